// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Head strings: the byte buffers behind token data.

use serde::{Deserialize, Serialize};

/// A position in the input, recorded at the first byte of a token.
///
/// Lines and columns are one-based; `byte` is the absolute offset from the
/// start of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Location {
    pub line: u64,
    pub column: u64,
    pub byte: u64,
}

/// A pooled, length-delimited byte buffer, optionally carrying the source
/// location of its first byte.
#[derive(Debug, Clone, Default)]
pub struct Head {
    pub data: Box<[u8]>,
    pub location: Option<Location>,
}

impl Head {
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        Self {
            data: data.into(),
            location: None,
        }
    }

    #[must_use]
    pub fn with_location(data: &[u8], location: Location) -> Self {
        Self {
            data: data.into(),
            location: Some(location),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
