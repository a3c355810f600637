// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The unit of stream queuing.

use crate::stream::Stream;
use weft_core::TreeId;

/// Fixed size of a [`RunBuf`]'s data area.
pub const RUNBUF_SIZE: usize = 8192;

/// What a queued buffer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunBufKind {
    /// Raw bytes in `data[offset..length]`.
    Data,
    /// A pre-built tree fed in place of characters.
    Token,
    /// A pre-built ignore tree.
    Ignore,
    /// A nested stream spliced in front of this one.
    Source,
}

/// One queued block of input.
///
/// `offset` is the consumed prefix within `data`; both stay within
/// `[0, RUNBUF_SIZE]`. Tree and stream payloads are used by the `Token`,
/// `Ignore`, and `Source` kinds.
pub struct RunBuf {
    pub kind: RunBufKind,
    pub data: [u8; RUNBUF_SIZE],
    pub length: usize,
    pub offset: usize,
    pub tree: Option<TreeId>,
    pub stream: Option<Box<Stream>>,
}

impl RunBuf {
    /// A fresh, empty data buffer. Boxed; these are 8 KiB each and live
    /// in a queue.
    #[must_use]
    pub fn new() -> Box<Self> {
        Box::new(Self {
            kind: RunBufKind::Data,
            data: [0; RUNBUF_SIZE],
            length: 0,
            offset: 0,
            tree: None,
            stream: None,
        })
    }

    /// A data buffer holding `bytes`; at most [`RUNBUF_SIZE`] of them.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Box<Self> {
        assert!(bytes.len() <= RUNBUF_SIZE, "runbuf overflow");
        let mut buf = Self::new();
        buf.data[..bytes.len()].copy_from_slice(bytes);
        buf.length = bytes.len();
        buf
    }

    /// A buffer carrying a pre-built tree.
    #[must_use]
    pub fn from_tree(tree: TreeId, ignore: bool) -> Box<Self> {
        let mut buf = Self::new();
        buf.kind = if ignore {
            RunBufKind::Ignore
        } else {
            RunBufKind::Token
        };
        buf.tree = Some(tree);
        buf
    }

    /// A buffer splicing a nested stream.
    #[must_use]
    pub fn from_stream(stream: Stream) -> Box<Self> {
        let mut buf = Self::new();
        buf.kind = RunBufKind::Source;
        buf.stream = Some(Box::new(stream));
        buf
    }

    /// Unread bytes remaining in a data buffer.
    #[must_use]
    pub fn avail(&self) -> usize {
        self.length - self.offset
    }
}

impl std::fmt::Debug for RunBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunBuf")
            .field("kind", &self.kind)
            .field("length", &self.length)
            .field("offset", &self.offset)
            .field("tree", &self.tree)
            .field("stream", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_bytes_bounds() {
        let buf = RunBuf::from_bytes(b"abc");
        assert_eq!(buf.kind, RunBufKind::Data);
        assert_eq!(buf.length, 3);
        assert_eq!(buf.offset, 0);
        assert_eq!(buf.avail(), 3);
        assert_eq!(&buf.data[..3], b"abc");
    }

    #[test]
    #[should_panic(expected = "runbuf overflow")]
    fn test_oversize_rejected() {
        let big = vec![0u8; RUNBUF_SIZE + 1];
        let _ = RunBuf::from_bytes(&big);
    }
}
