// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use crate::tree::LelId;
use thiserror::Error;

/// Errors raised while loading or validating the compiler-emitted runtime
/// tables.
///
/// Everything here points at a broken front-end, not at bad input text:
/// the tables are validated once when a [`crate::Program`] is created, and
/// the runtime assumes them consistent afterwards.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The reserved language elements (sentinel, pointer, string, ignore)
    /// are missing from the descriptor table.
    #[error("reserved language elements missing: {count} defined, at least {min} required")]
    MissingReserved { count: usize, min: usize },

    /// `first_nonterm_id` does not lie within the descriptor table.
    #[error("first nonterminal id {first} exceeds the language element count {count}")]
    NontermBoundary { first: LelId, count: usize },

    /// A pattern node links to a table index that does not exist.
    #[error("pattern node {node} links to missing node {target}")]
    BadNodeLink { node: usize, target: i32 },

    /// A pattern node names a language element the descriptor table does
    /// not define.
    #[error("pattern node {node} names undefined language element {id}")]
    BadNodeId { node: usize, id: LelId },

    /// A language element's capture-attribute window is out of range.
    #[error("element {lel}: capture attributes {start}..{end} out of range ({count} rows)")]
    CaptureRange {
        lel: LelId,
        start: usize,
        end: usize,
        count: usize,
    },

    /// A capture attribute targets an attribute slot past the element's
    /// object length.
    #[error("element {lel}: capture offset {offset} exceeds object length {object_length}")]
    CaptureOffset {
        lel: LelId,
        offset: u32,
        object_length: u32,
    },

    /// The serialized table form could not be decoded.
    #[error("malformed runtime tables: {0}")]
    Malformed(#[from] serde_json::Error),
}
