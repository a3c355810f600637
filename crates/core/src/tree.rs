// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # The Tree Model
//!
//! Trees are the universal value of the runtime: every token the scanner
//! emits, every nonterminal the parser reduces, and every value user code
//! constructs is a [`Tree`] node living in a per-program pool.
//!
//! ## Child layout
//!
//! A tree's children hang off a single-linked list of [`Kid`] cells with a
//! fixed prefix layout:
//!
//! ```text
//! child = [ left-ignore kid? , right-ignore kid? , attr[0..object_length) , real children... ]
//! ```
//!
//! The two ignore slots are present iff the corresponding flag bit is set.
//! An ignore slot's tree has `id == LEL_ID_IGNORE` and its own children
//! are the ignored tokens (whitespace, comments) collected next to the
//! tree. `object_length` comes from the language-element descriptor and
//! gives the number of attribute kids preceding the real children.
//!
//! ## Sharing
//!
//! `refs` counts logical owners. A tree with `refs > 1` is never mutated;
//! writers call [`crate::Program::split_tree`] first, which copies the
//! node and rebinds the writer's slot (copy-on-write). Trees form a
//! forest — ignore lists are owned subtrees, never siblings — so plain
//! reference counting is sufficient; no cycles arise.

/// Identifier of a language element (terminal, nonterminal, or one of the
/// reserved built-ins).
pub type LelId = u16;

/// Machine word carried by pointer trees.
pub type Word = u64;

/// The sentinel terminal the printer appends to flush trailing ignores.
pub const LEL_ID_SENTINEL: LelId = 0;
/// Reserved id of pointer trees.
pub const LEL_ID_PTR: LelId = 1;
/// Reserved id of string trees.
pub const LEL_ID_STR: LelId = 2;
/// Reserved id of ignore-list wrapper trees.
pub const LEL_ID_IGNORE: LelId = 3;
/// First id available to compiler-defined language elements.
pub const LEL_FIRST_USER: LelId = 4;

/// Tree flag bits.
pub mod flag {
    /// The first kid is a left-ignore list.
    pub const LEFT_IGNORE: u8 = 0x01;
    /// A right-ignore list follows the left-ignore kid (or heads the list).
    pub const RIGHT_IGNORE: u8 = 0x02;
    /// Printer: drop ignore content to the left of this wrapper.
    pub const SUPPRESS_LEFT: u8 = 0x04;
    /// Printer: drop ignore content from this wrapper rightward.
    pub const SUPPRESS_RIGHT: u8 = 0x08;
}

/// Handle to a pooled [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) u32);

/// Handle to a pooled [`Kid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KidId(pub(crate) u32);

/// Handle to a pooled [`crate::Head`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadId(pub(crate) u32);

/// Specialised value embedded in a tree, selected by its reserved id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    None,
    /// `id == LEL_ID_PTR`
    Ptr(Word),
    /// `id == LEL_ID_STR`
    Str(HeadId),
}

/// A single cell in a tree's child list.
///
/// Kids are never shared; each is owned by exactly one parent slot. An
/// attribute kid may carry no tree at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kid {
    pub tree: Option<TreeId>,
    pub next: Option<KidId>,
}

/// A tree node.
///
/// `prod_num` identifies the production that built a nonterminal; a cast
/// sets it to `-1`, which invalidates per-production child access.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tree {
    pub id: LelId,
    pub flags: u8,
    pub refs: u32,
    pub prod_num: i32,
    pub tokdata: Option<HeadId>,
    pub child: Option<KidId>,
    pub payload: Payload,
}

impl Tree {
    #[must_use]
    pub const fn has_left_ignore(&self) -> bool {
        self.flags & flag::LEFT_IGNORE != 0
    }

    #[must_use]
    pub const fn has_right_ignore(&self) -> bool {
        self.flags & flag::RIGHT_IGNORE != 0
    }

    /// Count of ignore kids heading the child list.
    #[must_use]
    pub const fn ignore_slots(&self) -> usize {
        self.has_left_ignore() as usize + self.has_right_ignore() as usize
    }
}
