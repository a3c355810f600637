// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

/*!
This crate is the tree half of the weft runtime.

It provides the pooled parse-tree model used by the scannerless parser
driver: reference-counted trees with attached ignore (whitespace/comment)
sidecars, copy-on-write sharing, tree construction from compiler-emitted
pattern tables, structural matching with capture bindings, and printers
that reconstruct source text or XML from a tree.

A [`Program`] owns everything: the node pools, the runtime descriptor
tables handed over by the grammar compiler, and the VM stack used to walk
arbitrarily deep trees without native recursion.
*/

pub mod construct;
pub mod error;
pub mod head;
pub mod ignore;
pub mod matcher;
pub mod ops;
pub mod pool;
pub mod print;
pub mod program;
pub mod runtime;
pub mod split;
pub mod tree;

pub use error::RuntimeError;
pub use head::{Head, Location};
pub use matcher::Bindings;
pub use print::{PrintOptions, PrintStyle, print_tree, print_tree_collect, print_xml_collect};
pub use program::{Pools, Program, VmStack};
pub use runtime::{
    CaptureAttr, LangElInfo, PAT_NONE, PatNode, RuntimeData, Template, TemplateItem,
};
pub use split::RefPath;
pub use tree::{
    HeadId, Kid, KidId, LEL_FIRST_USER, LEL_ID_IGNORE, LEL_ID_PTR, LEL_ID_SENTINEL, LEL_ID_STR,
    LelId, Payload, Tree, TreeId, Word, flag,
};
