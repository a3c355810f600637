// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

/*!
This crate is the input half of the weft runtime.

A [`Stream`] feeds the scanner characters, pre-built trees, and named
language elements, and can take all of them back when the parser
backtracks. Every source kind — memory buffer, reader (file or fd),
pattern template, constructor template, accumulator — answers the same
operation set; prepended and ungotten data queues in fixed-size
[`RunBuf`]s ahead of the underlying source.
*/

mod runbuf;
mod stream;

pub use runbuf::{RUNBUF_SIZE, RunBuf, RunBufKind};
pub use stream::{InputResult, ParseBlock, SourceKind, Stream};
