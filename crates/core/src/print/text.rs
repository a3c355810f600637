// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Plain-text printing: terminals emit their bytes, structure emits
//! nothing.

use super::{PrintStyle, Visit};
use crate::program::Program;
use crate::tree::{Payload, TreeId};
use std::io::{self, Write};

/// Reconstructs source text.
#[derive(Debug, Default)]
pub struct PlainText;

impl PrintStyle for PlainText {
    fn open_tree(&mut self, _prg: &Program, _out: &mut dyn Write, _visit: &Visit) -> io::Result<()> {
        Ok(())
    }

    fn print_term(&mut self, prg: &Program, out: &mut dyn Write, tree: TreeId) -> io::Result<()> {
        log::trace!("printing terminal {tree:?}");
        match prg.tree(tree).payload {
            Payload::Ptr(value) => write!(out, "#0x{value:x}"),
            Payload::Str(head) => out.write_all(&prg.head(head).data),
            Payload::None => {
                let data = prg.tokdata_bytes(tree);
                if data.is_empty() {
                    Ok(())
                } else {
                    out.write_all(data)
                }
            }
        }
    }

    fn close_tree(&mut self, _prg: &Program, _out: &mut dyn Write, _visit: &Visit) -> io::Result<()> {
        Ok(())
    }
}
