// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! XML printing with repeat/list flattening.
//!
//! Every language element opens and closes its `xml_tag`. Chains of
//! right-recursive repeats and lists would nest one tag per element, so a
//! kid that continues its parent's repetition (same id, last sibling,
//! element marked `repeat` or `list`) skips its own tags and the chain
//! prints flat.

use super::{PrintStyle, Visit};
use crate::program::Program;
use crate::tree::{LEL_ID_IGNORE, Payload, TreeId};
use std::io::{self, Write};

/// Emits a one-tag-per-element XML rendering of the tree.
#[derive(Debug, Default)]
pub struct Xml;

fn flattened(prg: &Program, visit: &Visit) -> bool {
    let Some(parent_id) = visit.parent_id else {
        return false;
    };
    if parent_id != visit.id || visit.has_next {
        return false;
    }
    let lel = prg.rtd.lel(parent_id);
    lel.repeat || lel.list
}

/// Escape bytes for XML content. Printable ASCII and common whitespace
/// pass through; markup characters and the rest become references.
pub fn xml_escape(out: &mut dyn Write, data: &[u8]) -> io::Result<()> {
    for &byte in data {
        match byte {
            b'<' => out.write_all(b"&lt;")?,
            b'>' => out.write_all(b"&gt;")?,
            b'&' => out.write_all(b"&amp;")?,
            0x20..=0x7e | b'\t' | b'\n' | b'\r' => out.write_all(&[byte])?,
            _ => write!(out, "&#{byte};")?,
        }
    }
    Ok(())
}

impl PrintStyle for Xml {
    fn open_tree(&mut self, prg: &Program, out: &mut dyn Write, visit: &Visit) -> io::Result<()> {
        // The trailing-flush sentinel prints nothing.
        if visit.tree.is_none() {
            return Ok(());
        }
        if flattened(prg, visit) {
            return Ok(());
        }
        write!(out, "<{}>", prg.rtd.lel(visit.id).xml_tag)
    }

    fn print_term(&mut self, prg: &Program, out: &mut dyn Write, tree: TreeId) -> io::Result<()> {
        let t = prg.tree(tree);
        match t.payload {
            Payload::Ptr(value) => writeln!(out, "#0x{value:x}"),
            Payload::Str(head) => xml_escape(out, &prg.head(head).data),
            Payload::None => {
                if t.id > 0 && prg.rtd.is_terminal(t.id) && t.id != LEL_ID_IGNORE {
                    let data = prg.tokdata_bytes(tree);
                    if !data.is_empty() {
                        return xml_escape(out, data);
                    }
                }
                Ok(())
            }
        }
    }

    fn close_tree(&mut self, prg: &Program, out: &mut dyn Write, visit: &Visit) -> io::Result<()> {
        if visit.tree.is_none() {
            return Ok(());
        }
        if flattened(prg, visit) {
            return Ok(());
        }
        write!(out, "</{}>", prg.rtd.lel(visit.id).xml_tag)
    }
}
