// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Runtime Descriptor Tables
//!
//! The grammar compiler is a black box to this crate. What it hands over
//! is data: a descriptor per language element, a dense pattern-node table
//! that templates are built from and matched against, capture-attribute
//! rows, and the terminal/nonterminal id boundary. [`RuntimeData`] bundles
//! those tables, validates their cross-references once, and serves lookups
//! for the rest of the runtime.
//!
//! The tables are plain serde types, so a front-end can ship them as JSON
//! (or any serde format) and the runtime can load them with
//! [`RuntimeData::from_json`].
//!
//! ## Pattern nodes
//!
//! A [`PatNode`] describes one tree node of a compiled pattern or
//! constructor template. The four link fields (`child`, `next`,
//! `left_ignore`, `right_ignore`) are indexes into the same table, with
//! [`PAT_NONE`] (`-1`) meaning absent — the table keeps the compiler's
//! wire format rather than translating into `Option` at the edge.

use crate::error::RuntimeError;
use crate::tree::{LEL_FIRST_USER, LEL_ID_IGNORE, LelId};
use serde::{Deserialize, Serialize};
use weft_util::FastMap;

/// Absent link in a [`PatNode`].
pub const PAT_NONE: i32 = -1;

const fn pat_none() -> i32 {
    PAT_NONE
}

/// Descriptor of one language element.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LangElInfo {
    pub name: String,
    /// Tag emitted by the XML printer.
    pub xml_tag: String,
    /// Whitespace/comment terminal collected into ignore lists.
    #[serde(default)]
    pub ignore: bool,
    /// Right-recursive repetition; the XML printer flattens chains of it.
    #[serde(default)]
    pub repeat: bool,
    /// Separated list; flattened like `repeat`.
    #[serde(default)]
    pub list: bool,
    /// Number of attribute kids preceding a tree's real children.
    #[serde(default)]
    pub object_length: u32,
    /// Number of capture attributes, starting at `capture_attr`.
    #[serde(default)]
    pub num_capture_attr: u32,
    /// First row of this element's window in the capture-attribute table.
    #[serde(default)]
    pub capture_attr: u32,
}

/// One row of the capture-attribute table: the attribute slot a captured
/// terminal is stored into.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CaptureAttr {
    pub offset: u32,
}

/// One node of the compiled pattern/constructor table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatNode {
    pub id: LelId,
    #[serde(default)]
    pub prod_num: i32,
    /// Token text to build from or match against; `None` is the
    /// "no data" state, distinct from empty text.
    #[serde(default)]
    pub data: Option<Box<[u8]>>,
    #[serde(default = "pat_none")]
    pub child: i32,
    #[serde(default = "pat_none")]
    pub next: i32,
    #[serde(default = "pat_none")]
    pub left_ignore: i32,
    #[serde(default = "pat_none")]
    pub right_ignore: i32,
    /// Capture/substitution slot; `0` means unbound.
    #[serde(default)]
    pub bind_id: u32,
    /// Stop descent: the node matched a terminal duplicate of a
    /// nonterminal, so children are not compared.
    #[serde(default)]
    pub stop: bool,
}

impl Default for PatNode {
    fn default() -> Self {
        Self {
            id: 0,
            prod_num: 0,
            data: None,
            child: PAT_NONE,
            next: PAT_NONE,
            left_ignore: PAT_NONE,
            right_ignore: PAT_NONE,
            bind_id: 0,
            stop: false,
        }
    }
}

/// One item of a pattern or constructor template walked by a
/// template-backed stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TemplateItem {
    /// Literal input characters.
    Text(Box<[u8]>),
    /// A named language element, fed to the parser as a token with its
    /// capture slot.
    Factor { id: LelId, bind_id: u32 },
}

/// A compiled pattern or constructor template.
pub type Template = Vec<TemplateItem>;

/// The complete table set consumed from the grammar compiler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeData {
    pub lel_info: Vec<LangElInfo>,
    pub pat_nodes: Vec<PatNode>,
    pub capture_attr: Vec<CaptureAttr>,
    /// Ids below this are terminals; at or above, nonterminals.
    pub first_nonterm_id: LelId,
    #[serde(skip)]
    name_index: FastMap<String, LelId>,
}

impl RuntimeData {
    /// Decode tables from their JSON wire form and validate them.
    pub fn from_json(json: &str) -> Result<Self, RuntimeError> {
        let mut rtd: Self = serde_json::from_str(json)?;
        rtd.validate()?;
        rtd.build_index();
        Ok(rtd)
    }

    /// Start assembling tables by hand (tests, embedders).
    #[must_use]
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Check cross-table consistency. Called once at program creation;
    /// the runtime trusts the tables afterwards.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        let count = self.lel_info.len();
        if count < LEL_FIRST_USER as usize {
            return Err(RuntimeError::MissingReserved {
                count,
                min: LEL_FIRST_USER as usize,
            });
        }
        if self.first_nonterm_id as usize > count {
            return Err(RuntimeError::NontermBoundary {
                first: self.first_nonterm_id,
                count,
            });
        }
        for (id, lel) in self.lel_info.iter().enumerate() {
            let start = lel.capture_attr as usize;
            let end = start + lel.num_capture_attr as usize;
            if end > self.capture_attr.len() && lel.num_capture_attr > 0 {
                return Err(RuntimeError::CaptureRange {
                    lel: id as LelId,
                    start,
                    end,
                    count: self.capture_attr.len(),
                });
            }
            for row in self.capture_attr.iter().take(end).skip(start) {
                if row.offset >= lel.object_length {
                    return Err(RuntimeError::CaptureOffset {
                        lel: id as LelId,
                        offset: row.offset,
                        object_length: lel.object_length,
                    });
                }
            }
        }
        for (i, node) in self.pat_nodes.iter().enumerate() {
            if node.id as usize >= count {
                return Err(RuntimeError::BadNodeId {
                    node: i,
                    id: node.id,
                });
            }
            for target in [node.child, node.next, node.left_ignore, node.right_ignore] {
                if target != PAT_NONE && (target < 0 || target as usize >= self.pat_nodes.len()) {
                    return Err(RuntimeError::BadNodeLink { node: i, target });
                }
            }
        }
        Ok(())
    }

    /// Rebuild the name-to-id index. `from_json` and the builder call
    /// this; call it yourself after mutating `lel_info` directly.
    pub fn build_index(&mut self) {
        self.name_index = weft_util::map_with_capacity(self.lel_info.len());
        for (id, lel) in self.lel_info.iter().enumerate() {
            self.name_index.insert(lel.name.clone(), id as LelId);
        }
    }

    /// Resolve a language element by name.
    #[must_use]
    pub fn lookup_id(&self, name: &str) -> Option<LelId> {
        self.name_index.get(name).copied()
    }

    #[must_use]
    pub fn lel(&self, id: LelId) -> &LangElInfo {
        &self.lel_info[id as usize]
    }

    /// Attribute-slot count of an element.
    #[must_use]
    pub fn object_length(&self, id: LelId) -> usize {
        self.lel_info[id as usize].object_length as usize
    }

    #[must_use]
    pub fn is_ignore(&self, id: LelId) -> bool {
        self.lel_info[id as usize].ignore
    }

    #[must_use]
    pub fn is_terminal(&self, id: LelId) -> bool {
        id < self.first_nonterm_id
    }

    /// Pattern node at a link index; [`PAT_NONE`] resolves to `None`.
    #[must_use]
    pub fn pat(&self, index: i32) -> Option<&PatNode> {
        if index == PAT_NONE {
            None
        } else {
            Some(&self.pat_nodes[index as usize])
        }
    }
}

/// Incremental construction of [`RuntimeData`].
///
/// Reserved elements are seeded automatically. Terminals must be added
/// before the first nonterminal; the boundary is recorded when the first
/// nonterminal arrives.
#[derive(Debug)]
pub struct RuntimeBuilder {
    lel_info: Vec<LangElInfo>,
    capture_attr: Vec<CaptureAttr>,
    pat_nodes: Vec<PatNode>,
    first_nonterm_id: Option<LelId>,
}

impl RuntimeBuilder {
    #[must_use]
    fn new() -> Self {
        let reserved = ["_sentinel", "_ptr", "_str", "_ignore"];
        let mut lel_info: Vec<LangElInfo> = reserved
            .iter()
            .map(|name| LangElInfo {
                name: (*name).to_string(),
                xml_tag: (*name).to_string(),
                ..LangElInfo::default()
            })
            .collect();
        lel_info[LEL_ID_IGNORE as usize].ignore = true;
        Self {
            lel_info,
            capture_attr: Vec::new(),
            pat_nodes: Vec::new(),
            first_nonterm_id: None,
        }
    }

    fn push(&mut self, lel: LangElInfo) -> LelId {
        let id = self.lel_info.len() as LelId;
        self.lel_info.push(lel);
        id
    }

    /// Add a plain terminal.
    pub fn terminal(&mut self, name: &str) -> LelId {
        assert!(
            self.first_nonterm_id.is_none(),
            "terminals must precede nonterminals"
        );
        self.push(LangElInfo {
            name: name.to_string(),
            xml_tag: name.to_string(),
            ..LangElInfo::default()
        })
    }

    /// Add an ignore terminal (whitespace, comments).
    pub fn ignore_terminal(&mut self, name: &str) -> LelId {
        let id = self.terminal(name);
        self.lel_info[id as usize].ignore = true;
        id
    }

    /// Add a terminal with attribute slots, capturing the given slots.
    pub fn capture_terminal(&mut self, name: &str, object_length: u32, captures: &[u32]) -> LelId {
        assert!(
            self.first_nonterm_id.is_none(),
            "terminals must precede nonterminals"
        );
        let capture_attr = self.capture_attr.len() as u32;
        self.capture_attr
            .extend(captures.iter().map(|&offset| CaptureAttr { offset }));
        self.push(LangElInfo {
            name: name.to_string(),
            xml_tag: name.to_string(),
            object_length,
            num_capture_attr: captures.len() as u32,
            capture_attr,
            ..LangElInfo::default()
        })
    }

    /// Add a nonterminal. The first one fixes the terminal/nonterminal
    /// boundary.
    pub fn nonterm(&mut self, name: &str, object_length: u32) -> LelId {
        let id = self.push(LangElInfo {
            name: name.to_string(),
            xml_tag: name.to_string(),
            object_length,
            ..LangElInfo::default()
        });
        self.first_nonterm_id.get_or_insert(id);
        id
    }

    /// Mark an element as a flattenable repetition.
    pub fn mark_repeat(&mut self, id: LelId) {
        self.lel_info[id as usize].repeat = true;
    }

    /// Mark an element as a flattenable list.
    pub fn mark_list(&mut self, id: LelId) {
        self.lel_info[id as usize].list = true;
    }

    /// Install the pattern-node table.
    pub fn pat_nodes(&mut self, nodes: Vec<PatNode>) {
        self.pat_nodes = nodes;
    }

    pub fn finish(self) -> Result<RuntimeData, RuntimeError> {
        let first_nonterm_id = self
            .first_nonterm_id
            .unwrap_or(self.lel_info.len() as LelId);
        let mut rtd = RuntimeData {
            lel_info: self.lel_info,
            pat_nodes: self.pat_nodes,
            capture_attr: self.capture_attr,
            first_nonterm_id,
            name_index: FastMap::default(),
        };
        rtd.validate()?;
        rtd.build_index();
        Ok(rtd)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn small_tables() -> RuntimeData {
        let mut b = RuntimeData::builder();
        b.ignore_terminal("ws");
        let num = b.terminal("num");
        b.terminal("plus");
        b.nonterm("expr", 0);
        b.pat_nodes(vec![PatNode {
            id: num,
            data: Some(b"42"[..].into()),
            ..PatNode::default()
        }]);
        b.finish().expect("tables are consistent")
    }

    #[test]
    fn test_builder_boundary_and_lookup() {
        let rtd = small_tables();
        assert_eq!(rtd.lookup_id("ws"), Some(4));
        assert_eq!(rtd.lookup_id("expr"), Some(7));
        assert_eq!(rtd.first_nonterm_id, 7);
        assert!(rtd.is_terminal(5));
        assert!(!rtd.is_terminal(7));
        assert!(rtd.is_ignore(4));
    }

    #[test]
    fn test_pat_link_resolution() {
        let rtd = small_tables();
        assert!(rtd.pat(PAT_NONE).is_none());
        assert_eq!(rtd.pat(0).unwrap().data.as_deref(), Some(&b"42"[..]));
    }

    #[test]
    fn test_validate_rejects_bad_link() {
        let mut b = RuntimeData::builder();
        let num = b.terminal("num");
        b.pat_nodes(vec![PatNode {
            id: num,
            child: 7,
            ..PatNode::default()
        }]);
        assert!(matches!(
            b.finish(),
            Err(RuntimeError::BadNodeLink { node: 0, target: 7 })
        ));
    }

    #[test]
    fn test_validate_rejects_capture_past_object_length() {
        let mut b = RuntimeData::builder();
        b.capture_terminal("str", 1, &[1]);
        assert!(matches!(
            b.finish(),
            Err(RuntimeError::CaptureOffset { .. })
        ));
    }

    #[test]
    fn test_json_roundtrip() {
        let rtd = small_tables();
        let json = serde_json::to_string(&rtd).expect("serialize");
        let back = RuntimeData::from_json(&json).expect("deserialize");
        assert_eq!(back.lel_info.len(), rtd.lel_info.len());
        assert_eq!(back.first_nonterm_id, rtd.first_nonterm_id);
        assert_eq!(back.lookup_id("num"), rtd.lookup_id("num"));
        assert_eq!(
            back.pat_nodes[0].data.as_deref(),
            rtd.pat_nodes[0].data.as_deref()
        );
    }
}
