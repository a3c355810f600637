// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Tree Printing
//!
//! Reconstructs bytes from a tree: source text through [`PlainText`],
//! markup through [`Xml`]. The engine walks kids left to right with an
//! explicit work stack — trees may be megabytes deep, and the printer
//! must not recurse natively any more than the free path does.
//!
//! ## Ignore handling
//!
//! Ignore content is not printed where it is found. Walking down, ignore
//! wrappers and their tokens are *collected* onto a pending list; the
//! next terminal flushes the list in front of itself. That is also where
//! the suppression flags act: a `SUPPRESS_LEFT` wrapper chops everything
//! collected before it, a `SUPPRESS_RIGHT` wrapper stops the flush early.
//! With `trim` set, nothing is flushed until a real terminal has been
//! printed, and a sentinel terminal appended after the root keeps
//! trailing ignores from surviving either.

mod text;
mod xml;

pub use text::PlainText;
pub use xml::Xml;

use crate::program::Program;
use crate::tree::{KidId, LEL_ID_IGNORE, LEL_ID_SENTINEL, LelId, TreeId, flag};
use std::io::{self, Write};

/// Printing knobs shared by all styles.
#[derive(Debug, Clone, Copy)]
pub struct PrintOptions {
    /// Emit collected ignore content (whitespace, comments).
    pub comments: bool,
    /// Walk attribute kids instead of skipping to real children.
    pub attrs: bool,
    /// Hold back ignore output until a terminal has been seen, and drop
    /// trailing ignore output.
    pub trim: bool,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            comments: true,
            attrs: false,
            trim: false,
        }
    }
}

/// What a style callback is looking at.
#[derive(Debug, Clone, Copy)]
pub struct Visit {
    /// `None` for the trailing-flush sentinel.
    pub tree: Option<TreeId>,
    pub id: LelId,
    pub parent_id: Option<LelId>,
    /// Whether the visited kid has a following sibling.
    pub has_next: bool,
}

/// Open/term/close callbacks of one output format.
pub trait PrintStyle {
    fn open_tree(&mut self, prg: &Program, out: &mut dyn Write, visit: &Visit) -> io::Result<()>;
    fn print_term(&mut self, prg: &Program, out: &mut dyn Write, tree: TreeId) -> io::Result<()>;
    fn close_tree(&mut self, prg: &Program, out: &mut dyn Write, visit: &Visit) -> io::Result<()>;
}

/// A place in the walk: a real kid cell, a bare tree (collected ignore
/// entries re-visited by the flush), or the trailing sentinel.
#[derive(Debug, Clone, Copy)]
enum Item {
    Kid(KidId),
    Tree(TreeId),
    Sentinel,
}

impl Item {
    fn tree(self, prg: &Program) -> Option<TreeId> {
        match self {
            Self::Kid(k) => prg.kid(k).tree,
            Self::Tree(t) => Some(t),
            Self::Sentinel => None,
        }
    }

    fn id(self, prg: &Program) -> LelId {
        self.tree(prg)
            .map_or(LEL_ID_SENTINEL, |t| prg.tree(t).id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitType {
    IgnoreWrapper,
    IgnoreData,
    Term,
    NonTerm,
}

#[derive(Debug)]
enum Task {
    /// Visit the rest of a sibling chain.
    Chain {
        kid: Option<KidId>,
        parent: Option<Item>,
    },
    /// Full visit of one item: left ignore, body, right ignore.
    Visit {
        item: Item,
        parent: Option<Item>,
        has_next: bool,
    },
    /// Classify and collect/flush; queues `Open`.
    Body {
        item: Item,
        parent: Option<Item>,
        has_next: bool,
    },
    /// Open callback, terminal text, children.
    Open {
        item: Item,
        parent: Option<Item>,
        has_next: bool,
        vt: VisitType,
    },
    Close {
        item: Item,
        parent: Option<Item>,
        has_next: bool,
        vt: VisitType,
    },
    /// Descend into the right-ignore slot after the subtree.
    RightIgnore { item: Item },
}

fn classify(prg: &Program, item: Item, parent: Option<Item>) -> VisitType {
    let id = item.id(prg);
    if id == LEL_ID_IGNORE {
        VisitType::IgnoreWrapper
    } else if parent.is_some_and(|p| p.id(prg) == LEL_ID_IGNORE) {
        VisitType::IgnoreData
    } else if id < prg.rtd.first_nonterm_id {
        VisitType::Term
    } else {
        VisitType::NonTerm
    }
}

fn visit_info(prg: &Program, item: Item, parent: Option<Item>, has_next: bool) -> Visit {
    Visit {
        tree: item.tree(prg),
        id: item.id(prg),
        parent_id: parent.map(|p| p.id(prg)),
        has_next,
    }
}

/// Print a tree through a style. A missing tree prints as `NIL`.
pub fn print_tree<S: PrintStyle + ?Sized>(
    prg: &Program,
    out: &mut dyn Write,
    style: &mut S,
    opts: &PrintOptions,
    tree: Option<TreeId>,
) -> io::Result<()> {
    let Some(root) = tree else {
        return out.write_all(b"NIL");
    };

    // Collected-but-unflushed ignore trees, in visitation order.
    let mut leading: Vec<TreeId> = Vec::new();
    let mut term_seen = false;

    let mut stack: Vec<Task> = Vec::new();
    // The sentinel terminal after the root forces trailing ignores out.
    stack.push(Task::Visit {
        item: Item::Sentinel,
        parent: None,
        has_next: false,
    });
    stack.push(Task::Visit {
        item: Item::Tree(root),
        parent: None,
        has_next: true,
    });

    while let Some(task) = stack.pop() {
        match task {
            Task::Chain { kid, parent } => {
                if let Some(k) = kid {
                    let next = prg.kid(k).next;
                    stack.push(Task::Chain { kid: next, parent });
                    stack.push(Task::Visit {
                        item: Item::Kid(k),
                        parent,
                        has_next: next.is_some(),
                    });
                }
            }

            Task::Visit {
                item,
                parent,
                has_next,
            } => {
                if let Item::Kid(k) = item {
                    if prg.kid(k).tree.is_none() {
                        continue;
                    }
                }
                stack.push(Task::RightIgnore { item });
                stack.push(Task::Body {
                    item,
                    parent,
                    has_next,
                });
                // Pending ignore data is gathered before the node itself.
                if let Some(t) = item.tree(prg) {
                    if prg.tree(t).has_left_ignore() {
                        let li = prg.left_ignore_kid(t).expect("left-ignore flag without kid");
                        stack.push(Task::Visit {
                            item: Item::Kid(li),
                            parent: Some(item),
                            has_next: prg.kid(li).next.is_some(),
                        });
                    }
                }
            }

            Task::Body {
                item,
                parent,
                has_next,
            } => {
                let vt = classify(prg, item, parent);
                log::trace!("print visit type: {vt:?}");

                if vt == VisitType::IgnoreData {
                    leading.push(item.tree(prg).expect("ignore data without tree"));
                    // The right-ignore task queued by Visit still runs.
                    continue;
                }
                if vt == VisitType::IgnoreWrapper {
                    leading.push(item.tree(prg).expect("ignore wrapper without tree"));
                }

                stack.push(Task::Open {
                    item,
                    parent,
                    has_next,
                    vt,
                });

                // A terminal flushes what has been collected so far.
                if vt == VisitType::Term && !leading.is_empty() {
                    // A suppress-left wrapper chops everything gathered
                    // before it.
                    if let Some(i) = leading
                        .iter()
                        .rposition(|&t| prg.tree(t).flags & flag::SUPPRESS_LEFT != 0)
                    {
                        leading.drain(..i);
                    }

                    let id = item.id(prg);
                    if opts.comments && (!opts.trim || (term_seen && id != LEL_ID_SENTINEL)) {
                        let mut entries: Vec<TreeId> = Vec::new();
                        for &ig in &leading {
                            if prg.tree(ig).flags & flag::SUPPRESS_RIGHT != 0 {
                                break;
                            }
                            if prg.tree(ig).id != LEL_ID_IGNORE {
                                entries.push(ig);
                            }
                        }
                        // Entries print ahead of the Open queued above.
                        for &entry in entries.iter().rev() {
                            stack.push(Task::Visit {
                                item: Item::Tree(entry),
                                parent: None,
                                has_next: false,
                            });
                        }
                    }
                    leading.clear();
                }
            }

            Task::Open {
                item,
                parent,
                has_next,
                vt,
            } => {
                let info = visit_info(prg, item, parent, has_next);
                if vt == VisitType::Term || vt == VisitType::NonTerm {
                    style.open_tree(prg, out, &info)?;
                }
                if vt == VisitType::Term {
                    term_seen = true;
                    if info.id != LEL_ID_SENTINEL {
                        let t = item.tree(prg).expect("terminal without tree");
                        style.print_term(prg, out, t)?;
                    }
                }

                stack.push(Task::Close {
                    item,
                    parent,
                    has_next,
                    vt,
                });
                if let Some(t) = item.tree(prg) {
                    let child = if opts.attrs {
                        prg.tree_attr(t)
                    } else {
                        prg.tree_child(t)
                    };
                    stack.push(Task::Chain {
                        kid: child,
                        parent: Some(item),
                    });
                }
            }

            Task::Close {
                item,
                parent,
                has_next,
                vt,
            } => {
                if vt == VisitType::Term || vt == VisitType::NonTerm {
                    let info = visit_info(prg, item, parent, has_next);
                    style.close_tree(prg, out, &info)?;
                }
            }

            Task::RightIgnore { item } => {
                if let Some(t) = item.tree(prg) {
                    if prg.tree(t).has_right_ignore() {
                        let ri = prg
                            .right_ignore_kid(t)
                            .expect("right-ignore flag without kid");
                        stack.push(Task::Visit {
                            item: Item::Kid(ri),
                            parent: Some(item),
                            has_next: prg.kid(ri).next.is_some(),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

/// Source text into a byte collector.
#[must_use]
pub fn print_tree_collect(prg: &Program, tree: Option<TreeId>, trim: bool) -> Vec<u8> {
    let mut collect = Vec::new();
    let opts = PrintOptions {
        trim,
        ..PrintOptions::default()
    };
    print_tree(prg, &mut collect, &mut PlainText, &opts, tree)
        .expect("writes to a collector cannot fail");
    collect
}

/// Source text as a (lossy) string; test-friendly.
#[must_use]
pub fn print_tree_str(prg: &Program, tree: Option<TreeId>, trim: bool) -> String {
    String::from_utf8_lossy(&print_tree_collect(prg, tree, trim)).into_owned()
}

/// XML to a writer. `comm_attr` switches on both comment output and
/// attribute walking.
pub fn print_xml(
    prg: &Program,
    out: &mut dyn Write,
    tree: Option<TreeId>,
    comm_attr: bool,
    trim: bool,
) -> io::Result<()> {
    let opts = PrintOptions {
        comments: comm_attr,
        attrs: comm_attr,
        trim,
    };
    print_tree(prg, out, &mut Xml, &opts, tree)
}

/// XML into a byte collector.
#[must_use]
pub fn print_xml_collect(prg: &Program, tree: Option<TreeId>, comm_attr: bool, trim: bool) -> Vec<u8> {
    let mut collect = Vec::new();
    print_xml(prg, &mut collect, tree, comm_attr, trim)
        .expect("writes to a collector cannot fail");
    collect
}
