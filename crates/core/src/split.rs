// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Copy-on-Write Splitting
//!
//! A tree with more than one owner is never written through. Writers call
//! [`Program::split_tree`] to get a private copy first; the copy shares
//! grandchildren by reference count, so splitting is shallow and cheap.
//!
//! [`Program::split_ref`] extends the same guarantee to a *path* of kid
//! slots: when user code holds a reference reaching down into a shared
//! tree, every shared level along the path is copied and the path entries
//! are rebound to the copies. The path is an explicit vector of kid
//! handles ([`RefPath`]) ordered from the rootmost slot down to the
//! target.

use crate::program::Program;
use crate::tree::{KidId, LEL_ID_PTR, LEL_ID_STR, Tree, TreeId};
use smallvec::SmallVec;

/// A chain of kid slots from an anchored root slot down to a target kid.
///
/// Consecutive duplicate entries are allowed; they represent multiple
/// references that share the same slot and are rebound together by
/// [`Program::split_ref`].
#[derive(Debug, Default)]
pub struct RefPath {
    kids: SmallVec<[KidId; 8]>,
}

impl RefPath {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next slot on the way down.
    pub fn descend(&mut self, kid: KidId) {
        self.kids.push(kid);
    }

    /// The slot the path ultimately refers to.
    #[must_use]
    pub fn target(&self) -> Option<KidId> {
        self.kids.last().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.kids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kids.is_empty()
    }
}

impl Program {
    /// Shallow copy of a tree: the node itself and its kid list are
    /// fresh, token data is deep-copied, child trees are shared with an
    /// extra reference each.
    ///
    /// While copying kids, the kid equal to `old_next_down` is tracked
    /// and its counterpart in the copy is returned, so a reference chain
    /// through this tree can be rebound to the copy.
    ///
    /// The copy starts with `refs = 0`; the caller takes ownership.
    pub fn copy_real_tree(
        &mut self,
        tree: TreeId,
        old_next_down: Option<KidId>,
    ) -> (TreeId, Option<KidId>) {
        let src: Tree = *self.tree(tree);
        let new_tree = self.tree_alloc();
        let tokdata = self.string_copy(src.tokdata);
        {
            let t = self.tree_mut(new_tree);
            t.id = src.id;
            t.prod_num = src.prod_num;
            t.tokdata = tokdata;
            // The ignore kids sit in the child list and are copied below
            // like everything else; only the flags need carrying over.
            t.flags = src.flags;
        }

        let mut new_next_down = None;
        let mut child = src.child;
        let mut last: Option<KidId> = None;
        while let Some(k) = child {
            let kid = *self.kid(k);
            let new_kid = self.kid_alloc();
            if Some(k) == old_next_down {
                new_next_down = Some(new_kid);
            }
            self.kid_mut(new_kid).tree = kid.tree;
            if let Some(child_tree) = kid.tree {
                self.upref(child_tree);
            }
            match last {
                None => self.tree_mut(new_tree).child = Some(new_kid),
                Some(l) => self.kid_mut(l).next = Some(new_kid),
            }
            last = Some(new_kid);
            child = kid.next;
        }

        (new_tree, new_next_down)
    }

    /// Copy dispatch. Pointer and string trees are immutable values and
    /// must never reach a split; hitting one here is a runtime bug.
    pub fn copy_tree(
        &mut self,
        tree: TreeId,
        old_next_down: Option<KidId>,
    ) -> (TreeId, Option<KidId>) {
        let id = self.tree(tree).id;
        assert!(
            id != LEL_ID_PTR && id != LEL_ID_STR,
            "copy of a specialised tree"
        );
        let copied = self.copy_real_tree(tree, old_next_down);
        debug_assert_eq!(self.tree(copied.0).refs, 0);
        copied
    }

    /// Enforce copy-on-write: a shared tree is copied, the original loses
    /// one reference, and the private copy (refs = 1) is returned. A tree
    /// that is already private is returned unchanged.
    #[must_use = "the caller's slot must be rebound to the returned tree"]
    pub fn split_tree(&mut self, tree: TreeId) -> TreeId {
        let refs = self.tree(tree).refs;
        assert!(refs >= 1, "split of an unowned tree");
        if refs == 1 {
            return tree;
        }
        log::trace!("splitting shared tree ({refs} refs)");
        let (new_tree, _) = self.copy_tree(tree, None);
        self.upref(new_tree);
        // No free to consider; refs were > 1.
        self.tree_mut(tree).refs -= 1;
        new_tree
    }

    /// Copy-on-write along a reference path.
    ///
    /// Walks the path downward. At each level whose tree is shared, the
    /// tree is copied, every path entry sharing that slot is rebound to
    /// the copy, and entries one level down are redirected to the copied
    /// kid.
    pub fn split_ref(&mut self, path: &mut RefPath) {
        let kids = &mut path.kids;
        let mut i = 0;
        while i < kids.len() {
            let kid_id = kids[i];
            let tree_id = self
                .kid(kid_id)
                .tree
                .expect("reference path through an empty slot");
            if self.tree(tree_id).refs > 1 {
                let mut j = i + 1;
                while j < kids.len() && kids[j] == kid_id {
                    j += 1;
                }
                let old_next_down = kids.get(j).copied();

                let (new_tree, new_next_down) = self.copy_tree(tree_id, old_next_down);
                self.upref(new_tree);
                // No free to consider; refs were > 1.
                self.tree_mut(tree_id).refs -= 1;
                self.kid_mut(kid_id).tree = Some(new_tree);

                if let Some(old_kid) = old_next_down {
                    let new_kid =
                        new_next_down.expect("next-down slot not reached while copying kids");
                    let mut k = j;
                    while k < kids.len() && kids[k] == old_kid {
                        kids[k] = new_kid;
                        k += 1;
                    }
                }
                i = j;
            } else {
                i += 1;
            }
        }
    }

    /// Replace the tree a reference's target slot holds, releasing the
    /// previous value. Call [`Program::split_ref`] first so the write
    /// lands in a private tree.
    pub fn ref_set_value(&mut self, kid: KidId, value: Option<TreeId>) {
        if let Some(old) = self.kid(kid).tree {
            self.downref(old);
        }
        self.kid_mut(kid).tree = value;
    }
}
