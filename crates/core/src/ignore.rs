// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Ignore-List Attachment
//!
//! Ignore lists (whitespace and comments) ride along parse trees in the
//! two reserved slots at the head of the child list. Because the parser
//! backtracks, attachment must be reversible without an undo log: pushing
//! a new list onto a tree that already has one *nests* the old list as
//! the opposite-side ignore of the new list, and popping unwinds the
//! nesting. The stack of "what was here before" is encoded in the lists
//! themselves.
//!
//! All push/pop entry points split the target tree first; ignore
//! attachment counts as a write.

use crate::program::Program;
use crate::tree::{LEL_ID_IGNORE, TreeId, flag};

impl Program {
    /// Attach `ignore_list` as the left ignore of `tree`. The tree must
    /// not already have one.
    pub fn ins_left_ignore(&mut self, tree: TreeId, ignore_list: TreeId) {
        assert!(
            !self.tree(tree).has_left_ignore(),
            "tree already has a left ignore"
        );
        let kid = self.kid_alloc();
        self.kid_mut(kid).tree = Some(ignore_list);
        self.upref(ignore_list);

        let old_head = self.tree(tree).child;
        self.kid_mut(kid).next = old_head;
        let t = self.tree_mut(tree);
        t.child = Some(kid);
        t.flags |= flag::LEFT_IGNORE;
    }

    /// Attach `ignore_list` as the right ignore of `tree`. The tree must
    /// not already have one.
    pub fn ins_right_ignore(&mut self, tree: TreeId, ignore_list: TreeId) {
        assert!(
            !self.tree(tree).has_right_ignore(),
            "tree already has a right ignore"
        );
        let kid = self.kid_alloc();
        self.kid_mut(kid).tree = Some(ignore_list);
        self.upref(ignore_list);

        if self.tree(tree).has_left_ignore() {
            let left = self.tree(tree).child.expect("left-ignore flag without kid");
            let after = self.kid(left).next;
            self.kid_mut(kid).next = after;
            self.kid_mut(left).next = Some(kid);
        } else {
            let old_head = self.tree(tree).child;
            self.kid_mut(kid).next = old_head;
            self.tree_mut(tree).child = Some(kid);
        }
        self.tree_mut(tree).flags |= flag::RIGHT_IGNORE;
    }

    /// Detach and release the left ignore.
    pub fn rem_left_ignore(&mut self, tree: TreeId) {
        assert!(self.tree(tree).has_left_ignore(), "no left ignore to drop");
        let kid = self.tree(tree).child.expect("left-ignore flag without kid");
        let next = self.kid(kid).next;
        if let Some(list) = self.kid(kid).tree {
            self.downref(list);
        }
        self.kid_release(kid);
        let t = self.tree_mut(tree);
        t.child = next;
        t.flags &= !flag::LEFT_IGNORE;
    }

    /// Detach and release the right ignore.
    pub fn rem_right_ignore(&mut self, tree: TreeId) {
        assert!(self.tree(tree).has_right_ignore(), "no right ignore to drop");
        if self.tree(tree).has_left_ignore() {
            let left = self.tree(tree).child.expect("left-ignore flag without kid");
            let kid = self.kid(left).next.expect("right-ignore flag without kid");
            let next = self.kid(kid).next;
            if let Some(list) = self.kid(kid).tree {
                self.downref(list);
            }
            self.kid_release(kid);
            self.kid_mut(left).next = next;
        } else {
            let kid = self.tree(tree).child.expect("right-ignore flag without kid");
            let next = self.kid(kid).next;
            if let Some(list) = self.kid(kid).tree {
                self.downref(list);
            }
            self.kid_release(kid);
            self.tree_mut(tree).child = next;
        }
        self.tree_mut(tree).flags &= !flag::RIGHT_IGNORE;
    }

    /// Push a left-ignore list onto a tree, nesting any current list as
    /// the right ignore of the new one. Returns the (possibly split)
    /// tree.
    #[must_use = "the caller's slot must be rebound to the returned tree"]
    pub fn push_left_ignore(&mut self, push_to: TreeId, left_ignore: TreeId) -> TreeId {
        // About to alter the tree. Split first.
        let push_to = self.split_tree(push_to);

        if self.tree(push_to).has_left_ignore() {
            let cur_kid = self
                .left_ignore_kid(push_to)
                .expect("left-ignore flag without kid");
            let cur_list = self.kid(cur_kid).tree.expect("ignore kid without list");
            self.ins_right_ignore(left_ignore, cur_list);

            // Replace the current ignore. The nested list keeps the
            // reference it just gained above.
            self.tree_mut(cur_list).refs -= 1;
            self.kid_mut(cur_kid).tree = Some(left_ignore);
            self.upref(left_ignore);
        } else {
            self.ins_left_ignore(push_to, left_ignore);
        }

        push_to
    }

    /// Mirror of [`Program::push_left_ignore`] for the right side.
    #[must_use = "the caller's slot must be rebound to the returned tree"]
    pub fn push_right_ignore(&mut self, push_to: TreeId, right_ignore: TreeId) -> TreeId {
        let push_to = self.split_tree(push_to);

        if self.tree(push_to).has_right_ignore() {
            let cur_kid = self
                .right_ignore_kid(push_to)
                .expect("right-ignore flag without kid");
            let cur_list = self.kid(cur_kid).tree.expect("ignore kid without list");
            self.ins_left_ignore(right_ignore, cur_list);

            self.tree_mut(cur_list).refs -= 1;
            self.kid_mut(cur_kid).tree = Some(right_ignore);
            self.upref(right_ignore);
        } else {
            self.ins_right_ignore(push_to, right_ignore);
        }

        push_to
    }

    /// Pop the current left ignore. Returns the (possibly split) tree and
    /// the popped list, owned by the caller. A nested previous list, if
    /// present, becomes current again.
    pub fn pop_left_ignore(&mut self, pop_from: TreeId) -> (TreeId, TreeId) {
        let pop_from = self.split_tree(pop_from);

        let li_kid = self
            .left_ignore_kid(pop_from)
            .expect("pop of a missing left ignore");
        let list = self.kid(li_kid).tree.expect("ignore kid without list");

        // A right ignore on the list itself is the previously pushed
        // list.
        if let Some(nested_kid) = self.right_ignore_kid(list) {
            let nested = self.kid(nested_kid).tree.expect("ignore kid without list");
            self.upref(nested);
            self.rem_right_ignore(list);
            self.upref(list);
            // The slot hands its reference on the popped list to the
            // caller and takes over the one `nested` gained above.
            self.kid_mut(li_kid).tree = Some(nested);
            self.tree_mut(list).refs -= 1;
            (pop_from, list)
        } else {
            self.upref(list);
            self.rem_left_ignore(pop_from);
            (pop_from, list)
        }
    }

    /// Mirror of [`Program::pop_left_ignore`] for the right side.
    pub fn pop_right_ignore(&mut self, pop_from: TreeId) -> (TreeId, TreeId) {
        let pop_from = self.split_tree(pop_from);

        let ri_kid = self
            .right_ignore_kid(pop_from)
            .expect("pop of a missing right ignore");
        let list = self.kid(ri_kid).tree.expect("ignore kid without list");

        // A left ignore on the list itself is the previously pushed list.
        if let Some(nested_kid) = self.left_ignore_kid(list) {
            let nested = self.kid(nested_kid).tree.expect("ignore kid without list");
            self.upref(nested);
            self.rem_left_ignore(list);
            self.upref(list);
            // The slot hands its reference on the popped list to the
            // caller and takes over the one `nested` gained above.
            self.kid_mut(ri_kid).tree = Some(nested);
            self.tree_mut(list).refs -= 1;
            (pop_from, list)
        } else {
            self.upref(list);
            self.rem_right_ignore(pop_from);
            (pop_from, list)
        }
    }

    /// Wrap a tree in suppression sentinels so printing drops its outer
    /// ignore content. Produces clean round-trip output for a
    /// parsed-then-edited document.
    #[must_use = "the caller's slot must be rebound to the returned tree"]
    pub fn tree_trim(&mut self, tree: TreeId) -> TreeId {
        log::debug!("attaching trim sentinels");

        let left = self.tree_alloc();
        {
            let t = self.tree_mut(left);
            t.id = LEL_ID_IGNORE;
            t.flags |= flag::SUPPRESS_RIGHT;
        }
        let tree = self.push_left_ignore(tree, left);

        let right = self.tree_alloc();
        {
            let t = self.tree_mut(right);
            t.id = LEL_ID_IGNORE;
            t.flags |= flag::SUPPRESS_LEFT;
        }
        self.push_right_ignore(tree, right)
    }
}
