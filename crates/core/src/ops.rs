// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Tree Operations
//!
//! Accessors and lifecycle operations over the pooled tree model: walking
//! the ignore/attribute prefix, reference counting with the iterative
//! free walk, deep comparison, and the per-production child accessors.
//!
//! The layout rules these helpers encode are in [`crate::tree`]; nothing
//! else in the runtime touches the child-list prefix directly.

use crate::program::Program;
use crate::tree::{Kid, KidId, LEL_ID_IGNORE, LEL_ID_PTR, LEL_ID_STR, LelId, Payload, Tree, TreeId};
use std::cmp::Ordering;

impl Program {
    // -- kid-list helpers -------------------------------------------------

    /// Allocate `length` empty attribute kids as a linked list.
    pub fn alloc_attrs(&mut self, length: usize) -> Option<KidId> {
        let mut cur = None;
        for _ in 0..length {
            let kid = self.kid_alloc();
            self.kid_mut(kid).next = cur;
            cur = Some(kid);
        }
        cur
    }

    /// Free the cells of a kid list. The trees hanging off it are left
    /// alone.
    pub fn free_kid_cells(&mut self, mut kid: Option<KidId>) {
        while let Some(k) = kid {
            kid = self.kid(k).next;
            self.kid_release(k);
        }
    }

    /// Append `list2` to `list1`, returning the combined head.
    pub fn kid_list_concat(
        &mut self,
        list1: Option<KidId>,
        list2: Option<KidId>,
    ) -> Option<KidId> {
        let Some(head) = list1 else { return list2 };
        if list2.is_some() {
            let mut dest = head;
            while let Some(next) = self.kid(dest).next {
                dest = next;
            }
            self.kid_mut(dest).next = list2;
        }
        Some(head)
    }

    fn kid_at(&self, mut kid: Option<KidId>, n: usize) -> Option<KidId> {
        for _ in 0..n {
            kid = self.kid(kid?).next;
        }
        kid
    }

    // -- layout accessors -------------------------------------------------

    /// First kid past the ignore prefix: the head of the attribute block.
    #[must_use]
    pub fn tree_attr(&self, tree: TreeId) -> Option<KidId> {
        let t = self.tree(tree);
        self.kid_at(t.child, t.ignore_slots())
    }

    /// The `pos`-th attribute kid. Panics when the tree has fewer
    /// attribute slots; that is a front-end table bug.
    #[must_use]
    pub fn attr_kid(&self, tree: TreeId, pos: usize) -> KidId {
        self.kid_at(self.tree_attr(tree), pos)
            .expect("attribute index out of range")
    }

    #[must_use]
    pub fn get_attr(&self, tree: TreeId, pos: usize) -> Option<TreeId> {
        self.kid(self.attr_kid(tree, pos)).tree
    }

    /// Write the `pos`-th attribute slot. Reference counts are the
    /// caller's business, as is splitting a shared tree first.
    pub fn set_attr(&mut self, tree: TreeId, pos: usize, val: Option<TreeId>) {
        let kid = self.attr_kid(tree, pos);
        self.kid_mut(kid).tree = val;
    }

    /// First real child: past the ignore prefix and the attribute block.
    #[must_use]
    pub fn tree_child(&self, tree: TreeId) -> Option<KidId> {
        let object_length = self.rtd.object_length(self.tree(tree).id);
        self.kid_at(self.tree_attr(tree), object_length)
    }

    /// Detach and return the real-children suffix, leaving ignores and
    /// attributes in place.
    pub fn tree_extract_child(&mut self, tree: TreeId) -> Option<KidId> {
        let object_length = self.rtd.object_length(self.tree(tree).id);
        let skip = self.tree(tree).ignore_slots() + object_length;
        if skip == 0 {
            return self.tree_mut(tree).child.take();
        }
        let last = self
            .kid_at(self.tree(tree).child, skip - 1)
            .expect("child list shorter than its fixed prefix");
        self.kid_mut(last).next.take()
    }

    #[must_use]
    pub fn left_ignore_kid(&self, tree: TreeId) -> Option<KidId> {
        let t = self.tree(tree);
        if t.has_left_ignore() { t.child } else { None }
    }

    #[must_use]
    pub fn right_ignore_kid(&self, tree: TreeId) -> Option<KidId> {
        let t = self.tree(tree);
        if !t.has_right_ignore() {
            return None;
        }
        if t.has_left_ignore() {
            self.kid(t.child.expect("left-ignore flag without kid")).next
        } else {
            t.child
        }
    }

    #[must_use]
    pub fn left_ignore(&self, tree: TreeId) -> Option<TreeId> {
        self.left_ignore_kid(tree).and_then(|k| self.kid(k).tree)
    }

    #[must_use]
    pub fn right_ignore(&self, tree: TreeId) -> Option<TreeId> {
        self.right_ignore_kid(tree).and_then(|k| self.kid(k).tree)
    }

    // -- reference counting -----------------------------------------------

    /// Add a logical owner.
    pub fn upref(&mut self, tree: TreeId) {
        self.tree_mut(tree).refs += 1;
    }

    /// Release a logical owner; the last one triggers the free walk.
    pub fn downref(&mut self, tree: TreeId) {
        let t = self.tree_mut(tree);
        assert!(t.refs > 0, "downref of a tree with no owners");
        t.refs -= 1;
        if t.refs == 0 {
            self.free_tree_rec(tree);
        }
    }

    /// Iterative free. Trees may be arbitrarily deep, so children are
    /// pushed onto the VM stack instead of recursing natively.
    fn free_tree_rec(&mut self, tree: TreeId) {
        let mark = self.stack.len();
        let mut current = tree;
        'free_tree: loop {
            let t: Tree = *self.tree(current);
            match t.id {
                LEL_ID_PTR => self.tree_release(current),
                LEL_ID_STR => {
                    if let Payload::Str(head) = t.payload {
                        self.string_release(head);
                    }
                    self.tree_release(current);
                }
                _ => {
                    // Ignore wrappers carry no token data of their own.
                    if t.id != LEL_ID_IGNORE {
                        if let Some(head) = t.tokdata {
                            self.string_release(head);
                        }
                    }
                    // Attributes and grammar-based children.
                    let mut child = t.child;
                    while let Some(k) = child {
                        let kid: Kid = *self.kid(k);
                        self.stack.push_tree(kid.tree);
                        self.kid_release(k);
                        child = kid.next;
                    }
                    self.tree_release(current);
                }
            }

            // Any trees to downref?
            while self.stack.len() > mark {
                if let Some(next) = self.stack.pop_tree() {
                    let t = self.tree_mut(next);
                    assert!(t.refs > 0, "freed tree still referenced from a kid");
                    t.refs -= 1;
                    if t.refs == 0 {
                        current = next;
                        continue 'free_tree;
                    }
                }
            }
            break;
        }
    }

    // -- comparison and search --------------------------------------------

    /// Deep ordering over trees: id, specialised value or token data,
    /// then the kid lists pairwise. Iterative; chains may be long.
    #[must_use]
    pub fn cmp_tree(&self, tree1: Option<TreeId>, tree2: Option<TreeId>) -> Ordering {
        let mut work = vec![(tree1, tree2)];
        while let Some(pair) = work.pop() {
            let (t1, t2) = match pair {
                (None, None) => continue,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(a), Some(b)) => (a, b),
            };
            let a = self.tree(t1);
            let b = self.tree(t2);
            match a.id.cmp(&b.id) {
                Ordering::Equal => {}
                other => return other,
            }
            if a.id == LEL_ID_PTR {
                let (Payload::Ptr(va), Payload::Ptr(vb)) = (a.payload, b.payload) else {
                    panic!("pointer tree without pointer payload");
                };
                match va.cmp(&vb) {
                    Ordering::Equal => {}
                    other => return other,
                }
            } else if a.id == LEL_ID_STR {
                let (Payload::Str(ha), Payload::Str(hb)) = (a.payload, b.payload) else {
                    panic!("string tree without string payload");
                };
                match self.head(ha).data.cmp(&self.head(hb).data) {
                    Ordering::Equal => {}
                    other => return other,
                }
            } else {
                match (a.tokdata, b.tokdata) {
                    (None, None) => {}
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(ha), Some(hb)) => match self.head(ha).data.cmp(&self.head(hb).data) {
                        Ordering::Equal => {}
                        other => return other,
                    },
                }
            }

            // Queue the kid pairs; first child compared first.
            let mut pairs = Vec::new();
            let mut k1 = self.tree_child(t1);
            let mut k2 = self.tree_child(t2);
            loop {
                match (k1, k2) {
                    (None, None) => break,
                    (None, Some(_)) => return Ordering::Less,
                    (Some(_), None) => return Ordering::Greater,
                    (Some(a), Some(b)) => {
                        pairs.push((self.kid(a).tree, self.kid(b).tree));
                        k1 = self.kid(a).next;
                        k2 = self.kid(b).next;
                    }
                }
            }
            work.extend(pairs.into_iter().rev());
        }
        Ordering::Equal
    }

    /// Preorder search for the first node with the given id.
    #[must_use]
    pub fn tree_search(&self, tree: TreeId, id: LelId) -> Option<TreeId> {
        let mut work = vec![tree];
        while let Some(t) = work.pop() {
            if self.tree(t).id == id {
                return Some(t);
            }
            let mut children = Vec::new();
            let mut kid = self.tree_child(t);
            while let Some(k) = kid {
                if let Some(child) = self.kid(k).tree {
                    children.push(child);
                }
                kid = self.kid(k).next;
            }
            work.extend(children.into_iter().rev());
        }
        None
    }

    /// First token location in preorder, if any token carries one.
    #[must_use]
    pub fn find_location(&self, tree: TreeId) -> Option<crate::head::Location> {
        let mut work = vec![tree];
        while let Some(t) = work.pop() {
            if let Some(head) = self.tree(t).tokdata {
                if let Some(loc) = self.head(head).location {
                    return Some(loc);
                }
            }
            let mut children = Vec::new();
            let mut kid = self.tree_child(t);
            while let Some(k) = kid {
                if let Some(child) = self.kid(k).tree {
                    children.push(child);
                }
                kid = self.kid(k).next;
            }
            work.extend(children.into_iter().rev());
        }
        None
    }

    // -- repeat and list access -------------------------------------------

    /// Value slot of a repeat node.
    #[must_use]
    pub fn repeat_val(&self, tree: TreeId) -> Option<TreeId> {
        self.kid(self.tree_attr(tree)?).tree
    }

    /// Continuation of a repeat node.
    #[must_use]
    pub fn repeat_next(&self, tree: TreeId) -> Option<TreeId> {
        let kid = self.tree_attr(tree)?;
        self.kid(self.kid(kid).next?).tree
    }

    /// A repeat node with no kids terminates the repetition.
    #[must_use]
    pub fn repeat_end(&self, tree: TreeId) -> bool {
        self.tree_attr(tree).is_none()
    }

    /// A list node whose value has no sibling is the last element.
    #[must_use]
    pub fn list_last(&self, tree: TreeId) -> bool {
        self.tree_attr(tree)
            .is_some_and(|kid| self.kid(kid).next.is_none())
    }

    // -- per-production child access --------------------------------------

    /// `pos`-th element of a production right-hand side.
    #[must_use]
    pub fn rhs_el(&self, lhs: TreeId, pos: usize) -> Option<TreeId> {
        self.kid(self.rhs_kid(lhs, pos)?).tree
    }

    #[must_use]
    pub fn rhs_kid(&self, lhs: TreeId, pos: usize) -> Option<KidId> {
        self.kid_at(self.tree_child(lhs), pos)
    }

    /// Resolve a child through a `(prod_num, child_index)` table. A tree
    /// whose production was invalidated by a cast resolves nothing.
    #[must_use]
    pub fn rhs_val(&self, tree: TreeId, table: &[(i32, usize)]) -> Option<TreeId> {
        let prod_num = self.tree(tree).prod_num;
        table
            .iter()
            .find(|(p, _)| *p == prod_num)
            .and_then(|&(_, child)| self.rhs_el(tree, child))
    }

    // -- field access -----------------------------------------------------

    #[must_use]
    pub fn get_field(&self, tree: TreeId, field: usize) -> Option<TreeId> {
        self.get_attr(tree, field)
    }

    /// Write a field of an unshared tree.
    pub fn set_field(&mut self, tree: TreeId, field: usize, value: Option<TreeId>) {
        assert_eq!(self.tree(tree).refs, 1, "field write to a shared tree");
        if let Some(v) = value {
            assert!(self.tree(v).refs >= 1, "field value must be owned");
        }
        self.set_attr(tree, field, value);
    }

    /// Read a field, splitting the stored tree so the caller may write
    /// through it.
    pub fn get_field_split(&mut self, tree: TreeId, field: usize) -> Option<TreeId> {
        let val = self.get_attr(tree, field)?;
        let split = self.split_tree(val);
        self.set_attr(tree, field, Some(split));
        Some(split)
    }
}
