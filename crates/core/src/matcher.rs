// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Structural Matching
//!
//! [`Program::match_pattern`] compares a compiled pattern (an index into
//! the pattern-node table) against an existing tree, capturing bound
//! subtrees into a [`Bindings`] vector as it goes.
//!
//! Bindings are assigned in pre-order of the pattern traversal; callers
//! depend on that order, so it is part of the contract, not an
//! implementation detail.
//!
//! [`Program::find_match`] layers a search on top: it walks a tree in
//! pre-order looking for the first subtree any of several patterns
//! accepts, prefiltered by the set of ids those patterns can possibly
//! match at their roots.

use crate::program::Program;
use crate::tree::{KidId, TreeId};
use bit_set::BitSet;

/// Capture slots for pattern matching and template construction.
///
/// One-based: slot 0 is unused, matching the compiler's bind-id
/// numbering.
#[derive(Debug, Clone, Default)]
pub struct Bindings {
    slots: Vec<Option<TreeId>>,
}

impl Bindings {
    /// Room for bind ids `1..=n_binds`.
    #[must_use]
    pub fn with_capacity(n_binds: usize) -> Self {
        Self {
            slots: vec![None; n_binds + 1],
        }
    }

    #[must_use]
    pub fn get(&self, bind_id: u32) -> Option<TreeId> {
        self.slots.get(bind_id as usize).copied().flatten()
    }

    pub fn set(&mut self, bind_id: u32, tree: TreeId) {
        assert!(bind_id > 0, "bind id 0 is reserved");
        if self.slots.len() <= bind_id as usize {
            self.slots.resize(bind_id as usize + 1, None);
        }
        self.slots[bind_id as usize] = Some(tree);
    }

    pub fn clear(&mut self) {
        self.slots.fill(None);
    }

    /// Highest usable bind id.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len().saturating_sub(1)
    }
}

impl Program {
    /// Match a pattern node (and, when `check_next`, its sibling chain)
    /// against a kid list. On success the captures named by the pattern
    /// are filled in traversal order; on failure `bindings` may hold a
    /// partial capture set and should be cleared by the caller before
    /// reuse.
    ///
    /// No references are taken on captured trees; the bindings borrow
    /// them from the matched tree.
    #[must_use]
    pub fn match_pattern(
        &self,
        bindings: &mut Bindings,
        pat: i32,
        kid: Option<KidId>,
        check_next: bool,
    ) -> bool {
        match (self.rtd.pat(pat), kid) {
            (Some(node), Some(kid_id)) => {
                let tree_id = match self.kid(kid_id).tree {
                    Some(t) => t,
                    None => return false,
                };
                let tree = self.tree(tree_id);
                if node.id != tree.id {
                    return false;
                }

                // A pattern node with data matches the token text
                // byte-for-byte.
                if let Some(data) = &node.data {
                    let tokdata = self.tokdata_bytes(tree_id);
                    if data.len() != tokdata.len() {
                        return false;
                    }
                    if !data.is_empty() && **data != *tokdata {
                        return false;
                    }
                }

                if node.bind_id > 0 {
                    bindings.set(node.bind_id, tree_id);
                }

                // A terminal duplicate of a nonterminal stops descent.
                if !node.stop {
                    let child = node.child;
                    if !self.match_pattern(bindings, child, self.tree_child(tree_id), true) {
                        return false;
                    }
                }

                if check_next {
                    let next = node.next;
                    if !self.match_pattern(bindings, next, self.kid(kid_id).next, true) {
                        return false;
                    }
                }

                true
            }
            // Both exhausted is a match; one exhausted is not.
            (None, None) => true,
            _ => false,
        }
    }

    /// The set of ids any of `pats` could match at its root. Used to
    /// prefilter candidate nodes before running the full match.
    #[must_use]
    pub fn potential_ids(&self, pats: &[usize]) -> BitSet {
        let mut ids = BitSet::new();
        for &pat in pats {
            ids.insert(self.rtd.pat_nodes[pat].id as usize);
        }
        ids
    }

    /// Find the first subtree of `tree` (pre-order) matched by any of
    /// `pats`. Returns the index into `pats` and the matched subtree;
    /// `bindings` holds that match's captures.
    #[must_use]
    pub fn find_match(
        &self,
        bindings: &mut Bindings,
        pats: &[usize],
        tree: TreeId,
    ) -> Option<(usize, TreeId)> {
        let ids = self.potential_ids(pats);
        let mut work = vec![tree];
        while let Some(t) = work.pop() {
            if ids.contains(self.tree(t).id as usize) {
                for (i, &pat) in pats.iter().enumerate() {
                    bindings.clear();
                    // wrap the candidate in a probe slot; matching is
                    // defined over kids
                    if self.match_candidate(bindings, pat, t) {
                        return Some((i, t));
                    }
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

    /// Match a single pattern root against a tree, without the sibling
    /// check.
    fn match_candidate(&self, bindings: &mut Bindings, pat: usize, tree_id: TreeId) -> bool {
        let node = &self.rtd.pat_nodes[pat];
        let tree = self.tree(tree_id);
        if node.id != tree.id {
            return false;
        }
        if let Some(data) = &node.data {
            let tokdata = self.tokdata_bytes(tree_id);
            if data.len() != tokdata.len() {
                return false;
            }
            if !data.is_empty() && **data != *tokdata {
                return false;
            }
        }
        if node.bind_id > 0 {
            bindings.set(node.bind_id, tree_id);
        }
        if !node.stop {
            let child = node.child;
            if !self.match_pattern(bindings, child, self.tree_child(tree_id), true) {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runtime::{PatNode, RuntimeData};
    use crate::tree::LelId;

    /// Table: expr -> [ num "42" (bind 1), plus "+", num "7" (bind 2) ]
    fn expr_program() -> (Program, LelId, LelId, LelId) {
        let mut b = RuntimeData::builder();
        let num = b.terminal("num");
        let plus = b.terminal("plus");
        let expr = b.nonterm("expr", 0);
        b.pat_nodes(vec![
            PatNode {
                id: expr,
                prod_num: 1,
                child: 1,
                ..PatNode::default()
            },
            PatNode {
                id: num,
                data: Some(b"42"[..].into()),
                next: 2,
                bind_id: 1,
                ..PatNode::default()
            },
            PatNode {
                id: plus,
                data: Some(b"+"[..].into()),
                next: 3,
                ..PatNode::default()
            },
            PatNode {
                id: num,
                data: Some(b"7"[..].into()),
                bind_id: 2,
                ..PatNode::default()
            },
        ]);
        let rtd = b.finish().expect("valid");
        (Program::new(rtd).expect("valid"), num, plus, expr)
    }

    fn probe_kid(prg: &mut Program, tree: TreeId) -> KidId {
        let kid = prg.kid_alloc();
        prg.kid_mut(kid).tree = Some(tree);
        kid
    }

    #[test]
    fn test_construct_then_match() {
        let (mut prg, ..) = expr_program();
        let empty = Bindings::with_capacity(0);
        let root = prg.construct_tree(&empty, 0);
        let root_kid = probe_kid(&mut prg, root);

        let mut bindings = Bindings::with_capacity(2);
        assert!(prg.match_pattern(&mut bindings, 0, Some(root_kid), false));

        // bindings land in pre-order
        let first = bindings.get(1).expect("bind 1 captured");
        let second = bindings.get(2).expect("bind 2 captured");
        assert_eq!(prg.tokdata_bytes(first), b"42");
        assert_eq!(prg.tokdata_bytes(second), b"7");

        prg.kid_release(root_kid);
        prg.downref(root);
        assert_eq!(prg.pools.live(), 0);
    }

    #[test]
    fn test_match_rejects_wrong_data() {
        let (mut prg, num, plus, expr) = expr_program();
        let a = prg.construct_token(num, b"41", &[], None);
        let p = prg.construct_token(plus, b"+", &[], None);
        let c = prg.construct_token(num, b"7", &[], None);
        let root = prg.make_tree(expr, &[a, p, c]);
        prg.tree_mut(root).prod_num = 1;
        for t in [a, p, c] {
            prg.downref(t);
        }
        let root_kid = probe_kid(&mut prg, root);

        let mut bindings = Bindings::with_capacity(2);
        // "41" != "42"
        assert!(!prg.match_pattern(&mut bindings, 0, Some(root_kid), false));

        prg.kid_release(root_kid);
        prg.downref(root);
        assert_eq!(prg.pools.live(), 0);
    }

    #[test]
    fn test_match_rejects_extra_children() {
        let (mut prg, num, plus, expr) = expr_program();
        let a = prg.construct_token(num, b"42", &[], None);
        let p = prg.construct_token(plus, b"+", &[], None);
        let c = prg.construct_token(num, b"7", &[], None);
        let d = prg.construct_token(num, b"9", &[], None);
        let root = prg.make_tree(expr, &[a, p, c, d]);
        for t in [a, p, c, d] {
            prg.downref(t);
        }
        let root_kid = probe_kid(&mut prg, root);

        let mut bindings = Bindings::with_capacity(2);
        assert!(!prg.match_pattern(&mut bindings, 0, Some(root_kid), false));

        prg.kid_release(root_kid);
        prg.downref(root);
        assert_eq!(prg.pools.live(), 0);
    }

    #[test]
    fn test_find_match_prefilters_and_searches() {
        let (mut prg, num, plus, expr) = expr_program();
        // wrapper(expr(42 + 7))
        let a = prg.construct_token(num, b"42", &[], None);
        let p = prg.construct_token(plus, b"+", &[], None);
        let c = prg.construct_token(num, b"7", &[], None);
        let inner = prg.make_tree(expr, &[a, p, c]);
        let outer = prg.make_tree(expr, &[inner]);
        for t in [a, p, c, inner] {
            prg.downref(t);
        }

        let mut bindings = Bindings::with_capacity(2);
        let (pat_idx, found) = prg
            .find_match(&mut bindings, &[0], outer)
            .expect("inner expr matches");
        assert_eq!(pat_idx, 0);
        assert_eq!(found, inner);
        assert_eq!(prg.tokdata_bytes(bindings.get(1).unwrap()), b"42");

        let ids = prg.potential_ids(&[0]);
        assert!(ids.contains(expr as usize));
        assert!(!ids.contains(num as usize));

        prg.downref(outer);
        assert_eq!(prg.pools.live(), 0);
    }
}
