// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! # Tree Construction
//!
//! Trees are built from the compiler-emitted pattern-node table: a
//! constructor template is an index into the table, and
//! [`Program::construct_tree`] synthesizes the tree it describes,
//! substituting bound subtrees into capture holes along the way.
//!
//! Construction is also the place where a template's literal ignore
//! content (whitespace written inside a pattern) gets attached, and where
//! capture attributes are seeded from their sibling table rows.
//!
//! All public constructors return a tree owned by the caller
//! (`refs = 1`). The one nuance is the substitution path: a bound tree's
//! reference is handed over by the bindings table rather than freshly
//! taken, so the table should be treated as consumed after construction.

use crate::matcher::Bindings;
use crate::program::Program;
use crate::runtime::{PAT_NONE, PatNode};
use crate::tree::{
    HeadId, KidId, LEL_ID_IGNORE, LEL_ID_PTR, LEL_ID_STR, LelId, Payload, TreeId, Word, flag,
};

impl Program {
    /// Build the kid list of an ignore-list tree from a chain of table
    /// rows.
    fn construct_ignore_list(&mut self, ignore_ind: i32) -> Option<KidId> {
        let mut first = None;
        let mut last: Option<KidId> = None;
        let mut ind = ignore_ind;
        while ind != PAT_NONE {
            let node = self.rtd.pat_nodes[ind as usize].clone();
            let data = node.data.unwrap_or_default();
            let head = self.string_alloc(&data);

            let ign_tree = self.tree_alloc();
            {
                let t = self.tree_mut(ign_tree);
                t.id = node.id;
                t.refs = 1;
                t.tokdata = Some(head);
            }

            let ign_kid = self.kid_alloc();
            self.kid_mut(ign_kid).tree = Some(ign_tree);
            match last {
                None => first = Some(ign_kid),
                Some(l) => self.kid_mut(l).next = Some(ign_kid),
            }
            last = Some(ign_kid);
            ind = node.next;
        }
        first
    }

    /// Wrap an ignore kid list into an ignore-list tree with zero refs;
    /// every caller attaches it immediately.
    fn wrap_ignore_list(&mut self, kids: KidId) -> TreeId {
        let list = self.tree_alloc();
        let t = self.tree_mut(list);
        t.id = LEL_ID_IGNORE;
        t.child = Some(kids);
        list
    }

    /// Build a tree from the pattern-node table.
    ///
    /// A node with a bind id substitutes the bound tree, wrapping it in
    /// the template's literal ignore content. Otherwise a fresh node is
    /// allocated: attributes first, children recursively from the child
    /// link, ignore lists prepended right-then-left so they land in the
    /// final layout, and capture attributes seeded from the rows
    /// following `pat`.
    pub fn construct_tree(&mut self, bindings: &Bindings, pat: usize) -> TreeId {
        let node: PatNode = self.rtd.pat_nodes[pat].clone();

        if node.bind_id > 0 {
            // The binding carries its own reference; it transfers to the
            // result.
            let mut tree = bindings
                .get(node.bind_id)
                .expect("template names an unbound capture slot");

            if node.left_ignore != PAT_NONE {
                let kids = self
                    .construct_ignore_list(node.left_ignore)
                    .expect("ignore link with no rows");
                let list = self.wrap_ignore_list(kids);
                tree = self.push_left_ignore(tree, list);
            }
            if node.right_ignore != PAT_NONE {
                let kids = self
                    .construct_ignore_list(node.right_ignore)
                    .expect("ignore link with no rows");
                let list = self.wrap_ignore_list(kids);
                tree = self.push_right_ignore(tree, list);
            }
            return tree;
        }

        let tree = self.tree_alloc();
        let tokdata = match &node.data {
            Some(data) if !data.is_empty() => {
                let data = data.clone();
                Some(self.string_alloc(&data))
            }
            _ => None,
        };
        {
            let t = self.tree_mut(tree);
            t.id = node.id;
            t.refs = 1;
            t.prod_num = node.prod_num;
            t.tokdata = tokdata;
        }

        let object_length = self.rtd.object_length(node.id);
        let attrs = self.alloc_attrs(object_length);
        let child = self.construct_kid(bindings, node.child);
        let full = self.kid_list_concat(attrs, child);
        self.tree_mut(tree).child = full;

        // Right first, then left, so the prefix ends up
        // [left, right, attrs, children].
        if let Some(kids) = self.construct_ignore_list(node.right_ignore) {
            let list = self.wrap_ignore_list(kids);
            self.tree_mut(list).refs = 1;
            let head = self.kid_alloc();
            let old_head = self.tree(tree).child;
            self.kid_mut(head).tree = Some(list);
            self.kid_mut(head).next = old_head;
            let t = self.tree_mut(tree);
            t.child = Some(head);
            t.flags |= flag::RIGHT_IGNORE;
        }
        if let Some(kids) = self.construct_ignore_list(node.left_ignore) {
            let list = self.wrap_ignore_list(kids);
            self.tree_mut(list).refs = 1;
            let head = self.kid_alloc();
            let old_head = self.tree(tree).child;
            self.kid_mut(head).tree = Some(list);
            self.kid_mut(head).next = old_head;
            let t = self.tree_mut(tree);
            t.child = Some(head);
            t.flags |= flag::LEFT_IGNORE;
        }

        let (num_capture, capture_base) = {
            let lel = self.rtd.lel(node.id);
            (lel.num_capture_attr as usize, lel.capture_attr as usize)
        };
        for i in 0..num_capture {
            let cnode = self.rtd.pat_nodes[pat + 1 + i].clone();
            let tokdata = match &cnode.data {
                Some(data) if !data.is_empty() => {
                    let data = data.clone();
                    Some(self.string_alloc(&data))
                }
                _ => None,
            };
            let attr = self.tree_alloc();
            {
                let t = self.tree_mut(attr);
                t.id = cnode.id;
                t.refs = 1;
                t.tokdata = tokdata;
            }
            let offset = self.rtd.capture_attr[capture_base + i].offset as usize;
            self.set_attr(tree, offset, Some(attr));
        }

        tree
    }

    /// Build a kid list from a sibling chain of table rows.
    pub fn construct_kid(&mut self, bindings: &Bindings, pat: i32) -> Option<KidId> {
        let mut first = None;
        let mut last: Option<KidId> = None;
        let mut cur = pat;
        while cur != PAT_NONE {
            let kid = self.kid_alloc();
            let tree = self.construct_tree(bindings, cur as usize);
            self.kid_mut(kid).tree = Some(tree);
            match last {
                None => first = Some(kid),
                Some(l) => self.kid_mut(l).next = Some(kid),
            }
            last = Some(kid);
            cur = self.rtd.pat_nodes[cur as usize].next;
        }
        first
    }

    /// A bare terminal around existing token data. Attribute slots are
    /// allocated per the descriptor.
    pub fn construct_term(&mut self, id: LelId, tokdata: Option<HeadId>) -> TreeId {
        let tree = self.tree_alloc();
        {
            let t = self.tree_mut(tree);
            t.id = id;
            t.refs = 1;
            t.tokdata = tokdata;
        }
        let object_length = self.rtd.object_length(id);
        let attrs = self.alloc_attrs(object_length);
        self.tree_mut(tree).child = attrs;
        tree
    }

    /// A terminal from token text, as sent by the scanner or user code.
    ///
    /// Ignore terminals carry no attribute block. Supplied attribute
    /// values are stored with a reference taken on each.
    pub fn construct_token(
        &mut self,
        id: LelId,
        text: &[u8],
        attrs: &[Option<TreeId>],
        location: Option<crate::head::Location>,
    ) -> TreeId {
        let tokdata = match location {
            Some(loc) => self.string_alloc_at(text, loc),
            None => self.string_alloc(text),
        };

        let tree = self.tree_alloc();
        {
            let t = self.tree_mut(tree);
            t.id = id;
            t.refs = 1;
            t.tokdata = Some(tokdata);
        }

        if self.rtd.is_ignore(id) {
            return tree;
        }

        let object_length = self.rtd.object_length(id);
        assert!(
            attrs.len() <= object_length,
            "more attribute values than slots"
        );
        let attr_kids = self.alloc_attrs(object_length);
        self.tree_mut(tree).child = attr_kids;
        for (i, val) in attrs.iter().enumerate() {
            self.set_attr(tree, i, *val);
            if let Some(v) = *val {
                self.upref(v);
            }
        }
        tree
    }

    /// The generic builder behind user-level tree expressions: an id and
    /// its children in order. Attribute slots are zeroed; each child
    /// gains a reference.
    pub fn make_tree(&mut self, id: LelId, children: &[TreeId]) -> TreeId {
        let tree = self.tree_alloc();
        {
            let t = self.tree_mut(tree);
            t.id = id;
            t.refs = 1;
        }

        let object_length = self.rtd.object_length(id);
        let attrs = self.alloc_attrs(object_length);

        let mut first = None;
        let mut last: Option<KidId> = None;
        for &child in children {
            let kid = self.kid_alloc();
            self.kid_mut(kid).tree = Some(child);
            self.upref(child);
            match last {
                None => first = Some(kid),
                Some(l) => self.kid_mut(l).next = Some(kid),
            }
            last = Some(kid);
        }

        let full = self.kid_list_concat(attrs, first);
        self.tree_mut(tree).child = full;
        tree
    }

    /// Type coercion: a shallow copy under a new id.
    ///
    /// The production number is invalidated, ignore slots are carried
    /// over, the attribute block is re-allocated at the *target* length,
    /// and the source's real children are shared into the copy.
    pub fn cast_tree(&mut self, target_id: LelId, tree: TreeId) -> TreeId {
        let src = *self.tree(tree);
        let new_tree = self.tree_alloc();
        let tokdata = self.string_copy(src.tokdata);
        {
            let t = self.tree_mut(new_tree);
            t.id = target_id;
            t.refs = 1;
            t.tokdata = tokdata;
            // per-production child access is meaningless across the cast
            t.prod_num = -1;
            t.flags = src.flags & (flag::LEFT_IGNORE | flag::RIGHT_IGNORE);
        }

        let mut last: Option<KidId> = None;
        let mut link = |prg: &mut Self, new_kid: KidId| {
            match last {
                None => prg.tree_mut(new_tree).child = Some(new_kid),
                Some(l) => prg.kid_mut(l).next = Some(new_kid),
            }
            last = Some(new_kid);
        };

        // Ignore slots, shared.
        let mut child = src.child;
        for _ in 0..src.ignore_slots() {
            let kid = *self.kid(child.expect("ignore flag without kid"));
            let new_kid = self.kid_alloc();
            self.kid_mut(new_kid).tree = kid.tree;
            if let Some(t) = kid.tree {
                self.upref(t);
            }
            link(self, new_kid);
            child = kid.next;
        }

        // Skip the source's attributes.
        for _ in 0..self.rtd.object_length(src.id) {
            child = self.kid(child.expect("attr prefix shorter than declared")).next;
        }

        // Fresh attributes at the target's length.
        for _ in 0..self.rtd.object_length(target_id) {
            let new_kid = self.kid_alloc();
            link(self, new_kid);
        }

        // Share the source's real children.
        while let Some(k) = child {
            let kid = *self.kid(k);
            let new_kid = self.kid_alloc();
            self.kid_mut(new_kid).tree = kid.tree;
            if let Some(t) = kid.tree {
                self.upref(t);
            }
            link(self, new_kid);
            child = kid.next;
        }

        new_tree
    }

    /// A pointer tree around a machine word.
    pub fn construct_pointer(&mut self, value: Word) -> TreeId {
        let tree = self.tree_alloc();
        let t = self.tree_mut(tree);
        t.id = LEL_ID_PTR;
        t.refs = 1;
        t.payload = Payload::Ptr(value);
        tree
    }

    /// The word a pointer tree wraps.
    #[must_use]
    pub fn pointer_val(&self, tree: TreeId) -> Word {
        match self.tree(tree).payload {
            Payload::Ptr(value) => value,
            _ => panic!("pointer read of a non-pointer tree"),
        }
    }

    /// A string tree around a byte buffer.
    pub fn construct_string(&mut self, data: &[u8]) -> TreeId {
        let head = self.string_alloc(data);
        let tree = self.tree_alloc();
        let t = self.tree_mut(tree);
        t.id = LEL_ID_STR;
        t.refs = 1;
        t.payload = Payload::Str(head);
        tree
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::runtime::{PatNode, RuntimeData};

    /// num(4) plus(5) under expr(6); table builds `expr -> 42 + 7`.
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

    #[test]
    fn test_construct_from_table() {
        let (mut prg, num, plus, expr) = expr_program();
        let bindings = Bindings::with_capacity(0);
        let root = prg.construct_tree(&bindings, 0);

        assert_eq!(prg.tree(root).id, expr);
        assert_eq!(prg.tree(root).refs, 1);
        assert_eq!(prg.tree(root).prod_num, 1);

        let k1 = prg.tree_child(root).expect("first child");
        let t1 = prg.kid(k1).tree.expect("kid holds tree");
        assert_eq!(prg.tree(t1).id, num);
        assert_eq!(prg.tokdata_bytes(t1), b"42");

        let k2 = prg.kid(k1).next.expect("second child");
        let t2 = prg.kid(k2).tree.expect("kid holds tree");
        assert_eq!(prg.tree(t2).id, plus);

        let k3 = prg.kid(k2).next.expect("third child");
        let t3 = prg.kid(k3).tree.expect("kid holds tree");
        assert_eq!(prg.tokdata_bytes(t3), b"7");
        assert!(prg.kid(k3).next.is_none());

        prg.downref(root);
        assert_eq!(prg.pools.live(), 0);
    }

    #[test]
    fn test_bind_substitution_wraps_ignores() {
        let mut b = RuntimeData::builder();
        let ws = b.ignore_terminal("ws");
        let num = b.terminal("num");
        b.pat_nodes(vec![
            // hole with a literal leading blank
            PatNode {
                id: num,
                bind_id: 1,
                left_ignore: 1,
                ..PatNode::default()
            },
            PatNode {
                id: ws,
                data: Some(b" "[..].into()),
                ..PatNode::default()
            },
        ]);
        let rtd = b.finish().expect("valid");
        let mut prg = Program::new(rtd).expect("valid");

        let head = prg.string_alloc(b"9");
        let bound = prg.construct_term(num, Some(head));

        let mut bindings = Bindings::with_capacity(1);
        bindings.set(1, bound);
        let out = prg.construct_tree(&bindings, 0);

        assert_eq!(out, bound);
        assert!(prg.tree(out).has_left_ignore());
        let list = prg.left_ignore(out).expect("attached list");
        assert_eq!(prg.tree(list).id, LEL_ID_IGNORE);

        prg.downref(out);
        assert_eq!(prg.pools.live(), 0);
    }

    #[test]
    fn test_capture_attrs_seeded() {
        let mut b = RuntimeData::builder();
        let word = b.capture_terminal("word", 1, &[0]);
        let inner = b.terminal("inner");
        b.pat_nodes(vec![
            PatNode {
                id: word,
                data: Some(b"abc"[..].into()),
                ..PatNode::default()
            },
            // capture row follows its owner
            PatNode {
                id: inner,
                data: Some(b"a"[..].into()),
                ..PatNode::default()
            },
        ]);
        let rtd = b.finish().expect("valid");
        let mut prg = Program::new(rtd).expect("valid");

        let bindings = Bindings::with_capacity(0);
        let tree = prg.construct_tree(&bindings, 0);
        let attr = prg.get_attr(tree, 0).expect("capture seeded");
        assert_eq!(prg.tree(attr).id, inner);
        assert_eq!(prg.tokdata_bytes(attr), b"a");

        prg.downref(tree);
        assert_eq!(prg.pools.live(), 0);
    }

    #[test]
    fn test_construct_token_and_attrs() {
        let mut b = RuntimeData::builder();
        let ws = b.ignore_terminal("ws");
        let ident = b.capture_terminal("ident", 2, &[]);
        let rtd = b.finish().expect("valid");
        let mut prg = Program::new(rtd).expect("valid");

        let val = prg.construct_token(ident, b"v", &[], None);
        let tok = prg.construct_token(ident, b"name", &[Some(val), None], None);
        prg.downref(val);
        assert_eq!(prg.get_attr(tok, 0), Some(val));
        assert_eq!(prg.get_attr(tok, 1), None);
        assert_eq!(prg.tokdata_bytes(tok), b"name");

        // ignore tokens carry no attribute block
        let blank = prg.construct_token(ws, b"  ", &[], None);
        assert!(prg.tree(blank).child.is_none());

        prg.downref(tok);
        prg.downref(blank);
        assert_eq!(prg.pools.live(), 0);
    }

    #[test]
    fn test_cast_preserves_children_invalidates_prod() {
        let mut b = RuntimeData::builder();
        let num = b.terminal("num");
        let a = b.nonterm("a", 1);
        let bb = b.nonterm("b", 2);
        let rtd = b.finish().expect("valid");
        let mut prg = Program::new(rtd).expect("valid");

        let child = prg.construct_token(num, b"1", &[], None);
        let src = prg.make_tree(a, &[child]);
        prg.downref(child);
        prg.tree_mut(src).prod_num = 3;

        let cast = prg.cast_tree(bb, src);
        assert_eq!(prg.tree(cast).id, bb);
        assert_eq!(prg.tree(cast).prod_num, -1);
        // target has two attr slots now, then the shared child
        assert_eq!(prg.get_attr(cast, 0), None);
        assert_eq!(prg.get_attr(cast, 1), None);
        let ck = prg.tree_child(cast).expect("shared child");
        assert_eq!(prg.kid(ck).tree, Some(child));
        assert_eq!(prg.tree(child).refs, 2);

        prg.downref(cast);
        prg.downref(src);
        assert_eq!(prg.pools.live(), 0);
    }

    #[test]
    fn test_pointer_and_string_trees() {
        let rtd = RuntimeData::builder().finish().expect("valid");
        let mut prg = Program::new(rtd).expect("valid");

        let p = prg.construct_pointer(0xdead_beef);
        assert_eq!(prg.pointer_val(p), 0xdead_beef);

        let s = prg.construct_string(b"hello");
        assert_eq!(prg.tree(s).id, LEL_ID_STR);

        prg.downref(p);
        prg.downref(s);
        assert_eq!(prg.pools.live(), 0);
    }
}
