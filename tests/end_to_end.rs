// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! End-to-end scenarios across the tree and stream layers.

use std::cmp::Ordering;
use weft::core::runtime::{PatNode, RuntimeData, TemplateItem};
use weft::core::{
    Bindings, LEL_ID_IGNORE, LelId, Program, TreeId, print_tree_collect, print_xml_collect,
};
use weft::input::{InputResult, RUNBUF_SIZE, Stream};

fn leaf(prg: &mut Program, id: LelId, text: &[u8]) -> TreeId {
    prg.construct_token(id, text, &[], None)
}

fn ignore_list(prg: &mut Program, ws: LelId, text: &[u8]) -> TreeId {
    let tok = leaf(prg, ws, text);
    let kid = prg.kid_alloc();
    prg.kid_mut(kid).tree = Some(tok);
    let list = prg.tree_alloc();
    let t = prg.tree_mut(list);
    t.id = LEL_ID_IGNORE;
    t.refs = 1;
    t.child = Some(kid);
    list
}

/// Scenario: a pattern table encoding `expr -> [ NUM "42", "+", NUM "7" ]`
/// with binds on the numbers. Constructing from it and matching against
/// the result captures both numbers.
#[test]
fn construct_then_match() {
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
    let mut prg = Program::new(b.finish().expect("valid tables")).expect("valid tables");

    let empty = Bindings::with_capacity(0);
    let root = prg.construct_tree(&empty, 0);
    let root_kid = prg.kid_alloc();
    prg.kid_mut(root_kid).tree = Some(root);

    let mut bindings = Bindings::with_capacity(2);
    assert!(prg.match_pattern(&mut bindings, 0, Some(root_kid), false));
    assert_eq!(prg.tokdata_bytes(bindings.get(1).unwrap()), b"42");
    assert_eq!(prg.tokdata_bytes(bindings.get(2).unwrap()), b"7");

    prg.kid_release(root_kid);
    prg.downref(root);
    assert_eq!(prg.pools.live(), 0);
}

/// Scenario: pushing two left-ignore lists onto a terminal prints the
/// most recent first; popping restores the earlier one.
#[test]
fn left_ignore_merge() {
    let mut b = RuntimeData::builder();
    let ws = b.ignore_terminal("ws");
    let num = b.terminal("num");
    let mut prg = Program::new(b.finish().expect("valid")).expect("valid");

    let term = leaf(&mut prg, num, b"x");
    let l1 = ignore_list(&mut prg, ws, b"/*one*/");
    let l2 = ignore_list(&mut prg, ws, b"/*two*/");

    let term = prg.push_left_ignore(term, l1);
    prg.downref(l1);
    let term = prg.push_left_ignore(term, l2);
    prg.downref(l2);

    let printed = print_tree_collect(&prg, Some(term), false);
    assert_eq!(printed, b"/*two*//*one*/x");

    let (term, popped) = prg.pop_left_ignore(term);
    assert_eq!(popped, l2);
    prg.downref(popped);
    assert_eq!(prg.left_ignore(term), Some(l1));
    assert_eq!(print_tree_collect(&prg, Some(term), false), b"/*one*/x");

    prg.downref(term);
    assert_eq!(prg.pools.live(), 0);
}

/// Scenario: splitting a shared tree yields an equal, privately owned
/// copy and returns the original to single ownership.
#[test]
fn refcount_sharing() {
    let mut b = RuntimeData::builder();
    let num = b.terminal("num");
    let expr = b.nonterm("expr", 0);
    let mut prg = Program::new(b.finish().expect("valid")).expect("valid");

    let n = leaf(&mut prg, num, b"1");
    let t1 = prg.make_tree(expr, &[n]);
    prg.downref(n);

    prg.upref(t1);
    let t2 = prg.split_tree(t1);
    assert_ne!(t2, t1);
    assert_eq!(prg.tree(t1).refs, 1);
    assert_eq!(prg.tree(t2).refs, 1);
    assert_eq!(prg.cmp_tree(Some(t1), Some(t2)), Ordering::Equal);
    assert_eq!(
        print_tree_collect(&prg, Some(t1), false),
        print_tree_collect(&prg, Some(t2), false)
    );

    prg.downref(t1);
    prg.downref(t2);
    assert_eq!(prg.pools.live(), 0);
}

/// Scenario: a 9000-byte feed spans two runbufs; consuming 500 bytes and
/// undoing them restores the original read position byte-for-byte.
#[test]
fn stream_backtrack() {
    let bytes: Vec<u8> = (0..9000u32).map(|i| (i * 7 % 251) as u8).collect();
    let mut s = Stream::accum();
    s.append_data(&bytes);
    assert_eq!(s.queue_len(), 2);

    let first = s.get_parse_block(0);
    assert_eq!(first.result, InputResult::Data);
    let original = first.data.to_vec();
    assert_eq!(original.len(), RUNBUF_SIZE);

    assert_eq!(s.consume_data(500), 500);
    assert_eq!(s.undo_consume_data(&bytes[..500]), 500);

    let again = s.get_parse_block(0);
    assert_eq!(again.result, InputResult::Data);
    assert!(again.data.len() >= 500);
    assert_eq!(again.data, &original[..]);
}

/// Scenario: an accumulator hands out its 10 bytes, pauses with EOD, and
/// resumes when 20 more arrive.
#[test]
fn accumulator_pause() {
    let mut s = Stream::accum();
    s.append_data(b"0123456789");

    let block = s.get_parse_block(0);
    assert_eq!(block.result, InputResult::Data);
    assert_eq!(block.data.len(), 10);
    s.consume_data(10);

    assert_eq!(s.get_parse_block(0).result, InputResult::Eod);

    s.append_data(&[b'y'; 20]);
    let block = s.get_parse_block(0);
    assert_eq!(block.result, InputResult::Data);
    assert_eq!(block.data.len(), 20);
}

/// Scenario: a `list -> list -> list` chain marked for flattening prints
/// one tag pair around its three items.
#[test]
fn xml_flatten() {
    let mut b = RuntimeData::builder();
    let item = b.terminal("item");
    let list = b.nonterm("list", 0);
    b.mark_list(list);
    let mut prg = Program::new(b.finish().expect("valid")).expect("valid");

    let i3 = leaf(&mut prg, item, b"c");
    let l3 = prg.make_tree(list, &[i3]);
    let i2 = leaf(&mut prg, item, b"b");
    let l2 = prg.make_tree(list, &[i2, l3]);
    let i1 = leaf(&mut prg, item, b"a");
    let l1 = prg.make_tree(list, &[i1, l2]);
    for t in [i1, i2, i3, l2, l3] {
        prg.downref(t);
    }

    let out = print_xml_collect(&prg, Some(l1), false, false);
    assert_eq!(
        out,
        b"<list><item>a</item><item>b</item><item>c</item></list>"
    );
    prg.downref(l1);
    assert_eq!(prg.pools.live(), 0);
}

/// Trim keeps ignore bytes out of both ends of the printed output.
#[test]
fn printer_trim() {
    let mut b = RuntimeData::builder();
    let ws = b.ignore_terminal("ws");
    let num = b.terminal("num");
    let expr = b.nonterm("expr", 0);
    let mut prg = Program::new(b.finish().expect("valid")).expect("valid");

    let a = leaf(&mut prg, num, b"1");
    let li = ignore_list(&mut prg, ws, b"  ");
    let a = prg.push_left_ignore(a, li);
    prg.downref(li);

    let z = leaf(&mut prg, num, b"2");
    let ri = ignore_list(&mut prg, ws, b"\n");
    let z = prg.push_right_ignore(z, ri);
    prg.downref(ri);

    let root = prg.make_tree(expr, &[a, z]);
    prg.downref(a);
    prg.downref(z);

    assert_eq!(print_tree_collect(&prg, Some(root), false), b"  12\n");
    assert_eq!(print_tree_collect(&prg, Some(root), true), b"12");

    prg.downref(root);
    assert_eq!(prg.pools.live(), 0);
}

/// The runtime tables round-trip through their JSON wire form.
#[test]
fn tables_roundtrip_json() {
    let mut b = RuntimeData::builder();
    let num = b.terminal("num");
    b.nonterm("expr", 1);
    b.pat_nodes(vec![PatNode {
        id: num,
        data: Some(b"42"[..].into()),
        ..PatNode::default()
    }]);
    let rtd = b.finish().expect("valid");

    let json = serde_json::to_string(&rtd).expect("serializes");
    let back = RuntimeData::from_json(&json).expect("deserializes");
    assert_eq!(back.first_nonterm_id, rtd.first_nonterm_id);
    assert_eq!(back.lookup_id("num"), Some(num));

    // a program stands up on the round-tripped tables
    let mut prg = Program::new(back).expect("valid");
    let t = prg.construct_tree(&Bindings::with_capacity(0), 0);
    assert_eq!(prg.tokdata_bytes(t), b"42");
    prg.downref(t);
    assert_eq!(prg.pools.live(), 0);
}

/// A template stream feeds text and language elements to a driver, which
/// builds tokens with stream-stamped locations.
#[test]
fn template_stream_drives_token_construction() {
    let mut b = RuntimeData::builder();
    let word = b.terminal("word");
    let mut prg = Program::new(b.finish().expect("valid")).expect("valid");

    let items = vec![
        TemplateItem::Text(b"let "[..].into()),
        TemplateItem::Factor {
            id: word,
            bind_id: 1,
        },
    ];
    let mut s = Stream::from_pattern(items);

    // scan the literal text
    let block = s.get_parse_block(0);
    assert_eq!(block.result, InputResult::Data);
    let text = block.data.to_vec();
    let loc = s.position();
    s.consume_data(text.len());
    let tok = prg.construct_token(word, &text, &[], Some(loc));
    assert_eq!(prg.tokdata_bytes(tok), b"let ");
    assert_eq!(
        prg.head(prg.tree(tok).tokdata.unwrap()).location.unwrap().line,
        1
    );
    assert_eq!(prg.find_location(tok).unwrap().byte, 0);

    // then the named element with its capture slot
    assert_eq!(s.get_parse_block(0).result, InputResult::LangEl);
    assert_eq!(s.consume_lang_el(), Some((word, 1)));

    prg.downref(tok);
    assert_eq!(prg.pools.live(), 0);
}
