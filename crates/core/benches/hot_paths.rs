// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Benchmarks of the tree hot paths: template construction with free,
//! copy-on-write splitting, and structural matching.

use criterion::{Criterion, criterion_group, criterion_main};
use weft_core::{Bindings, PatNode, Program, RuntimeData};

fn expr_program() -> Program {
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
    Program::new(b.finish().expect("valid")).expect("valid")
}

fn bench_construct_free(c: &mut Criterion) {
    let mut prg = expr_program();
    let bindings = Bindings::with_capacity(0);
    c.bench_function("construct_free", |b| {
        b.iter(|| {
            let root = prg.construct_tree(&bindings, 0);
            prg.downref(root);
        });
    });
}

fn bench_split(c: &mut Criterion) {
    let mut prg = expr_program();
    let bindings = Bindings::with_capacity(0);
    let root = prg.construct_tree(&bindings, 0);
    c.bench_function("split_shared", |b| {
        b.iter(|| {
            prg.upref(root);
            let copy = prg.split_tree(root);
            prg.downref(copy);
        });
    });
    prg.downref(root);
}

fn bench_match(c: &mut Criterion) {
    let mut prg = expr_program();
    let empty = Bindings::with_capacity(0);
    let root = prg.construct_tree(&empty, 0);
    let kid = prg.kid_alloc();
    prg.kid_mut(kid).tree = Some(root);
    c.bench_function("match_pattern", |b| {
        b.iter(|| {
            let mut bindings = Bindings::with_capacity(2);
            assert!(prg.match_pattern(&mut bindings, 0, Some(kid), false));
        });
    });
    prg.kid_release(kid);
    prg.downref(root);
}

criterion_group!(benches, bench_construct_free, bench_split, bench_match);
criterion_main!(benches);
