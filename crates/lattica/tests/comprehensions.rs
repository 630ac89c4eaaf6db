//! for/if/let clause chains and the embeddings they emit.

use lattica::{
    BinOp, BoundOp, Clause, CompilationUnit, Decl, ErrorKind, Expr, ListElem, Runtime, Value,
};
use pretty_assertions::assert_eq;

/// A list comprehension over a list source, with a filter and an arithmetic
/// body.
#[test]
fn list_comprehension_filters_and_maps() {
    let mut unit = CompilationUnit::new();
    let nums = unit.str_label("nums");
    let doubled = unit.str_label("doubled");
    let v = unit.intern("v");
    let ref_nums = unit.reference("nums");
    let ref_v1 = unit.reference("v");
    let ref_v2 = unit.reference("v");
    unit.push(Decl::field(
        nums,
        Expr::list_lit(vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
    ));
    // doubled: [ for v in nums if v > 1 { v * 2 } ]
    unit.push(Decl::field(
        doubled,
        Expr::ListLit {
            elems: vec![ListElem::Comprehension {
                clauses: vec![
                    Clause::For {
                        key: None,
                        value: v,
                        source: ref_nums,
                    },
                    Clause::If {
                        cond: Expr::binary(BinOp::Gt, ref_v1, Expr::int(1)),
                    },
                ],
                body: Expr::binary(BinOp::Mul, ref_v2, Expr::int(2)),
            }],
        },
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["doubled", "0"]), Some(Value::int(4)));
    assert_eq!(instance.lookup(&["doubled", "1"]), Some(Value::int(6)));
    assert_eq!(instance.lookup(&["doubled", "2"]), None);
}

/// Iterating a struct yields regular fields in insertion order; the key
/// variable binds the label.
#[test]
fn struct_iteration_in_insertion_order() {
    let mut unit = CompilationUnit::new();
    let src = unit.str_label("src");
    let keys = unit.str_label("keys");
    let vals = unit.str_label("vals");
    let b = unit.str_label("b");
    let a = unit.str_label("a");
    let hidden = unit.hidden_label("secret");
    let k = unit.intern("k");
    let v = unit.intern("v");
    let ref_src1 = unit.reference("src");
    let ref_src2 = unit.reference("src");
    let ref_k = unit.reference("k");
    let ref_v = unit.reference("v");
    unit.push(Decl::field(
        src,
        Expr::struct_lit(vec![
            Decl::field(b, Expr::int(2)),
            Decl::field(a, Expr::int(1)),
            Decl::field(hidden, Expr::int(99)),
        ]),
    ));
    unit.push(Decl::field(
        keys,
        Expr::ListLit {
            elems: vec![ListElem::Comprehension {
                clauses: vec![Clause::For {
                    key: Some(k),
                    value: v,
                    source: ref_src1,
                }],
                body: ref_k,
            }],
        },
    ));
    unit.push(Decl::field(
        vals,
        Expr::ListLit {
            elems: vec![ListElem::Comprehension {
                clauses: vec![Clause::For {
                    key: None,
                    value: v,
                    source: ref_src2,
                }],
                body: ref_v,
            }],
        },
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    // Insertion order: b before a; the hidden field is skipped.
    assert_eq!(instance.lookup(&["keys", "0"]), Some(Value::string("b")));
    assert_eq!(instance.lookup(&["keys", "1"]), Some(Value::string("a")));
    assert_eq!(instance.lookup(&["keys", "2"]), None);
    assert_eq!(instance.lookup(&["vals", "0"]), Some(Value::int(2)));
    assert_eq!(instance.lookup(&["vals", "1"]), Some(Value::int(1)));
}

/// A struct comprehension embeds its body per iteration; iterations unify.
#[test]
fn struct_comprehension_embeds_fields() {
    let mut unit = CompilationUnit::new();
    let nums = unit.str_label("nums");
    let out = unit.str_label("out");
    let big = unit.str_label("big");
    let v = unit.intern("v");
    let ref_nums = unit.reference("nums");
    let ref_v = unit.reference("v");
    unit.push(Decl::field(
        nums,
        Expr::list_lit(vec![Expr::int(1), Expr::int(5)]),
    ));
    // out: { for v in nums if v > 2 { big: true } }
    unit.push(Decl::field(
        out,
        Expr::struct_lit(vec![Decl::Comprehension {
            clauses: vec![
                Clause::For {
                    key: None,
                    value: v,
                    source: ref_nums,
                },
                Clause::If {
                    cond: Expr::binary(BinOp::Gt, ref_v, Expr::int(2)),
                },
            ],
            body: vec![Decl::field(big, Expr::Bool(true))],
        }]),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["out", "big"]), Some(Value::Bool(true)));
}

/// `let` clauses extend the iteration scope.
#[test]
fn let_clause_binds_per_iteration() {
    let mut unit = CompilationUnit::new();
    let nums = unit.str_label("nums");
    let shifted = unit.str_label("shifted");
    let v = unit.intern("v");
    let w = unit.intern("w");
    let ref_nums = unit.reference("nums");
    let ref_v = unit.reference("v");
    let ref_w = unit.reference("w");
    unit.push(Decl::field(nums, Expr::list_lit(vec![Expr::int(1), Expr::int(2)])));
    unit.push(Decl::field(
        shifted,
        Expr::ListLit {
            elems: vec![ListElem::Comprehension {
                clauses: vec![
                    Clause::For {
                        key: None,
                        value: v,
                        source: ref_nums,
                    },
                    Clause::Let {
                        name: w,
                        value: Expr::binary(BinOp::Add, ref_v, Expr::int(10)),
                    },
                ],
                body: ref_w,
            }],
        },
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["shifted", "0"]), Some(Value::int(11)));
    assert_eq!(instance.lookup(&["shifted", "1"]), Some(Value::int(12)));
}

/// A comprehension may read regular sibling fields, but not fields another
/// comprehension generated at the same level.
#[test]
fn comprehension_may_not_read_generated_siblings() {
    let mut unit = CompilationUnit::new();
    let out = unit.str_label("out");
    let r#gen = unit.str_label("gen");
    let echo = unit.str_label("echo");
    let v = unit.intern("v");
    let w = unit.intern("w");
    let ref_gen = unit.reference("gen");
    let ref_w = unit.reference("w");
    // out: {
    //   for v in [1] { gen: 1 }
    //   for w in [gen] { echo: w }
    // }
    unit.push(Decl::field(
        out,
        Expr::struct_lit(vec![
            Decl::Comprehension {
                clauses: vec![Clause::For {
                    key: None,
                    value: v,
                    source: Expr::list_lit(vec![Expr::int(1)]),
                }],
                body: vec![Decl::field(r#gen, Expr::int(1))],
            },
            Decl::Comprehension {
                clauses: vec![Clause::For {
                    key: None,
                    value: w,
                    source: Expr::list_lit(vec![ref_gen]),
                }],
                body: vec![Decl::field(echo, ref_w)],
            },
        ]),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert!(instance.errors().iter().any(|b| b.kind == ErrorKind::Cycle));
}

/// Comprehension-emitted fields participate in closedness like declared
/// fields when the comprehension sits inside a definition.
#[test]
fn comprehension_fields_are_admitted_in_definitions() {
    let mut unit = CompilationUnit::new();
    let d = unit.def_label("D");
    let uses = unit.str_label("uses");
    let flag = unit.str_label("flag");
    let v = unit.intern("v");
    let d_ref = Expr::Ref(lattica::RefName::Def(unit.intern("D")));
    unit.push(Decl::field(
        d,
        Expr::struct_lit(vec![Decl::Comprehension {
            clauses: vec![Clause::For {
                key: None,
                value: v,
                source: Expr::list_lit(vec![Expr::int(1)]),
            }],
            body: vec![Decl::field(flag, Expr::bound(BoundOp::Gte, Expr::int(0)))],
        }]),
    ));
    unit.push(Decl::field(
        uses,
        Expr::unify(d_ref, Expr::struct_lit(vec![Decl::field(flag, Expr::int(3))])),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["uses", "flag"]), Some(Value::int(3)));
}
