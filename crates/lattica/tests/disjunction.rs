//! Disjunction normalization, the default-mark algebra, and selection.

use lattica::{CompilationUnit, Decl, ErrorKind, Expr, Runtime, Value};
use pretty_assertions::assert_eq;

fn eval_single<'a>(unit: &'a CompilationUnit) -> lattica::Instance<'a> {
    Runtime::new().evaluate(unit)
}

/// A marked term whose inner disjunction already carries defaults keeps
/// them.
#[test]
fn marked_term_keeps_inner_defaults() {
    let mut unit = CompilationUnit::new();
    let p = unit.str_label("p");
    // p: *(*"a" | "b") | "c"
    unit.push(Decl::field(
        p,
        Expr::disjunction(vec![
            (
                Expr::disjunction(vec![(Expr::string("a"), true), (Expr::string("b"), false)]),
                true,
            ),
            (Expr::string("c"), false),
        ]),
    ));
    let instance = eval_single(&unit);
    let p_val = instance.lookup(&["p"]).unwrap();
    assert_eq!(instance.default_view(&p_val), Value::string("a"));
}

/// In a marked disjunction, an unmarked nested disjunction loses its
/// defaults.
#[test]
fn unmarked_nested_defaults_are_stripped() {
    let mut unit = CompilationUnit::new();
    let p = unit.str_label("p");
    // p: *"a" | ("b" | *"c") — only "a" is the default.
    unit.push(Decl::field(
        p,
        Expr::disjunction(vec![
            (Expr::string("a"), true),
            (
                Expr::disjunction(vec![(Expr::string("b"), false), (Expr::string("c"), true)]),
                false,
            ),
        ]),
    ));
    let instance = eval_single(&unit);
    let p_val = instance.lookup(&["p"]).unwrap();
    assert_eq!(instance.default_view(&p_val), Value::string("a"));
    // All three alternatives are still present.
    let Value::Disjunction(d) = &p_val else {
        panic!("expected disjunction, got {p_val:?}");
    };
    assert_eq!(d.terms.len(), 3);
    assert_eq!(d.terms.iter().filter(|t| t.default).count(), 1);
}

/// In an unmarked disjunction, nested defaults survive the flattening.
#[test]
fn plain_disjoining_keeps_inner_defaults() {
    let mut unit = CompilationUnit::new();
    let p = unit.str_label("p");
    // p: (*"a" | "b") | "c"
    unit.push(Decl::field(
        p,
        Expr::disjunction(vec![
            (
                Expr::disjunction(vec![(Expr::string("a"), true), (Expr::string("b"), false)]),
                false,
            ),
            (Expr::string("c"), false),
        ]),
    ));
    let instance = eval_single(&unit);
    let p_val = instance.lookup(&["p"]).unwrap();
    assert_eq!(instance.default_view(&p_val), Value::string("a"));
}

/// Unification preserves the default through refinement (U1), and defaults
/// of both operands meet (U2).
#[test]
fn defaults_through_unification() {
    let mut unit = CompilationUnit::new();
    let p = unit.str_label("p");
    let q = unit.str_label("q");
    let r = unit.str_label("r");
    let string_ty = unit.reference("string");
    let ref_p = unit.reference("p");
    let ref_p2 = unit.reference("p");
    unit.push(Decl::field(
        p,
        Expr::disjunction(vec![(Expr::string("tcp"), true), (Expr::string("udp"), false)]),
    ));
    // q: p & string — default survives.
    unit.push(Decl::field(q, Expr::unify(ref_p, string_ty)));
    // r: p & (*"tcp" | "udp" | "sctp") — defaults meet.
    unit.push(Decl::field(
        r,
        Expr::unify(
            ref_p2,
            Expr::disjunction(vec![
                (Expr::string("tcp"), true),
                (Expr::string("udp"), false),
                (Expr::string("sctp"), false),
            ]),
        ),
    ));

    let instance = eval_single(&unit);
    let q_val = instance.lookup(&["q"]).unwrap();
    assert_eq!(instance.default_view(&q_val), Value::string("tcp"));
    let r_val = instance.lookup(&["r"]).unwrap();
    assert_eq!(instance.default_view(&r_val), Value::string("tcp"));
    let Value::Disjunction(d) = &r_val else {
        panic!("expected disjunction, got {r_val:?}");
    };
    assert_eq!(d.terms.len(), 2);
}

/// Two distinct marked defaults with a bottom meet leave selection
/// incomplete.
#[test]
fn conflicting_defaults_are_ambiguous() {
    let mut unit = CompilationUnit::new();
    let p = unit.str_label("p");
    unit.push(Decl::field(
        p,
        Expr::disjunction(vec![(Expr::string("a"), true), (Expr::string("b"), true)]),
    ));
    let instance = eval_single(&unit);
    assert_eq!(instance.errors(), &[]);
    let p_val = instance.lookup(&["p"]).unwrap();
    // No single default is selectable.
    assert!(matches!(instance.default_view(&p_val), Value::Disjunction(_)));
    let problems = instance.check();
    assert!(problems.iter().any(|b| b.kind == ErrorKind::Incomplete));
}

/// Duplicate alternatives collapse; a marked and an unmarked occurrence of
/// the same value stay distinct.
#[test]
fn normalization_deduplicates() {
    let mut unit = CompilationUnit::new();
    let p = unit.str_label("p");
    let q = unit.str_label("q");
    unit.push(Decl::field(
        p,
        Expr::disjunction(vec![
            (Expr::string("a"), false),
            (Expr::string("a"), false),
            (Expr::string("b"), false),
        ]),
    ));
    unit.push(Decl::field(
        q,
        Expr::disjunction(vec![(Expr::string("a"), true), (Expr::string("a"), false)]),
    ));
    let instance = eval_single(&unit);
    let p_val = instance.lookup(&["p"]).unwrap();
    let Value::Disjunction(d) = &p_val else {
        panic!("expected disjunction, got {p_val:?}");
    };
    assert_eq!(d.terms.len(), 2);

    let q_val = instance.lookup(&["q"]).unwrap();
    let Value::Disjunction(d) = &q_val else {
        panic!("expected disjunction, got {q_val:?}");
    };
    assert_eq!(d.terms.len(), 2);
}

/// Bottom terms vanish; a single survivor collapses the disjunction.
#[test]
fn bottom_terms_are_eliminated() {
    let mut unit = CompilationUnit::new();
    let p = unit.str_label("p");
    let int_ty = unit.reference("int");
    // p: (int & "nope") | 3
    unit.push(Decl::field(
        p,
        Expr::disjunction(vec![
            (Expr::unify(int_ty, Expr::string("nope")), false),
            (Expr::int(3), false),
        ]),
    ));
    let instance = eval_single(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["p"]), Some(Value::int(3)));
}

/// Disjunctions over struct alternatives distribute against sibling
/// structure; failing alternatives drop out.
#[test]
fn struct_disjunction_distributes() {
    let mut unit = CompilationUnit::new();
    let v = unit.str_label("v");
    let kind = unit.str_label("kind");
    let size = unit.str_label("size");
    let int_ty = unit.reference("int");
    // v: ({kind: "a"} | {kind: "b", size: int}) & {kind: "b", size: 10}
    unit.push(Decl::field(
        v,
        Expr::unify(
            Expr::disjunction(vec![
                (
                    Expr::struct_lit(vec![Decl::field(kind, Expr::string("a"))]),
                    false,
                ),
                (
                    Expr::struct_lit(vec![Decl::field(kind, Expr::string("b")), Decl::field(size, int_ty)]),
                    false,
                ),
            ]),
            Expr::struct_lit(vec![
                Decl::field(kind, Expr::string("b")),
                Decl::field(size, Expr::int(10)),
            ]),
        ),
    ));

    let instance = eval_single(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["v", "kind"]), Some(Value::string("b")));
    assert_eq!(instance.lookup(&["v", "size"]), Some(Value::int(10)));
}
