//! End-to-end evaluation scenarios driving the public API.

use lattica::{
    BoundOp, CompilationUnit, Decimal, Decl, ErrorKind, Expr, ListElem, RefName, Runtime, Value,
};
use pretty_assertions::assert_eq;

/// `a: {x: 1}; b: a & {y: 2}` evaluates b to `{x: 1, y: 2}`, an instance
/// of a.
#[test]
fn unify_struct_with_reference() {
    let mut unit = CompilationUnit::new();
    let a = unit.str_label("a");
    let b = unit.str_label("b");
    let x = unit.str_label("x");
    let y = unit.str_label("y");
    let ref_a = unit.reference("a");
    unit.push(Decl::field(a, Expr::struct_lit(vec![Decl::field(x, Expr::int(1))])));
    unit.push(Decl::field(
        b,
        Expr::unify(ref_a, Expr::struct_lit(vec![Decl::field(y, Expr::int(2))])),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["b", "x"]), Some(Value::int(1)));
    assert_eq!(instance.lookup(&["b", "y"]), Some(Value::int(2)));
    assert_eq!(instance.lookup(&["a", "y"]), None);

    let a_val = instance.lookup(&["a"]).unwrap();
    let b_val = instance.lookup(&["b"]).unwrap();
    assert!(instance.subsumes(&a_val, &b_val));
    assert!(!instance.subsumes(&b_val, &a_val));
}

/// `p: *"tcp" | "udp"` exports its default, refines under unification, and
/// conflicts with a value outside the alternatives.
#[test]
fn marked_default_selection_and_refinement() {
    let mut unit = CompilationUnit::new();
    let p = unit.str_label("p");
    unit.push(Decl::field(
        p,
        Expr::disjunction(vec![(Expr::string("tcp"), true), (Expr::string("udp"), false)]),
    ));

    let mut instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    let p_val = instance.lookup(&["p"]).unwrap();
    assert_eq!(instance.default_view(&p_val), Value::string("tcp"));

    let refined = instance.unify(&p_val, &Value::string("udp"));
    assert_eq!(refined, Value::string("udp"));

    let conflicted = instance.unify(&p_val, &Value::string("sctp"));
    assert_eq!(conflicted.as_bottom().unwrap().kind, ErrorKind::Conflict);
}

/// `r: {a: r.b & {x: 1}, b: r.a & {y: 2}}`: a reference cycle over structs
/// reaching the fixed point `{x: 1, y: 2}` on both fields.
#[test]
fn reference_cycle_fixed_point() {
    let mut unit = CompilationUnit::new();
    let r = unit.str_label("r");
    let a = unit.str_label("a");
    let b = unit.str_label("b");
    let x = unit.str_label("x");
    let y = unit.str_label("y");
    let ref_r_b = Expr::select(unit.reference("r"), b);
    let ref_r_a = Expr::select(unit.reference("r"), a);
    unit.push(Decl::field(
        r,
        Expr::struct_lit(vec![
            Decl::field(
                a,
                Expr::unify(ref_r_b, Expr::struct_lit(vec![Decl::field(x, Expr::int(1))])),
            ),
            Decl::field(
                b,
                Expr::unify(ref_r_a, Expr::struct_lit(vec![Decl::field(y, Expr::int(2))])),
            ),
        ]),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["r", "a", "x"]), Some(Value::int(1)));
    assert_eq!(instance.lookup(&["r", "a", "y"]), Some(Value::int(2)));
    assert_eq!(instance.lookup(&["r", "b", "x"]), Some(Value::int(1)));
    assert_eq!(instance.lookup(&["r", "b", "y"]), Some(Value::int(2)));
    let ra = instance.lookup(&["r", "a"]).unwrap();
    let rb = instance.lookup(&["r", "b"]).unwrap();
    assert!(instance.equals(&ra, &rb));
}

/// `#D: {field: string}; v: #D & {extra: 1}`: definitions close recursively,
/// so the extra field is rejected.
#[test]
fn definition_closes_against_extra_fields() {
    let mut unit = CompilationUnit::new();
    let d = unit.def_label("D");
    let v = unit.str_label("v");
    let field = unit.str_label("field");
    let extra = unit.str_label("extra");
    let string_ty = unit.reference("string");
    let d_ref = Expr::Ref(RefName::Def(unit.intern("D")));
    unit.push(Decl::field(d, Expr::struct_lit(vec![Decl::field(field, string_ty)])));
    unit.push(Decl::field(
        v,
        Expr::unify(d_ref, Expr::struct_lit(vec![Decl::field(extra, Expr::int(1))])),
    ));

    let instance = Runtime::new().evaluate(&unit);
    let v_val = instance.lookup(&["v"]).unwrap();
    assert_eq!(v_val.as_bottom().unwrap().kind, ErrorKind::ClosedFieldNotAllowed);
    assert!(
        instance
            .errors()
            .iter()
            .any(|b| b.kind == ErrorKind::ClosedFieldNotAllowed)
    );
}

/// `L: *null | {head: int, tail: L}` terminates through the null default:
/// unifying with a two-element spine yields the finite structure.
#[test]
fn recursive_disjunction_terminates_via_default() {
    let mut unit = CompilationUnit::new();
    let l = unit.str_label("L");
    let x = unit.str_label("x");
    let head = unit.str_label("head");
    let tail = unit.str_label("tail");
    let int_ty = unit.reference("int");
    let ref_l = unit.reference("L");
    let ref_l2 = unit.reference("L");
    unit.push(Decl::field(
        l,
        Expr::disjunction(vec![
            (Expr::Null, true),
            (
                Expr::struct_lit(vec![Decl::field(head, int_ty), Decl::field(tail, ref_l)]),
                false,
            ),
        ]),
    ));
    unit.push(Decl::field(
        x,
        Expr::unify(
            ref_l2,
            Expr::struct_lit(vec![
                Decl::field(head, Expr::int(1)),
                Decl::field(
                    tail,
                    Expr::struct_lit(vec![
                        Decl::field(head, Expr::int(2)),
                        Decl::field(tail, Expr::Null),
                    ]),
                ),
            ]),
        ),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["x", "head"]), Some(Value::int(1)));
    assert_eq!(instance.lookup(&["x", "tail", "head"]), Some(Value::int(2)));
    assert_eq!(instance.lookup(&["x", "tail", "tail"]), Some(Value::Null));
}

/// `a: >=0 & <=10 & (int | *float); b: a & 3`: the default float branch
/// refines the integer literal to the concrete float `3.0`.
#[test]
fn bounds_with_defaulted_number_kind() {
    let mut unit = CompilationUnit::new();
    let a = unit.str_label("a");
    let b = unit.str_label("b");
    let int_ty = unit.reference("int");
    let float_ty = unit.reference("float");
    let ref_a = unit.reference("a");
    unit.push(Decl::field(
        a,
        Expr::unify(
            Expr::unify(
                Expr::bound(BoundOp::Gte, Expr::int(0)),
                Expr::bound(BoundOp::Lte, Expr::int(10)),
            ),
            Expr::disjunction(vec![(int_ty, false), (float_ty, true)]),
        ),
    ));
    unit.push(Decl::field(b, Expr::unify(ref_a, Expr::int(3))));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    let b_val = instance.lookup(&["b"]).unwrap();
    assert_eq!(instance.default_view(&b_val), Value::Float(Decimal::from_i64(3)));
}

/// Out-of-range unification against the bound interval fails.
#[test]
fn bound_interval_rejects_out_of_range() {
    let mut unit = CompilationUnit::new();
    let a = unit.str_label("a");
    let b = unit.str_label("b");
    let ref_a = unit.reference("a");
    unit.push(Decl::field(
        a,
        Expr::unify(
            Expr::bound(BoundOp::Gte, Expr::int(0)),
            Expr::bound(BoundOp::Lte, Expr::int(10)),
        ),
    ));
    unit.push(Decl::field(b, Expr::unify(ref_a, Expr::int(11))));

    let instance = Runtime::new().evaluate(&unit);
    let b_val = instance.lookup(&["b"]).unwrap();
    assert_eq!(b_val.as_bottom().unwrap().kind, ErrorKind::Conflict);
}

/// Lists unify element-wise; an open tail admits a longer counterpart.
#[test]
fn list_unification_with_open_tail() {
    let mut unit = CompilationUnit::new();
    let short = unit.str_label("short");
    let long = unit.str_label("long");
    let both = unit.str_label("both");
    let int_ty = unit.reference("int");
    let ref_short = unit.reference("short");
    let ref_long = unit.reference("long");
    unit.push(Decl::field(
        short,
        Expr::ListLit {
            elems: vec![ListElem::Elem(Expr::int(1)), ListElem::Ellipsis(Some(int_ty))],
        },
    ));
    unit.push(Decl::field(long, Expr::list_lit(vec![Expr::int(1), Expr::int(2)])));
    unit.push(Decl::field(both, Expr::unify(ref_short, ref_long)));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["both", "0"]), Some(Value::int(1)));
    assert_eq!(instance.lookup(&["both", "1"]), Some(Value::int(2)));
}
