//! Arithmetic, comparison, interpolation, and incomplete expressions.

use lattica::{
    BinOp, CompilationUnit, Decimal, Decl, Expr, InterpolationPart, Runtime, UnaryOp, Value,
};
use pretty_assertions::assert_eq;

#[test]
fn arithmetic_is_arbitrary_precision() {
    let mut unit = CompilationUnit::new();
    let small = unit.str_label("small");
    let big = unit.str_label("big");
    let tenth = unit.str_label("tenth");
    unit.push(Decl::field(
        small,
        Expr::binary(BinOp::Add, Expr::int(1), Expr::int(2)),
    ));
    // (1 << 100) * (1 << 100) does not overflow.
    let huge = num_bigint_pow2_100();
    unit.push(Decl::field(
        big,
        Expr::binary(BinOp::Mul, Expr::Int(huge.clone()), Expr::Int(huge.clone())),
    ));
    // Decimal arithmetic: 0.1 + 0.2 is exactly 0.3.
    unit.push(Decl::field(
        tenth,
        Expr::binary(
            BinOp::Add,
            Expr::float("0.1").unwrap(),
            Expr::float("0.2").unwrap(),
        ),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["small"]), Some(Value::int(3)));
    assert_eq!(instance.lookup(&["big"]), Some(Value::Int(&huge * &huge)));
    assert_eq!(
        instance.lookup(&["tenth"]),
        Some(Value::Float(Decimal::from_string("0.3").unwrap()))
    );
}

fn num_bigint_pow2_100() -> num_bigint::BigInt {
    num_bigint::BigInt::from(1u8) << 100
}

#[test]
fn division_always_yields_float() {
    let mut unit = CompilationUnit::new();
    let half = unit.str_label("half");
    let exact = unit.str_label("exact");
    unit.push(Decl::field(
        half,
        Expr::binary(BinOp::Div, Expr::int(7), Expr::int(2)),
    ));
    unit.push(Decl::field(
        exact,
        Expr::binary(BinOp::Div, Expr::int(4), Expr::int(2)),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(
        instance.lookup(&["half"]),
        Some(Value::Float(Decimal::from_string("3.5").unwrap()))
    );
    assert_eq!(
        instance.lookup(&["exact"]),
        Some(Value::Float(Decimal::from_i64(2)))
    );
}

#[test]
fn string_and_bytes_operators() {
    let mut unit = CompilationUnit::new();
    let cat = unit.str_label("cat");
    let rep = unit.str_label("rep");
    let cmp = unit.str_label("cmp");
    unit.push(Decl::field(
        cat,
        Expr::binary(BinOp::Add, Expr::string("foo"), Expr::string("bar")),
    ));
    unit.push(Decl::field(
        rep,
        Expr::binary(BinOp::Mul, Expr::string("ab"), Expr::int(3)),
    ));
    unit.push(Decl::field(
        cmp,
        Expr::binary(BinOp::Lt, Expr::string("a"), Expr::string("b")),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["cat"]), Some(Value::string("foobar")));
    assert_eq!(instance.lookup(&["rep"]), Some(Value::string("ababab")));
    assert_eq!(instance.lookup(&["cmp"]), Some(Value::Bool(true)));
}

#[test]
fn comparisons_cross_numeric_kinds() {
    let mut unit = CompilationUnit::new();
    let lt = unit.str_label("lt");
    let eq = unit.str_label("eq");
    let ne = unit.str_label("ne");
    unit.push(Decl::field(
        lt,
        Expr::binary(BinOp::Lt, Expr::int(3), Expr::float("3.5").unwrap()),
    ));
    unit.push(Decl::field(
        eq,
        Expr::binary(BinOp::Eq, Expr::int(3), Expr::float("3.0").unwrap()),
    ));
    unit.push(Decl::field(
        ne,
        Expr::binary(BinOp::Ne, Expr::Null, Expr::int(0)),
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["lt"]), Some(Value::Bool(true)));
    assert_eq!(instance.lookup(&["eq"]), Some(Value::Bool(true)));
    assert_eq!(instance.lookup(&["ne"]), Some(Value::Bool(true)));
}

#[test]
fn unary_operators() {
    let mut unit = CompilationUnit::new();
    let not = unit.str_label("not");
    let neg = unit.str_label("neg");
    unit.push(Decl::field(
        not,
        Expr::Unary {
            op: UnaryOp::Not,
            expr: Box::new(Expr::Bool(false)),
        },
    ));
    unit.push(Decl::field(
        neg,
        Expr::Unary {
            op: UnaryOp::Neg,
            expr: Box::new(Expr::int(5)),
        },
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["not"]), Some(Value::Bool(true)));
    assert_eq!(instance.lookup(&["neg"]), Some(Value::int(-5)));
}

#[test]
fn interpolation_renders_canonical_forms() {
    let mut unit = CompilationUnit::new();
    let line = unit.str_label("line");
    let port = unit.str_label("port");
    let ref_port = unit.reference("port");
    unit.push(Decl::field(port, Expr::int(80)));
    unit.push(Decl::field(
        line,
        Expr::Interpolation {
            parts: vec![
                InterpolationPart::Lit("host:".into()),
                InterpolationPart::Expr(ref_port),
                InterpolationPart::Lit(" secure=".into()),
                InterpolationPart::Expr(Expr::Bool(false)),
            ],
        },
    ));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["line"]), Some(Value::string("host:80 secure=false")));
}

/// Valid UTF-8 round-trips through unification untouched, including
/// multi-byte sequences.
#[test]
fn utf8_strings_round_trip() {
    let text = "héllo ⊓ wörld 𝄞";
    let mut unit = CompilationUnit::new();
    let a = unit.str_label("a");
    let b = unit.str_label("b");
    let string_ty = unit.reference("string");
    let ref_a = unit.reference("a");
    unit.push(Decl::field(a, Expr::string(text)));
    unit.push(Decl::field(b, Expr::unify(ref_a, string_ty)));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["b"]), Some(Value::string(text)));
}

/// Operands that never become concrete leave the expression incomplete:
/// not an error unless a concrete value is demanded.
#[test]
fn incomplete_expressions_are_deferred() {
    let mut unit = CompilationUnit::new();
    let a = unit.str_label("a");
    let b = unit.str_label("b");
    let int_ty = unit.reference("int");
    let ref_b = unit.reference("b");
    unit.push(Decl::field(a, Expr::binary(BinOp::Add, ref_b, Expr::int(1))));
    unit.push(Decl::field(b, int_ty));

    let instance = Runtime::new().evaluate(&unit);
    // Incomplete is not an evaluation error...
    assert_eq!(instance.errors(), &[]);
    let a_val = instance.lookup(&["a"]).unwrap();
    assert!(a_val.is_incomplete());
    // ...but demanding concrete data reports it.
    let problems = instance.check();
    assert!(!problems.is_empty());
}

/// Once the operand becomes concrete through unification elsewhere, the
/// same expression evaluates.
#[test]
fn deferred_expression_completes_with_data() {
    let mut unit = CompilationUnit::new();
    let a = unit.str_label("a");
    let b = unit.str_label("b");
    let int_ty = unit.reference("int");
    let ref_b = unit.reference("b");
    unit.push(Decl::field(a, Expr::binary(BinOp::Add, ref_b, Expr::int(1))));
    unit.push(Decl::field(b, int_ty));
    unit.push(Decl::field(b, Expr::int(4)));

    let instance = Runtime::new().evaluate(&unit);
    assert_eq!(instance.errors(), &[]);
    assert_eq!(instance.lookup(&["a"]), Some(Value::int(5)));
}
