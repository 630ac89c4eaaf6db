//! Universal lattice laws: unification is a commutative, associative,
//! idempotent meet, dual to subsumption, with top and bottom as identities.

use lattica::{
    Bound, BoundOp, BasicType, CompilationUnit, Decimal, Decl, DisjunctTerm, Disjunction, ErrorKind, Expr,
    Runtime, Value,
};

fn bound(op: BoundOp, n: i64) -> Value {
    Value::Bound(Box::new(Bound::new(op, Value::int(n))))
}

fn disj(terms: Vec<(Value, bool)>) -> Value {
    Value::Disjunction(Box::new(Disjunction {
        terms: terms
            .into_iter()
            .map(|(value, default)| DisjunctTerm { value, default })
            .collect(),
    }))
}

/// Scalar-level sample values covering every non-aggregate variant family.
///
/// The float *type* is deliberately absent: the int-to-float refinement it
/// triggers is a one-way coercion, not a lattice element, and the laws are
/// stated over values.
fn samples() -> Vec<Value> {
    vec![
        Value::Top,
        Value::bottom(ErrorKind::Conflict),
        Value::Null,
        Value::Bool(true),
        Value::int(3),
        Value::int(7),
        Value::Float(Decimal::from_string("3.5").unwrap()),
        Value::string("tcp"),
        Value::string("udp"),
        Value::Type(BasicType::Int),
        Value::Type(BasicType::Number),
        Value::Type(BasicType::String),
        bound(BoundOp::Gte, 0),
        bound(BoundOp::Lte, 10),
        bound(BoundOp::Gt, 5),
        bound(BoundOp::Neq, 3),
        disj(vec![(Value::string("tcp"), true), (Value::string("udp"), false)]),
        disj(vec![(Value::int(3), false), (Value::Type(BasicType::String), false)]),
    ]
}

#[test]
fn unification_is_commutative() {
    let unit = CompilationUnit::new();
    let mut instance = Runtime::new().evaluate(&unit);
    for a in &samples() {
        for b in &samples() {
            let ab = instance.unify(a, b);
            let ba = instance.unify(b, a);
            assert!(instance.equals(&ab, &ba), "{a} & {b} gave {ab} vs {ba}");
        }
    }
}

#[test]
fn unification_is_associative() {
    let unit = CompilationUnit::new();
    let mut instance = Runtime::new().evaluate(&unit);
    let samples = samples();
    for a in &samples {
        for b in &samples {
            for c in &samples {
                let left_inner = instance.unify(a, b);
                let left = instance.unify(&left_inner, c);
                let right_inner = instance.unify(b, c);
                let right = instance.unify(a, &right_inner);
                assert!(
                    instance.equals(&left, &right),
                    "({a} & {b}) & {c} gave {left} vs {right}"
                );
            }
        }
    }
}

#[test]
fn unification_is_idempotent() {
    let unit = CompilationUnit::new();
    let mut instance = Runtime::new().evaluate(&unit);
    for a in &samples() {
        let aa = instance.unify(a, a);
        assert!(instance.equals(&aa, a), "{a} & {a} gave {aa}");
    }
}

#[test]
fn unification_result_is_subsumed_by_both_operands() {
    let unit = CompilationUnit::new();
    let mut instance = Runtime::new().evaluate(&unit);
    for a in &samples() {
        for b in &samples() {
            let ab = instance.unify(a, b);
            assert!(instance.subsumes(a, &ab), "{a} does not subsume {a} & {b} = {ab}");
            assert!(instance.subsumes(b, &ab), "{b} does not subsume {a} & {b} = {ab}");
        }
    }
}

#[test]
fn subsumption_unification_duality() {
    let unit = CompilationUnit::new();
    let mut instance = Runtime::new().evaluate(&unit);
    for a in &samples() {
        for b in &samples() {
            let ab = instance.unify(a, b);
            // b ⊑ a exactly when a & b = b.
            assert_eq!(
                instance.subsumes(a, b),
                instance.equals(&ab, b),
                "duality broken for {a} and {b}: meet is {ab}"
            );
        }
    }
}

#[test]
fn top_and_bottom_identities() {
    let unit = CompilationUnit::new();
    let mut instance = Runtime::new().evaluate(&unit);
    let bottom = Value::bottom(ErrorKind::Conflict);
    for v in &samples() {
        let with_top = instance.unify(&Value::Top, v);
        assert!(instance.equals(&with_top, v), "_ & {v} gave {with_top}");
        let with_bottom = instance.unify(&bottom, v);
        assert!(with_bottom.is_bottom(), "_|_ & {v} gave {with_bottom}");
    }
}

#[test]
fn disjunction_distributes_over_unification() {
    let unit = CompilationUnit::new();
    let mut instance = Runtime::new().evaluate(&unit);
    let d = disj(vec![
        (Value::Type(BasicType::Int), false),
        (Value::Type(BasicType::String), false),
    ]);
    for v in &samples() {
        let direct = instance.unify(&d, v);
        // Distribute by hand: unify each term, then rejoin.
        let t1 = instance.unify(&Value::Type(BasicType::Int), v);
        let t2 = instance.unify(&Value::Type(BasicType::String), v);
        let mut terms = Vec::new();
        if !t1.is_bottom() {
            terms.push((t1, false));
        }
        if !t2.is_bottom() {
            terms.push((t2, false));
        }
        let expected = match terms.len() {
            0 => Value::bottom(ErrorKind::Conflict),
            1 => terms.remove(0).0,
            _ => disj(terms),
        };
        assert!(
            instance.equals(&direct, &expected),
            "distribution broken for {v}: {direct} vs {expected}"
        );
    }
}

/// Aggregate laws: the same properties hold for struct values produced by
/// evaluation.
#[test]
fn laws_hold_for_structs() {
    let mut unit = CompilationUnit::new();
    let a = unit.str_label("a");
    let b = unit.str_label("b");
    let x = unit.str_label("x");
    let y = unit.str_label("y");
    unit.push(Decl::field(a, Expr::struct_lit(vec![Decl::field(x, Expr::int(1))])));
    unit.push(Decl::field(
        b,
        Expr::struct_lit(vec![Decl::field(x, Expr::int(1)), Decl::field(y, Expr::int(2))]),
    ));

    let mut instance = Runtime::new().evaluate(&unit);
    let a_val = instance.lookup(&["a"]).unwrap();
    let b_val = instance.lookup(&["b"]).unwrap();

    let ab = instance.unify(&a_val, &b_val);
    let ba = instance.unify(&b_val, &a_val);
    assert!(instance.equals(&ab, &ba));

    let aa = instance.unify(&a_val, &a_val);
    assert!(instance.equals(&aa, &a_val));

    // a ⊒ b, so a & b == b.
    assert!(instance.subsumes(&a_val, &b_val));
    assert!(instance.equals(&ab, &b_val));
    assert!(instance.subsumes(&a_val, &ab));
}
