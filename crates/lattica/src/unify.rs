//! Scalar unification: the meet operation on every non-aggregate variant
//! pair.
//!
//! Aggregates and disjunctions are handled by the evaluator (they need the
//! node arena); everything here is pure. The meet is total: it returns a new
//! value or a bottom carrying an error kind, and never fails.

use crate::{
    bound::{Bound, BoundMeet, BoundOp, meet_bounds},
    decimal::Decimal,
    errors::{Bottom, ErrorKind},
    value::{BasicType, Value, atom_instance_of},
};

/// Atom families for bound/type compatibility decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Numeric,
    Str,
    Bytes,
    Bool,
    Null,
}

fn atom_family(v: &Value) -> Option<Family> {
    match v {
        Value::Null => Some(Family::Null),
        Value::Bool(_) => Some(Family::Bool),
        Value::Int(_) | Value::Float(_) => Some(Family::Numeric),
        Value::String(_) => Some(Family::Str),
        Value::Bytes(_) => Some(Family::Bytes),
        _ => None,
    }
}

fn type_family(t: BasicType) -> Family {
    match t {
        BasicType::Bool => Family::Bool,
        BasicType::Int | BasicType::Float | BasicType::Number => Family::Numeric,
        BasicType::String => Family::Str,
        BasicType::Bytes => Family::Bytes,
    }
}

fn bound_family(b: &Bound) -> Option<Family> {
    atom_family(&b.atom)
}

/// Computes `a & b` for scalar values.
///
/// Callers strip `Struct`, `List`, and `Disjunction` first; if an aggregate
/// reaches this function paired with a scalar the result is a conflict, which
/// is also the right answer.
#[must_use]
pub(crate) fn meet(a: &Value, b: &Value) -> Value {
    match (a, b) {
        // Top and bottom identities.
        (Value::Bottom(_), _) => a.clone(),
        (_, Value::Bottom(_)) => b.clone(),
        (Value::Top, _) => b.clone(),
        (_, Value::Top) => a.clone(),

        // Conjunctions fold their counterpart in.
        (Value::Conjunction(parts), _) => conjoin(parts.clone(), b.clone()),
        (_, Value::Conjunction(parts)) => conjoin(parts.clone(), a.clone()),

        // Same-atom meets.
        (Value::Null, Value::Null) => Value::Null,
        (Value::Bool(x), Value::Bool(y)) if x == y => a.clone(),
        (Value::Int(x), Value::Int(y)) if x == y => a.clone(),
        (Value::Float(x), Value::Float(y)) if x == y => a.clone(),
        (Value::String(x), Value::String(y)) if x == y => a.clone(),
        (Value::Bytes(x), Value::Bytes(y)) if x == y => a.clone(),

        // Type markers.
        (Value::Type(x), Value::Type(y)) => meet_types(*x, *y),
        (Value::Type(t), v) if v.is_atom() => meet_type_atom(*t, v),
        (v, Value::Type(t)) if v.is_atom() => meet_type_atom(*t, v),
        (Value::Type(t), Value::Bound(bd)) => meet_type_bound(*t, bd),
        (Value::Bound(bd), Value::Type(t)) => meet_type_bound(*t, bd),
        (Value::Type(t), Value::Regex(r)) | (Value::Regex(r), Value::Type(t)) => {
            if *t == BasicType::String {
                Value::Regex(r.clone())
            } else {
                Value::from_bottom(Bottom::mismatch("string", t))
            }
        }

        // Bounds.
        (Value::Bound(bd), v) if v.is_atom() => meet_bound_atom(bd, v),
        (v, Value::Bound(bd)) if v.is_atom() => meet_bound_atom(bd, v),
        (Value::Bound(x), Value::Bound(y)) => meet_bound_bound(x, y),
        (Value::Bound(bd), Value::Regex(r)) | (Value::Regex(r), Value::Bound(bd)) => {
            match bound_family(bd) {
                Some(Family::Str) => conjunction(vec![Value::Bound(bd.clone()), Value::Regex(r.clone())]),
                // != of a non-string atom is vacuous against strings.
                _ if bd.op == BoundOp::Neq => Value::Regex(r.clone()),
                _ => Value::from_bottom(Bottom::mismatch("string", Value::Bound(bd.clone()))),
            }
        }

        // Regexes.
        (Value::Regex(x), Value::Regex(y)) => {
            if x == y {
                a.clone()
            } else {
                conjunction(vec![a.clone(), b.clone()])
            }
        }
        (Value::Regex(r), v) if v.is_atom() => meet_regex_atom(r, v),
        (v, Value::Regex(r)) if v.is_atom() => meet_regex_atom(r, v),

        // Distinct atoms (including int/float crossings) conflict.
        (x, y) if x.is_atom() && y.is_atom() => Value::from_bottom(Bottom::conflict(x, y)),

        // Anything else that lands here is a scalar/aggregate crossing.
        (x, y) => Value::from_bottom(Bottom::with_msg(
            ErrorKind::Conflict,
            format!("conflicting values {} and {}", x.kind_name(), y.kind_name()),
        )),
    }
}

fn meet_types(x: BasicType, y: BasicType) -> Value {
    if x == y {
        return Value::Type(x);
    }
    match (x, y) {
        (BasicType::Number, BasicType::Int | BasicType::Float) => Value::Type(y),
        (BasicType::Int | BasicType::Float, BasicType::Number) => Value::Type(x),
        _ => Value::from_bottom(Bottom::mismatch(x.into(), y)),
    }
}

fn meet_type_atom(t: BasicType, atom: &Value) -> Value {
    if atom_instance_of(atom, t) {
        return atom.clone();
    }
    // An integer refines to a float when unified with the float type; this is
    // the one coercion in the numeric tower. The reverse never holds.
    if t == BasicType::Float
        && let Value::Int(n) = atom
    {
        return Value::Float(Decimal::from_bigint(n));
    }
    Value::from_bottom(Bottom::mismatch(t.into(), atom))
}

fn meet_type_bound(t: BasicType, bd: &Bound) -> Value {
    let Some(fam) = bound_family(bd) else {
        return Value::from_bottom(Bottom::mismatch(t.into(), bd));
    };
    if fam != type_family(t) {
        // A != bound whose endpoint lies outside the type's family is
        // vacuously satisfied by every instance of the type.
        if bd.op == BoundOp::Neq {
            return Value::Type(t);
        }
        return Value::from_bottom(Bottom::mismatch(t.into(), bd));
    }
    match t {
        // number, string, and bytes admit exactly what their bounds admit.
        BasicType::Number | BasicType::String | BasicType::Bytes => Value::Bound(Box::new(bd.clone())),
        _ => conjunction(vec![Value::Type(t), Value::Bound(Box::new(bd.clone()))]),
    }
}

fn meet_bound_atom(bd: &Bound, atom: &Value) -> Value {
    match bd.admits(atom) {
        Some(true) => atom.clone(),
        Some(false) => Value::from_bottom(Bottom::conflict(atom, Value::Bound(Box::new(bd.clone())))),
        None => {
            if bd.op == BoundOp::Neq {
                // Atoms from a different family are trivially unequal.
                atom.clone()
            } else {
                Value::from_bottom(Bottom::mismatch(
                    bd.atom.kind_name(),
                    atom,
                ))
            }
        }
    }
}

fn meet_bound_bound(x: &Bound, y: &Bound) -> Value {
    let same_family = match (bound_family(x), bound_family(y)) {
        (Some(fx), Some(fy)) => fx == fy,
        _ => false,
    };
    if !same_family {
        // Cross-family != bounds are vacuous against the other constraint.
        if x.op == BoundOp::Neq {
            return Value::Bound(Box::new(y.clone()));
        }
        if y.op == BoundOp::Neq {
            return Value::Bound(Box::new(x.clone()));
        }
        return Value::from_bottom(Bottom::with_msg(
            ErrorKind::TypeMismatch,
            format!("incompatible bounds {x} and {y}"),
        ));
    }
    match meet_bounds(x, y) {
        BoundMeet::Single(b) => Value::Bound(Box::new(b)),
        BoundMeet::Atom(v) => v,
        BoundMeet::Both => conjunction(vec![
            Value::Bound(Box::new(x.clone())),
            Value::Bound(Box::new(y.clone())),
        ]),
        BoundMeet::Empty => Value::from_bottom(Bottom::conflict(
            Value::Bound(Box::new(x.clone())),
            Value::Bound(Box::new(y.clone())),
        )),
    }
}

fn meet_regex_atom(r: &crate::bound::RegexBound, atom: &Value) -> Value {
    match atom {
        Value::String(s) => match r.admits(s) {
            Ok(true) => atom.clone(),
            Ok(false) => Value::from_bottom(Bottom::conflict(atom, Value::Regex(Box::new(r.clone())))),
            Err(b) => Value::from_bottom(b),
        },
        _ => Value::from_bottom(Bottom::mismatch("string", atom)),
    }
}

/// Builds a normalized conjunction: flat, type-markers first, single
/// elements collapse.
fn conjunction(mut parts: Vec<Value>) -> Value {
    parts.sort_by_key(part_rank);
    match parts.len() {
        0 => Value::Top,
        1 => parts.pop().expect("len checked"),
        _ => Value::Conjunction(parts),
    }
}

fn part_rank(v: &Value) -> u8 {
    match v {
        Value::Type(_) => 0,
        Value::Bound(_) => 1,
        Value::Regex(_) => 2,
        _ => 3,
    }
}

/// Folds `add` into the parts of an existing conjunction, reducing pairwise
/// until a fixed point.
fn conjoin(parts: Vec<Value>, add: Value) -> Value {
    let mut parts = parts;
    let mut pending = vec![add];
    while let Some(x) = pending.pop() {
        match x {
            Value::Top => {}
            Value::Bottom(_) => return x,
            Value::Conjunction(inner) => pending.extend(inner),
            x => {
                let mut remaining = Vec::with_capacity(parts.len());
                let mut carry = Some(x);
                for part in parts {
                    let Some(cur) = carry.as_ref() else {
                        remaining.push(part);
                        continue;
                    };
                    let m = meet(&part, cur);
                    match m {
                        Value::Bottom(_) => return m,
                        // An irreducible pair keeps the part and carries on.
                        Value::Conjunction(pair) if pair.len() == 2 => {
                            // meet() only builds fresh two-element pairs here.
                            remaining.push(part);
                        }
                        reduced => {
                            // The pair reduced; restart with the result.
                            carry = None;
                            pending.push(reduced);
                        }
                    }
                }
                if let Some(cur) = carry {
                    remaining.push(cur);
                }
                parts = remaining;
            }
        }
    }
    conjunction(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bound::RegexBound;

    fn gte(n: i64) -> Value {
        Value::Bound(Box::new(Bound::new(BoundOp::Gte, Value::int(n))))
    }

    fn lte(n: i64) -> Value {
        Value::Bound(Box::new(Bound::new(BoundOp::Lte, Value::int(n))))
    }

    #[test]
    fn atoms_and_types() {
        assert_eq!(meet(&Value::int(3), &Value::int(3)), Value::int(3));
        assert!(meet(&Value::int(3), &Value::int(4)).is_bottom());
        assert_eq!(meet(&Value::Type(BasicType::Int), &Value::int(3)), Value::int(3));
        assert!(meet(&Value::Type(BasicType::String), &Value::int(3)).is_bottom());
        // int literals refine to floats under the float type
        let d = Decimal::from_i64(3);
        assert_eq!(meet(&Value::Type(BasicType::Float), &Value::int(3)), Value::Float(d));
        // but a float literal is not an int
        let f = Value::Float(Decimal::from_i64(3));
        assert!(meet(&Value::Type(BasicType::Int), &f).is_bottom());
    }

    #[test]
    fn interval_then_atom() {
        let interval = meet(&gte(0), &lte(10));
        let Value::Conjunction(parts) = &interval else {
            panic!("expected conjunction, got {interval:?}");
        };
        assert_eq!(parts.len(), 2);
        assert_eq!(meet(&interval, &Value::int(3)), Value::int(3));
        assert!(meet(&interval, &Value::int(11)).is_bottom());
    }

    #[test]
    fn conjunction_tightens() {
        let interval = meet(&gte(0), &lte(10));
        let tightened = meet(&interval, &gte(5));
        let Value::Conjunction(parts) = &tightened else {
            panic!("expected conjunction, got {tightened:?}");
        };
        assert!(parts.contains(&gte(5)));
        assert!(parts.contains(&lte(10)));
        assert!(!parts.contains(&gte(0)));
    }

    #[test]
    fn number_absorbs_numeric_bounds() {
        assert_eq!(meet(&Value::Type(BasicType::Number), &gte(0)), gte(0));
        let with_int = meet(&Value::Type(BasicType::Int), &gte(0));
        assert!(matches!(with_int, Value::Conjunction(_)));
    }

    #[test]
    fn regex_meets() {
        let re = Value::Regex(Box::new(RegexBound::new("^a", false)));
        assert_eq!(meet(&re, &Value::string("abc")), Value::string("abc"));
        assert!(meet(&re, &Value::string("xyz")).is_bottom());
        assert_eq!(meet(&Value::Type(BasicType::String), &re), re);
    }

    #[test]
    fn meet_is_commutative_on_samples() {
        let samples = [
            Value::Top,
            Value::Null,
            Value::int(3),
            Value::string("s"),
            Value::Type(BasicType::Int),
            Value::Type(BasicType::Number),
            gte(0),
            lte(10),
            meet(&gte(0), &lte(10)),
        ];
        for a in &samples {
            for b in &samples {
                let ab = meet(a, b);
                let ba = meet(b, a);
                assert_eq!(
                    ab.is_bottom(),
                    ba.is_bottom(),
                    "bottom-ness differs for {a} & {b}"
                );
            }
        }
    }
}
