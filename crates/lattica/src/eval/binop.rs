//! Unary and binary operators over concrete scalars.
//!
//! Operands are taken through default selection first: arithmetic,
//! comparison, and boolean operators consult a disjunction's default, never
//! its full term set. Operands that are not concrete leave the expression
//! incomplete, which hardens into an error only when a concrete value is
//! demanded.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    decimal::Decimal,
    errors::{ErrorKind, EvalResult},
    eval::{Evaluator, Reduced},
    ir::{BinOp, UnaryOp},
    regex_cache,
    resource::ResourceTracker,
    value::{Value, atom_cmp, atom_eq},
};

/// Classifies an operand for arithmetic: concrete atoms pass through,
/// bottoms propagate, everything else is incomplete or mismatched.
fn check_operand(v: &Value) -> Option<Value> {
    match v {
        Value::Bottom(_) => Some(v.clone()),
        _ if v.is_atom() => None,
        Value::Struct(_) | Value::List(_) => Some(Value::bottom_msg(
            ErrorKind::TypeMismatch,
            format!("invalid operand: {}", v.kind_name()),
        )),
        _ => Some(Value::bottom_msg(
            ErrorKind::Incomplete,
            format!("operand is not concrete: {}", v.kind_name()),
        )),
    }
}

impl<'ir, T: ResourceTracker> Evaluator<'ir, T> {
    pub(crate) fn unary(&mut self, op: UnaryOp, operand: Reduced) -> EvalResult<Reduced> {
        let value = self.reduced_for_use(operand)?;
        if let Some(err) = check_operand(&value) {
            return Ok(Reduced::value(err));
        }
        let result = match (op, &value) {
            (UnaryOp::Not, Value::Bool(b)) => Value::Bool(!b),
            (UnaryOp::Neg, Value::Int(n)) => Value::Int(-n),
            (UnaryOp::Neg, Value::Float(d)) => Value::Float(d.neg()),
            (UnaryOp::Pos, Value::Int(_) | Value::Float(_)) => value.clone(),
            _ => Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!("invalid operand for unary operator: {}", value.kind_name()),
            ),
        };
        Ok(Reduced::value(result))
    }

    pub(crate) fn binary(&mut self, op: BinOp, left: Reduced, right: Reduced) -> EvalResult<Reduced> {
        let lhs = self.reduced_for_use(left)?;
        let rhs = self.reduced_for_use(right)?;
        if let Some(err) = check_operand(&lhs) {
            return Ok(Reduced::value(err));
        }
        if let Some(err) = check_operand(&rhs) {
            return Ok(Reduced::value(err));
        }
        let result = match op {
            BinOp::Add => add(&lhs, &rhs),
            BinOp::Sub => numeric(&lhs, &rhs, |a, b| a - b, Decimal::sub),
            BinOp::Mul => mul(&lhs, &rhs),
            BinOp::Div => div(&lhs, &rhs),
            BinOp::LAnd | BinOp::LOr => match (&lhs, &rhs) {
                (Value::Bool(a), Value::Bool(b)) => Value::Bool(if op == BinOp::LAnd { *a && *b } else { *a || *b }),
                _ => mismatch(op, &lhs, &rhs),
            },
            BinOp::Eq => Value::Bool(atom_eq(&lhs, &rhs)),
            BinOp::Ne => Value::Bool(!atom_eq(&lhs, &rhs)),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => match atom_cmp(&lhs, &rhs) {
                Some(ord) => Value::Bool(match op {
                    BinOp::Lt => ord.is_lt(),
                    BinOp::Le => ord.is_le(),
                    BinOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                }),
                None => mismatch(op, &lhs, &rhs),
            },
            BinOp::Match | BinOp::NotMatch => match (&lhs, &rhs) {
                (Value::String(s), Value::String(pattern)) => match regex_cache::compile(pattern) {
                    Ok(re) => Value::Bool(re.is_match(s) == (op == BinOp::Match)),
                    Err(e) => Value::bottom_msg(ErrorKind::UserError, format!("invalid regular expression: {e}")),
                },
                _ => mismatch(op, &lhs, &rhs),
            },
            BinOp::Unify => unreachable!("unification is handled before operand selection"),
        };
        Ok(Reduced::value(result))
    }
}

fn mismatch(op: BinOp, lhs: &Value, rhs: &Value) -> Value {
    Value::bottom_msg(
        ErrorKind::TypeMismatch,
        format!(
            "invalid operands {} and {} for {op:?}",
            lhs.kind_name(),
            rhs.kind_name()
        ),
    )
}

/// Applies a numeric operator, promoting to decimal when either side is a
/// float. Arithmetic is arbitrary precision throughout.
fn numeric(
    lhs: &Value,
    rhs: &Value,
    int_op: impl Fn(&BigInt, &BigInt) -> BigInt,
    dec_op: impl Fn(&Decimal, &Decimal) -> Decimal,
) -> Value {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Value::Int(int_op(a, b)),
        (Value::Float(a), Value::Float(b)) => Value::Float(dec_op(a, b)),
        (Value::Int(a), Value::Float(b)) => Value::Float(dec_op(&Decimal::from_bigint(a), b)),
        (Value::Float(a), Value::Int(b)) => Value::Float(dec_op(a, &Decimal::from_bigint(b))),
        _ => Value::bottom_msg(
            ErrorKind::TypeMismatch,
            format!("invalid operands {} and {}", lhs.kind_name(), rhs.kind_name()),
        ),
    }
}

fn add(lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Value::string(format!("{a}{b}")),
        (Value::Bytes(a), Value::Bytes(b)) => {
            let mut out = a.to_vec();
            out.extend_from_slice(b);
            Value::Bytes(out.into())
        }
        _ => numeric(lhs, rhs, |a, b| a + b, Decimal::add),
    }
}

fn mul(lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::String(s), Value::Int(n)) | (Value::Int(n), Value::String(s)) => repeat_str(s, n),
        (Value::Bytes(b), Value::Int(n)) | (Value::Int(n), Value::Bytes(b)) => repeat_bytes(b, n),
        _ => numeric(lhs, rhs, |a, b| a * b, Decimal::mul),
    }
}

fn div(lhs: &Value, rhs: &Value) -> Value {
    let (a, b) = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => (Decimal::from_bigint(a), Decimal::from_bigint(b)),
        (Value::Float(a), Value::Float(b)) => (a.clone(), b.clone()),
        (Value::Int(a), Value::Float(b)) => (Decimal::from_bigint(a), b.clone()),
        (Value::Float(a), Value::Int(b)) => (a.clone(), Decimal::from_bigint(b)),
        _ => {
            return Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!("invalid operands {} and {}", lhs.kind_name(), rhs.kind_name()),
            );
        }
    };
    if b.is_zero() {
        return Value::bottom_msg(ErrorKind::OutOfRange, "division by zero");
    }
    // Division always produces a float.
    Value::Float(a.div(&b))
}

fn repeat_str(s: &str, n: &BigInt) -> Value {
    if n.is_negative() {
        return Value::bottom_msg(ErrorKind::OutOfRange, "negative repeat count");
    }
    match n.to_usize() {
        Some(count) => Value::string(s.repeat(count)),
        None => Value::bottom_msg(ErrorKind::OutOfRange, "repeat count out of range"),
    }
}

fn repeat_bytes(b: &[u8], n: &BigInt) -> Value {
    if n.is_negative() {
        return Value::bottom_msg(ErrorKind::OutOfRange, "negative repeat count");
    }
    match n.to_usize() {
        Some(count) => Value::Bytes(b.repeat(count).into()),
        None => Value::bottom_msg(ErrorKind::OutOfRange, "repeat count out of range"),
    }
}
