//! Integer division builtins: Euclidean div/mod and truncated quo/rem.

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, Zero};

use crate::{
    builtins::Builtins,
    errors::{ErrorKind, EvalResult},
    value::Value,
};

pub(crate) fn builtin_int_div(which: Builtins, args: Vec<Value>) -> EvalResult<Value> {
    if let Err(b) = super::expect_args(&which.to_string(), &args, 2) {
        return Ok(b);
    }
    let (a, b) = match (&args[0], &args[1]) {
        (Value::Bottom(_), _) => return Ok(args[0].clone()),
        (_, Value::Bottom(_)) => return Ok(args[1].clone()),
        (Value::Int(a), Value::Int(b)) => (a, b),
        (x, y) => {
            return Ok(Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!("{which}() requires ints, found {} and {}", x.kind_name(), y.kind_name()),
            ));
        }
    };
    if b.is_zero() {
        return Ok(Value::bottom_msg(ErrorKind::OutOfRange, "division by zero"));
    }

    // Truncated quotient and remainder; the Euclidean pair is derived so
    // the remainder is always in [0, |b|).
    let (quo, rem) = a.div_rem(b);
    let result = match which {
        Builtins::Quo => quo,
        Builtins::Rem => rem,
        Builtins::Div => {
            if rem.is_negative() {
                if b.is_positive() { quo - 1 } else { quo + 1 }
            } else {
                quo
            }
        }
        Builtins::Mod => {
            if rem.is_negative() {
                rem + b.abs()
            } else {
                rem
            }
        }
        _ => unreachable!("dispatched for integer division builtins only"),
    };
    Ok(Value::Int(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(which: Builtins, a: i64, b: i64) -> BigInt {
        let out = builtin_int_div(which, vec![Value::int(a), Value::int(b)]).unwrap();
        match out {
            Value::Int(n) => n,
            other => panic!("expected int, got {other:?}"),
        }
    }

    #[test]
    fn euclidean_vs_truncated() {
        // -7 / 2: Euclidean rounds toward -inf with non-negative remainder.
        assert_eq!(run(Builtins::Div, -7, 2), BigInt::from(-4));
        assert_eq!(run(Builtins::Mod, -7, 2), BigInt::from(1));
        assert_eq!(run(Builtins::Quo, -7, 2), BigInt::from(-3));
        assert_eq!(run(Builtins::Rem, -7, 2), BigInt::from(-1));
        // Negative divisor: remainder stays non-negative for mod.
        assert_eq!(run(Builtins::Div, 7, -2), BigInt::from(-3));
        assert_eq!(run(Builtins::Mod, 7, -2), BigInt::from(1));
        assert_eq!(run(Builtins::Quo, 7, -2), BigInt::from(-3));
        assert_eq!(run(Builtins::Rem, 7, -2), BigInt::from(1));
    }

    #[test]
    fn division_by_zero() {
        let out = builtin_int_div(Builtins::Div, vec![Value::int(1), Value::int(0)]).unwrap();
        assert_eq!(out.as_bottom().unwrap().kind, ErrorKind::OutOfRange);
    }
}
