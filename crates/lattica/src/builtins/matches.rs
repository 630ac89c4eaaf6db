//! Implementation of the matches() builtin: regex matching on strings.

use crate::{
    errors::{ErrorKind, EvalResult},
    regex_cache,
    value::Value,
};

pub(crate) fn builtin_matches(args: Vec<Value>) -> EvalResult<Value> {
    if let Err(b) = super::expect_args("matches", &args, 2) {
        return Ok(b);
    }
    let (s, pattern) = match (&args[0], &args[1]) {
        (Value::Bottom(_), _) => return Ok(args[0].clone()),
        (_, Value::Bottom(_)) => return Ok(args[1].clone()),
        (Value::String(s), Value::String(p)) => (s, p),
        (x, y) => {
            return Ok(Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!(
                    "matches() requires strings, found {} and {}",
                    x.kind_name(),
                    y.kind_name()
                ),
            ));
        }
    };
    match regex_cache::compile(pattern) {
        Ok(re) => Ok(Value::Bool(re.is_match(s))),
        Err(e) => Ok(Value::bottom_msg(
            ErrorKind::UserError,
            format!("invalid regular expression: {e}"),
        )),
    }
}
