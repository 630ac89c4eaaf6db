//! Implementation of the close() builtin.

use crate::{
    errors::{ErrorKind, EvalResult},
    eval::{Evaluator, Reduced},
    graph::CloseMode,
    resource::ResourceTracker,
    value::Value,
};

/// Closes a struct value at one level: the result, when unified into a
/// node, admits only the labels the struct declares or pattern-matches.
/// Unlike a definition, nested structs are not closed.
pub(crate) fn builtin_close<T: ResourceTracker>(
    _ev: &mut Evaluator<'_, T>,
    args: Vec<Value>,
) -> EvalResult<Reduced> {
    if let Err(b) = super::expect_args("close", &args, 1) {
        return Ok(Reduced::value(b));
    }
    let value = args.into_iter().next().expect("arity checked");
    match value {
        Value::Bottom(_) => Ok(Reduced::value(value)),
        Value::Struct(_) => Ok(Reduced::Val {
            value,
            close: CloseMode::Level,
        }),
        other => Ok(Reduced::value(Value::bottom_msg(
            ErrorKind::TypeMismatch,
            format!("close() argument must be struct, found {}", other.kind_name()),
        ))),
    }
}
