//! Implementation of the len() builtin.

use crate::{
    errors::{ErrorKind, EvalResult},
    eval::Evaluator,
    resource::ResourceTracker,
    value::Value,
};

/// Returns the byte length of strings and bytes, the element count of lists
/// (a lower bound for open lists), and the regular field count of structs
/// (optional, hidden, and definition fields excluded).
pub(crate) fn builtin_len<T: ResourceTracker>(
    ev: &mut Evaluator<'_, T>,
    args: Vec<Value>,
) -> EvalResult<Value> {
    if let Err(b) = super::expect_args("len", &args, 1) {
        return Ok(b);
    }
    let value = &args[0];
    let len = match value {
        Value::Bottom(_) => return Ok(value.clone()),
        Value::String(s) => s.len(),
        Value::Bytes(b) => b.len(),
        Value::List(n) => {
            ev.finalize(*n, false)?;
            ev.arena.get(*n).arcs.len()
        }
        Value::Struct(n) => {
            ev.finalize(*n, false)?;
            ev.arena
                .get(*n)
                .arcs
                .iter()
                .filter(|(label, arc)| label.is_regular() && !arc.optional)
                .count()
        }
        other => {
            return Ok(Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!("len() not supported for {}", other.kind_name()),
            ));
        }
    };
    Ok(Value::Int(len.into()))
}
