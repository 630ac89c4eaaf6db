//! Implementations of the and() and or() builtins: meet and join over the
//! elements of a list.

use crate::{
    errors::{ErrorKind, EvalResult},
    eval::{Evaluator, Reduced},
    graph::CloseMode,
    resource::ResourceTracker,
    value::Value,
};

/// Collects the element values of a list argument.
fn list_elements<T: ResourceTracker>(
    ev: &mut Evaluator<'_, T>,
    name: &str,
    args: Vec<Value>,
) -> EvalResult<Result<Vec<Value>, Value>> {
    if let Err(b) = super::expect_args(name, &args, 1) {
        return Ok(Err(b));
    }
    let value = args.into_iter().next().expect("arity checked");
    let n = match value {
        Value::Bottom(_) => return Ok(Err(value)),
        Value::List(n) => n,
        other => {
            return Ok(Err(Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!("{name}() argument must be list, found {}", other.kind_name()),
            )));
        }
    };
    ev.finalize(n, false)?;
    let arcs: Vec<crate::graph::Arc> = ev.arena.get(n).arcs.values().copied().collect();
    let mut out = Vec::with_capacity(arcs.len());
    for arc in arcs {
        let elem = match ev.arc_result(arc.node, CloseMode::Open)? {
            Reduced::Val { value, .. } => value,
            Reduced::Cycle(_) => Value::bottom(ErrorKind::Cycle),
        };
        out.push(elem);
    }
    Ok(Ok(out))
}

/// Meets all elements of a list; `Top` on an empty list.
pub(crate) fn builtin_and<T: ResourceTracker>(
    ev: &mut Evaluator<'_, T>,
    args: Vec<Value>,
) -> EvalResult<Value> {
    let elements = match list_elements(ev, "and", args)? {
        Ok(elements) => elements,
        Err(b) => return Ok(b),
    };
    let mut acc = Value::Top;
    for elem in elements {
        acc = ev.unify_values(acc, CloseMode::Open, elem, CloseMode::Open)?;
        if acc.is_bottom() {
            break;
        }
    }
    Ok(acc)
}

/// Joins all elements of a list into a disjunction; bottom on an empty
/// list.
pub(crate) fn builtin_or<T: ResourceTracker>(
    ev: &mut Evaluator<'_, T>,
    args: Vec<Value>,
) -> EvalResult<Value> {
    let elements = match list_elements(ev, "or", args)? {
        Ok(elements) => elements,
        Err(b) => return Ok(b),
    };
    Ok(ev.disjoin_values(elements, ErrorKind::Conflict))
}
