//! Engine-native builtin functions.
//!
//! Builtins are called by qualified name from the compiled IR; the name is
//! resolved through the strum-derived `FromStr` on [`Builtins`]. Each
//! builtin family has its own submodule.

mod and_or;
mod close_fn;
mod div_mod;
mod len;
mod matches;

use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    errors::EvalResult,
    eval::{Evaluator, Reduced},
    resource::ResourceTracker,
    value::Value,
};

/// Enumerates every engine-native builtin.
///
/// Uses strum derives for automatic `Display` and `FromStr`; all variants
/// serialize to lowercase (e.g. `Len` -> "len").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum Builtins {
    Len,
    Close,
    And,
    Or,
    Div,
    Mod,
    Quo,
    Rem,
    Matches,
}

impl Builtins {
    /// Calls this builtin with already-reduced, default-selected arguments.
    pub fn call<'ir, T: ResourceTracker>(
        self,
        ev: &mut Evaluator<'ir, T>,
        args: Vec<Value>,
    ) -> EvalResult<Reduced> {
        match self {
            Self::Len => len::builtin_len(ev, args).map(Reduced::value),
            Self::Close => close_fn::builtin_close(ev, args),
            Self::And => and_or::builtin_and(ev, args).map(Reduced::value),
            Self::Or => and_or::builtin_or(ev, args).map(Reduced::value),
            Self::Div | Self::Mod | Self::Quo | Self::Rem => {
                div_mod::builtin_int_div(self, args).map(Reduced::value)
            }
            Self::Matches => matches::builtin_matches(args).map(Reduced::value),
        }
    }
}

/// Arity check shared by the builtin implementations.
fn expect_args(name: &str, args: &[Value], count: usize) -> Result<(), Value> {
    if args.len() == count {
        Ok(())
    } else {
        Err(Value::bottom_msg(
            crate::errors::ErrorKind::TypeMismatch,
            format!("{name}() takes {count} argument(s), got {}", args.len()),
        ))
    }
}
