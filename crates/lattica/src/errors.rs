use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::resource::ResourceError;

/// Result type alias for evaluation steps that can abort on a resource ceiling.
///
/// Semantic failures never take the `Err` path: they are first-class [`Bottom`]
/// values flowing through the lattice. Only resource exhaustion (node count,
/// reduction steps, recursion depth) aborts evaluation through `Err`.
pub type EvalResult<T> = Result<T, ResourceError>;

/// Classification of every failure the engine can produce.
///
/// Uses strum derives for automatic `Display`, `FromStr`, and `Into<&'static str>`
/// implementations. The string representation matches the variant name exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Two values with no common instance were unified.
    Conflict,
    /// An operation was applied to a value of the wrong basic type.
    TypeMismatch,
    /// A selector or reference named a label that does not exist.
    NotFound,
    /// An index or slice fell outside a list or string, or arithmetic left
    /// the representable domain (e.g. division by zero).
    OutOfRange,
    /// A reference cycle that does not resolve to a fixed point.
    Cycle,
    /// A cycle in the result tree that would produce infinite structure.
    StructuralCycle,
    /// An expression whose operands never became concrete. Not an error until
    /// a concrete value is demanded.
    Incomplete,
    /// A field was added to a closed struct without a matching declaration
    /// or pattern.
    ClosedFieldNotAllowed,
    /// A numeric conversion would silently lose precision.
    PrecisionLoss,
    /// An embedder-imposed resource ceiling was exceeded.
    ResourceExhausted,
    /// An explicit bottom literal in the source.
    UserError,
}

impl ErrorKind {
    /// Incomplete bottoms are deferred: they only become hard errors when a
    /// concrete value is demanded (export, validation).
    #[must_use]
    pub fn is_incomplete(self) -> bool {
        matches!(self, Self::Incomplete)
    }
}

/// The error element of the lattice.
///
/// `Bottom` is a first-class value: it subsumes nothing but itself and is
/// subsumed by everything. Every failure in the engine collapses to a bottom
/// tagged with an [`ErrorKind`] and an optional human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bottom {
    pub kind: ErrorKind,
    pub message: Option<Box<str>>,
}

impl Bottom {
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, message: None }
    }

    #[must_use]
    pub fn with_msg(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: Some(message.into().into_boxed_str()),
        }
    }

    /// Builds the conflict bottom for two incompatible values, naming both.
    #[must_use]
    pub(crate) fn conflict(a: impl fmt::Display, b: impl fmt::Display) -> Self {
        Self::with_msg(ErrorKind::Conflict, format!("conflicting values {a} and {b}"))
    }

    /// Builds the mismatch bottom for an operand of the wrong basic type.
    #[must_use]
    pub(crate) fn mismatch(expected: &str, got: impl fmt::Display) -> Self {
        Self::with_msg(ErrorKind::TypeMismatch, format!("expected {expected}, found {got}"))
    }
}

impl fmt::Display for Bottom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {msg}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Bottom {}

impl From<ResourceError> for Bottom {
    fn from(err: ResourceError) -> Self {
        Self::with_msg(ErrorKind::ResourceExhausted, err.to_string())
    }
}
