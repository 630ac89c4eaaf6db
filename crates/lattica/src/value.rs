use std::{cmp::Ordering, fmt};

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::{
    bound::{Bound, RegexBound},
    decimal::Decimal,
    errors::{Bottom, ErrorKind},
    graph::NodeId,
};

/// Primary value type: one variant per element kind of the lattice.
///
/// Scalars are stored inline. Structs and lists are references into the node
/// arena (`NodeId`), which owns their identity and lifetime; everything the
/// engine learns about an aggregate goes through the arena.
///
/// `Conjunction` is the normalized irreducible meet of scalar constraints
/// (e.g. `>=0 & <=10`): the data model's "bound intersection" is an interval,
/// which no single variant can carry. Its elements are bounds, regexes, and
/// basic types, never atoms or further conjunctions.
///
/// Derived equality is shallow: scalars compare structurally, aggregates by
/// node identity. Deep structural equality over the arena is
/// [`Instance::equals`](crate::Instance::equals).
///
/// NOTE: keep this enum small; large payloads are boxed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The universal element: subsumes everything.
    Top,
    /// The error element: subsumed by everything.
    Bottom(Box<Bottom>),
    Null,
    Bool(bool),
    Int(BigInt),
    Float(Decimal),
    String(Box<str>),
    Bytes(Box<[u8]>),
    /// A basic-type marker such as `int` or `string`.
    Type(BasicType),
    /// A scalar bound such as `>=0` or `!=null`.
    Bound(Box<Bound>),
    /// A regex constraint, `=~pattern` or `!~pattern`.
    Regex(Box<RegexBound>),
    /// Irreducible meet of scalar constraints.
    Conjunction(Vec<Value>),
    /// A struct value; the node holds the arcs.
    Struct(NodeId),
    /// A list value; the node holds integer-labeled arcs.
    List(NodeId),
    /// A disjunction of alternatives, possibly with default marks.
    Disjunction(Box<Disjunction>),
}

/// Basic-type markers. `Number` is the union of `Int` and `Float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum BasicType {
    Bool,
    Int,
    Float,
    String,
    Bytes,
    Number,
}

/// A disjunction value: a non-empty list of terms, each optionally marked as
/// a default. The pair view of the algebra is derived: the value is the join
/// of all terms, the default the join of the marked ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disjunction {
    pub terms: Vec<DisjunctTerm>,
}

/// One alternative of a disjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisjunctTerm {
    pub value: Value,
    /// True when the term is (or derives from) a `*`-marked default.
    pub default: bool,
}

impl Disjunction {
    /// True if any term carries a default mark.
    #[must_use]
    pub fn has_default(&self) -> bool {
        self.terms.iter().any(|t| t.default)
    }
}

impl Value {
    #[must_use]
    pub fn bottom(kind: ErrorKind) -> Self {
        Self::Bottom(Box::new(Bottom::new(kind)))
    }

    #[must_use]
    pub fn bottom_msg(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Bottom(Box::new(Bottom::with_msg(kind, message)))
    }

    #[must_use]
    pub fn from_bottom(b: Bottom) -> Self {
        Self::Bottom(Box::new(b))
    }

    #[must_use]
    pub fn int(n: i64) -> Self {
        Self::Int(BigInt::from(n))
    }

    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into().into_boxed_str())
    }

    #[must_use]
    pub fn is_bottom(&self) -> bool {
        matches!(self, Self::Bottom(_))
    }

    #[must_use]
    pub fn as_bottom(&self) -> Option<&Bottom> {
        match self {
            Self::Bottom(b) => Some(b),
            _ => None,
        }
    }

    /// True for bottoms whose kind is `Incomplete`: deferred, not yet errors.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.as_bottom().is_some_and(|b| b.kind.is_incomplete())
    }

    /// True for scalar atoms: values whose only instances are themselves
    /// and bottom.
    #[must_use]
    pub fn is_atom(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Float(_) | Self::String(_) | Self::Bytes(_)
        )
    }

    /// True for values that are concrete at the scalar level. Aggregates are
    /// concrete only if all member values are; that judgment needs the arena
    /// and lives with the evaluator.
    #[must_use]
    pub fn is_concrete_scalar(&self) -> bool {
        self.is_atom()
    }

    /// Short name of the value's kind, for error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Top => "_",
            Self::Bottom(_) => "_|_",
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Type(t) => (*t).into(),
            Self::Bound(_) => "bound",
            Self::Regex(_) => "regex",
            Self::Conjunction(_) => "constraint",
            Self::Struct(_) => "struct",
            Self::List(_) => "list",
            Self::Disjunction(_) => "disjunction",
        }
    }
}

/// Numeric comparison across the int/float divide.
///
/// Returns `None` when either side is not numeric.
#[must_use]
pub(crate) fn numeric_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Float(y)) => Some(Decimal::from_bigint(x).cmp(y)),
        (Value::Float(x), Value::Int(y)) => Some(x.cmp(&Decimal::from_bigint(y))),
        _ => None,
    }
}

/// Ordering between two atoms of the same family: numbers numerically,
/// strings and bytes lexicographically. `None` for incomparable pairs.
#[must_use]
pub(crate) fn atom_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    if let Some(ord) = numeric_cmp(a, b) {
        return Some(ord);
    }
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Equality between two atoms, with int/float crossing compared numerically.
#[must_use]
pub(crate) fn atom_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        _ => atom_cmp(a, b) == Some(Ordering::Equal),
    }
}

/// True if the atom is an instance of the basic type.
#[must_use]
pub(crate) fn atom_instance_of(atom: &Value, ty: BasicType) -> bool {
    match (atom, ty) {
        (Value::Bool(_), BasicType::Bool)
        | (Value::Int(_), BasicType::Int | BasicType::Number)
        | (Value::Float(_), BasicType::Float | BasicType::Number)
        | (Value::String(_), BasicType::String)
        | (Value::Bytes(_), BasicType::Bytes) => true,
        _ => false,
    }
}

impl fmt::Display for Value {
    /// Renders scalars in their canonical source form; aggregates render as
    /// their kind name since their contents live in the arena.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Top => write!(f, "_"),
            Self::Bottom(b) => write!(f, "_|_({b})"),
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "'{} bytes'", b.len()),
            Self::Type(t) => write!(f, "{t}"),
            Self::Bound(b) => write!(f, "{b}"),
            Self::Regex(r) => write!(f, "{r}"),
            Self::Conjunction(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " & ")?;
                    }
                    write!(f, "{p}")?;
                }
                Ok(())
            }
            Self::Struct(_) => write!(f, "struct"),
            Self::List(_) => write!(f, "list"),
            Self::Disjunction(d) => {
                for (i, t) in d.terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    if t.default {
                        write!(f, "*")?;
                    }
                    write!(f, "{}", t.value)?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::int(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Self::Int(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atom_comparisons_cross_numeric_kinds() {
        let three = Value::int(3);
        let three_f = Value::Float(Decimal::from_string("3.0").unwrap());
        assert!(atom_eq(&three, &three_f));
        assert_eq!(numeric_cmp(&Value::int(2), &three_f), Some(Ordering::Less));
        assert!(!atom_eq(&Value::string("3"), &three));
    }

    #[test]
    fn type_instances() {
        assert!(atom_instance_of(&Value::int(1), BasicType::Int));
        assert!(atom_instance_of(&Value::int(1), BasicType::Number));
        assert!(!atom_instance_of(&Value::int(1), BasicType::Float));
        let f = Value::Float(Decimal::from_i64(1));
        assert!(atom_instance_of(&f, BasicType::Float));
        assert!(atom_instance_of(&f, BasicType::Number));
        assert!(!atom_instance_of(&f, BasicType::Int));
    }
}
