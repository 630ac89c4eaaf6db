//! Scalar bound and regex constraints.
//!
//! A bound pairs a comparison operator with a concrete atom (`>=0`, `<"m"`,
//! `!=null`). A regex constraint carries a pattern and a negation flag
//! (`=~"^a"`, `!~"tmp$"`). Both admit a set of atoms; unification intersects
//! those sets and subsumption is interval inclusion.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    errors::{Bottom, ErrorKind},
    regex_cache,
    value::{Value, atom_cmp, atom_eq},
};

/// Comparison operator of a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum BoundOp {
    #[strum(serialize = ">=")]
    Gte,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Lte,
    #[strum(serialize = "!=")]
    Neq,
}

impl BoundOp {
    /// True for `>` and `>=`.
    #[must_use]
    pub fn is_lower(self) -> bool {
        matches!(self, Self::Gt | Self::Gte)
    }

    /// True for `<` and `<=`.
    #[must_use]
    pub fn is_upper(self) -> bool {
        matches!(self, Self::Lt | Self::Lte)
    }
}

/// A scalar bound: all atoms `x` with `x op atom`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub op: BoundOp,
    pub atom: Value,
}

impl Bound {
    #[must_use]
    pub fn new(op: BoundOp, atom: Value) -> Self {
        Self { op, atom }
    }

    /// Tests whether a concrete atom satisfies this bound.
    ///
    /// `None` means the atom is not comparable with the bound's endpoint
    /// (e.g. a string against `>=0`); callers surface that as a type
    /// mismatch rather than a plain conflict.
    #[must_use]
    pub fn admits(&self, v: &Value) -> Option<bool> {
        if self.op == BoundOp::Neq {
            // != admits comparison between any equality-comparable atoms;
            // atoms of different families are trivially unequal.
            if v.is_atom() {
                return Some(!atom_eq(v, &self.atom));
            }
            return None;
        }
        let ord = atom_cmp(v, &self.atom)?;
        Some(match self.op {
            BoundOp::Gte => ord != Ordering::Less,
            BoundOp::Gt => ord == Ordering::Greater,
            BoundOp::Lt => ord == Ordering::Less,
            BoundOp::Lte => ord != Ordering::Greater,
            BoundOp::Neq => unreachable!(),
        })
    }

    /// True when `inner`'s admitted set is contained in this bound's.
    ///
    /// This is bound-over-bound subsumption, derived from interval
    /// inclusion. Incomparable endpoints yield `false` (conservative).
    #[must_use]
    pub fn subsumes_bound(&self, inner: &Self) -> bool {
        let Some(ord) = atom_cmp(&inner.atom, &self.atom) else {
            // != endpoints of different families never constrain each other.
            return false;
        };
        match (self.op, inner.op) {
            (BoundOp::Gte, BoundOp::Gte | BoundOp::Gt) => ord != Ordering::Less,
            (BoundOp::Gt, BoundOp::Gt) => ord != Ordering::Less,
            (BoundOp::Gt, BoundOp::Gte) => ord == Ordering::Greater,
            (BoundOp::Lte, BoundOp::Lte | BoundOp::Lt) => ord != Ordering::Greater,
            (BoundOp::Lt, BoundOp::Lt) => ord != Ordering::Greater,
            (BoundOp::Lt, BoundOp::Lte) => ord == Ordering::Less,
            (BoundOp::Neq, BoundOp::Neq) => ord == Ordering::Equal,
            // `!=a` subsumes any half-line that excludes `a`.
            (BoundOp::Neq, BoundOp::Gte) => ord == Ordering::Greater,
            (BoundOp::Neq, BoundOp::Gt) => ord != Ordering::Less,
            (BoundOp::Neq, BoundOp::Lte) => ord == Ordering::Less,
            (BoundOp::Neq, BoundOp::Lt) => ord != Ordering::Greater,
            _ => false,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op, self.atom)
    }
}

/// Result of intersecting two bounds.
pub(crate) enum BoundMeet {
    /// The intersection is a single bound.
    Single(Bound),
    /// The intersection collapsed to one concrete atom.
    Atom(Value),
    /// The intersection is both bounds, irreducibly.
    Both,
    /// The intersection is empty.
    Empty,
}

/// Intersects two bounds over the same atom family.
///
/// Returns `Empty` when no atom can satisfy both, `Atom` when exactly one
/// can, `Single` when one bound implies the other or the pair tightens to a
/// single half-line, and `Both` when the conjunction is irreducible (a
/// genuine interval, or an unrelated `!=`).
#[must_use]
pub(crate) fn meet_bounds(a: &Bound, b: &Bound) -> BoundMeet {
    if a.subsumes_bound(b) {
        return BoundMeet::Single(b.clone());
    }
    if b.subsumes_bound(a) {
        return BoundMeet::Single(a.clone());
    }
    let Some(ord) = atom_cmp(&a.atom, &b.atom) else {
        // Endpoints from different atom families: only != pairs coexist.
        if a.op == BoundOp::Neq && b.op == BoundOp::Neq {
            return BoundMeet::Both;
        }
        return BoundMeet::Empty;
    };

    match (a.op, b.op) {
        // Two lower or two upper bounds always reduce via subsumption above;
        // reaching here means mixed directions or a != against a half-line.
        (BoundOp::Neq, BoundOp::Neq) => BoundMeet::Both,
        (BoundOp::Neq, _) => tighten_neq(&a.atom, b, ord.reverse()),
        (_, BoundOp::Neq) => tighten_neq(&b.atom, a, ord),
        (lo, up) if lo.is_lower() && up.is_upper() => interval(a, b, ord),
        (up, lo) if lo.is_lower() && up.is_upper() => interval(b, a, ord.reverse()),
        _ => BoundMeet::Both,
    }
}

/// Handles `!=x & <half-line>`; `endpoint_ord` is the half-line endpoint
/// compared against `x`.
fn tighten_neq(excluded: &Value, half: &Bound, endpoint_ord: Ordering) -> BoundMeet {
    if endpoint_ord == Ordering::Equal {
        // !=x & >=x tightens to >x; !=x & <=x tightens to <x.
        return match half.op {
            BoundOp::Gte => BoundMeet::Single(Bound::new(BoundOp::Gt, excluded.clone())),
            BoundOp::Lte => BoundMeet::Single(Bound::new(BoundOp::Lt, excluded.clone())),
            // >x and <x already exclude x.
            _ => BoundMeet::Single(half.clone()),
        };
    }
    // The excluded atom lies strictly inside or outside the half-line.
    match half.admits(excluded) {
        Some(true) => BoundMeet::Both,
        _ => BoundMeet::Single(half.clone()),
    }
}

/// Intersects a lower bound with an upper bound; `ord` compares
/// `lo.atom` against `up.atom`.
fn interval(lo: &Bound, up: &Bound, ord: Ordering) -> BoundMeet {
    match ord {
        Ordering::Greater => BoundMeet::Empty,
        Ordering::Equal => {
            if lo.op == BoundOp::Gte && up.op == BoundOp::Lte {
                BoundMeet::Atom(lo.atom.clone())
            } else {
                BoundMeet::Empty
            }
        }
        Ordering::Less => BoundMeet::Both,
    }
}

/// A regular-expression constraint on strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexBound {
    pub pattern: Box<str>,
    pub negated: bool,
}

impl RegexBound {
    #[must_use]
    pub fn new(pattern: impl Into<String>, negated: bool) -> Self {
        Self {
            pattern: pattern.into().into_boxed_str(),
            negated,
        }
    }

    /// Tests a string against the pattern, honoring negation.
    pub fn admits(&self, s: &str) -> Result<bool, Bottom> {
        let re = regex_cache::compile(&self.pattern)
            .map_err(|e| Bottom::with_msg(ErrorKind::UserError, format!("invalid regular expression: {e}")))?;
        Ok(re.is_match(s) != self.negated)
    }

    /// Conservative regex-over-regex subsumption: equal constraints only.
    #[must_use]
    pub fn subsumes_regex(&self, inner: &Self) -> bool {
        self == inner
    }
}

impl fmt::Display for RegexBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = if self.negated { "!~" } else { "=~" };
        write!(f, "{op}{:?}", self.pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gte(n: i64) -> Bound {
        Bound::new(BoundOp::Gte, Value::int(n))
    }

    fn lte(n: i64) -> Bound {
        Bound::new(BoundOp::Lte, Value::int(n))
    }

    #[test]
    fn admits_numeric() {
        assert_eq!(gte(0).admits(&Value::int(3)), Some(true));
        assert_eq!(gte(0).admits(&Value::int(-1)), Some(false));
        assert_eq!(gte(0).admits(&Value::string("x")), None);
        let neq = Bound::new(BoundOp::Neq, Value::Null);
        assert_eq!(neq.admits(&Value::Null), Some(false));
        assert_eq!(neq.admits(&Value::int(1)), Some(true));
    }

    #[test]
    fn bound_subsumption_is_interval_inclusion() {
        assert!(gte(0).subsumes_bound(&gte(5)));
        assert!(!gte(5).subsumes_bound(&gte(0)));
        assert!(gte(5).subsumes_bound(&Bound::new(BoundOp::Gt, Value::int(5))));
        assert!(!Bound::new(BoundOp::Gt, Value::int(5)).subsumes_bound(&gte(5)));
        assert!(Bound::new(BoundOp::Neq, Value::int(3)).subsumes_bound(&gte(4)));
    }

    #[test]
    fn meets() {
        // >=0 & <=10 is an irreducible interval
        assert!(matches!(meet_bounds(&gte(0), &lte(10)), BoundMeet::Both));
        // >=5 & <=5 collapses to the atom 5
        assert!(matches!(meet_bounds(&gte(5), &lte(5)), BoundMeet::Atom(Value::Int(n)) if n == 5.into()));
        // >=10 & <=5 is empty
        assert!(matches!(meet_bounds(&gte(10), &lte(5)), BoundMeet::Empty));
        // >=0 & >=5 keeps the tighter lower bound
        assert!(matches!(meet_bounds(&gte(0), &gte(5)), BoundMeet::Single(b) if b == gte(5)));
        // >=5 & !=5 tightens to >5
        let m = meet_bounds(&gte(5), &Bound::new(BoundOp::Neq, Value::int(5)));
        assert!(matches!(m, BoundMeet::Single(b) if b.op == BoundOp::Gt));
    }
}
