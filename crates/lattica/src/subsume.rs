//! Subsumption: the lattice ordering `⊑`.
//!
//! `subsumes(a, b)` tests `b ⊑ a`: every instance of `b` is an instance of
//! `a`; equivalently `unify(a, b) == b`. Scalar cases are pure; aggregate
//! cases walk the node arena, reading the values finalization left behind.
//! Where the ordering is ambiguous (pattern constraints, constrained open
//! tails) the check is conservative and reports non-subsumption.

use crate::{
    bound::Bound,
    graph::{NodeArena, NodeId, NodeKind},
    ir::Label,
    resource::ResourceTracker,
    value::{BasicType, Disjunction, Value, atom_instance_of},
};

/// Tests whether `a` subsumes `b` (`b ⊑ a`).
#[must_use]
pub(crate) fn value_subsumes<T: ResourceTracker>(arena: &NodeArena<'_, T>, a: &Value, b: &Value) -> bool {
    // Top and bottom ends of the lattice.
    match (a, b) {
        (Value::Top, _) => return true,
        (_, Value::Bottom(_)) => return true,
        (Value::Bottom(_), _) | (_, Value::Top) => return false,
        _ => {}
    }

    // Disjunctions: every term of the lower value must be covered by some
    // term of the upper one.
    match (a, b) {
        (Value::Disjunction(da), Value::Disjunction(db)) => {
            return db
                .terms
                .iter()
                .all(|tb| da.terms.iter().any(|ta| value_subsumes(arena, &ta.value, &tb.value)));
        }
        (Value::Disjunction(da), _) => return da.terms.iter().any(|ta| value_subsumes(arena, &ta.value, b)),
        (_, Value::Disjunction(db)) => return db.terms.iter().all(|tb| value_subsumes(arena, a, &tb.value)),
        _ => {}
    }

    // Conjunctions: the upper conjunction must hold part-wise; the lower one
    // is covered if any single part is.
    if let Value::Conjunction(parts) = a {
        return parts.iter().all(|p| value_subsumes(arena, p, b));
    }
    if let Value::Conjunction(parts) = b {
        return parts.iter().any(|p| value_subsumes(arena, a, p));
    }

    match (a, b) {
        // Atoms subsume only themselves (int and float atoms stay distinct).
        (x, y) if x.is_atom() && y.is_atom() => atoms_identical(x, y),

        (Value::Type(ta), Value::Type(tb)) => type_subsumes_type(*ta, *tb),
        (Value::Type(t), atom) if atom.is_atom() => atom_instance_of(atom, *t),
        (Value::Type(t), Value::Bound(bd)) => type_subsumes_bound(*t, bd),
        (Value::Type(BasicType::String), Value::Regex(_)) => true,

        (Value::Bound(ba), Value::Bound(bb)) => ba.subsumes_bound(bb),
        (Value::Bound(bd), atom) if atom.is_atom() => bd.admits(atom) == Some(true),

        (Value::Regex(ra), Value::Regex(rb)) => ra.subsumes_regex(rb),
        (Value::Regex(r), Value::String(s)) => r.admits(s).unwrap_or(false),

        (Value::Struct(na), Value::Struct(nb)) => struct_subsumes(arena, *na, *nb),
        (Value::List(na), Value::List(nb)) => list_subsumes(arena, *na, *nb),

        _ => false,
    }
}

/// Strict atom identity: same kind and equal payload. `3` and `3.0` are
/// distinct atoms even though they compare equal numerically.
fn atoms_identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x == y,
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        _ => false,
    }
}

fn type_subsumes_type(a: BasicType, b: BasicType) -> bool {
    a == b || (a == BasicType::Number && matches!(b, BasicType::Int | BasicType::Float))
}

/// A type marker subsumes a bound when every atom the bound admits is an
/// instance of the type. Bounds admit atoms of their endpoint's family only.
fn type_subsumes_bound(t: BasicType, bd: &Bound) -> bool {
    match (&bd.atom, t) {
        (Value::Int(_) | Value::Float(_), BasicType::Number)
        | (Value::String(_), BasicType::String)
        | (Value::Bytes(_), BasicType::Bytes) => true,
        _ => false,
    }
}

fn arc_value<'a, T: ResourceTracker>(arena: &'a NodeArena<'_, T>, node: NodeId) -> Option<&'a Value> {
    arena.get(node).value.as_ref()
}

/// Open-struct subsumption: every regular field of the upper struct needs a
/// subsumed counterpart below, optional fields may be absent, and a closed
/// upper struct disallows extra regular fields below.
///
/// Pattern constraints and constrained ellipses make the ordering ambiguous;
/// those report non-subsumption unless the nodes are identical.
fn struct_subsumes<T: ResourceTracker>(arena: &NodeArena<'_, T>, na: NodeId, nb: NodeId) -> bool {
    if na == nb {
        return true;
    }
    let a = arena.get(na);
    let b = arena.get(nb);
    if a.kind != NodeKind::Struct || b.kind != NodeKind::Struct {
        return false;
    }
    if a.closed && !b.closed {
        return false;
    }
    if !a.patterns.is_empty() || a.ellipsis.as_ref().is_some_and(|e| e.value.is_some()) {
        return false;
    }

    for (label, arc_a) in &a.arcs {
        if !label.is_regular() {
            continue;
        }
        let Some(va) = arc_value(arena, arc_a.node) else {
            return false;
        };
        match b.arcs.get(label) {
            Some(arc_b) => {
                let Some(vb) = arc_value(arena, arc_b.node) else {
                    return false;
                };
                if !value_subsumes(arena, va, vb) {
                    return false;
                }
            }
            None => {
                if !arc_a.optional {
                    return false;
                }
            }
        }
    }

    if a.closed {
        for (label, _) in &b.arcs {
            if label.is_regular() && !a.arcs.contains_key(label) {
                return false;
            }
        }
    }

    true
}

/// List subsumption: element-wise on the explicit prefix; an open upper list
/// admits longer lower lists, a closed one requires equal length.
fn list_subsumes<T: ResourceTracker>(arena: &NodeArena<'_, T>, na: NodeId, nb: NodeId) -> bool {
    if na == nb {
        return true;
    }
    let a = arena.get(na);
    let b = arena.get(nb);
    let a_open = a.ellipsis.is_some();
    if a.ellipsis.as_ref().is_some_and(|e| e.value.is_some()) {
        return false;
    }
    let (a_len, b_len) = (a.arcs.len(), b.arcs.len());
    if a_open {
        if b_len < a_len {
            return false;
        }
    } else if b_len != a_len {
        return false;
    }
    for i in 0..a_len {
        let (Some(arc_a), Some(arc_b)) = (a.arcs.get(&Label::Index(i)), b.arcs.get(&Label::Index(i))) else {
            return false;
        };
        let (Some(va), Some(vb)) = (arc_value(arena, arc_a.node), arc_value(arena, arc_b.node)) else {
            return false;
        };
        if !value_subsumes(arena, va, vb) {
            return false;
        }
    }
    true
}

/// Deep structural equality on finalized values.
///
/// Aggregates compare arc-by-arc through the arena, order-insensitively;
/// conjunctions and disjunctions compare as multisets, and a disjunction's
/// default marks must match (`⟨v, v⟩` is not `v`).
#[must_use]
pub(crate) fn value_equal<T: ResourceTracker>(arena: &NodeArena<'_, T>, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Top, Value::Top) => true,
        // Every bottom is the same lattice element; kinds and messages are
        // diagnostic annotations.
        (Value::Bottom(_), Value::Bottom(_)) => true,
        (Value::Type(x), Value::Type(y)) => x == y,
        (Value::Bound(x), Value::Bound(y)) => x == y,
        (Value::Regex(x), Value::Regex(y)) => x == y,
        (Value::Conjunction(xs), Value::Conjunction(ys)) => multiset_equal(arena, xs, ys),
        (Value::Disjunction(dx), Value::Disjunction(dy)) => disjunction_equal(arena, dx, dy),
        (Value::Struct(nx), Value::Struct(ny)) => struct_equal(arena, *nx, *ny),
        (Value::List(nx), Value::List(ny)) => list_equal(arena, *nx, *ny),
        (x, y) if x.is_atom() && y.is_atom() => atoms_identical(x, y),
        _ => false,
    }
}

fn multiset_equal<T: ResourceTracker>(arena: &NodeArena<'_, T>, xs: &[Value], ys: &[Value]) -> bool {
    if xs.len() != ys.len() {
        return false;
    }
    let mut used = vec![false; ys.len()];
    'outer: for x in xs {
        for (i, y) in ys.iter().enumerate() {
            if !used[i] && value_equal(arena, x, y) {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

fn disjunction_equal<T: ResourceTracker>(arena: &NodeArena<'_, T>, dx: &Disjunction, dy: &Disjunction) -> bool {
    if dx.terms.len() != dy.terms.len() {
        return false;
    }
    let mut used = vec![false; dy.terms.len()];
    'outer: for tx in &dx.terms {
        for (i, ty) in dy.terms.iter().enumerate() {
            if !used[i] && tx.default == ty.default && value_equal(arena, &tx.value, &ty.value) {
                used[i] = true;
                continue 'outer;
            }
        }
        return false;
    }
    true
}

fn struct_equal<T: ResourceTracker>(arena: &NodeArena<'_, T>, nx: NodeId, ny: NodeId) -> bool {
    if nx == ny {
        return true;
    }
    let x = arena.get(nx);
    let y = arena.get(ny);
    if x.kind != y.kind || x.arcs.len() != y.arcs.len() {
        return false;
    }
    for (label, arc_x) in &x.arcs {
        let Some(arc_y) = y.arcs.get(label) else {
            return false;
        };
        match (arc_value(arena, arc_x.node), arc_value(arena, arc_y.node)) {
            (Some(vx), Some(vy)) => {
                if !value_equal(arena, vx, vy) {
                    return false;
                }
            }
            _ => return false,
        }
    }
    true
}

fn list_equal<T: ResourceTracker>(arena: &NodeArena<'_, T>, nx: NodeId, ny: NodeId) -> bool {
    // Lists and structs share the arc representation; the same walk works.
    struct_equal(arena, nx, ny)
}
