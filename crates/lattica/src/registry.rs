//! Predeclared identifiers and the process-wide type registry.
//!
//! Predeclared names (`int`, `string`, `number`, ...) resolve in every root
//! scope without declarations. The type registry lets an embedder install
//! named scalar constraints (the constraints induced by its external types)
//! once per process; evaluation then resolves them like predeclared names.

use std::sync::{LazyLock, RwLock};

use ahash::AHashMap;

use crate::value::{BasicType, Value};

/// Built once on first use, never mutated after.
static PREDECLARED: LazyLock<AHashMap<&'static str, Value>> = LazyLock::new(|| {
    let mut m = AHashMap::new();
    m.insert("_", Value::Top);
    m.insert("null", Value::Null);
    m.insert("true", Value::Bool(true));
    m.insert("false", Value::Bool(false));
    m.insert("bool", Value::Type(BasicType::Bool));
    m.insert("int", Value::Type(BasicType::Int));
    m.insert("float", Value::Type(BasicType::Float));
    m.insert("string", Value::Type(BasicType::String));
    m.insert("bytes", Value::Type(BasicType::Bytes));
    m.insert("number", Value::Type(BasicType::Number));
    m
});

/// Registered external-type constraints. Read-mostly: the write lock is
/// taken once per key at registration; evaluation only ever reads.
static REGISTRY: LazyLock<RwLock<AHashMap<Box<str>, Value>>> = LazyLock::new(|| RwLock::new(AHashMap::new()));

/// Resolves a predeclared identifier.
#[must_use]
pub(crate) fn predeclared(name: &str) -> Option<Value> {
    PREDECLARED.get(name).cloned()
}

/// Registers the constraint induced by an external type under a qualified
/// name. Only scalar-level constraints (types, bounds, conjunctions,
/// disjunctions of those) are meaningful here: struct values are owned by a
/// compilation unit's arena and cannot outlive it.
///
/// Re-registering a name overwrites the previous constraint.
pub fn register_type(name: &str, constraint: Value) {
    REGISTRY
        .write()
        .expect("type registry poisoned")
        .insert(name.into(), constraint);
}

/// Looks up a registered external-type constraint.
#[must_use]
pub fn registered_type(name: &str) -> Option<Value> {
    REGISTRY.read().expect("type registry poisoned").get(name).cloned()
}
