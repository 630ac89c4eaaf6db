#![doc = include_str!("../../../README.md")]
#![expect(dead_code, reason = "graph and interner APIs keep their full surface")]
#![allow(clippy::needless_pass_by_value, reason = "evaluation APIs pass values consistently")]
#![allow(clippy::too_many_arguments, reason = "conjunct plumbing requires wide signatures")]

mod bound;
mod builtins;
mod decimal;
mod env;
mod errors;
mod eval;
mod graph;
mod intern;
mod ir;
mod regex_cache;
mod registry;
mod resource;
mod run;
mod subsume;
mod unify;
mod value;
mod walk;

pub use crate::{
    bound::{Bound, BoundOp, RegexBound},
    decimal::Decimal,
    errors::{Bottom, ErrorKind},
    graph::NodeId,
    intern::{Interns, StringId},
    ir::{
        BinOp, Clause, CompilationUnit, Decl, DisjunctExpr, Expr, InterpolationPart, Label, ListElem, RefName,
        UnaryOp,
    },
    registry::{register_type, registered_type},
    resource::{DEFAULT_MAX_DEPTH, LimitedTracker, NoLimitTracker, ResourceError, ResourceLimits, ResourceTracker},
    run::{Instance, Runtime},
    value::{BasicType, DisjunctTerm, Disjunction, Value},
    walk::{Visitor, WalkFilter},
};
