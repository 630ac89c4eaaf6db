//! Expression reduction.

use num_traits::ToPrimitive;

use crate::{
    bound::{BoundOp, RegexBound},
    builtins::Builtins,
    env::{EnvId, LetState},
    errors::{ErrorKind, EvalResult},
    eval::{Evaluator, Reduced},
    graph::{CloseMode, Conjunct, NodeId, NodeKind, NodeState},
    intern::StringId,
    ir::{BinOp, Expr, InterpolationPart, Label, RefName, UnaryOp},
    registry,
    resource::ResourceTracker,
    value::Value,
};

impl<'ir, T: ResourceTracker> Evaluator<'ir, T> {
    /// Reduces an expression to a value (or a cycle marker) under an
    /// environment.
    pub(crate) fn reduce(&mut self, expr: &'ir Expr, env: EnvId) -> EvalResult<Reduced> {
        self.arena.tracker.check_step()?;
        match expr {
            Expr::Null => Ok(Reduced::value(Value::Null)),
            Expr::Bool(b) => Ok(Reduced::value(Value::Bool(*b))),
            Expr::Int(n) => Ok(Reduced::value(Value::Int(n.clone()))),
            Expr::Float(d) => Ok(Reduced::value(Value::Float(d.clone()))),
            Expr::String(s) => Ok(Reduced::value(Value::String(s.clone()))),
            Expr::Bytes(b) => Ok(Reduced::value(Value::Bytes(b.clone()))),
            Expr::Top => Ok(Reduced::value(Value::Top)),
            Expr::Bottom { message } => Ok(Reduced::value(match message {
                Some(msg) => Value::bottom_msg(ErrorKind::UserError, msg.to_string()),
                None => Value::bottom(ErrorKind::UserError),
            })),
            Expr::Type(t) => Ok(Reduced::value(Value::Type(*t))),
            Expr::Ref(name) => self.resolve_ref(*name, env),
            Expr::Selector { expr, label } => {
                let base = self.reduce(expr, env)?;
                self.select(base, *label)
            }
            Expr::Index { expr, index } => {
                let base = self.reduce(expr, env)?;
                let idx = self.reduce(index, env)?;
                self.index(base, idx)
            }
            Expr::Slice { expr, lo, hi } => self.slice(expr, lo.as_deref(), hi.as_deref(), env),
            Expr::Unary { op, expr } => {
                let operand = self.reduce(expr, env)?;
                self.unary(*op, operand)
            }
            Expr::Binary {
                op: BinOp::Unify,
                lhs,
                rhs,
            } => {
                let left = self.reduce(lhs, env)?;
                let right = self.reduce(rhs, env)?;
                self.unify_reduced(left, right)
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = self.reduce(lhs, env)?;
                let right = self.reduce(rhs, env)?;
                self.binary(*op, left, right)
            }
            Expr::Bound { op, expr } => {
                let operand = self.reduce(expr, env)?;
                self.make_bound(*op, operand)
            }
            Expr::Matcher { negated, pattern } => {
                let operand = self.reduce(pattern, env)?;
                self.make_matcher(*negated, operand)
            }
            Expr::Call { func, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    let reduced = self.reduce(arg, env)?;
                    let value = self.reduced_for_use(reduced)?;
                    values.push(value);
                }
                match func.parse::<Builtins>() {
                    Ok(builtin) => builtin.call(self, values),
                    Err(_) => Ok(Reduced::value(Value::bottom_msg(
                        ErrorKind::NotFound,
                        format!("unknown builtin: {func}"),
                    ))),
                }
            }
            Expr::StructLit { .. } => self.lit_node(NodeKind::Struct, expr, env),
            Expr::ListLit { .. } => self.lit_node(NodeKind::List, expr, env),
            Expr::Interpolation { parts } => self.interpolate(parts, env),
            Expr::Disjunction { terms } => self.eval_disjunction_expr(terms, env),
        }
    }

    /// Evaluates a struct or list literal in expression position: a fresh
    /// node carrying the literal as its only conjunct, shallow-finalized so
    /// its structure is visible without forcing its arcs.
    fn lit_node(&mut self, kind: NodeKind, expr: &'ir Expr, env: EnvId) -> EvalResult<Reduced> {
        let parent = self.current_node();
        let node = self.arena.alloc(kind, parent)?;
        self.arena.get_mut(node).push_conjunct(Conjunct::expr(expr, env));
        self.finalize(node, false)?;
        Ok(Reduced::value(self.arena.get(node).value_or_top()))
    }

    pub(crate) fn current_node(&self) -> Option<NodeId> {
        self.stack.last().copied()
    }

    // ------------------------------------------------------------------
    // References
    // ------------------------------------------------------------------

    fn resolve_ref(&mut self, name: RefName, env: EnvId) -> EvalResult<Reduced> {
        let label = match name {
            RefName::Regular(id) => Label::Str(id),
            RefName::Hidden(id) => Label::Hidden {
                name: id,
                package: self.unit.package,
            },
            RefName::Def(id) => Label::Def(id),
        };
        let closing = if matches!(name, RefName::Def(_)) {
            CloseMode::Deep
        } else {
            CloseMode::Open
        };

        let mut cur = Some(env);
        while let Some(eid) = cur {
            if let RefName::Regular(id) = name {
                if let Some(v) = self.envs.frame(eid).vars.get(&id) {
                    return Ok(Reduced::value(v.clone()));
                }
                if self.envs.frame(eid).lets.contains_key(&id) {
                    return self.force_let(eid, id);
                }
            }
            let scope = self.envs.frame(eid).scope;
            if let Some(arc) = self.arena.lookup(scope, label) {
                if arc.from_comprehension && self.comp_scopes.contains(&scope) {
                    return Ok(Reduced::value(Value::bottom_msg(
                        ErrorKind::Cycle,
                        "comprehension references a comprehension-generated field",
                    )));
                }
                return self.arc_result(arc.node, closing);
            }
            cur = self.envs.frame(eid).parent;
        }

        let name_str = self.unit.interns().get(name.name());
        if matches!(name, RefName::Regular(_)) {
            if let Some(v) = registry::predeclared(name_str) {
                return Ok(Reduced::value(v));
            }
            if let Some(v) = registry::registered_type(name_str) {
                return Ok(Reduced::value(v));
            }
        }
        Ok(Reduced::value(Value::bottom_msg(
            ErrorKind::NotFound,
            format!("reference \"{name_str}\" not found"),
        )))
    }

    /// Forces a lazy let binding, memoizing the result in its frame.
    fn force_let(&mut self, env: EnvId, name: StringId) -> EvalResult<Reduced> {
        let slot = self.envs.frame(env).lets.get(&name).expect("let binding exists");
        match &slot.state {
            LetState::Resolved(v) => return Ok(Reduced::value(v.clone())),
            LetState::Resolving => {
                return Ok(Reduced::value(Value::bottom_msg(
                    ErrorKind::Cycle,
                    "cyclic let binding",
                )));
            }
            LetState::Unresolved => {}
        }
        let expr = slot.expr;
        self.envs.frame_mut(env).lets.get_mut(&name).expect("let binding exists").state = LetState::Resolving;
        let reduced = self.reduce(expr, env)?;
        let value = match reduced {
            Reduced::Val { value, .. } => value,
            Reduced::Cycle(_) => Value::bottom_msg(ErrorKind::Cycle, "cyclic let binding"),
        };
        self.envs.frame_mut(env).lets.get_mut(&name).expect("let binding exists").state =
            LetState::Resolved(value.clone());
        Ok(Reduced::value(value))
    }

    /// The value of an arc's target, finalizing it shallowly on demand.
    pub(crate) fn arc_result(&mut self, child: NodeId, closing: CloseMode) -> EvalResult<Reduced> {
        match self.arena.get(child).state {
            NodeState::Evaluating => return Ok(Reduced::Cycle(child)),
            NodeState::Unprocessed => self.finalize(child, false)?,
            _ => {}
        }
        Ok(Reduced::Val {
            value: self.arena.get(child).value_or_top(),
            close: closing,
        })
    }

    // ------------------------------------------------------------------
    // Selection and indexing
    // ------------------------------------------------------------------

    fn select(&mut self, base: Reduced, label: Label) -> EvalResult<Reduced> {
        let closing = if label.is_definition() {
            CloseMode::Deep
        } else {
            CloseMode::Open
        };
        match base {
            Reduced::Cycle(n) => {
                // The node is mid-evaluation, but arcs registered so far are
                // fair game; this is what lets sibling fields of a cyclic
                // struct resolve each other.
                match self.arena.lookup(n, label) {
                    Some(arc) => self.arc_result(arc.node, closing),
                    None => Ok(Reduced::value(Value::bottom_msg(
                        ErrorKind::Incomplete,
                        format!("cannot select {} from value under evaluation", label.display(self.unit.interns())),
                    ))),
                }
            }
            Reduced::Val { value, .. } => match value {
                Value::Bottom(_) => Ok(Reduced::value(value)),
                Value::Struct(n) | Value::List(n) => match self.arena.lookup(n, label) {
                    Some(arc) => self.arc_result(arc.node, closing),
                    None => Ok(Reduced::value(Value::bottom_msg(
                        ErrorKind::NotFound,
                        format!("field not found: {}", label.display(self.unit.interns())),
                    ))),
                },
                Value::Disjunction(d) => {
                    let mut terms = Vec::with_capacity(d.terms.len());
                    for term in d.terms {
                        let selected = self.select(Reduced::value(term.value), label)?;
                        let value = match selected {
                            Reduced::Val { value, .. } => value,
                            Reduced::Cycle(_) => Value::bottom(ErrorKind::Cycle),
                        };
                        terms.push((value, term.default));
                    }
                    Ok(Reduced::value(self.rebuild_disjunction(terms, ErrorKind::NotFound)))
                }
                other => Ok(Reduced::value(Value::bottom_msg(
                    ErrorKind::TypeMismatch,
                    format!("cannot select field from {}", other.kind_name()),
                ))),
            },
        }
    }

    fn index(&mut self, base: Reduced, index: Reduced) -> EvalResult<Reduced> {
        let index = self.reduced_for_use(index)?;
        if index.is_bottom() {
            return Ok(Reduced::value(index));
        }
        let base_value = match base {
            Reduced::Cycle(_) => {
                return Ok(Reduced::value(Value::bottom_msg(
                    ErrorKind::Incomplete,
                    "cannot index value under evaluation",
                )));
            }
            Reduced::Val { value, .. } => value,
        };
        match base_value {
            Value::Bottom(_) => Ok(Reduced::value(base_value)),
            Value::Disjunction(d) => {
                let mut terms = Vec::with_capacity(d.terms.len());
                for term in d.terms {
                    let indexed = self.index(Reduced::value(term.value), Reduced::value(index.clone()))?;
                    let value = match indexed {
                        Reduced::Val { value, .. } => value,
                        Reduced::Cycle(_) => Value::bottom(ErrorKind::Cycle),
                    };
                    terms.push((value, term.default));
                }
                Ok(Reduced::value(self.rebuild_disjunction(terms, ErrorKind::OutOfRange)))
            }
            Value::List(n) => {
                let Value::Int(i) = &index else {
                    return Ok(Reduced::value(Value::bottom_msg(
                        ErrorKind::TypeMismatch,
                        format!("list index must be int, found {}", index.kind_name()),
                    )));
                };
                let Some(i) = i.to_usize() else {
                    return Ok(Reduced::value(Value::bottom_msg(ErrorKind::OutOfRange, "index out of range")));
                };
                match self.arena.lookup(n, Label::Index(i)) {
                    Some(arc) => self.arc_result(arc.node, CloseMode::Open),
                    // Open tails stay unlocked: indexing past the explicit
                    // elements fails even when an ellipsis would admit more.
                    None => Ok(Reduced::value(Value::bottom_msg(ErrorKind::OutOfRange, "index out of range"))),
                }
            }
            Value::Struct(n) => {
                let Value::String(s) = &index else {
                    return Ok(Reduced::value(Value::bottom_msg(
                        ErrorKind::TypeMismatch,
                        format!("struct index must be string, found {}", index.kind_name()),
                    )));
                };
                let label = self.unit.interns().lookup(s).map(Label::Str);
                match label.and_then(|l| self.arena.lookup(n, l)) {
                    Some(arc) => self.arc_result(arc.node, CloseMode::Open),
                    None => Ok(Reduced::value(Value::bottom_msg(
                        ErrorKind::NotFound,
                        format!("field not found: {s}"),
                    ))),
                }
            }
            Value::String(s) => Ok(Reduced::value(index_bytes(s.as_bytes(), &index))),
            Value::Bytes(b) => Ok(Reduced::value(index_bytes(&b, &index))),
            other => Ok(Reduced::value(Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!("cannot index {}", other.kind_name()),
            ))),
        }
    }

    fn slice(
        &mut self,
        expr: &'ir Expr,
        lo: Option<&'ir Expr>,
        hi: Option<&'ir Expr>,
        env: EnvId,
    ) -> EvalResult<Reduced> {
        let base = self.reduce(expr, env)?;
        let base = self.reduced_for_use(base)?;
        if base.is_bottom() {
            return Ok(Reduced::value(base));
        }
        let bound_at = |ev: &mut Self, e: Option<&'ir Expr>, default: usize| -> EvalResult<Result<usize, Value>> {
            let Some(e) = e else {
                return Ok(Ok(default));
            };
            let r = ev.reduce(e, env)?;
            let v = ev.reduced_for_use(r)?;
            match &v {
                Value::Int(n) => match n.to_usize() {
                    Some(i) => Ok(Ok(i)),
                    None => Ok(Err(Value::bottom_msg(ErrorKind::OutOfRange, "slice index out of range"))),
                },
                Value::Bottom(_) => Ok(Err(v)),
                other => Ok(Err(Value::bottom_msg(
                    ErrorKind::TypeMismatch,
                    format!("slice index must be int, found {}", other.kind_name()),
                ))),
            }
        };

        match base {
            Value::List(n) => {
                let len = self.arena.get(n).arcs.len();
                let lo = match bound_at(self, lo, 0)? {
                    Ok(i) => i,
                    Err(b) => return Ok(Reduced::value(b)),
                };
                let hi = match bound_at(self, hi, len)? {
                    Ok(i) => i,
                    Err(b) => return Ok(Reduced::value(b)),
                };
                if lo > hi || hi > len {
                    return Ok(Reduced::value(Value::bottom_msg(ErrorKind::OutOfRange, "slice out of range")));
                }
                let parent = self.current_node();
                let out = self.arena.alloc(NodeKind::List, parent)?;
                self.arena.get_mut(out).is_aggregate = true;
                for (dst, src) in (lo..hi).enumerate() {
                    let arc = self
                        .arena
                        .lookup(n, Label::Index(src))
                        .expect("list arcs are dense");
                    let elem = match self.arc_result(arc.node, CloseMode::Open)? {
                        Reduced::Val { value, .. } => value,
                        Reduced::Cycle(_) => Value::bottom(ErrorKind::Cycle),
                    };
                    let child = self.ensure_arc(out, Label::Index(dst), false, false, false, None)?;
                    let env0 = self.root_env();
                    self.arena.get_mut(child).push_conjunct(Conjunct::value(elem, env0));
                }
                self.finalize(out, false)?;
                Ok(Reduced::value(self.arena.get(out).value_or_top()))
            }
            Value::String(s) => {
                let bytes = s.as_bytes();
                let lo = match bound_at(self, lo, 0)? {
                    Ok(i) => i,
                    Err(b) => return Ok(Reduced::value(b)),
                };
                let hi = match bound_at(self, hi, bytes.len())? {
                    Ok(i) => i,
                    Err(b) => return Ok(Reduced::value(b)),
                };
                if lo > hi || hi > bytes.len() || !s.is_char_boundary(lo) || !s.is_char_boundary(hi) {
                    return Ok(Reduced::value(Value::bottom_msg(ErrorKind::OutOfRange, "slice out of range")));
                }
                Ok(Reduced::value(Value::string(&s[lo..hi])))
            }
            Value::Bytes(b) => {
                let lo = match bound_at(self, lo, 0)? {
                    Ok(i) => i,
                    Err(b) => return Ok(Reduced::value(b)),
                };
                let hi = match bound_at(self, hi, b.len())? {
                    Ok(i) => i,
                    Err(bv) => return Ok(Reduced::value(bv)),
                };
                if lo > hi || hi > b.len() {
                    return Ok(Reduced::value(Value::bottom_msg(ErrorKind::OutOfRange, "slice out of range")));
                }
                Ok(Reduced::value(Value::Bytes(b[lo..hi].into())))
            }
            other => Ok(Reduced::value(Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!("cannot slice {}", other.kind_name()),
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Bounds, matchers, interpolation
    // ------------------------------------------------------------------

    fn make_bound(&mut self, op: BoundOp, operand: Reduced) -> EvalResult<Reduced> {
        let value = self.reduced_for_use(operand)?;
        if value.is_bottom() {
            return Ok(Reduced::value(value));
        }
        let ok = match op {
            BoundOp::Neq => value.is_atom(),
            _ => matches!(
                value,
                Value::Int(_) | Value::Float(_) | Value::String(_) | Value::Bytes(_)
            ),
        };
        if !ok {
            let kind = if value.is_concrete_scalar() || matches!(value, Value::Struct(_) | Value::List(_)) {
                ErrorKind::TypeMismatch
            } else {
                ErrorKind::Incomplete
            };
            return Ok(Reduced::value(Value::bottom_msg(
                kind,
                format!("invalid bound endpoint: {}", value.kind_name()),
            )));
        }
        Ok(Reduced::value(Value::Bound(Box::new(crate::bound::Bound::new(
            op, value,
        )))))
    }

    fn make_matcher(&mut self, negated: bool, operand: Reduced) -> EvalResult<Reduced> {
        let value = self.reduced_for_use(operand)?;
        match value {
            Value::Bottom(_) => Ok(Reduced::value(value)),
            Value::String(s) => Ok(Reduced::value(Value::Regex(Box::new(RegexBound::new(
                s.to_string(),
                negated,
            ))))),
            other => Ok(Reduced::value(Value::bottom_msg(
                ErrorKind::TypeMismatch,
                format!("regex pattern must be string, found {}", other.kind_name()),
            ))),
        }
    }

    fn interpolate(&mut self, parts: &'ir [InterpolationPart], env: EnvId) -> EvalResult<Reduced> {
        let mut out = String::new();
        for part in parts {
            match part {
                InterpolationPart::Lit(s) => out.push_str(s),
                InterpolationPart::Expr(e) => {
                    let reduced = self.reduce(e, env)?;
                    let value = self.reduced_for_use(reduced)?;
                    match &value {
                        Value::String(s) => out.push_str(s),
                        Value::Int(n) => out.push_str(&n.to_string()),
                        Value::Float(d) => out.push_str(&d.to_string()),
                        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
                        Value::Bytes(b) => match std::str::from_utf8(b) {
                            Ok(s) => out.push_str(s),
                            Err(_) => {
                                return Ok(Reduced::value(Value::bottom_msg(
                                    ErrorKind::TypeMismatch,
                                    "interpolated bytes are not valid UTF-8",
                                )));
                            }
                        },
                        Value::Bottom(_) => return Ok(Reduced::value(value.clone())),
                        other if other.is_concrete_scalar() || matches!(other, Value::Struct(_) | Value::List(_)) => {
                            return Ok(Reduced::value(Value::bottom_msg(
                                ErrorKind::TypeMismatch,
                                format!("cannot interpolate {}", other.kind_name()),
                            )));
                        }
                        other => {
                            return Ok(Reduced::value(Value::bottom_msg(
                                ErrorKind::Incomplete,
                                format!("interpolated value is not concrete: {}", other.kind_name()),
                            )));
                        }
                    }
                }
            }
        }
        Ok(Reduced::value(Value::string(out)))
    }

    // ------------------------------------------------------------------
    // Nested unification
    // ------------------------------------------------------------------

    /// `a & b` in expression position (conjunct-level `&` is split instead).
    fn unify_reduced(&mut self, left: Reduced, right: Reduced) -> EvalResult<Reduced> {
        match (left, right) {
            (Reduced::Val { value: a, close: ca }, Reduced::Val { value: b, close: cb }) => {
                let value = self.unify_values(a, ca, b, cb)?;
                Ok(Reduced::value(value))
            }
            (Reduced::Cycle(n), Reduced::Val { value, close })
            | (Reduced::Val { value, close }, Reduced::Cycle(n)) => self.unify_with_cycle(n, value, close),
            (Reduced::Cycle(_), Reduced::Cycle(_)) => {
                Ok(Reduced::value(Value::bottom_msg(ErrorKind::Cycle, "cyclic unification")))
            }
        }
    }

    /// Unifies a value with a reference into a node under evaluation.
    ///
    /// An atom asserts equality with the cyclic path: the atom is returned
    /// and the check deferred until the node's conjuncts are reduced. A
    /// struct merges with the node's conjunct snapshot.
    fn unify_with_cycle(&mut self, n: NodeId, value: Value, close: CloseMode) -> EvalResult<Reduced> {
        if value.is_atom() {
            if let Some(current) = self.current_node() {
                self.arena.get_mut(current).pending_checks.push(value.clone());
            }
            return Ok(Reduced::value(value));
        }
        match value {
            Value::Struct(_) | Value::List(_) => {
                let cyclic = match self.arena.get(n).kind {
                    NodeKind::Struct => Value::Struct(n),
                    NodeKind::List => Value::List(n),
                };
                let merged = self.unify_values(cyclic, CloseMode::Open, value, close)?;
                Ok(Reduced::value(merged))
            }
            Value::Bottom(_) => Ok(Reduced::value(value)),
            _ => Ok(Reduced::value(Value::bottom_msg(
                ErrorKind::Cycle,
                "cyclic reference does not resolve",
            ))),
        }
    }
}

/// Byte-level indexing shared by strings and bytes.
fn index_bytes(bytes: &[u8], index: &Value) -> Value {
    let Value::Int(i) = index else {
        return Value::bottom_msg(
            ErrorKind::TypeMismatch,
            format!("index must be int, found {}", index.kind_name()),
        );
    };
    match i.to_usize().and_then(|i| bytes.get(i)) {
        Some(b) => Value::Int((*b).into()),
        None => Value::bottom_msg(ErrorKind::OutOfRange, "index out of range"),
    }
}
