//! Public entry points: evaluating a compilation unit and querying the
//! finalized result.

use crate::{
    errors::{Bottom, ErrorKind},
    eval::Evaluator,
    graph::{CloseMode, NodeId, NodeState},
    ir::{CompilationUnit, Label},
    resource::{LimitedTracker, NoLimitTracker, ResourceLimits, ResourceTracker},
    subsume::{value_equal, value_subsumes},
    value::Value,
    walk::{WalkFilter, Visitor, export_view, walk_value},
};

/// Evaluation entry point, optionally bounded by resource limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Runtime {
    limits: Option<ResourceLimits>,
}

impl Runtime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(limits: ResourceLimits) -> Self {
        Self { limits: Some(limits) }
    }

    /// Evaluates a compilation unit to its fixed point.
    ///
    /// The result is always an [`Instance`]: evaluation failures are bottom
    /// values inside it, never panics or host errors. Exceeding a resource
    /// ceiling yields a root-level `ResourceExhausted` bottom.
    #[must_use]
    pub fn evaluate<'a>(&self, unit: &'a CompilationUnit) -> Instance<'a> {
        match self.limits {
            Some(limits) => evaluate_with(unit, LimitedTracker::new(limits)),
            None => evaluate_with(unit, NoLimitTracker::default()),
        }
    }
}

fn evaluate_with<'a, T: ResourceTracker>(unit: &'a CompilationUnit, tracker: T) -> Instance<'a> {
    let (mut ev, root) = match Evaluator::new(unit, tracker) {
        Ok(pair) => pair,
        Err(err) => {
            // The very first allocation was over the limit; produce an
            // empty instance carrying the failure.
            let bottom = Bottom::from(err);
            let (mut ev, root) = Evaluator::new(unit, NoLimitTracker::default()).expect("no-limit evaluator");
            ev.arena.get_mut(root).value = Some(Value::from_bottom(bottom.clone()));
            ev.arena.get_mut(root).state = NodeState::Errored;
            return Instance {
                ev,
                root,
                errors: vec![bottom],
            };
        }
    };

    let mut errors = Vec::new();
    if let Err(err) = ev.finalize(root, true) {
        let bottom = Bottom::from(err);
        let node = ev.arena.get_mut(root);
        node.value = Some(Value::from_bottom(bottom.clone()));
        node.state = NodeState::Errored;
        errors.push(bottom);
    }
    errors.extend(std::mem::take(&mut ev.errors));

    let root_env = ev.root_env();
    let (arena, envs) = ev.into_parts();
    let ev = Evaluator::from_parts(unit, arena.into_nodes(), envs, root_env, NoLimitTracker::default());
    Instance { ev, root, errors }
}

/// A finalized evaluation: the node graph plus the queries §6 exposes.
///
/// Borrows the compilation unit it was evaluated from.
pub struct Instance<'a> {
    ev: Evaluator<'a, NoLimitTracker>,
    root: NodeId,
    errors: Vec<Bottom>,
}

impl<'a> Instance<'a> {
    /// The root value of the evaluation.
    #[must_use]
    pub fn value(&self) -> Value {
        self.ev.arena.get(self.root).value_or_top()
    }

    /// Every error collected during evaluation. Empty when the unit is
    /// well-formed.
    #[must_use]
    pub fn errors(&self) -> &[Bottom] {
        &self.errors
    }

    /// Looks up a value by path of regular labels from the root. Segments
    /// starting with `#` name definitions, segments starting with `_` name
    /// hidden fields.
    ///
    /// Navigation follows arcs, so fields under a node whose own value
    /// collapsed to bottom (error propagation) remain reachable.
    #[must_use]
    pub fn lookup(&self, path: &[&str]) -> Option<Value> {
        let mut node = self.root;
        let mut current = self.value();
        for seg in path {
            let label = self.parse_label(seg)?;
            let arc = self.ev.arena.lookup(node, label)?;
            current = self.ev.arena.get(arc.node).value.clone()?;
            node = match current {
                Value::Struct(n) | Value::List(n) => n,
                _ => arc.node,
            };
        }
        Some(current)
    }

    fn parse_label(&self, seg: &str) -> Option<Label> {
        if let Ok(index) = seg.parse::<usize>() {
            return Some(Label::Index(index));
        }
        let interns = self.ev.unit.interns();
        if let Some(name) = seg.strip_prefix('#') {
            return Some(Label::Def(interns.lookup(name)?));
        }
        if let Some(name) = seg.strip_prefix('_') {
            return Some(Label::Hidden {
                name: interns.lookup(name)?,
                package: self.ev.unit.package,
            });
        }
        Some(Label::Str(interns.lookup(seg)?))
    }

    /// Unifies two finalized values, finalizing the combination.
    pub fn unify(&mut self, a: &Value, b: &Value) -> Value {
        let result = self
            .ev
            .unify_values(a.clone(), CloseMode::Open, b.clone(), CloseMode::Open);
        match result {
            Ok(Value::Struct(n)) | Ok(Value::List(n)) => {
                if let Err(err) = self.ev.finalize(n, true) {
                    return Value::from_bottom(Bottom::from(err));
                }
                self.ev.arena.get(n).value_or_top()
            }
            Ok(value) => value,
            Err(err) => Value::from_bottom(Bottom::from(err)),
        }
    }

    /// Tests `b ⊑ a`: schema validation's core primitive.
    #[must_use]
    pub fn subsumes(&self, a: &Value, b: &Value) -> bool {
        value_subsumes(&self.ev.arena, a, b)
    }

    /// Deep structural equality on finalized values.
    #[must_use]
    pub fn equals(&self, a: &Value, b: &Value) -> bool {
        value_equal(&self.ev.arena, a, b)
    }

    /// The value an export consults: defaults selected, recursively.
    #[must_use]
    pub fn default_view(&self, value: &Value) -> Value {
        export_view(value)
    }

    /// In-order traversal of the result with visibility filters.
    pub fn walk(&self, filter: WalkFilter, visitor: &mut dyn Visitor) {
        let value = self.value();
        walk_value(
            &self.ev.arena,
            self.ev.unit.interns(),
            &value,
            None,
            filter,
            visitor,
        );
    }

    /// Validates the result for data export: every non-optional field must
    /// be concrete and unambiguous. Returns the full error set.
    #[must_use]
    pub fn check(&self) -> Vec<Bottom> {
        let mut out = Vec::new();
        self.check_value(&self.value(), &mut out, &mut Vec::new());
        out
    }

    fn check_value(&self, value: &Value, out: &mut Vec<Bottom>, seen: &mut Vec<NodeId>) {
        let viewed = export_view(value);
        match &viewed {
            Value::Bottom(b) => out.push((**b).clone()),
            Value::Disjunction(_) => out.push(Bottom::with_msg(
                ErrorKind::Incomplete,
                "ambiguous disjunction: no default",
            )),
            Value::Type(_) | Value::Bound(_) | Value::Regex(_) | Value::Conjunction(_) | Value::Top => {
                out.push(Bottom::with_msg(
                    ErrorKind::Incomplete,
                    format!("value is not concrete: {}", viewed.kind_name()),
                ));
            }
            Value::Struct(n) | Value::List(n) => {
                if seen.contains(n) {
                    return;
                }
                seen.push(*n);
                for (label, arc) in &self.ev.arena.get(*n).arcs {
                    if label.is_hidden() || label.is_definition() {
                        continue;
                    }
                    let Some(child) = self.ev.arena.get(arc.node).value.as_ref() else {
                        continue;
                    };
                    if arc.optional {
                        continue;
                    }
                    if arc.required && !child.is_atom() && !matches!(child, Value::Struct(_) | Value::List(_)) {
                        out.push(Bottom::with_msg(
                            ErrorKind::Incomplete,
                            format!(
                                "required field is not concrete: {}",
                                label.display(self.ev.unit.interns())
                            ),
                        ));
                        continue;
                    }
                    self.check_value(child, out, seen);
                }
                seen.pop();
            }
            _ => {}
        }
    }
}
