//! Visitor traversal of finalized values, with visibility filters.

use crate::{
    graph::{NodeArena, NodeId, NodeKind},
    intern::Interns,
    resource::ResourceTracker,
    value::Value,
};

/// Which arcs a walk exposes.
///
/// The default filter is the data-export view: hidden fields, optional
/// fields, and definitions are omitted.
#[derive(Debug, Clone, Copy)]
pub struct WalkFilter {
    pub omit_hidden: bool,
    pub omit_optional: bool,
    pub omit_definitions: bool,
}

impl WalkFilter {
    /// The data-export view.
    #[must_use]
    pub fn data() -> Self {
        Self {
            omit_hidden: true,
            omit_optional: true,
            omit_definitions: true,
        }
    }

    /// Everything, including hidden fields and definitions.
    #[must_use]
    pub fn everything() -> Self {
        Self {
            omit_hidden: false,
            omit_optional: false,
            omit_definitions: false,
        }
    }
}

impl Default for WalkFilter {
    fn default() -> Self {
        Self::data()
    }
}

/// Callbacks for an in-order traversal. Labels are `None` at the root and
/// for list elements' enclosing events.
pub trait Visitor {
    fn begin_struct(&mut self, _label: Option<&str>) {}
    fn end_struct(&mut self) {}
    fn begin_list(&mut self, _label: Option<&str>) {}
    fn end_list(&mut self) {}
    fn scalar(&mut self, _label: Option<&str>, _value: &Value) {}
}

/// The value a walk presents for an arc: disjunctions collapse to their
/// default when one is decidable without further evaluation.
pub(crate) fn export_view(value: &Value) -> Value {
    let Value::Disjunction(d) = value else {
        return value.clone();
    };
    let marked: Vec<&Value> = d.terms.iter().filter(|t| t.default).map(|t| &t.value).collect();
    match marked.len() {
        0 if d.terms.len() == 1 => export_view(&d.terms[0].value),
        0 => value.clone(),
        1 => export_view(marked[0]),
        _ => {
            // Ties meet pairwise; aggregates among the candidates keep the
            // disjunction as-is (meeting them needs the evaluator), and a
            // bottom meet means there is no default to select.
            let mut acc = marked[0].clone();
            for m in &marked[1..] {
                if matches!(acc, Value::Struct(_) | Value::List(_)) || matches!(m, Value::Struct(_) | Value::List(_)) {
                    return value.clone();
                }
                acc = crate::unify::meet(&acc, m);
            }
            if acc.is_bottom() {
                return value.clone();
            }
            export_view(&acc)
        }
    }
}

pub(crate) fn walk_node<T: ResourceTracker>(
    arena: &NodeArena<'_, T>,
    interns: &Interns,
    node: NodeId,
    label: Option<&str>,
    filter: WalkFilter,
    visitor: &mut dyn Visitor,
) {
    let n = arena.get(node);
    let is_list = n.kind == NodeKind::List;
    if is_list {
        visitor.begin_list(label);
    } else {
        visitor.begin_struct(label);
    }
    for (arc_label, arc) in &n.arcs {
        if filter.omit_hidden && arc_label.is_hidden() {
            continue;
        }
        if filter.omit_definitions && arc_label.is_definition() {
            continue;
        }
        if filter.omit_optional && arc.optional {
            continue;
        }
        let Some(value) = arena.get(arc.node).value.as_ref() else {
            continue;
        };
        // Optional fields whose value failed are excluded, not errors.
        if arc.optional && value.is_bottom() {
            continue;
        }
        let name = arc_label.display(interns);
        let name = if is_list { None } else { Some(name.as_ref()) };
        walk_value(arena, interns, &export_view(value), name, filter, visitor);
    }
    if is_list {
        visitor.end_list();
    } else {
        visitor.end_struct();
    }
}

pub(crate) fn walk_value<T: ResourceTracker>(
    arena: &NodeArena<'_, T>,
    interns: &Interns,
    value: &Value,
    label: Option<&str>,
    filter: WalkFilter,
    visitor: &mut dyn Visitor,
) {
    match value {
        Value::Struct(n) | Value::List(n) => walk_node(arena, interns, *n, label, filter, visitor),
        scalar => visitor.scalar(label, scalar),
    }
}
