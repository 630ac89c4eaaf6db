//! The evaluator: reduces conjuncts to values over the node graph until a
//! fixed point is reached.
//!
//! Evaluation is demand-driven depth-first with memoization. Finalizing a
//! node runs in phases: a structure phase expands conjuncts into arcs,
//! patterns, and pending work (conjuncts split at `&`, struct values replay
//! their source conjuncts with identity de-duplication); a value phase folds
//! scalar contributions, distributes pending disjunctions, and enforces
//! closedness; a deep phase finalizes arcs recursively. Reference cycles
//! converge through conjunct identity (unifying a node with itself adds
//! nothing); structural cycles are caught via the evaluation stack and each
//! conjunct's replay chain.

mod binop;
mod comprehension;
mod disjunction;
mod expr;

use smallvec::smallvec;

use crate::{
    env::{EnvId, Envs},
    errors::{Bottom, ErrorKind, EvalResult},
    graph::{
        CloseGroup, CloseMode, Conjunct, ConjunctSource, ListShape, Node, NodeArena, NodeId, NodeKind, NodeState,
        PendingComp, RefChain,
    },
    ir::{BinOp, CompilationUnit, Decl, Expr, Label, ListElem},
    resource::ResourceTracker,
    subsume::value_equal,
    value::Value,
};

/// Result of reducing an expression: a value (with the closedness it
/// carries), or a reference into a node currently on the evaluation stack.
#[derive(Debug)]
pub(crate) enum Reduced {
    Val { value: Value, close: CloseMode },
    Cycle(NodeId),
}

impl Reduced {
    pub(crate) fn value(value: Value) -> Self {
        Self::Val {
            value,
            close: CloseMode::Open,
        }
    }
}

/// The evaluation engine for one compilation unit.
pub(crate) struct Evaluator<'ir, T: ResourceTracker> {
    pub unit: &'ir CompilationUnit,
    pub arena: NodeArena<'ir, T>,
    pub envs: Envs<'ir>,
    /// Nodes currently being structure- or value-phased.
    stack: Vec<NodeId>,
    /// Enclosing nodes whose comprehension clauses are being iterated.
    comp_scopes: Vec<NodeId>,
    /// Non-zero while finalizing disjunction variants, whose failures are
    /// selection, not errors.
    suppress_errors: u32,
    /// Environment used for synthesized value conjuncts.
    root_env: EnvId,
    pub errors: Vec<Bottom>,
}

impl<'ir, T: ResourceTracker> Evaluator<'ir, T> {
    pub fn new(unit: &'ir CompilationUnit, tracker: T) -> EvalResult<(Self, NodeId)> {
        let mut arena = NodeArena::new(tracker);
        let root = arena.alloc(NodeKind::Struct, None)?;
        let mut envs = Envs::new();
        let root_env = envs.push(None, root);
        let mut ev = Self {
            unit,
            arena,
            envs,
            stack: Vec::new(),
            comp_scopes: Vec::new(),
            suppress_errors: 0,
            root_env,
            errors: Vec::new(),
        };
        ev.arena.get_mut(root).push_conjunct(Conjunct {
            source: ConjunctSource::Decls(&unit.decls),
            env: root_env,
            close: CloseMode::Open,
            embed: false,
            from_comp: false,
            group: None,
            chain: RefChain::new(),
        });
        Ok((ev, root))
    }

    /// Rebuilds an evaluator around a finalized graph, for post-evaluation
    /// unification and subsumption queries.
    pub fn from_parts(unit: &'ir CompilationUnit, nodes: Vec<Node<'ir>>, envs: Envs<'ir>, root_env: EnvId, tracker: T) -> Self {
        Self {
            unit,
            arena: NodeArena::from_nodes(nodes, tracker),
            envs,
            stack: Vec::new(),
            comp_scopes: Vec::new(),
            suppress_errors: 0,
            root_env,
            errors: Vec::new(),
        }
    }

    pub fn root_env(&self) -> EnvId {
        self.root_env
    }

    /// Decomposes the evaluator into its graph and environments.
    pub fn into_parts(self) -> (NodeArena<'ir, T>, Envs<'ir>) {
        (self.arena, self.envs)
    }

    // ------------------------------------------------------------------
    // Node finalization
    // ------------------------------------------------------------------

    /// Finalizes a node: shallow (`deep == false`) computes its value and
    /// leaves arcs pending; deep recurses into arcs.
    pub fn finalize(&mut self, id: NodeId, deep: bool) -> EvalResult<()> {
        match self.arena.get(id).state {
            // Callers reaching an Evaluating node get a Cycle from `reduce`;
            // a direct call is a no-op to keep re-entry harmless.
            NodeState::Evaluating | NodeState::Errored => return Ok(()),
            NodeState::Finalized => return Ok(()),
            NodeState::Ready => {
                if deep {
                    self.finalize_arcs(id)?;
                }
                return Ok(());
            }
            NodeState::Unprocessed => {}
        }

        self.arena.tracker.enter()?;
        self.arena.get_mut(id).state = NodeState::Evaluating;
        self.stack.push(id);
        let result = self.run_node(id);
        self.stack.pop();
        self.arena.tracker.exit();
        result?;

        if deep {
            self.finalize_arcs(id)?;
        }
        Ok(())
    }

    /// Structure and value phases of one node.
    fn run_node(&mut self, id: NodeId) -> EvalResult<()> {
        let mut next = 0;
        let mut embeds: Vec<usize> = Vec::new();
        loop {
            // Expand plain conjuncts first; embeddings and comprehensions
            // see the declared structure of their siblings.
            while next < self.arena.get(id).conjuncts.len() {
                let idx = next;
                next += 1;
                let conjunct = self.arena.get(id).conjuncts[idx].clone();
                if conjunct.embed && matches!(&conjunct.source, ConjunctSource::Expr(_)) {
                    embeds.push(idx);
                    continue;
                }
                self.process_conjunct(id, idx, conjunct)?;
            }
            if !embeds.is_empty() {
                for idx in std::mem::take(&mut embeds) {
                    let conjunct = self.arena.get(id).conjuncts[idx].clone();
                    self.process_embed(id, idx, conjunct)?;
                }
                continue;
            }
            // Comprehensions run one at a time so each sees the structure
            // the previous one emitted.
            if self.arena.get(id).pending_comps.is_empty() {
                break;
            }
            let comp = self.arena.get_mut(id).pending_comps.remove(0);
            self.run_struct_comprehension(id, comp)?;
        }

        self.apply_patterns(id)?;
        self.apply_list_shapes(id)?;
        self.compute_value(id)
    }

    fn process_conjunct(&mut self, id: NodeId, idx: usize, c: Conjunct<'ir>) -> EvalResult<()> {
        self.arena.tracker.check_step()?;
        match &c.source {
            ConjunctSource::Decls(decls) => {
                let decls = *decls;
                self.process_struct_source(id, &c, decls)
            }
            ConjunctSource::Expr(expr) => {
                let expr: &'ir Expr = expr;
                match expr {
                    Expr::StructLit { decls } => self.process_struct_source(id, &c, decls),
                    Expr::ListLit { elems } => self.process_list_source(id, &c, elems),
                    // Unification conjuncts split: each operand constrains
                    // the node independently, which is what makes
                    // self-unification the identity under conjunct
                    // de-duplication.
                    Expr::Binary {
                        op: BinOp::Unify,
                        lhs,
                        rhs,
                    } => {
                        let mut left = c.clone();
                        left.source = ConjunctSource::Expr(lhs.as_ref());
                        self.arena.get_mut(id).push_conjunct(left);
                        let mut right = c;
                        right.source = ConjunctSource::Expr(rhs.as_ref());
                        self.arena.get_mut(id).push_conjunct(right);
                        Ok(())
                    }
                    expr => {
                        let reduced = self.reduce(expr, c.env)?;
                        self.handle_reduced(id, idx, &c, reduced)
                    }
                }
            }
            ConjunctSource::Value(v) => {
                let v = v.clone();
                let close = c.close;
                self.handle_value(id, idx, &c, v, close)
            }
        }
    }

    fn process_embed(&mut self, id: NodeId, idx: usize, c: Conjunct<'ir>) -> EvalResult<()> {
        let ConjunctSource::Expr(expr) = &c.source else {
            return Ok(());
        };
        let expr: &'ir Expr = expr;
        // Embedded struct literals unify into the host node directly.
        match expr {
            Expr::StructLit { decls } => self.process_struct_source(id, &c, decls),
            Expr::ListLit { elems } => self.process_list_source(id, &c, elems),
            _ => {
                let reduced = self.reduce(expr, c.env)?;
                self.handle_reduced(id, idx, &c, reduced)
            }
        }
    }

    /// Registers the declarations of a struct literal (or the unit root) on
    /// a node.
    fn process_struct_source(&mut self, id: NodeId, c: &Conjunct<'ir>, decls: &'ir [Decl]) -> EvalResult<()> {
        {
            let node = self.arena.get_mut(id);
            if node.is_aggregate && node.kind == NodeKind::List {
                let b = Bottom::with_msg(ErrorKind::Conflict, "conflicting values list and struct");
                let merged = crate::unify::meet(&node.scalar.clone().unwrap_or(Value::Top), &Value::from_bottom(b));
                node.scalar = Some(merged);
                return Ok(());
            }
            node.is_aggregate = true;
        }

        // A closing, non-embedded struct source opens a close group; its
        // labels (and those of anything merged beneath it) feed that group.
        let group = if c.close.closes() && !c.embed {
            let node = self.arena.get_mut(id);
            node.close_groups.push(CloseGroup::default());
            Some(node.close_groups.len() - 1)
        } else {
            c.group
        };

        let env = self.envs.push(Some(c.env), id);
        for decl in decls {
            if let Decl::Let { name, value } = decl {
                self.envs.bind_let(env, *name, value);
            }
        }

        for decl in decls {
            match decl {
                Decl::Field {
                    label,
                    value,
                    optional,
                    required,
                } => {
                    let child = self.ensure_arc(id, *label, *optional, *required, c.from_comp, group)?;
                    self.arena.get_mut(child).push_conjunct(Conjunct {
                        source: ConjunctSource::Expr(value),
                        env,
                        close: c.close.child(),
                        embed: false,
                        from_comp: c.from_comp,
                        group: None,
                        chain: c.chain.clone(),
                    });
                }
                Decl::Pattern { matcher, value } => {
                    let matcher = match self.reduce(matcher, env)? {
                        Reduced::Val { value, .. } => value,
                        Reduced::Cycle(_) => Value::bottom(ErrorKind::Cycle),
                    };
                    if let Some(g) = group {
                        self.arena.get_mut(id).close_groups[g].patterns.push(matcher.clone());
                    }
                    self.arena.get_mut(id).patterns.push(crate::graph::PatternConstraint {
                        matcher,
                        value,
                        env,
                        close: c.close.child(),
                    });
                }
                Decl::Ellipsis { value } => {
                    let node = self.arena.get_mut(id);
                    if node.ellipsis.is_none() {
                        node.ellipsis = Some(crate::graph::EllipsisConstraint {
                            value: value.as_ref(),
                            env,
                        });
                    }
                    if let Some(g) = group {
                        node.close_groups[g].open = true;
                    }
                }
                Decl::Embedding { expr } => {
                    self.arena.get_mut(id).push_conjunct(Conjunct {
                        source: ConjunctSource::Expr(expr),
                        env,
                        close: CloseMode::Open,
                        embed: true,
                        from_comp: c.from_comp,
                        group,
                        chain: c.chain.clone(),
                    });
                }
                Decl::Comprehension { clauses, body } => {
                    self.arena.get_mut(id).pending_comps.push(PendingComp {
                        clauses,
                        body,
                        env,
                        close: c.close.child(),
                        group,
                        chain: c.chain.clone(),
                    });
                }
                Decl::Let { .. } | Decl::Attribute { .. } => {}
            }
        }
        Ok(())
    }

    /// Registers the elements of a list literal on a node.
    fn process_list_source(&mut self, id: NodeId, c: &Conjunct<'ir>, elems: &'ir [ListElem]) -> EvalResult<()> {
        {
            let node = self.arena.get_mut(id);
            if node.is_aggregate && node.kind == NodeKind::Struct {
                let b = Bottom::with_msg(ErrorKind::Conflict, "conflicting values struct and list");
                let merged = crate::unify::meet(&node.scalar.clone().unwrap_or(Value::Top), &Value::from_bottom(b));
                node.scalar = Some(merged);
                return Ok(());
            }
            node.kind = NodeKind::List;
            node.is_aggregate = true;
        }

        let env = self.envs.push(Some(c.env), id);
        let mut index = 0usize;
        let mut tail = None;
        for elem in elems {
            match elem {
                ListElem::Elem(expr) => {
                    let child = self.ensure_arc(id, Label::Index(index), false, false, c.from_comp, None)?;
                    self.arena.get_mut(child).push_conjunct(Conjunct {
                        source: ConjunctSource::Expr(expr),
                        env,
                        close: c.close.child(),
                        embed: false,
                        from_comp: c.from_comp,
                        group: None,
                        chain: c.chain.clone(),
                    });
                    index += 1;
                }
                ListElem::Ellipsis(value) => {
                    tail = Some(crate::graph::EllipsisConstraint {
                        value: value.as_ref(),
                        env,
                    });
                }
                ListElem::Comprehension { clauses, body } => {
                    match self.comprehension_envs(id, clauses, env)? {
                        Ok(iter_envs) => {
                            for iter_env in iter_envs {
                                let child =
                                    self.ensure_arc(id, Label::Index(index), false, false, true, None)?;
                                self.arena.get_mut(child).push_conjunct(Conjunct {
                                    source: ConjunctSource::Expr(body),
                                    env: iter_env,
                                    close: c.close.child(),
                                    embed: false,
                                    from_comp: true,
                                    group: None,
                                    chain: c.chain.clone(),
                                });
                                index += 1;
                            }
                        }
                        Err(bottom) => {
                            let node = self.arena.get_mut(id);
                            let merged = crate::unify::meet(
                                &node.scalar.clone().unwrap_or(Value::Top),
                                &Value::from_bottom(bottom),
                            );
                            node.scalar = Some(merged);
                        }
                    }
                }
            }
        }

        let node = self.arena.get_mut(id);
        if tail.is_some() && node.ellipsis.is_none() {
            node.ellipsis = tail.clone();
        }
        node.list_shapes.push(ListShape { len: index, tail });
        Ok(())
    }

    /// Returns the arc's child node, creating it if needed.
    ///
    /// Repeated declarations of the same label concatenate their conjunct
    /// lists on the shared child; the arc stays optional only while every
    /// declaration is optional.
    fn ensure_arc(
        &mut self,
        id: NodeId,
        label: Label,
        optional: bool,
        required: bool,
        from_comp: bool,
        group: Option<usize>,
    ) -> EvalResult<NodeId> {
        if let Some(g) = group {
            self.arena.get_mut(id).close_groups[g].labels.insert(label);
        }
        if let Some(arc) = self.arena.get(id).arcs.get(&label).copied() {
            let node = self.arena.get_mut(id);
            let entry = node.arcs.get_mut(&label).expect("arc exists");
            entry.optional &= optional;
            entry.required |= required;
            entry.from_comprehension &= from_comp;
            return Ok(arc.node);
        }
        let child = self.arena.alloc(NodeKind::Struct, Some(id))?;
        self.arena.get_mut(id).arcs.insert(
            label,
            crate::graph::Arc {
                node: child,
                optional,
                required,
                from_comprehension: from_comp,
            },
        );
        Ok(child)
    }

    fn handle_reduced(&mut self, id: NodeId, idx: usize, c: &Conjunct<'ir>, reduced: Reduced) -> EvalResult<()> {
        match reduced {
            Reduced::Val { value, close } => {
                let combined = c.close.max(close);
                self.handle_value(id, idx, c, value, combined)
            }
            Reduced::Cycle(n) => {
                if n == id {
                    // Unifying a node with itself is the identity.
                    self.arena.get_mut(id).saw_cycle = true;
                    Ok(())
                } else if self.arena.is_strict_ancestor(n, id) {
                    self.fold_scalar(id, Value::bottom(ErrorKind::StructuralCycle));
                    Ok(())
                } else {
                    // Reference cycle between siblings: replay the target's
                    // conjuncts; de-duplication makes this converge.
                    self.merge_node(id, c, n, c.close)
                }
            }
        }
    }

    fn handle_value(&mut self, id: NodeId, idx: usize, c: &Conjunct<'ir>, value: Value, close: CloseMode) -> EvalResult<()> {
        match value {
            Value::Top => Ok(()),
            Value::Struct(m) | Value::List(m) => self.merge_node(id, c, m, close),
            Value::Disjunction(d) => {
                let node = self.arena.get_mut(id);
                node.pending_disjs.push(*d);
                node.disjunct_conjuncts.push(idx);
                Ok(())
            }
            scalar => {
                self.fold_scalar(id, scalar);
                Ok(())
            }
        }
    }

    fn fold_scalar(&mut self, id: NodeId, value: Value) {
        let node = self.arena.get_mut(id);
        let merged = match &node.scalar {
            Some(acc) => crate::unify::meet(acc, &value),
            None => value,
        };
        node.scalar = Some(merged);
    }

    /// Unifies node `m` into node `id` by replaying `m`'s conjuncts.
    fn merge_node(&mut self, id: NodeId, c: &Conjunct<'ir>, m: NodeId, host_close: CloseMode) -> EvalResult<()> {
        if m == id {
            self.arena.get_mut(id).saw_cycle = true;
            return Ok(());
        }
        if self.arena.get(m).state == NodeState::Unprocessed {
            self.finalize(m, false)?;
        }

        // Kind reconciliation.
        {
            let m_kind = self.arena.get(m).kind;
            let node = self.arena.get_mut(id);
            if node.is_aggregate && node.kind != m_kind {
                let b = Bottom::with_msg(ErrorKind::Conflict, "conflicting values list and struct");
                self.fold_scalar(id, Value::from_bottom(b));
                return Ok(());
            }
            node.kind = m_kind;
            node.is_aggregate = true;
        }

        // Structural-cycle guard: replaying a node already in this
        // conjunct's chain is allowed only when independent conjuncts are
        // contributing structure at this level (the recursion is consuming
        // real input); otherwise the expansion would never terminate.
        let base_chain: RefChain = if c.chain.contains(&m) {
            let independent = self
                .arena
                .get(id)
                .conjuncts
                .iter()
                .any(|other| !other.chain.contains(&m));
            if independent {
                smallvec![m]
            } else {
                self.fold_scalar(id, Value::bottom(ErrorKind::StructuralCycle));
                return Ok(());
            }
        } else {
            let mut chain = c.chain.clone();
            chain.push(m);
            chain
        };

        // Closedness: a closing reference, or unification with an already
        // closed struct, opens a close group admitting the source's shape.
        // Embeddings never close their host.
        let group = {
            let m_node = self.arena.get(m);
            if (host_close.closes() || m_node.closed) && !c.embed && m_node.kind == NodeKind::Struct {
                let g = CloseGroup {
                    labels: m_node.arcs.keys().copied().collect(),
                    patterns: m_node.patterns.iter().map(|p| p.matcher.clone()).collect(),
                    open: m_node.ellipsis.is_some(),
                };
                let node = self.arena.get_mut(id);
                node.close_groups.push(g);
                Some(node.close_groups.len() - 1)
            } else {
                None
            }
        };

        let replayed = self.arena.get(m).conjuncts.clone();
        for mut conj in replayed {
            let mut chain = base_chain.clone();
            for n in &conj.chain {
                if !chain.contains(n) {
                    chain.push(*n);
                }
            }
            conj.chain = chain;
            conj.close = conj.close.max(host_close.child());
            if c.embed {
                // An embedded value's own literals must not close the host
                // either; nested structs still close through `close`.
                conj.embed = true;
            }
            if group.is_some() {
                conj.group = group;
            }
            self.arena.get_mut(id).push_conjunct(conj);
        }
        Ok(())
    }

    /// Applies pattern constraints to every matching regular arc.
    fn apply_patterns(&mut self, id: NodeId) -> EvalResult<()> {
        let patterns = self.arena.get(id).patterns.clone();
        if patterns.is_empty() {
            return Ok(());
        }
        let labels: Vec<Label> = self.arena.get(id).arcs.keys().copied().collect();
        for label in labels {
            if !label.is_regular() {
                continue;
            }
            let label_value = self.label_value(label);
            for p in &patterns {
                if crate::unify::meet(&p.matcher, &label_value).is_bottom() {
                    continue;
                }
                let arc = self.arena.get(id).arcs.get(&label).copied().expect("arc exists");
                self.arena.get_mut(arc.node).push_conjunct(Conjunct {
                    source: ConjunctSource::Expr(p.value),
                    env: p.env,
                    close: p.close,
                    embed: false,
                    from_comp: false,
                    group: None,
                    chain: RefChain::new(),
                });
            }
        }
        Ok(())
    }

    /// Checks list lengths against closed sources and constrains elements
    /// beyond a source's explicit prefix with its open tail.
    fn apply_list_shapes(&mut self, id: NodeId) -> EvalResult<()> {
        let shapes = self.arena.get(id).list_shapes.clone();
        if shapes.is_empty() {
            return Ok(());
        }
        let total = self.arena.get(id).arcs.len();
        for shape in shapes {
            if shape.len < total {
                match shape.tail {
                    None => {
                        let b = Bottom::with_msg(
                            ErrorKind::Conflict,
                            format!("incompatible list lengths ({} and {total})", shape.len),
                        );
                        self.fold_scalar(id, Value::from_bottom(b));
                    }
                    Some(tail) => {
                        if let Some(expr) = tail.value {
                            for i in shape.len..total {
                                let arc = self
                                    .arena
                                    .get(id)
                                    .arcs
                                    .get(&Label::Index(i))
                                    .copied()
                                    .expect("list arcs are dense");
                                self.arena.get_mut(arc.node).push_conjunct(Conjunct {
                                    source: ConjunctSource::Expr(expr),
                                    env: tail.env,
                                    close: CloseMode::Open,
                                    embed: false,
                                    from_comp: false,
                                    group: None,
                                    chain: RefChain::new(),
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// The value of a label when matched against a pattern or compared for
    /// closedness.
    pub(crate) fn label_value(&self, label: Label) -> Value {
        match label {
            Label::Str(id) => Value::string(self.unit.interns().get(id)),
            Label::Index(i) => Value::Int(i.into()),
            Label::Hidden { name, .. } => Value::string(self.unit.interns().get(name)),
            Label::Def(id) => Value::string(self.unit.interns().get(id)),
        }
    }

    /// Value phase: fold scalars, enforce closedness, distribute pending
    /// disjunctions, verify scheduled equality checks.
    fn compute_value(&mut self, id: NodeId) -> EvalResult<()> {
        let closed = {
            let node = self.arena.get(id);
            node.close_groups.iter().any(|g| !g.open)
        };
        self.arena.get_mut(id).closed = closed;

        // Closedness check: every regular arc must be admitted by every
        // close group. Hidden and definition arcs are always admissible.
        let mut result: Option<Value> = None;
        if closed {
            let labels: Vec<Label> = self.arena.get(id).arcs.keys().copied().collect();
            'labels: for label in labels {
                if !label.is_regular() {
                    continue;
                }
                let label_value = self.label_value(label);
                let node = self.arena.get(id);
                for group in &node.close_groups {
                    if !group.admits(label, &label_value) {
                        let msg = format!("field not allowed: {}", label.display(self.unit.interns()));
                        result = Some(Value::bottom_msg(ErrorKind::ClosedFieldNotAllowed, msg));
                        break 'labels;
                    }
                }
            }
        }

        let mut value = if let Some(err) = result {
            err
        } else {
            let node = self.arena.get(id);
            match (&node.scalar, node.is_aggregate) {
                (Some(s), false) => s.clone(),
                (None, true) => match node.kind {
                    NodeKind::Struct => Value::Struct(id),
                    NodeKind::List => Value::List(id),
                },
                (Some(s), true) => {
                    if s.is_bottom() {
                        s.clone()
                    } else {
                        Value::from_bottom(Bottom::with_msg(
                            ErrorKind::Conflict,
                            format!(
                                "conflicting values {} and {s}",
                                if node.kind == NodeKind::Struct { "struct" } else { "list" }
                            ),
                        ))
                    }
                }
                (None, false) => {
                    if node.saw_cycle && node.conjuncts.len() <= 1 {
                        Value::bottom_msg(ErrorKind::Cycle, "self-referential value")
                    } else if node.saw_cycle {
                        Value::bottom_msg(ErrorKind::Cycle, "cycle resolves to no value")
                    } else {
                        Value::Top
                    }
                }
            }
        };

        // Distribute pending disjunctions over the rest of the node.
        if !value.is_bottom() && !self.arena.get(id).pending_disjs.is_empty() {
            value = self.distribute_node_disjunctions(id, value)?;
        }

        // Equality checks scheduled by `ref & atom` cycles.
        let checks = std::mem::take(&mut self.arena.get_mut(id).pending_checks);
        for atom in checks {
            if !value_equal(&self.arena, &value, &atom) {
                value = Value::from_bottom(Bottom::conflict(&value, &atom));
                break;
            }
        }

        if let Some(b) = value.as_bottom()
            && !b.kind.is_incomplete()
            && self.suppress_errors == 0
        {
            self.errors.push(b.clone());
        }
        let state = if value.as_bottom().is_some_and(|b| !b.kind.is_incomplete()) {
            NodeState::Errored
        } else {
            NodeState::Ready
        };
        let node = self.arena.get_mut(id);
        node.value = Some(value);
        node.state = state;
        Ok(())
    }

    /// Recursively finalizes the arcs behind a node's value.
    fn finalize_arcs(&mut self, id: NodeId) -> EvalResult<()> {
        match self.arena.get(id).value.clone() {
            Some(Value::Struct(n)) | Some(Value::List(n)) if n != id => {
                self.arena.get_mut(id).state = NodeState::Finalized;
                self.finalize(n, true)?;
                let bottom = self
                    .arena
                    .get(n)
                    .value
                    .as_ref()
                    .and_then(|v| v.as_bottom())
                    .filter(|b| !b.kind.is_incomplete())
                    .cloned();
                if let Some(b) = bottom {
                    let node = self.arena.get_mut(id);
                    node.value = Some(Value::from_bottom(b));
                    node.state = NodeState::Errored;
                }
                Ok(())
            }
            Some(Value::Struct(_)) | Some(Value::List(_)) => {
                self.arena.get_mut(id).state = NodeState::Finalized;
                let arcs: Vec<(Label, crate::graph::Arc)> =
                    self.arena.get(id).arcs.iter().map(|(l, a)| (*l, *a)).collect();
                let mut first_error: Option<Bottom> = None;
                for (_, arc) in arcs {
                    self.finalize(arc.node, true)?;
                    if arc.optional {
                        continue;
                    }
                    if let Some(b) = self.arena.get(arc.node).value.as_ref().and_then(|v| v.as_bottom())
                        && !b.kind.is_incomplete()
                        && first_error.is_none()
                    {
                        first_error = Some(b.clone());
                    }
                }
                if let Some(b) = first_error {
                    let node = self.arena.get_mut(id);
                    node.value = Some(Value::from_bottom(b));
                    node.state = NodeState::Errored;
                }
                Ok(())
            }
            _ => {
                self.arena.get_mut(id).state = NodeState::Finalized;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Value-level unification
    // ------------------------------------------------------------------

    /// Unifies two finalized (or at least `Ready`) values.
    pub(crate) fn unify_values(&mut self, a: Value, ca: CloseMode, b: Value, cb: CloseMode) -> EvalResult<Value> {
        self.arena.tracker.check_step()?;
        match (&a, &b) {
            (Value::Bottom(_), _) => return Ok(a),
            (_, Value::Bottom(_)) => return Ok(b),
            (Value::Top, _) => return Ok(b),
            (_, Value::Top) => return Ok(a),
            _ => {}
        }
        if matches!(a, Value::Disjunction(_)) || matches!(b, Value::Disjunction(_)) {
            return self.unify_disjunctions(a, ca, b, cb);
        }
        match (&a, &b) {
            (Value::Struct(_) | Value::List(_), Value::Struct(_) | Value::List(_)) => {
                let kind = match (&a, &b) {
                    (Value::List(_), Value::List(_)) => NodeKind::List,
                    (Value::Struct(_), Value::Struct(_)) => NodeKind::Struct,
                    _ => {
                        return Ok(Value::from_bottom(Bottom::with_msg(
                            ErrorKind::Conflict,
                            "conflicting values list and struct",
                        )));
                    }
                };
                let merged = self.arena.alloc(kind, None)?;
                let env = self.root_env;
                let mut left = Conjunct::value(a, env);
                left.close = ca;
                let mut right = Conjunct::value(b, env);
                right.close = cb;
                self.arena.get_mut(merged).push_conjunct(left);
                self.arena.get_mut(merged).push_conjunct(right);
                self.finalize(merged, false)?;
                Ok(self.arena.get(merged).value_or_top())
            }
            _ => Ok(crate::unify::meet(&a, &b)),
        }
    }
}
