//! The node graph behind struct and list values.
//!
//! Nodes live in an arena and are addressed by stable `NodeId` indices; arcs
//! own their child nodes by id and parent links are ids too, so the graph is
//! cyclic-navigable with no ownership cycles. Arc maps preserve insertion
//! order, which is the observable iteration order of struct fields.

use ahash::AHashSet;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    env::EnvId,
    errors::EvalResult,
    ir::{Clause, Decl, Expr, Label},
    resource::ResourceTracker,
    value::{Disjunction, Value},
};

/// Stable index of a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Evaluation state of a node.
///
/// `Ready` means the node's own value is computed but its arcs have not been
/// recursively finalized; references may read a `Ready` node while the deep
/// pass is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    Unprocessed,
    Evaluating,
    Ready,
    Finalized,
    Errored,
}

/// Whether a node backs a struct or a list value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Struct,
    List,
}

/// A labeled child of a node.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Arc {
    pub node: NodeId,
    pub optional: bool,
    pub required: bool,
    /// Set while every conjunct of the arc came from comprehension
    /// embeddings; such arcs may not be referenced by sibling comprehension
    /// clauses.
    pub from_comprehension: bool,
}

/// How strongly a conjunct closes the structs it contributes.
///
/// `Level` closes one level (the `close()` builtin); `Deep` closes
/// recursively (references through definitions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum CloseMode {
    Open,
    Level,
    Deep,
}

impl CloseMode {
    /// The mode child conjuncts inherit: only `Deep` propagates.
    #[must_use]
    pub fn child(self) -> Self {
        if self == Self::Deep { Self::Deep } else { Self::Open }
    }

    #[must_use]
    pub fn closes(self) -> bool {
        self != Self::Open
    }
}

/// Provenance chain of a conjunct: the nodes whose conjunct lists were
/// replayed to produce it. A repeat in the chain flags a potential
/// structural cycle.
pub(crate) type RefChain = SmallVec<[NodeId; 4]>;

/// What a conjunct contributes: an unreduced expression, a declaration
/// block, or an already computed value.
#[derive(Debug, Clone)]
pub(crate) enum ConjunctSource<'ir> {
    Expr(&'ir Expr),
    Decls(&'ir [Decl]),
    Value(Value),
}

/// One unreduced contribution to a node, with the environment it is
/// evaluated under and its closedness provenance.
#[derive(Debug, Clone)]
pub(crate) struct Conjunct<'ir> {
    pub source: ConjunctSource<'ir>,
    pub env: EnvId,
    pub close: CloseMode,
    /// True when the conjunct is an embedding: it adds arcs without closing
    /// the host node.
    pub embed: bool,
    /// True when the conjunct was emitted by a comprehension.
    pub from_comp: bool,
    /// Close group this conjunct's labels feed, if any.
    pub group: Option<usize>,
    pub chain: RefChain,
}

impl<'ir> Conjunct<'ir> {
    pub fn expr(expr: &'ir Expr, env: EnvId) -> Self {
        Self {
            source: ConjunctSource::Expr(expr),
            env,
            close: CloseMode::Open,
            embed: false,
            from_comp: false,
            group: None,
            chain: RefChain::new(),
        }
    }

    pub fn value(value: Value, env: EnvId) -> Self {
        Self {
            source: ConjunctSource::Value(value),
            env,
            close: CloseMode::Open,
            embed: false,
            from_comp: false,
            group: None,
            chain: RefChain::new(),
        }
    }

    /// Identity key used to de-duplicate logically equal conjuncts: the
    /// source's address plus the environment it is closed over. Value
    /// conjuncts have no stable identity and are never de-duplicated
    /// directly (the conjuncts they replay are).
    pub fn identity(&self) -> Option<(usize, u32)> {
        match self.source {
            ConjunctSource::Expr(expr) => Some((std::ptr::from_ref(expr) as usize, self.env.raw())),
            ConjunctSource::Decls(decls) => Some((decls.as_ptr() as usize, self.env.raw())),
            ConjunctSource::Value(_) => None,
        }
    }
}

/// A pattern constraint `[matcher]: value` registered on a node.
#[derive(Debug, Clone)]
pub(crate) struct PatternConstraint<'ir> {
    /// The matcher, reduced to a value at registration time.
    pub matcher: Value,
    pub value: &'ir Expr,
    pub env: EnvId,
    pub close: CloseMode,
}

/// An ellipsis constraint `...expr` registered on a node (also the open
/// tail of a list).
#[derive(Debug, Clone)]
pub(crate) struct EllipsisConstraint<'ir> {
    pub value: Option<&'ir Expr>,
    pub env: EnvId,
}

/// Labels one closing conjunct admits. When a node is closed, every regular
/// arc must be admitted by every one of its close groups.
#[derive(Debug, Default)]
pub(crate) struct CloseGroup {
    pub labels: AHashSet<Label>,
    /// Matchers of pattern constraints declared within the closing source.
    pub patterns: Vec<Value>,
    /// An ellipsis inside the closing source keeps it open; the group then
    /// admits everything.
    pub open: bool,
}

impl CloseGroup {
    pub fn admits(&self, label: Label, label_value: &Value) -> bool {
        if self.open || self.labels.contains(&label) {
            return true;
        }
        self.patterns
            .iter()
            .any(|m| !crate::unify::meet(m, label_value).is_bottom())
    }
}

/// A comprehension waiting for its siblings before iterating.
#[derive(Debug, Clone)]
pub(crate) struct PendingComp<'ir> {
    pub clauses: &'ir [Clause],
    pub body: &'ir [Decl],
    pub env: EnvId,
    pub close: CloseMode,
    /// Close group the emitted fields feed (set for comprehensions declared
    /// inside a closing literal).
    pub group: Option<usize>,
    pub chain: RefChain,
}

/// Length and tail shape contributed by one list conjunct.
#[derive(Debug, Clone)]
pub(crate) struct ListShape<'ir> {
    pub len: usize,
    /// `Some` when the source list had an open tail.
    pub tail: Option<EllipsisConstraint<'ir>>,
}

/// A struct or list node: ordered arcs, accumulated conjuncts, and
/// closedness bookkeeping.
#[derive(Debug)]
pub(crate) struct Node<'ir> {
    pub kind: NodeKind,
    pub state: NodeState,
    /// Enclosing node; `None` for roots and merge results.
    pub parent: Option<NodeId>,
    /// Ordered arcs; labels are unique per node.
    pub arcs: IndexMap<Label, Arc>,
    /// Accumulated conjuncts. Never drained: the list doubles as the replay
    /// source when this node is unified into another one.
    pub conjuncts: Vec<Conjunct<'ir>>,
    /// Identity keys of conjuncts already present.
    pub seen: AHashSet<(usize, u32)>,
    /// Indices of conjuncts that reduced to disjunctions; excluded when the
    /// node's conjuncts are cloned for per-term distribution.
    pub disjunct_conjuncts: Vec<usize>,
    /// The reduced value, set exactly once.
    pub value: Option<Value>,
    pub closed: bool,
    pub close_groups: Vec<CloseGroup>,
    pub patterns: Vec<PatternConstraint<'ir>>,
    pub ellipsis: Option<EllipsisConstraint<'ir>>,
    /// Scalar conjuncts folded by the meet as they are processed.
    pub scalar: Option<Value>,
    /// Disjunction-valued conjuncts, distributed at the value phase.
    pub pending_disjs: Vec<Disjunction>,
    /// Comprehensions deferred until sibling structure exists.
    pub pending_comps: Vec<PendingComp<'ir>>,
    /// Shapes of the list literals unified into this node.
    pub list_shapes: Vec<ListShape<'ir>>,
    /// Saw a struct or list contribution.
    pub is_aggregate: bool,
    /// A self-referential conjunct was dropped (reference cycle).
    pub saw_cycle: bool,
    /// Atoms asserted by cyclic references, checked after reduction.
    pub pending_checks: Vec<Value>,
}

impl<'ir> Node<'ir> {
    fn new(kind: NodeKind, parent: Option<NodeId>) -> Self {
        Self {
            kind,
            state: NodeState::Unprocessed,
            parent,
            arcs: IndexMap::new(),
            conjuncts: Vec::new(),
            seen: AHashSet::new(),
            disjunct_conjuncts: Vec::new(),
            value: None,
            closed: false,
            close_groups: Vec::new(),
            patterns: Vec::new(),
            ellipsis: None,
            scalar: None,
            pending_disjs: Vec::new(),
            pending_comps: Vec::new(),
            list_shapes: Vec::new(),
            is_aggregate: false,
            saw_cycle: false,
            pending_checks: Vec::new(),
        }
    }

    /// Appends a conjunct unless an identical one is already present.
    /// Returns true when the conjunct was new.
    pub fn push_conjunct(&mut self, conjunct: Conjunct<'ir>) -> bool {
        if let Some(key) = conjunct.identity()
            && !self.seen.insert(key)
        {
            return false;
        }
        self.conjuncts.push(conjunct);
        true
    }

    /// The value the node settled on, or `Top` while still unset.
    pub fn value_or_top(&self) -> Value {
        self.value.clone().unwrap_or(Value::Top)
    }
}

/// Arena that owns every node of one evaluation.
///
/// Generic over `T: ResourceTracker` so embedder limits apply to node
/// allocation; with the default tracker the checks compile away.
#[derive(Debug)]
pub(crate) struct NodeArena<'ir, T: ResourceTracker> {
    nodes: Vec<Node<'ir>>,
    pub tracker: T,
}

impl<'ir, T: ResourceTracker> NodeArena<'ir, T> {
    pub fn new(tracker: T) -> Self {
        Self {
            nodes: Vec::new(),
            tracker,
        }
    }

    /// Allocates a fresh node, charging the tracker.
    pub fn alloc(&mut self, kind: NodeKind, parent: Option<NodeId>) -> EvalResult<NodeId> {
        self.tracker.check_node()?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(kind, parent));
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> &Node<'ir> {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node<'ir> {
        &mut self.nodes[id.index()]
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when `anc` is a strict ancestor of `node` along parent links.
    ///
    /// Used to distinguish structural cycles (a node demanded from within
    /// its own subtree) from plain reference cycles.
    pub fn is_strict_ancestor(&self, anc: NodeId, node: NodeId) -> bool {
        let mut cur = self.get(node).parent;
        while let Some(p) = cur {
            if p == anc {
                return true;
            }
            cur = self.get(p).parent;
        }
        false
    }

    /// Direct arc lookup.
    pub fn lookup(&self, node: NodeId, label: Label) -> Option<Arc> {
        self.get(node).arcs.get(&label).copied()
    }

    /// Moves the nodes out, dropping the tracker.
    pub fn into_nodes(self) -> Vec<Node<'ir>> {
        self.nodes
    }

    /// Rebuilds an arena around existing nodes with a fresh tracker.
    pub fn from_nodes(nodes: Vec<Node<'ir>>, tracker: T) -> Self {
        Self { nodes, tracker }
    }
}
