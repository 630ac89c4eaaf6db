//! Lexical environments.
//!
//! An environment is an immutable chain of frames, each tying a scope to a
//! node in the graph: identifier resolution walks the chain, checking each
//! frame's let bindings and comprehension variables, then the arcs of the
//! frame's scope node. Frames live in an arena and are shared by id, so a
//! conjunct's environment survives being replayed into many nodes.

use ahash::AHashMap;

use crate::{graph::NodeId, intern::StringId, ir::Expr, value::Value};

/// Index of a frame in the environment arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EnvId(u32);

impl EnvId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Resolution state of a lazy `let` binding.
#[derive(Debug, Clone)]
pub(crate) enum LetState {
    Unresolved,
    /// Currently being resolved; a lookup in this state is a reference cycle.
    Resolving,
    Resolved(Value),
}

/// A struct-scope `let`: evaluated on first use, memoized per frame.
#[derive(Debug, Clone)]
pub(crate) struct LetSlot<'ir> {
    pub expr: &'ir Expr,
    pub state: LetState,
}

/// One frame of the lexical scope chain.
#[derive(Debug)]
pub(crate) struct Frame<'ir> {
    pub parent: Option<EnvId>,
    /// Node whose arcs are in scope for identifier resolution.
    pub scope: NodeId,
    /// Lazy `let` declarations of the scope's struct body.
    pub lets: AHashMap<StringId, LetSlot<'ir>>,
    /// Comprehension variables and clause lets, bound to concrete values.
    pub vars: AHashMap<StringId, Value>,
}

/// Arena of environment frames for one evaluation.
#[derive(Debug, Default)]
pub(crate) struct Envs<'ir> {
    frames: Vec<Frame<'ir>>,
}

impl<'ir> Envs<'ir> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a new frame whose scope is `scope`.
    pub fn push(&mut self, parent: Option<EnvId>, scope: NodeId) -> EnvId {
        let id = EnvId(u32::try_from(self.frames.len()).expect("environment arena overflow"));
        self.frames.push(Frame {
            parent,
            scope,
            lets: AHashMap::new(),
            vars: AHashMap::new(),
        });
        id
    }

    pub fn frame(&self, id: EnvId) -> &Frame<'ir> {
        &self.frames[id.index()]
    }

    pub fn frame_mut(&mut self, id: EnvId) -> &mut Frame<'ir> {
        &mut self.frames[id.index()]
    }

    /// Binds a comprehension variable in an existing frame.
    pub fn bind_var(&mut self, env: EnvId, name: StringId, value: Value) {
        self.frame_mut(env).vars.insert(name, value);
    }

    /// Registers a lazy let binding in an existing frame.
    pub fn bind_let(&mut self, env: EnvId, name: StringId, expr: &'ir Expr) {
        self.frame_mut(env).lets.insert(
            name,
            LetSlot {
                expr,
                state: LetState::Unresolved,
            },
        );
    }
}
