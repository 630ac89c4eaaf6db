//! Comprehension clauses: `for`/`if`/`let` chains that emit embeddings.

use crate::{
    env::EnvId,
    errors::{Bottom, ErrorKind, EvalResult},
    eval::{Evaluator, Reduced},
    graph::{Conjunct, ConjunctSource, NodeId, PendingComp},
    ir::Clause,
    resource::ResourceTracker,
    value::Value,
};

impl<'ir, T: ResourceTracker> Evaluator<'ir, T> {
    /// Runs a struct-level comprehension: each completed clause iteration
    /// embeds the body's declarations into the host node.
    pub(crate) fn run_struct_comprehension(&mut self, id: NodeId, comp: PendingComp<'ir>) -> EvalResult<()> {
        match self.comprehension_envs(id, comp.clauses, comp.env)? {
            Err(bottom) => {
                self.fold_scalar(id, Value::from_bottom(bottom));
                Ok(())
            }
            Ok(envs) => {
                for env in envs {
                    self.arena.get_mut(id).push_conjunct(Conjunct {
                        source: ConjunctSource::Decls(comp.body),
                        env,
                        close: comp.close,
                        embed: false,
                        from_comp: true,
                        group: comp.group,
                        chain: comp.chain.clone(),
                    });
                }
                Ok(())
            }
        }
    }

    /// Evaluates a clause chain, returning one environment per completed
    /// iteration (or the bottom that aborted the whole comprehension).
    ///
    /// While clauses run, references to fields of `host` that were
    /// themselves generated by comprehensions are cyclic and rejected.
    pub(crate) fn comprehension_envs(
        &mut self,
        host: NodeId,
        clauses: &'ir [Clause],
        env: EnvId,
    ) -> EvalResult<Result<Vec<EnvId>, Bottom>> {
        self.comp_scopes.push(host);
        let mut out = Vec::new();
        let result = self.clause_rec(clauses, env, &mut out);
        self.comp_scopes.pop();
        match result? {
            Some(bottom) => Ok(Err(bottom)),
            None => Ok(Ok(out)),
        }
    }

    fn clause_rec(
        &mut self,
        clauses: &'ir [Clause],
        env: EnvId,
        out: &mut Vec<EnvId>,
    ) -> EvalResult<Option<Bottom>> {
        self.arena.tracker.check_step()?;
        let Some((clause, rest)) = clauses.split_first() else {
            out.push(env);
            return Ok(None);
        };
        match clause {
            Clause::If { cond } => {
                let reduced = self.reduce(cond, env)?;
                let value = self.reduced_for_use(reduced)?;
                match value {
                    Value::Bool(true) => self.clause_rec(rest, env, out),
                    Value::Bool(false) => Ok(None),
                    Value::Bottom(b) => Ok(Some(*b)),
                    other => Ok(Some(Bottom::mismatch("bool", other.kind_name()))),
                }
            }
            Clause::Let { name, value } => {
                let reduced = self.reduce(value, env)?;
                let value = match reduced {
                    Reduced::Val { value, .. } => value,
                    Reduced::Cycle(_) => return Ok(Some(Bottom::new(ErrorKind::Cycle))),
                };
                let scope = self.envs.frame(env).scope;
                let frame = self.envs.push(Some(env), scope);
                self.envs.bind_var(frame, *name, value);
                self.clause_rec(rest, frame, out)
            }
            Clause::For { key, value, source } => {
                let reduced = self.reduce(source, env)?;
                let src = self.reduced_for_use(reduced)?;
                match src {
                    Value::Bottom(b) => Ok(Some(*b)),
                    Value::Struct(n) | Value::List(n) => {
                        self.finalize(n, false)?;
                        let arcs: Vec<(crate::ir::Label, crate::graph::Arc)> =
                            self.arena.get(n).arcs.iter().map(|(l, a)| (*l, *a)).collect();
                        for (label, arc) in arcs {
                            // Iteration covers regular, non-optional fields
                            // (hidden and definition arcs stay internal).
                            if !label.is_regular() || arc.optional {
                                continue;
                            }
                            let elem = match self.arc_result(arc.node, crate::graph::CloseMode::Open)? {
                                Reduced::Val { value, .. } => value,
                                Reduced::Cycle(_) => return Ok(Some(Bottom::new(ErrorKind::Cycle))),
                            };
                            let label_val = self.label_value(label);
                            let scope = self.envs.frame(env).scope;
                            let frame = self.envs.push(Some(env), scope);
                            if let Some(key) = key {
                                self.envs.bind_var(frame, *key, label_val);
                            }
                            self.envs.bind_var(frame, *value, elem);
                            if let Some(b) = self.clause_rec(rest, frame, out)? {
                                return Ok(Some(b));
                            }
                        }
                        Ok(None)
                    }
                    other => Ok(Some(Bottom::mismatch("struct or list", other.kind_name()))),
                }
            }
        }
    }
}
