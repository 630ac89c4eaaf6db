//! The disjunction and default-mark algebra.
//!
//! A disjunction value carries `(value, marked-default)` terms. Syntactic
//! marks are normalized when the disjunction expression is evaluated; the
//! distribution laws apply at unification; default selection collapses a
//! disjunction to its default when a single value is demanded.

use crate::{
    errors::{Bottom, ErrorKind, EvalResult},
    eval::{Evaluator, Reduced},
    graph::{CloseMode, Conjunct, ConjunctSource, RefChain},
    resource::ResourceTracker,
    subsume::value_equal,
    value::{Disjunction, DisjunctTerm, Value},
};

impl<'ir, T: ResourceTracker> Evaluator<'ir, T> {
    /// Evaluates a disjunction expression, applying the mark-normalization
    /// rules:
    /// - an unmarked term contributes no default;
    /// - a `*`-marked term becomes its own default (all of it, when the
    ///   inner value is a markless disjunction);
    /// - a marked term that already carries defaults keeps them;
    /// - in a marked disjunction, unmarked nested disjunctions lose theirs.
    pub(crate) fn eval_disjunction_expr(
        &mut self,
        terms: &'ir [crate::ir::DisjunctExpr],
        env: crate::env::EnvId,
    ) -> EvalResult<Reduced> {
        let marked_disjunction = terms.iter().any(|t| t.default);
        let mut out: Vec<(Value, bool)> = Vec::with_capacity(terms.len());
        for term in terms {
            let value = match self.reduce(&term.expr, env)? {
                Reduced::Val { value, .. } => value,
                Reduced::Cycle(_) => Value::bottom(ErrorKind::Cycle),
            };
            match value {
                Value::Disjunction(inner) => {
                    if term.default {
                        if inner.has_default() {
                            // M2: the inner defaults survive.
                            out.extend(inner.terms.into_iter().map(|t| (t.value, t.default)));
                        } else {
                            // M1 over a markless inner: everything defaults.
                            out.extend(inner.terms.into_iter().map(|t| (t.value, true)));
                        }
                    } else if marked_disjunction {
                        // M3: strip nested defaults in a marked disjunction.
                        out.extend(inner.terms.into_iter().map(|t| (t.value, false)));
                    } else {
                        // D1/D2: plain disjoining keeps inner defaults.
                        out.extend(inner.terms.into_iter().map(|t| (t.value, t.default)));
                    }
                }
                v => out.push((v, term.default)),
            }
        }
        Ok(Reduced::value(self.rebuild_disjunction(out, ErrorKind::Conflict)))
    }

    /// Normalizes a term list into a disjunction value: bottom terms are
    /// removed, duplicate `(value, mark)` pairs collapse (a marked and an
    /// unmarked occurrence of the same value stay distinct), and a
    /// single-term disjunction collapses to that term.
    pub(crate) fn rebuild_disjunction(&mut self, terms: Vec<(Value, bool)>, empty_kind: ErrorKind) -> Value {
        let mut kept: Vec<DisjunctTerm> = Vec::with_capacity(terms.len());
        let mut first_bottom: Option<Bottom> = None;
        for (value, default) in terms {
            if let Some(b) = value.as_bottom() {
                if first_bottom.is_none() {
                    first_bottom = Some(b.clone());
                }
                continue;
            }
            let duplicate = kept
                .iter()
                .any(|t| t.default == default && value_equal(&self.arena, &t.value, &value));
            if !duplicate {
                kept.push(DisjunctTerm { value, default });
            }
        }
        match kept.len() {
            0 => match first_bottom {
                Some(b) => Value::from_bottom(b),
                None => Value::bottom_msg(empty_kind, "empty disjunction"),
            },
            1 => kept.pop().expect("len checked").value,
            _ => Value::Disjunction(Box::new(Disjunction { terms: kept })),
        }
    }

    /// Distributes unification over disjunction operands:
    /// `(⋁ aᵢ) & b = ⋁ (aᵢ & b)`, with the result term marked according to
    /// which operands carried defaults.
    pub(crate) fn unify_disjunctions(
        &mut self,
        a: Value,
        ca: CloseMode,
        b: Value,
        cb: CloseMode,
    ) -> EvalResult<Value> {
        let (a_terms, a_has) = disjunction_terms(a);
        let (b_terms, b_has) = disjunction_terms(b);
        let mut out = Vec::with_capacity(a_terms.len() * b_terms.len());
        self.suppress_errors += 1;
        let result = (|| -> EvalResult<()> {
            for ta in &a_terms {
                for tb in &b_terms {
                    // When both operands are aggregates the unification is a
                    // fresh merge; finalize it deeply so alternatives whose
                    // conflicts sit in arcs are eliminated. Identity results
                    // (a term passing through Top) stay lazy.
                    let deep = matches!(&ta.value, Value::Struct(_) | Value::List(_))
                        && matches!(&tb.value, Value::Struct(_) | Value::List(_));
                    let unified = self.unify_values(ta.value.clone(), ca, tb.value.clone(), cb)?;
                    let value = match unified {
                        Value::Struct(n) | Value::List(n) if deep => {
                            self.finalize(n, true)?;
                            self.arena.get(n).value_or_top()
                        }
                        v => v,
                    };
                    let default = match (a_has, b_has) {
                        (true, true) => ta.default && tb.default,
                        (true, false) => ta.default,
                        (false, true) => tb.default,
                        (false, false) => false,
                    };
                    out.push((value, default));
                }
            }
            Ok(())
        })();
        self.suppress_errors -= 1;
        result?;
        Ok(self.rebuild_disjunction(out, ErrorKind::Conflict))
    }

    /// Distributes a node's pending disjunction conjuncts over the rest of
    /// the node.
    ///
    /// For scalar nodes the distribution happens at the value level. For
    /// aggregates each combination of terms gets a clone of the node's other
    /// conjuncts plus the chosen terms; clones that fail are eliminated from
    /// the disjunction (this is where a structurally cyclic alternative
    /// drops out), and only if every combination fails is the node bottom.
    pub(crate) fn distribute_node_disjunctions(
        &mut self,
        id: crate::graph::NodeId,
        base: Value,
    ) -> EvalResult<Value> {
        let pending = std::mem::take(&mut self.arena.get_mut(id).pending_disjs);
        let sources = std::mem::take(&mut self.arena.get_mut(id).disjunct_conjuncts);
        if pending.is_empty() {
            return Ok(base);
        }

        if !self.arena.get(id).is_aggregate {
            let mut value = base;
            for d in pending {
                value = self.unify_disjunctions(value, CloseMode::Open, Value::Disjunction(Box::new(d)), CloseMode::Open)?;
                if value.is_bottom() {
                    return Ok(value);
                }
            }
            return Ok(value);
        }

        // Chains of the conjuncts the disjunctions came from; the chosen
        // terms inherit them so structural-cycle detection keeps working
        // through the distribution.
        let chains: Vec<RefChain> = sources
            .iter()
            .map(|&idx| self.arena.get(id).conjuncts[idx].chain.clone())
            .collect();
        let skip: ahash::AHashSet<usize> = sources.iter().copied().collect();
        let base_conjuncts: Vec<Conjunct<'ir>> = self
            .arena
            .get(id)
            .conjuncts
            .iter()
            .enumerate()
            .filter(|(i, _)| !skip.contains(i))
            .map(|(_, c)| c.clone())
            .collect();
        // Identities of the disjunction sources. Clones pre-mark them as
        // seen so that re-splitting a replayed `&` conjunct cannot
        // regenerate the disjunction being distributed.
        let skip_identities: Vec<(usize, u32)> = sources
            .iter()
            .filter_map(|&idx| self.arena.get(id).conjuncts[idx].identity())
            .collect();

        // Cartesian product over the pending disjunctions' terms.
        let mut combos: Vec<Vec<(Value, bool, bool)>> = vec![Vec::new()];
        for d in &pending {
            let has_default = d.has_default();
            let mut next = Vec::with_capacity(combos.len() * d.terms.len());
            for combo in &combos {
                for term in &d.terms {
                    let mut grown = combo.clone();
                    grown.push((term.value.clone(), term.default && has_default, has_default));
                    next.push(grown);
                }
            }
            combos = next;
        }

        let kind = self.arena.get(id).kind;
        let parent = self.arena.get(id).parent;
        let mut out = Vec::with_capacity(combos.len());
        for combo in combos {
            let clone = self.arena.alloc(kind, parent)?;
            for key in &skip_identities {
                self.arena.get_mut(clone).seen.insert(*key);
            }
            for c in &base_conjuncts {
                let mut fresh = c.clone();
                fresh.group = None;
                self.arena.get_mut(clone).push_conjunct(fresh);
            }
            for (i, (term, _, _)) in combo.iter().enumerate() {
                let conjunct = Conjunct {
                    source: ConjunctSource::Value(term.clone()),
                    env: self.root_env(),
                    close: CloseMode::Open,
                    embed: false,
                    from_comp: false,
                    group: None,
                    chain: chains.get(i).cloned().unwrap_or_default(),
                };
                self.arena.get_mut(clone).push_conjunct(conjunct);
            }
            // Deep finalization: an alternative whose conflict sits in an
            // arc must still be eliminated, and its failure is selection,
            // not an error.
            self.suppress_errors += 1;
            let finalized = self.finalize(clone, true);
            self.suppress_errors -= 1;
            finalized?;
            let value = self.arena.get(clone).value_or_top();
            // Combined mark: every defaulted disjunction must have chosen a
            // marked term; disjunctions without defaults do not veto.
            let relevant: Vec<&(Value, bool, bool)> = combo.iter().filter(|(_, _, has)| *has).collect();
            let default = !relevant.is_empty() && relevant.iter().all(|(_, marked, _)| *marked);
            out.push((value, default));
        }

        Ok(self.rebuild_disjunction(out, ErrorKind::Conflict))
    }

    /// Selects the value an operation other than unification or disjunction
    /// consults: the default when one exists, the sole term of a singleton,
    /// otherwise incomplete. When several marked defaults tie, the combined
    /// default is their meet; a bottom meet means there is no default.
    pub(crate) fn value_for_use(&mut self, value: Value) -> EvalResult<Value> {
        let d = match value {
            Value::Disjunction(d) => d,
            other => return Ok(other),
        };
        let marked: Vec<Value> = d
            .terms
            .iter()
            .filter(|t| t.default)
            .map(|t| t.value.clone())
            .collect();
        if marked.is_empty() {
            if d.terms.len() == 1 {
                let only = d.terms.into_iter().next().expect("len checked").value;
                return self.value_for_use(only);
            }
            return Ok(Value::bottom_msg(
                ErrorKind::Incomplete,
                "ambiguous disjunction: no default",
            ));
        }
        let mut combined: Option<Value> = None;
        self.suppress_errors += 1;
        let result = (|| -> EvalResult<()> {
            for m in marked {
                combined = Some(match combined.take() {
                    None => m,
                    Some(acc) => self.unify_values(acc, CloseMode::Open, m, CloseMode::Open)?,
                });
            }
            Ok(())
        })();
        self.suppress_errors -= 1;
        result?;
        let combined = combined.expect("at least one marked term");
        if combined.is_bottom() {
            return Ok(Value::bottom_msg(
                ErrorKind::Incomplete,
                "ambiguous disjunction: defaults conflict",
            ));
        }
        self.value_for_use(combined)
    }

    /// Default selection applied to a freshly reduced operand.
    pub(crate) fn reduced_for_use(&mut self, reduced: Reduced) -> EvalResult<Value> {
        match reduced {
            Reduced::Val { value, .. } => self.value_for_use(value),
            Reduced::Cycle(_) => Ok(Value::bottom_msg(
                ErrorKind::Cycle,
                "operand depends on a value under evaluation",
            )),
        }
    }

    /// Joins already-evaluated values into a disjunction (the `or` builtin).
    pub(crate) fn disjoin_values(&mut self, values: Vec<Value>, empty_kind: ErrorKind) -> Value {
        let mut terms = Vec::with_capacity(values.len());
        for v in values {
            match v {
                Value::Disjunction(d) => terms.extend(d.terms.into_iter().map(|t| (t.value, t.default))),
                v => terms.push((v, false)),
            }
        }
        self.rebuild_disjunction(terms, empty_kind)
    }
}

/// Splits a value into disjunction terms plus whether it carried defaults;
/// a non-disjunction is its own single term.
fn disjunction_terms(v: Value) -> (Vec<DisjunctTerm>, bool) {
    match v {
        Value::Disjunction(d) => {
            let has = d.has_default();
            (d.terms, has)
        }
        v => (
            vec![DisjunctTerm {
                value: v,
                default: false,
            }],
            false,
        ),
    }
}
