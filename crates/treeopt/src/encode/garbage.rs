//! Retraction of query artifacts.
//!
//! Every variable, constraint or objective a query adds on top of the
//! compiled base model is registered here together with the batch (query)
//! that created it. Retracting removes artifacts newest first and returns the
//! program to its state before those queries.

use std::fmt;

use crate::program::{ConstrId, Program, VarId};

/// Identifier of one query batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchId(u32);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch#{}", self.0)
    }
}

/// Something a query added to the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    Var(VarId),
    Constraint(ConstrId),
    /// The program objective.
    Objective,
}

/// Ordered record of query artifacts.
#[derive(Debug, Clone, Default)]
pub struct GarbageTracker {
    entries: Vec<(Artifact, BatchId)>,
    next_batch: u32,
}

impl GarbageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new batch.
    pub fn begin(&mut self) -> BatchId {
        let batch = BatchId(self.next_batch);
        self.next_batch += 1;
        batch
    }

    /// Register an artifact under `batch`.
    pub fn track(&mut self, artifact: Artifact, batch: BatchId) {
        self.entries.push((artifact, batch));
    }

    /// Batch that created `artifact`, if it is still tracked.
    pub fn batch_of(&self, artifact: Artifact) -> Option<BatchId> {
        self.entries
            .iter()
            .rev()
            .find(|(a, _)| *a == artifact)
            .map(|&(_, b)| b)
    }

    /// Tracked artifacts in registration order.
    pub fn entries(&self) -> &[(Artifact, BatchId)] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every tracked artifact from `program`, newest first.
    ///
    /// Returns the number of artifacts retracted.
    pub fn cleanup(&mut self, program: &mut Program) -> usize {
        let n = self.entries.len();
        while let Some((artifact, _)) = self.entries.pop() {
            retract(program, artifact);
        }
        n
    }
}

fn retract(program: &mut Program, artifact: Artifact) {
    match artifact {
        Artifact::Var(v) => {
            program.remove_var(v);
        }
        Artifact::Constraint(c) => {
            program.remove_constraint(c);
        }
        Artifact::Objective => {
            program.clear_objective();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::LinExpr;

    #[test]
    fn cleanup_restores_base_program() {
        let mut p = Program::new();
        let base = p.add_binary("base");
        p.add_constraint(LinExpr::from(base).leq(1.0), "base");

        let mut g = GarbageTracker::new();
        let batch = g.begin();
        let u = p.add_integer(0.0, 3.0, "u");
        g.track(Artifact::Var(u), batch);
        let c = p.add_constraint(LinExpr::from(u).geq(base), "link");
        g.track(Artifact::Constraint(c), batch);
        p.set_objective(u.into());
        g.track(Artifact::Objective, batch);

        assert_eq!(g.batch_of(Artifact::Var(u)), Some(batch));
        assert_eq!(g.cleanup(&mut p), 3);
        assert!(g.is_empty());
        assert_eq!(p.n_vars(), 1);
        assert_eq!(p.n_constraints(), 1);
        assert!(p.objective().is_none());
        assert_eq!(g.cleanup(&mut p), 0);
    }

    #[test]
    fn cleanup_spans_every_batch() {
        let mut p = Program::new();
        let x = p.add_binary("x");
        let y = p.add_binary("y");
        let mut g = GarbageTracker::new();

        let first = g.begin();
        let a = p.add_constraint(LinExpr::from(x).geq(0.0), "a");
        g.track(Artifact::Constraint(a), first);
        p.set_objective(x.into());
        g.track(Artifact::Objective, first);

        let second = g.begin();
        assert_ne!(first, second);
        let b = p.add_constraint(LinExpr::from(y).leq(1.0), "b");
        g.track(Artifact::Constraint(b), second);
        p.set_objective(y.into());
        g.track(Artifact::Objective, second);

        assert_eq!(g.batch_of(Artifact::Constraint(a)), Some(first));
        assert_eq!(g.batch_of(Artifact::Objective), Some(second));
        assert_eq!(g.cleanup(&mut p), 4);
        assert!(p.constraint(a).is_none());
        assert!(p.constraint(b).is_none());
        assert!(p.objective().is_none());
    }
}
