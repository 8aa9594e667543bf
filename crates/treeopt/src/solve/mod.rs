//! Solver seam.
//!
//! Compilation produces a [`Program`]; a [`Solver`] turns it into an
//! [`Outcome`]. The returned [`Solution`] is the session handle every
//! post-solve read goes through: variable values, objective value and the
//! decode performed by [`Model::explain`](crate::encode::Model::explain).
//!
//! [`EnumerationSolver`] is an exact reference solver for small
//! bounded-integer programs. Production deployments implement [`Solver`] on
//! top of an external CP or MIP engine.

mod enumerate;

pub use enumerate::EnumerationSolver;

use crate::program::{LinExpr, Program, VarId};

// =============================================================================
// Solution
// =============================================================================

/// Values assigned to the variables of one program.
///
/// Values are indexed by arena position; variables that were never set read
/// as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solution {
    values: Vec<f64>,
    objective: Option<f64>,
}

impl Solution {
    /// Zero assignment sized for `program`.
    pub fn zeros(program: &Program) -> Self {
        Self {
            values: vec![0.0; program.var_capacity()],
            objective: None,
        }
    }

    /// Assignment from values in arena order.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values,
            objective: None,
        }
    }

    /// Value of a variable.
    #[inline]
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.index()).copied().unwrap_or(0.0)
    }

    /// Assign a variable, growing the value vector when needed.
    pub fn set(&mut self, var: VarId, value: f64) {
        let i = var.index();
        if i >= self.values.len() {
            self.values.resize(i + 1, 0.0);
        }
        self.values[i] = value;
    }

    /// Evaluate an expression under this assignment.
    pub fn eval(&self, expr: &LinExpr) -> f64 {
        expr.eval(|v| self.value(v))
    }

    /// Objective value reported by the solver, if the program had one.
    #[inline]
    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    pub fn with_objective(mut self, objective: Option<f64>) -> Self {
        self.objective = objective;
        self
    }

    /// Raw values in arena order.
    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

// =============================================================================
// Solver
// =============================================================================

/// Result of a successful solver run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// An optimal (or, without objective, any) feasible assignment.
    Solved(Solution),
    /// No assignment satisfies the program.
    Infeasible,
}

impl Outcome {
    #[inline]
    pub fn is_solved(&self) -> bool {
        matches!(self, Self::Solved(_))
    }

    pub fn solution(&self) -> Option<&Solution> {
        match self {
            Self::Solved(s) => Some(s),
            Self::Infeasible => None,
        }
    }

    pub fn into_solution(self) -> Option<Solution> {
        match self {
            Self::Solved(s) => Some(s),
            Self::Infeasible => None,
        }
    }
}

/// The solver could not decide the program.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolveError {
    /// The program uses a variable kind this solver cannot search.
    #[error("variable {name} cannot be enumerated: {reason}")]
    Unsupported { name: String, reason: &'static str },

    /// The search budget was exhausted before the search completed.
    #[error("node limit of {limit} exhausted")]
    NodeLimit { limit: u64 },
}

/// Anything that can solve a [`Program`].
pub trait Solver {
    /// Minimize the program's objective subject to its constraints.
    ///
    /// Without an objective any feasible assignment is returned.
    /// Infeasibility is a regular [`Outcome`], not an error.
    fn solve(&self, program: &Program) -> Result<Outcome, SolveError>;
}
