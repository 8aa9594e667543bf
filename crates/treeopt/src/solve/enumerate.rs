//! Exhaustive branch-and-bound over bounded-integer programs.
//!
//! Variables are fixed in declaration order, smallest value first. After each
//! assignment every constraint touching the variable is checked against the
//! interval its expression can still reach; the objective's lower bound
//! prunes against the incumbent.

use super::{Outcome, SolveError, Solution, Solver};
use crate::config::SolverOptions;
use crate::program::{Constraint, LinExpr, Program, Sense, VarId, VarKind};

const TOL: f64 = 1e-6;

/// Exact solver for programs whose variables are all bounded integers.
#[derive(Debug, Clone, Default)]
pub struct EnumerationSolver {
    options: SolverOptions,
}

impl EnumerationSolver {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    #[inline]
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }
}

impl Solver for EnumerationSolver {
    fn solve(&self, program: &Program) -> Result<Outcome, SolveError> {
        let mut search = Search::new(program, self.options.node_limit)?;
        if !search.root_consistent() {
            tracing::debug!("program infeasible at root");
            return Ok(Outcome::Infeasible);
        }
        search.descend(0)?;
        tracing::debug!(nodes = search.nodes, solved = search.best.is_some(), "enumeration finished");

        Ok(match search.best {
            Some((value, values)) => Outcome::Solved(
                Solution::from_values(values).with_objective(program.objective().map(|_| value)),
            ),
            None => Outcome::Infeasible,
        })
    }
}

// =============================================================================
// Search state
// =============================================================================

struct Search<'a> {
    order: Vec<VarId>,
    lb: Vec<f64>,
    ub: Vec<f64>,
    constraints: Vec<&'a Constraint>,
    /// Constraint positions touching each variable, by arena index.
    watch: Vec<Vec<usize>>,
    objective: Option<&'a LinExpr>,
    best: Option<(f64, Vec<f64>)>,
    nodes: u64,
    limit: u64,
}

impl<'a> Search<'a> {
    fn new(program: &'a Program, limit: u64) -> Result<Self, SolveError> {
        let n = program.var_capacity();
        let mut lb = vec![0.0; n];
        let mut ub = vec![0.0; n];
        let mut order = Vec::with_capacity(program.n_vars());

        for (id, var) in program.vars() {
            if var.kind == VarKind::Continuous {
                return Err(SolveError::Unsupported {
                    name: var.name.clone(),
                    reason: "continuous variable",
                });
            }
            if !var.is_bounded_integer() {
                return Err(SolveError::Unsupported {
                    name: var.name.clone(),
                    reason: "unbounded domain",
                });
            }
            lb[id.index()] = var.lb.ceil();
            ub[id.index()] = var.ub.floor();
            order.push(id);
        }

        let constraints: Vec<&Constraint> = program.constraints().map(|(_, c)| c).collect();
        let mut watch = vec![Vec::new(); n];
        for (pos, c) in constraints.iter().enumerate() {
            let mut vars = c.vars();
            vars.sort();
            vars.dedup();
            for v in vars {
                watch[v.index()].push(pos);
            }
        }

        Ok(Self {
            order,
            lb,
            ub,
            constraints,
            watch,
            objective: program.objective(),
            best: None,
            nodes: 0,
            limit,
        })
    }

    fn root_consistent(&self) -> bool {
        self.order
            .iter()
            .all(|v| self.lb[v.index()] <= self.ub[v.index()])
            && self.constraints.iter().all(|c| self.may_hold(c))
    }

    fn descend(&mut self, depth: usize) -> Result<(), SolveError> {
        self.nodes += 1;
        if self.nodes > self.limit {
            return Err(SolveError::NodeLimit { limit: self.limit });
        }
        if let (Some(objective), Some((incumbent, _))) = (self.objective, &self.best) {
            if self.interval(objective).0 >= incumbent - TOL {
                return Ok(());
            }
        }

        let Some(&var) = self.order.get(depth) else {
            let value = self
                .objective
                .map_or(0.0, |o| o.eval(|v| self.lb[v.index()]));
            self.best = Some((value, self.lb.clone()));
            return Ok(());
        };

        let i = var.index();
        let (lo, hi) = (self.lb[i], self.ub[i]);
        let mut value = lo;
        while value <= hi {
            self.lb[i] = value;
            self.ub[i] = value;
            if self.watch[i].iter().all(|&c| self.may_hold(self.constraints[c])) {
                self.descend(depth + 1)?;
                if self.objective.is_none() && self.best.is_some() {
                    break;
                }
            }
            value += 1.0;
        }
        self.lb[i] = lo;
        self.ub[i] = hi;
        Ok(())
    }

    /// Range `[min, max]` an expression can take within the current bounds.
    fn interval(&self, expr: &LinExpr) -> (f64, f64) {
        expr.terms().iter().fold(
            (expr.constant_term(), expr.constant_term()),
            |(lo, hi), &(v, c)| {
                let (a, b) = (c * self.lb[v.index()], c * self.ub[v.index()]);
                (lo + a.min(b), hi + a.max(b))
            },
        )
    }

    /// Whether the constraint can still be satisfied within the current bounds.
    fn may_hold(&self, constraint: &Constraint) -> bool {
        match constraint {
            Constraint::Linear { expr, sense, rhs } => {
                let (lo, hi) = self.interval(expr);
                match sense {
                    Sense::Le => lo <= rhs + TOL,
                    Sense::Ge => hi >= rhs - TOL,
                    Sense::Eq => lo <= rhs + TOL && hi >= rhs - TOL,
                }
            }
            Constraint::AbsEq { target, expr } => {
                let (lo, hi) = self.interval(expr);
                let (abs_lo, abs_hi) = if lo >= 0.0 {
                    (lo, hi)
                } else if hi <= 0.0 {
                    (-hi, -lo)
                } else {
                    (0.0, hi.max(-lo))
                };
                let (t_lo, t_hi) = (self.lb[target.index()], self.ub[target.index()]);
                t_lo <= abs_hi + TOL && t_hi >= abs_lo - TOL
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_objective() {
        // min x + y  s.t.  x + 2y >= 3,  x, y in [0, 3]
        let mut p = Program::new();
        let x = p.add_integer(0.0, 3.0, "x");
        let y = p.add_integer(0.0, 3.0, "y");
        p.add_constraint((LinExpr::from(x) + LinExpr::term(y, 2.0)).geq(3.0), "cover");
        p.set_objective(LinExpr::from(x) + y);

        let outcome = EnumerationSolver::default().solve(&p).unwrap();
        let s = outcome.solution().unwrap();
        assert_eq!(s.objective(), Some(2.0));
        assert!(p.is_feasible(s, 1e-9));
    }

    #[test]
    fn reports_infeasible() {
        let mut p = Program::new();
        let x = p.add_binary("x");
        let y = p.add_binary("y");
        p.add_constraint((LinExpr::from(x) + y).geq(3.0), "impossible");
        assert_eq!(EnumerationSolver::default().solve(&p).unwrap(), Outcome::Infeasible);

        let mut q = Program::new();
        q.add_constraint(LinExpr::constant(1.0).leq(0.0), "constant");
        assert_eq!(EnumerationSolver::default().solve(&q).unwrap(), Outcome::Infeasible);
    }

    #[test]
    fn handles_absolute_value() {
        // min u  s.t.  u == |x - 2|,  x >= 4
        let mut p = Program::new();
        let x = p.add_integer(0.0, 5.0, "x");
        let u = p.add_integer(0.0, 5.0, "u");
        p.add_constraint(Constraint::abs_eq(u, LinExpr::from(x) - 2.0), "abs");
        p.add_constraint(LinExpr::from(x).geq(4.0), "floor");
        p.set_objective(u.into());

        let s = EnumerationSolver::default()
            .solve(&p)
            .unwrap()
            .into_solution()
            .unwrap();
        assert_eq!(s.value(x), 4.0);
        assert_eq!(s.value(u), 2.0);
    }

    #[test]
    fn skips_removed_variables() {
        let mut p = Program::new();
        let gone = p.add_continuous(0.0, 1.0, "gone");
        let x = p.add_binary("x");
        p.remove_var(gone);
        p.add_constraint(LinExpr::from(x).equals(1.0), "fix");

        let s = EnumerationSolver::default().solve(&p).unwrap().into_solution().unwrap();
        assert_eq!(s.value(x), 1.0);
        assert_eq!(s.objective(), None);
    }

    #[test]
    fn rejects_continuous_and_respects_limit() {
        let mut p = Program::new();
        p.add_continuous(0.0, 1.0, "z");
        assert!(matches!(
            EnumerationSolver::default().solve(&p),
            Err(SolveError::Unsupported { .. })
        ));

        let mut q = Program::new();
        let vars: Vec<_> = (0..12).map(|i| q.add_binary(format!("b{i}"))).collect();
        q.set_objective(LinExpr::sum_of(vars.iter().copied()) * -1.0 + 100.0);
        let solver = EnumerationSolver::new(SolverOptions { node_limit: 10 });
        assert_eq!(solver.solve(&q), Err(SolveError::NodeLimit { limit: 10 }));
    }
}
