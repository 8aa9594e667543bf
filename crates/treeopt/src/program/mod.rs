//! Solver-agnostic optimization program.
//!
//! A [`Program`] is an arena of decision variables and constraints addressed
//! by typed handles ([`VarId`], [`ConstrId`]), plus an optional minimization
//! objective. Entries can be removed again; removal leaves a tombstone so
//! handles of the remaining entries stay valid.
//!
//! Variable and constraint names are debug metadata only.

pub mod expr;

pub use expr::{ConstrId, Constraint, LinExpr, Sense, VarId};

use crate::solve::Solution;
use crate::utils::is_integral;

/// Kind of decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    /// 0/1 variable.
    Binary,
    /// Integer variable within bounds.
    Integer,
    /// Real variable within bounds.
    Continuous,
}

/// Declaration of a decision variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VarInfo {
    pub kind: VarKind,
    pub lb: f64,
    pub ub: f64,
    pub name: String,
}

impl VarInfo {
    /// Whether the variable ranges over a finite set of integers.
    pub fn is_bounded_integer(&self) -> bool {
        self.kind != VarKind::Continuous && self.lb.is_finite() && self.ub.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ConstrEntry {
    constraint: Constraint,
    name: String,
}

/// Arena of variables and constraints with a minimization objective.
#[derive(Debug, Clone, Default)]
pub struct Program {
    vars: Vec<Option<VarInfo>>,
    constraints: Vec<Option<ConstrEntry>>,
    objective: Option<LinExpr>,
    n_vars: usize,
    n_constraints: usize,
}

impl Program {
    /// Create an empty program.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Variables
    // =========================================================================

    /// Declare a variable. Binary variables are always bounded to `[0, 1]`.
    pub fn add_var(&mut self, kind: VarKind, lb: f64, ub: f64, name: impl Into<String>) -> VarId {
        let (lb, ub) = match kind {
            VarKind::Binary => (0.0, 1.0),
            _ => (lb, ub),
        };
        debug_assert!(lb <= ub, "variable bounds are inverted");
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Some(VarInfo {
            kind,
            lb,
            ub,
            name: name.into(),
        }));
        self.n_vars += 1;
        id
    }

    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_var(VarKind::Binary, 0.0, 1.0, name)
    }

    pub fn add_integer(&mut self, lb: f64, ub: f64, name: impl Into<String>) -> VarId {
        self.add_var(VarKind::Integer, lb, ub, name)
    }

    pub fn add_continuous(&mut self, lb: f64, ub: f64, name: impl Into<String>) -> VarId {
        self.add_var(VarKind::Continuous, lb, ub, name)
    }

    /// Declaration of an active variable.
    pub fn var(&self, id: VarId) -> Option<&VarInfo> {
        self.vars.get(id.index()).and_then(Option::as_ref)
    }

    /// Change the kind of an active variable; binary also narrows the bounds
    /// to `[0, 1]`. Returns `false` if the variable is not active.
    pub fn set_var_kind(&mut self, id: VarId, kind: VarKind) -> bool {
        let Some(var) = self.vars.get_mut(id.index()).and_then(Option::as_mut) else {
            return false;
        };
        var.kind = kind;
        if kind == VarKind::Binary {
            var.lb = var.lb.max(0.0);
            var.ub = var.ub.min(1.0);
        }
        true
    }

    /// Remove a variable. Returns `false` if it was not active.
    pub fn remove_var(&mut self, id: VarId) -> bool {
        match self.vars.get_mut(id.index()).and_then(Option::take) {
            Some(_) => {
                self.n_vars -= 1;
                true
            }
            None => false,
        }
    }

    /// Active variables in declaration order.
    pub fn vars(&self) -> impl Iterator<Item = (VarId, &VarInfo)> {
        self.vars
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.as_ref().map(|v| (VarId(i as u32), v)))
    }

    /// Number of active variables.
    #[inline]
    pub fn n_vars(&self) -> usize {
        self.n_vars
    }

    /// Size of the variable arena, including tombstones.
    #[inline]
    pub fn var_capacity(&self) -> usize {
        self.vars.len()
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    /// Add a constraint.
    pub fn add_constraint(&mut self, constraint: Constraint, name: impl Into<String>) -> ConstrId {
        debug_assert!(
            constraint.vars().iter().all(|&v| self.var(v).is_some()),
            "constraint references an inactive variable"
        );
        let id = ConstrId(self.constraints.len() as u32);
        self.constraints.push(Some(ConstrEntry {
            constraint,
            name: name.into(),
        }));
        self.n_constraints += 1;
        id
    }

    /// An active constraint.
    pub fn constraint(&self, id: ConstrId) -> Option<&Constraint> {
        self.constraints
            .get(id.index())
            .and_then(Option::as_ref)
            .map(|e| &e.constraint)
    }

    /// Debug name of an active constraint.
    pub fn constraint_name(&self, id: ConstrId) -> Option<&str> {
        self.constraints
            .get(id.index())
            .and_then(Option::as_ref)
            .map(|e| e.name.as_str())
    }

    /// Remove a constraint. Returns `false` if it was not active.
    pub fn remove_constraint(&mut self, id: ConstrId) -> bool {
        match self.constraints.get_mut(id.index()).and_then(Option::take) {
            Some(_) => {
                self.n_constraints -= 1;
                true
            }
            None => false,
        }
    }

    /// Active constraints in insertion order.
    pub fn constraints(&self) -> impl Iterator<Item = (ConstrId, &Constraint)> {
        self.constraints.iter().enumerate().filter_map(|(i, c)| {
            c.as_ref().map(|e| (ConstrId(i as u32), &e.constraint))
        })
    }

    /// Number of active constraints.
    #[inline]
    pub fn n_constraints(&self) -> usize {
        self.n_constraints
    }

    // =========================================================================
    // Objective
    // =========================================================================

    /// Set the minimization objective, returning the previous one.
    pub fn set_objective(&mut self, objective: LinExpr) -> Option<LinExpr> {
        self.objective.replace(objective.compact())
    }

    /// Remove the objective, returning it.
    pub fn clear_objective(&mut self) -> Option<LinExpr> {
        self.objective.take()
    }

    #[inline]
    pub fn objective(&self) -> Option<&LinExpr> {
        self.objective.as_ref()
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Whether every active variable is a bounded integer and every
    /// coefficient and right-hand side is integral.
    pub fn is_integral(&self) -> bool {
        const TOL: f64 = 1e-9;
        let integral_expr = |e: &LinExpr| {
            e.terms().iter().all(|&(_, c)| is_integral(c, TOL)) && is_integral(e.constant_term(), TOL)
        };

        self.vars().all(|(_, v)| v.is_bounded_integer())
            && self.constraints().all(|(_, c)| match c {
                Constraint::Linear { expr, rhs, .. } => integral_expr(expr) && is_integral(*rhs, TOL),
                Constraint::AbsEq { expr, .. } => integral_expr(expr),
            })
            && self.objective.as_ref().map_or(true, integral_expr)
    }

    /// Everything `solution` violates: variables outside their bounds or
    /// domain as `Err(var)`, then unsatisfied constraints as `Ok(constraint)`.
    pub fn violations(&self, solution: &Solution, tol: f64) -> Vec<Result<ConstrId, VarId>> {
        let mut out = Vec::new();
        for (id, var) in self.vars() {
            let v = solution.value(id);
            let in_bounds = v >= var.lb - tol && v <= var.ub + tol;
            let integral = var.kind == VarKind::Continuous || is_integral(v, tol);
            if !in_bounds || !integral {
                out.push(Err(id));
            }
        }
        for (id, c) in self.constraints() {
            if !c.is_satisfied(|v| solution.value(v), tol) {
                out.push(Ok(id));
            }
        }
        out
    }

    /// Whether `solution` satisfies every bound, integrality requirement and
    /// constraint.
    pub fn is_feasible(&self, solution: &Solution, tol: f64) -> bool {
        self.violations(solution, tol).is_empty()
    }
}
