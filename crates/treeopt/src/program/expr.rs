//! Variable handles, linear expressions and constraints.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Handle to a decision variable in a [`Program`](super::Program).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) u32);

impl VarId {
    /// Arena index of this variable.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Handle to a constraint in a [`Program`](super::Program).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstrId(pub(crate) u32);

impl ConstrId {
    /// Arena index of this constraint.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ============================================================================
// LinExpr
// ============================================================================

/// Linear expression `Σ coef·var + constant`.
///
/// Terms are not merged on construction; [`compact`](Self::compact) folds
/// duplicates and drops zero coefficients.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinExpr {
    /// The zero expression.
    pub fn new() -> Self {
        Self::default()
    }

    /// Constant expression.
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Single term `coef·var`.
    pub fn term(var: VarId, coef: f64) -> Self {
        Self {
            terms: vec![(var, coef)],
            constant: 0.0,
        }
    }

    /// Unit-coefficient sum of variables.
    pub fn sum_of(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    #[inline]
    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    #[inline]
    pub fn constant_term(&self) -> f64 {
        self.constant
    }

    #[inline]
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Append `coef·var`.
    pub fn add_term(&mut self, var: VarId, coef: f64) {
        self.terms.push((var, coef));
    }

    /// Add `scale·other` in place.
    pub fn add_scaled(&mut self, other: &LinExpr, scale: f64) {
        self.terms
            .extend(other.terms.iter().map(|&(v, c)| (v, c * scale)));
        self.constant += other.constant * scale;
    }

    /// Merge duplicate variables and drop zero coefficients.
    ///
    /// Terms are returned sorted by variable.
    pub fn compact(&self) -> Self {
        let mut terms = self.terms.clone();
        terms.sort_by_key(|&(v, _)| v);
        let mut merged: Vec<(VarId, f64)> = Vec::with_capacity(terms.len());
        for (v, c) in terms {
            match merged.last_mut() {
                Some((last, acc)) if *last == v => *acc += c,
                _ => merged.push((v, c)),
            }
        }
        merged.retain(|&(_, c)| c != 0.0);
        Self {
            terms: merged,
            constant: self.constant,
        }
    }

    /// Variables referenced by this expression (may repeat).
    pub fn vars(&self) -> impl Iterator<Item = VarId> + '_ {
        self.terms.iter().map(|&(v, _)| v)
    }

    /// Evaluate under an assignment.
    pub fn eval(&self, value: impl Fn(VarId) -> f64) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, &(v, c)| acc + c * value(v))
    }

    /// `self <= rhs`.
    pub fn leq(self, rhs: impl Into<LinExpr>) -> Constraint {
        Constraint::linear(self - rhs.into(), Sense::Le)
    }

    /// `self >= rhs`.
    pub fn geq(self, rhs: impl Into<LinExpr>) -> Constraint {
        Constraint::linear(self - rhs.into(), Sense::Ge)
    }

    /// `self == rhs`.
    pub fn equals(self, rhs: impl Into<LinExpr>) -> Constraint {
        Constraint::linear(self - rhs.into(), Sense::Eq)
    }
}

impl From<VarId> for LinExpr {
    fn from(var: VarId) -> Self {
        Self::term(var, 1.0)
    }
}

impl From<f64> for LinExpr {
    fn from(value: f64) -> Self {
        Self::constant(value)
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> LinExpr {
        self += rhs;
        self
    }
}

impl<T: Into<LinExpr>> AddAssign<T> for LinExpr {
    fn add_assign(&mut self, rhs: T) {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: T) -> LinExpr {
        self -= rhs;
        self
    }
}

impl<T: Into<LinExpr>> SubAssign<T> for LinExpr {
    fn sub_assign(&mut self, rhs: T) {
        self.add_scaled(&rhs.into(), -1.0);
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;

    fn mul(mut self, rhs: f64) -> LinExpr {
        for (_, c) in &mut self.terms {
            *c *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        self * -1.0
    }
}

impl Sum for LinExpr {
    fn sum<I: Iterator<Item = LinExpr>>(iter: I) -> Self {
        iter.fold(LinExpr::new(), |acc, e| acc + e)
    }
}

impl fmt::Display for LinExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "{}", self.constant);
        }
        for (i, (v, c)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{c}·{v}")?;
        }
        if self.constant != 0.0 {
            write!(f, " + {}", self.constant)?;
        }
        Ok(())
    }
}

// ============================================================================
// Constraint
// ============================================================================

/// Comparison of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

/// A constraint over program variables.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// `expr (sense) rhs` with the expression's constant folded into `rhs`.
    Linear {
        expr: LinExpr,
        sense: Sense,
        rhs: f64,
    },
    /// `target == |expr|`.
    AbsEq { target: VarId, expr: LinExpr },
}

impl Constraint {
    /// Normalize `expr (sense) 0` into `terms (sense) rhs`.
    pub fn linear(expr: LinExpr, sense: Sense) -> Self {
        let expr = expr.compact();
        let rhs = -expr.constant;
        Self::Linear {
            expr: LinExpr {
                terms: expr.terms,
                constant: 0.0,
            },
            sense,
            rhs,
        }
    }

    /// `target == |expr|`.
    pub fn abs_eq(target: VarId, expr: LinExpr) -> Self {
        Self::AbsEq {
            target,
            expr: expr.compact(),
        }
    }

    /// Variables referenced by this constraint.
    pub fn vars(&self) -> Vec<VarId> {
        match self {
            Self::Linear { expr, .. } => expr.vars().collect(),
            Self::AbsEq { target, expr } => {
                std::iter::once(*target).chain(expr.vars()).collect()
            }
        }
    }

    /// Check the constraint under an assignment, with absolute tolerance `tol`.
    pub fn is_satisfied(&self, value: impl Fn(VarId) -> f64, tol: f64) -> bool {
        match self {
            Self::Linear { expr, sense, rhs } => {
                let lhs = expr.eval(value);
                match sense {
                    Sense::Le => lhs <= rhs + tol,
                    Sense::Ge => lhs >= rhs - tol,
                    Sense::Eq => (lhs - rhs).abs() <= tol,
                }
            }
            Self::AbsEq { target, expr } => {
                let t = value(*target);
                (t - expr.eval(value).abs()).abs() <= tol
            }
        }
    }
}
