//! Feature compilation.
//!
//! A [`FeatureVar`] owns the program variables encoding one [`Feature`]:
//!
//! - **Binary**: one 0/1 variable
//! - **Continuous / Discrete**: a monotone ladder `mu[0] >= mu[1] >= ...` of
//!   `len(levels) - 1` indicators plus a scalar tied to the ladder by an
//!   equality; `mu[j] = 1` iff the value reaches `levels[j + 1]`
//! - **One-hot**: one 0/1 indicator per code, summing to exactly one

use super::backend::Backend;
use crate::error::{ConsistencyError, DomainError};
use crate::program::{LinExpr, Program, VarId, VarKind};
use crate::repr::{Feature, FeatureKind, FeatureValue};
use crate::solve::Solution;

/// Program variables of one compiled feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVar {
    name: String,
    kind: FeatureKind,
    scalar: Option<VarId>,
    /// Expression the scalar equals, in terms of the ladder.
    scalar_expr: LinExpr,
    ladder: Vec<VarId>,
    /// Declared domain of the ladder; continuous ladders decode unrounded.
    ladder_kind: VarKind,
    indicators: Vec<VarId>,
}

impl FeatureVar {
    /// Declare the feature's variables and its internal consistency
    /// constraints.
    pub fn build<B: Backend + ?Sized>(
        program: &mut Program,
        backend: &B,
        name: &str,
        feature: &Feature,
    ) -> Self {
        let mut var = Self {
            name: name.to_string(),
            kind: feature.kind(),
            scalar: None,
            scalar_expr: LinExpr::new(),
            ladder: Vec::new(),
            ladder_kind: VarKind::Binary,
            indicators: Vec::new(),
        };

        match feature.kind() {
            FeatureKind::Binary => {
                var.scalar = Some(program.add_binary(name));
            }
            FeatureKind::Continuous | FeatureKind::Discrete => {
                let kind = backend.ladder_kind(feature);
                var.ladder_kind = kind;
                var.ladder = (0..feature.n_ladder())
                    .map(|j| program.add_var(kind, 0.0, 1.0, format!("{name}.mu[{j}]")))
                    .collect();
                for (j, pair) in var.ladder.windows(2).enumerate() {
                    program.add_constraint(
                        LinExpr::from(pair[1]).leq(pair[0]),
                        format!("{name}.ladder[{j}]"),
                    );
                }
                let (scalar, expr) = backend.scalar(program, feature, &var.ladder, name);
                program.add_constraint(
                    LinExpr::from(scalar).equals(expr.clone()),
                    format!("{name}.link"),
                );
                var.scalar = Some(scalar);
                var.scalar_expr = expr;
            }
            FeatureKind::OneHot => {
                let codes = feature.codes().unwrap_or_default();
                var.indicators = codes
                    .iter()
                    .map(|code| program.add_binary(format!("{name}[{code}]")))
                    .collect();
                program.add_constraint(
                    LinExpr::sum_of(var.indicators.iter().copied()).equals(1.0),
                    format!("{name}.one_hot"),
                );
            }
        }
        var
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    /// Scalar variable: the 0/1 value of a binary feature or the ladder
    /// scalar of a numeric one.
    pub fn x(&self) -> Result<VarId, DomainError> {
        self.scalar.ok_or(DomainError::OneHotScalar)
    }

    /// Indicator of the code at `index`.
    pub fn code(&self, index: usize) -> Result<VarId, DomainError> {
        if self.kind != FeatureKind::OneHot {
            return Err(DomainError::NotOneHot);
        }
        self.indicators.get(index).copied().ok_or(DomainError::CodeIndex {
            index,
            len: self.indicators.len(),
        })
    }

    /// Ladder indicator `mu[index]`.
    pub fn mu(&self, index: usize) -> Result<VarId, DomainError> {
        if !self.kind.is_numeric() {
            return Err(DomainError::NotNumeric);
        }
        self.ladder.get(index).copied().ok_or(DomainError::LadderIndex {
            index,
            len: self.ladder.len(),
        })
    }

    /// All ladder indicators, empty for non-numeric features.
    #[inline]
    pub fn ladder(&self) -> &[VarId] {
        &self.ladder
    }

    /// All code indicators, empty unless one-hot.
    #[inline]
    pub fn indicators(&self) -> &[VarId] {
        &self.indicators
    }

    /// Bucket index `Σ mu` of a numeric feature.
    pub fn bucket_expr(&self) -> Result<LinExpr, DomainError> {
        if !self.kind.is_numeric() {
            return Err(DomainError::NotNumeric);
        }
        Ok(LinExpr::sum_of(self.ladder.iter().copied()))
    }

    /// Write the canonical encoding of `value` into `solution`.
    pub fn lift(
        &self,
        feature: &Feature,
        value: &FeatureValue,
        solution: &mut Solution,
    ) -> Result<(), ConsistencyError> {
        let mismatch = || ConsistencyError::Decode {
            feature: self.name.clone(),
            reason: format!("value {value} does not match a {} feature", self.kind.as_str()),
        };

        match (self.kind, value) {
            (FeatureKind::Binary, FeatureValue::Number(v)) => {
                let x = self.scalar.ok_or_else(mismatch)?;
                solution.set(x, *v);
            }
            (FeatureKind::Continuous | FeatureKind::Discrete, FeatureValue::Number(v)) => {
                let bucket = feature.bucket(*v).map_err(|_| mismatch())?;
                for (j, &mu) in self.ladder.iter().enumerate() {
                    solution.set(mu, if j < bucket { 1.0 } else { 0.0 });
                }
                let x = self.scalar.ok_or_else(mismatch)?;
                let scalar = solution.eval(&self.scalar_expr);
                solution.set(x, scalar);
            }
            (FeatureKind::OneHot, FeatureValue::Code(code)) => {
                let selected = feature.code_index(code).map_err(|_| mismatch())?;
                for (k, &ind) in self.indicators.iter().enumerate() {
                    solution.set(ind, if k == selected { 1.0 } else { 0.0 });
                }
            }
            _ => return Err(mismatch()),
        }
        Ok(())
    }

    /// Read the feature's value back from a solution.
    ///
    /// Numeric values are reconstructed from the ladder as
    /// `levels[0] + Σ mu[j]·(levels[j+1] - levels[j])`, rounding `mu` only
    /// when the ladder is integral. One-hot values require exactly one
    /// indicator to round to one.
    pub fn decode(
        &self,
        feature: &Feature,
        solution: &Solution,
    ) -> Result<FeatureValue, ConsistencyError> {
        let read = |v: VarId| solution.value(v).round();
        match self.kind {
            FeatureKind::Binary => Ok(FeatureValue::Number(
                self.scalar.map_or(0.0, read),
            )),
            FeatureKind::Continuous | FeatureKind::Discrete => {
                let levels = feature.levels().map_err(|e| self.decode_error(e.to_string()))?;
                let step = |mu: VarId| match self.ladder_kind {
                    VarKind::Continuous => solution.value(mu),
                    _ => read(mu),
                };
                let value = self
                    .ladder
                    .iter()
                    .zip(levels.windows(2))
                    .fold(levels[0], |acc, (&mu, w)| acc + step(mu) * (w[1] - w[0]));
                Ok(FeatureValue::Number(value))
            }
            FeatureKind::OneHot => {
                let codes = feature.codes().map_err(|e| self.decode_error(e.to_string()))?;
                let active: Vec<usize> = self
                    .indicators
                    .iter()
                    .enumerate()
                    .filter(|(_, &v)| read(v) == 1.0)
                    .map(|(k, _)| k)
                    .collect();
                match active.as_slice() {
                    &[k] => Ok(FeatureValue::Code(codes[k].clone())),
                    other => Err(self.decode_error(format!(
                        "expected one active code indicator, got {}",
                        other.len()
                    ))),
                }
            }
        }
    }

    fn decode_error(&self, reason: String) -> ConsistencyError {
        ConsistencyError::Decode {
            feature: self.name.clone(),
            reason,
        }
    }
}
