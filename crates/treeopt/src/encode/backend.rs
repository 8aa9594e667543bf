//! Backend strategies.
//!
//! Feature and tree compilation are shared by all backends; a [`Backend`]
//! only decides the variable domains and the arithmetic of the program:
//!
//! | | [`CpBackend`] | [`MipBackend`] |
//! |---|---|---|
//! | numeric scalar | bucket index `Σ mu` (integer) | `levels[0] + Σ mu·Δ` (continuous) |
//! | ladder | binary | continuous (continuous features), binary (discrete) |
//! | node activation | binary | binary or continuous ([`FlowType`]) |
//! | split ladder indicator | binary | binary under continuous flow |
//! | leaf coefficients | `round(w·v·scale)` | `w·v` |
//! | majority margin | `max(1, ceil(ε·scale))` | `ε` |
//! | `u = |e|` | absolute-value equality | `u >= e`, `u >= -e` |

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ensemble::EnsembleAggregator;
use super::feature::FeatureVar;
use super::tree::{FlowType, TreeVar};
use crate::config::ModelConfig;
use crate::error::Error;
use crate::program::{ConstrId, Constraint, LinExpr, Program, VarId, VarKind};
use crate::repr::{Ensemble, Feature, FeatureSchema};

/// Backend family selected by [`ModelConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Bounded integers and booleans with scaled integer scores.
    #[default]
    Cp,
    /// Continuous and binary variables with floating-point scores.
    Mip,
}

impl BackendKind {
    /// Instantiate the backend with the constants from `config`.
    pub fn backend(self, config: &ModelConfig) -> Box<dyn Backend> {
        match self {
            Self::Cp => Box::new(CpBackend::new(config.score_scale, config.epsilon)),
            Self::Mip => Box::new(MipBackend::new(config.epsilon, config.flow)),
        }
    }
}

// =============================================================================
// Backend trait
// =============================================================================

/// Compiled base model: one [`FeatureVar`] per schema column plus the
/// ensemble aggregate.
#[derive(Debug, Clone)]
pub struct Encoding {
    pub features: Vec<FeatureVar>,
    pub aggregator: EnsembleAggregator,
}

/// Variable encoding strategy of one solver family.
pub trait Backend: fmt::Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Domain of the ladder indicators of a numeric feature.
    fn ladder_kind(&self, feature: &Feature) -> VarKind;

    /// Declare the scalar of a numeric feature.
    ///
    /// Returns the scalar and the ladder expression it must equal.
    fn scalar(
        &self,
        program: &mut Program,
        feature: &Feature,
        ladder: &[VarId],
        name: &str,
    ) -> (VarId, LinExpr);

    /// Declare a node activation variable.
    fn activation(&self, program: &mut Program, name: &str) -> VarId;

    /// Whether node activations are relaxed to `[0, 1]`.
    ///
    /// Branch conditions of relaxed trees are made integral by the tree
    /// compiler.
    fn relaxed_flow(&self) -> bool {
        false
    }

    /// Integer scale of leaf values, `None` for exact floating-point scores.
    fn score_scale(&self) -> Option<u32>;

    /// Margin by which the target class must beat lower-indexed classes.
    fn margin(&self) -> f64;

    /// Declare `u` with `u == |expr|` at every optimum of a minimization
    /// over `u`, with `0 <= u <= bound`.
    ///
    /// Returns `u` and the constraints added for it.
    fn distance(
        &self,
        program: &mut Program,
        expr: &LinExpr,
        bound: f64,
        name: &str,
    ) -> (VarId, Vec<ConstrId>);

    /// Compile the schema and the ensemble into `program`.
    ///
    /// All trees are checked against the schema before anything is added,
    /// so a consistency error leaves `program` untouched.
    fn compile(
        &self,
        program: &mut Program,
        schema: &FeatureSchema,
        ensemble: &Ensemble,
    ) -> Result<Encoding, Error> {
        for tree in ensemble.trees() {
            TreeVar::check(tree, schema)?;
        }

        let features: Vec<FeatureVar> = schema
            .iter()
            .map(|(name, feature)| FeatureVar::build(program, self, name, feature))
            .collect();

        let trees = ensemble
            .trees()
            .iter()
            .enumerate()
            .map(|(t, tree)| TreeVar::build(program, self, tree, schema, &features, t))
            .collect::<Result<Vec<_>, _>>()?;

        let aggregator = EnsembleAggregator::new(
            trees,
            Some(ensemble.weights().to_vec()),
            ensemble.n_isolators(),
            self.score_scale(),
        )?;

        Ok(Encoding {
            features,
            aggregator,
        })
    }
}

// =============================================================================
// CP backend
// =============================================================================

/// Constraint-programming style backend: every variable is a bounded integer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpBackend {
    score_scale: u32,
    epsilon: f64,
}

impl CpBackend {
    pub fn new(score_scale: u32, epsilon: f64) -> Self {
        Self {
            score_scale,
            epsilon,
        }
    }
}

impl Backend for CpBackend {
    fn name(&self) -> &'static str {
        "cp"
    }

    fn ladder_kind(&self, _feature: &Feature) -> VarKind {
        VarKind::Binary
    }

    fn scalar(
        &self,
        program: &mut Program,
        _feature: &Feature,
        ladder: &[VarId],
        name: &str,
    ) -> (VarId, LinExpr) {
        let x = program.add_integer(0.0, ladder.len() as f64, name);
        (x, LinExpr::sum_of(ladder.iter().copied()))
    }

    fn activation(&self, program: &mut Program, name: &str) -> VarId {
        program.add_binary(name)
    }

    fn score_scale(&self) -> Option<u32> {
        Some(self.score_scale)
    }

    fn margin(&self) -> f64 {
        (self.epsilon * self.score_scale as f64).ceil().max(1.0)
    }

    fn distance(
        &self,
        program: &mut Program,
        expr: &LinExpr,
        bound: f64,
        name: &str,
    ) -> (VarId, Vec<ConstrId>) {
        let u = program.add_integer(0.0, bound, name);
        let c = program.add_constraint(Constraint::abs_eq(u, expr.clone()), format!("{name}.abs"));
        (u, vec![c])
    }
}

// =============================================================================
// MIP backend
// =============================================================================

/// Mixed-integer style backend with continuous scalars and float scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MipBackend {
    epsilon: f64,
    flow: FlowType,
}

impl MipBackend {
    pub fn new(epsilon: f64, flow: FlowType) -> Self {
        Self { epsilon, flow }
    }
}

impl Backend for MipBackend {
    fn name(&self) -> &'static str {
        "mip"
    }

    fn ladder_kind(&self, feature: &Feature) -> VarKind {
        if feature.is_discrete() {
            VarKind::Binary
        } else {
            VarKind::Continuous
        }
    }

    fn scalar(
        &self,
        program: &mut Program,
        feature: &Feature,
        ladder: &[VarId],
        name: &str,
    ) -> (VarId, LinExpr) {
        let levels = feature.levels().unwrap_or_default();
        let (lo, hi) = match (levels.first(), levels.last()) {
            (Some(&lo), Some(&hi)) => (lo, hi),
            _ => (0.0, 0.0),
        };
        let x = program.add_continuous(lo, hi, name);
        let mut expr = LinExpr::constant(lo);
        for (&mu, w) in ladder.iter().zip(levels.windows(2)) {
            expr.add_term(mu, w[1] - w[0]);
        }
        (x, expr)
    }

    fn activation(&self, program: &mut Program, name: &str) -> VarId {
        match self.flow {
            FlowType::Binary => program.add_binary(name),
            FlowType::Continuous => program.add_continuous(0.0, 1.0, name),
        }
    }

    fn relaxed_flow(&self) -> bool {
        self.flow == FlowType::Continuous
    }

    fn score_scale(&self) -> Option<u32> {
        None
    }

    fn margin(&self) -> f64 {
        self.epsilon
    }

    fn distance(
        &self,
        program: &mut Program,
        expr: &LinExpr,
        bound: f64,
        name: &str,
    ) -> (VarId, Vec<ConstrId>) {
        let u = program.add_continuous(0.0, bound, name);
        let pos = program.add_constraint(LinExpr::from(u).geq(expr.clone()), format!("{name}.pos"));
        let neg = program.add_constraint(LinExpr::from(u).geq(-expr.clone()), format!("{name}.neg"));
        (u, vec![pos, neg])
    }
}
