//! Model orchestration and queries.
//!
//! [`Model`] owns the schema, the ensemble, the backend and the program.
//! `build()` compiles the base model once; queries
//! ([`set_majority_class`](Model::set_majority_class),
//! [`add_objective`](Model::add_objective),
//! [`add_query_constraint`](Model::add_query_constraint)) add garbage-tracked
//! artifacts on top of it, and [`cleanup`](Model::cleanup) retracts them.
//!
//! # Example
//!
//! ```
//! use ndarray::array;
//! use treeopt::config::ModelConfig;
//! use treeopt::encode::Model;
//! use treeopt::repr::{Ensemble, Feature, FeatureSchema, Node, Tree};
//! use treeopt::solve::{EnumerationSolver, Solver};
//!
//! let schema = FeatureSchema::from_features([("f", Feature::binary())]).unwrap();
//! let tree = Tree::new(Node::threshold(0, 0.5, Node::leaf([1.0, 0.0]), Node::leaf([0.0, 1.0]))).unwrap();
//! let ensemble = Ensemble::from_trees(vec![tree]).unwrap();
//!
//! let mut model = Model::new(schema, ensemble, ModelConfig::default()).unwrap();
//! model.build().unwrap();
//! model.set_majority_class(1, 0).unwrap();
//! model.add_objective(array![0.0].view(), 1).unwrap();
//!
//! let solution = model.solve(&EnumerationSolver::default()).unwrap().into_solution().unwrap();
//! assert_eq!(model.explain(&solution).unwrap().to_vec(), vec![1.0]);
//! model.cleanup();
//! ```

use ndarray::{Array2, ArrayView1};

use super::backend::{Backend, Encoding};
use super::ensemble::EnsembleAggregator;
use super::feature::FeatureVar;
use super::garbage::{Artifact, BatchId, GarbageTracker};
use crate::config::ModelConfig;
use crate::error::{ConfigError, DomainError, Error};
use crate::explain::Explanation;
use crate::program::{ConstrId, Constraint, LinExpr, Program, VarId};
use crate::repr::{Ensemble, FeatureKind, FeatureSchema, FeatureValue};
use crate::solve::{Outcome, SolveError, Solution, Solver};
use crate::utils::argmax_lowest;

/// Per-feature term of an L1 objective, planned before anything is added.
enum DistanceTerm {
    /// Disagreement indicator of a binary feature.
    Binary { x: VarId, reference_is_zero: bool },
    /// `|Σ mu - bucket(reference)|` of a numeric feature.
    Bucket { name: String, expr: LinExpr, bound: f64 },
}

/// Compiled optimization model of an ensemble over a feature schema.
#[derive(Debug)]
pub struct Model {
    schema: FeatureSchema,
    ensemble: Ensemble,
    config: ModelConfig,
    backend: Box<dyn Backend>,
    program: Program,
    encoding: Option<Encoding>,
    garbage: GarbageTracker,
    /// Objective auxiliaries and the expression whose magnitude they carry.
    distances: Vec<(VarId, LinExpr)>,
}

impl Model {
    /// Create an unbuilt model with the backend selected by `config`.
    pub fn new(
        schema: FeatureSchema,
        ensemble: Ensemble,
        config: ModelConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        let backend = config.backend.backend(&config);
        Self::with_backend(schema, ensemble, config, backend)
    }

    /// Create an unbuilt model with an explicit backend.
    pub fn with_backend(
        schema: FeatureSchema,
        ensemble: Ensemble,
        config: ModelConfig,
        backend: Box<dyn Backend>,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            schema,
            ensemble,
            config,
            backend,
            program: Program::new(),
            encoding: None,
            garbage: GarbageTracker::new(),
            distances: Vec::new(),
        })
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Compile features, then trees, then the aggregate score function.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::AlreadyBuilt`] on a second call
    /// - [`ConsistencyError`](crate::error::ConsistencyError) if a split
    ///   cannot be expressed over the schema; the program is left empty
    pub fn build(&mut self) -> Result<(), Error> {
        if self.encoding.is_some() {
            return Err(ConfigError::AlreadyBuilt.into());
        }
        tracing::debug!(
            backend = self.backend.name(),
            n_features = self.schema.len(),
            n_trees = self.ensemble.n_trees(),
            "compiling model"
        );

        let encoding = self
            .backend
            .compile(&mut self.program, &self.schema, &self.ensemble)?;
        self.encoding = Some(encoding);

        tracing::info!(
            backend = self.backend.name(),
            n_vars = self.program.n_vars(),
            n_constraints = self.program.n_constraints(),
            "model built"
        );
        Ok(())
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.encoding.is_some()
    }

    fn encoding(&self) -> Result<&Encoding, ConfigError> {
        self.encoding.as_ref().ok_or(ConfigError::NotBuilt)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Force `target` to be the predicted class of output `slot`.
    ///
    /// Adds `score[slot, target] - score[slot, c] >= margin` for every
    /// competing class `c < target` and `>= 0` for `c > target`, so ties go
    /// to the lowest class index.
    pub fn set_majority_class(&mut self, target: usize, slot: usize) -> Result<BatchId, Error> {
        let encoding = self.encoding.as_ref().ok_or(ConfigError::NotBuilt)?;
        let (n_outputs, n_classes) = encoding.aggregator.shape();
        if target >= n_classes {
            return Err(DomainError::ClassOutOfRange {
                class: target,
                n_classes,
            }
            .into());
        }
        if slot >= n_outputs {
            return Err(DomainError::SlotOutOfRange { slot, n_outputs }.into());
        }

        let margin = self.backend.margin();
        let function = encoding.aggregator.function();
        let batch = self.garbage.begin();
        for class in (0..n_classes).filter(|&c| c != target) {
            let rhs = if class < target { margin } else { 0.0 };
            let diff = function[[slot, target]].clone() - function[[slot, class]].clone();
            let id = self.program.add_constraint(
                diff.geq(rhs),
                format!("majority[{slot}]: {target} over {class}"),
            );
            self.garbage.track(Artifact::Constraint(id), batch);
        }

        tracing::debug!(class = target, slot, %batch, "majority class registered");
        Ok(batch)
    }

    /// Minimize the L1 distance to `reference`, a flat input vector.
    ///
    /// Binary features contribute their disagreement with the reference and
    /// numeric features `|bucket(x) - bucket(reference)|`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::UnsupportedNorm`] unless `norm == 1`
    /// - [`ConfigError::ReferenceLength`] if `reference` does not have one
    ///   value per column
    /// - [`ConfigError::NonFiniteReference`] if a value is NaN or infinite
    /// - [`DomainError::UnsupportedObjective`] if the schema has a one-hot feature
    pub fn add_objective(&mut self, reference: ArrayView1<'_, f64>, norm: u32) -> Result<BatchId, Error> {
        let encoding = self.encoding.as_ref().ok_or(ConfigError::NotBuilt)?;
        if norm != 1 {
            return Err(ConfigError::UnsupportedNorm(norm).into());
        }
        let expected = self.schema.n_columns();
        if reference.len() != expected {
            return Err(ConfigError::ReferenceLength {
                expected,
                got: reference.len(),
            }
            .into());
        }
        if let Some((index, &value)) = reference.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::NonFiniteReference { index, value }.into());
        }
        if let Some((name, _)) = self.schema.iter().find(|(_, f)| f.is_one_hot()) {
            return Err(DomainError::UnsupportedObjective {
                feature: name.to_string(),
            }
            .into());
        }

        let values = self.schema.parse_row(reference)?;
        let mut terms = Vec::with_capacity(values.len());
        for ((var, (name, feature)), value) in encoding
            .features
            .iter()
            .zip(self.schema.iter())
            .zip(&values)
        {
            let v = value.as_number().unwrap_or_default();
            terms.push(match feature.kind() {
                FeatureKind::Binary => DistanceTerm::Binary {
                    x: var.x()?,
                    reference_is_zero: v == 0.0,
                },
                FeatureKind::Continuous | FeatureKind::Discrete => {
                    let bucket = feature.bucket(v)?;
                    let n = feature.n_ladder();
                    DistanceTerm::Bucket {
                        name: name.to_string(),
                        expr: var.bucket_expr()? - bucket as f64,
                        bound: bucket.max(n - bucket) as f64,
                    }
                }
                FeatureKind::OneHot => {
                    return Err(DomainError::UnsupportedObjective {
                        feature: name.to_string(),
                    }
                    .into())
                }
            });
        }

        let batch = self.garbage.begin();
        let mut objective = LinExpr::new();
        for term in terms {
            match term {
                DistanceTerm::Binary {
                    x,
                    reference_is_zero: true,
                } => objective += x,
                DistanceTerm::Binary { x, .. } => objective += LinExpr::constant(1.0) - x,
                DistanceTerm::Bucket { name, expr, bound } => {
                    let (u, constraints) =
                        self.backend
                            .distance(&mut self.program, &expr, bound, &format!("{name}.dist"));
                    self.garbage.track(Artifact::Var(u), batch);
                    for c in constraints {
                        self.garbage.track(Artifact::Constraint(c), batch);
                    }
                    self.distances.push((u, expr));
                    objective += u;
                }
            }
        }

        if self.program.set_objective(objective).is_some() {
            tracing::warn!(%batch, "objective replaced without cleanup");
        }
        self.garbage.track(Artifact::Objective, batch);
        tracing::debug!(%batch, n_terms = values.len(), "L1 objective registered");
        Ok(batch)
    }

    /// Add a caller-defined constraint as a garbage-tracked query artifact.
    pub fn add_query_constraint(
        &mut self,
        constraint: Constraint,
        name: impl Into<String>,
    ) -> Result<ConstrId, Error> {
        self.encoding()?;
        let batch = self.garbage.begin();
        let id = self.program.add_constraint(constraint, name);
        self.garbage.track(Artifact::Constraint(id), batch);
        Ok(id)
    }

    /// Retract every query artifact, restoring the post-build program.
    ///
    /// Returns the number of retracted artifacts.
    pub fn cleanup(&mut self) -> usize {
        let n = self.garbage.cleanup(&mut self.program);
        self.distances.clear();
        tracing::debug!(retracted = n, "cleanup");
        n
    }

    // =========================================================================
    // Solving and decoding
    // =========================================================================

    /// Run `solver` on the current program.
    pub fn solve<S: Solver + ?Sized>(&self, solver: &S) -> Result<Outcome, SolveError> {
        let outcome = solver.solve(&self.program)?;
        tracing::info!(
            solved = outcome.is_solved(),
            objective = outcome.solution().and_then(Solution::objective),
            "solve finished"
        );
        Ok(outcome)
    }

    /// Decode a solution into one value per feature.
    pub fn explain(&self, solution: &Solution) -> Result<Explanation, Error> {
        let encoding = self.encoding()?;
        let values = encoding
            .features
            .iter()
            .zip(self.schema.iter())
            .map(|(var, (_, feature))| var.decode(feature, solution))
            .collect::<Result<Vec<_>, _>>()?;
        Explanation::new(&self.schema, values)
    }

    /// Canonical assignment of the compiled variables for an input vector.
    ///
    /// Ladders, indicators and node activations follow `point`; objective
    /// auxiliaries take the distance they measure. Query constraints are not
    /// consulted, so the result may violate them.
    pub fn assignment_for(&self, point: ArrayView1<'_, f64>) -> Result<Solution, Error> {
        let encoding = self.encoding()?;
        let sample = self.schema.parse_row(point)?;
        let mut solution = Solution::zeros(&self.program);

        for ((var, (_, feature)), value) in encoding
            .features
            .iter()
            .zip(self.schema.iter())
            .zip(&sample)
        {
            var.lift(feature, value, &mut solution)?;
        }
        for (var, tree) in encoding.aggregator.trees().iter().zip(self.ensemble.trees()) {
            var.lift(tree, &sample, &mut solution)?;
        }
        for (u, expr) in &self.distances {
            let d = solution.eval(expr).abs();
            solution.set(*u, d);
        }

        let objective = self.program.objective().map(|o| solution.eval(o));
        Ok(solution.with_objective(objective))
    }

    /// Class scores under a solution, in leaf-value units.
    pub fn scores(&self, solution: &Solution) -> Result<Array2<f64>, ConfigError> {
        let aggregator = &self.encoding()?.aggregator;
        let scale = aggregator.score_scale().map_or(1.0, f64::from);
        Ok(aggregator.function().map(|e| solution.eval(e) / scale))
    }

    /// Predicted class of output `slot` under a solution, lowest index on ties.
    pub fn predicted_class(&self, solution: &Solution, slot: usize) -> Result<usize, Error> {
        let scores = self.scores(solution)?;
        if slot >= scores.nrows() {
            return Err(DomainError::SlotOutOfRange {
                slot,
                n_outputs: scores.nrows(),
            }
            .into());
        }
        Ok(argmax_lowest(scores.row(slot).iter().copied()).unwrap_or(0))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    #[inline]
    pub fn program(&self) -> &Program {
        &self.program
    }

    #[inline]
    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    #[inline]
    pub fn ensemble(&self) -> &Ensemble {
        &self.ensemble
    }

    #[inline]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    #[inline]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    #[inline]
    pub fn garbage(&self) -> &GarbageTracker {
        &self.garbage
    }

    /// Compiled features in schema order.
    pub fn features(&self) -> Result<&[FeatureVar], ConfigError> {
        Ok(&self.encoding()?.features)
    }

    /// Compiled feature called `name`.
    pub fn feature(&self, name: &str) -> Result<&FeatureVar, Error> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| DomainError::UnknownFeature(name.to_string()))?;
        Ok(&self.features()?[idx])
    }

    pub fn aggregator(&self) -> Result<&EnsembleAggregator, ConfigError> {
        Ok(&self.encoding()?.aggregator)
    }

    /// Score expressions, shape `(n_outputs, n_classes)`.
    pub fn function(&self) -> Result<&Array2<LinExpr>, ConfigError> {
        Ok(self.aggregator()?.function())
    }

    /// Decoded value of one feature.
    pub fn value(&self, name: &str, solution: &Solution) -> Result<FeatureValue, Error> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| DomainError::UnknownFeature(name.to_string()))?;
        let feature = self
            .schema
            .feature(idx)
            .ok_or_else(|| DomainError::UnknownFeature(name.to_string()))?;
        Ok(self.features()?[idx].decode(feature, solution)?)
    }
}
