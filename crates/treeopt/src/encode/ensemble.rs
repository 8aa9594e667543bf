//! Ensemble score aggregation.

use ndarray::Array2;

use super::tree::TreeVar;
use crate::error::{ConfigError, ConsistencyError, Error};
use crate::program::LinExpr;
use crate::repr::ensemble::validate_weights;

/// Combines compiled trees into one linear score expression per
/// `(output, class)`.
///
/// The first `n_estimators` trees are scored; the trailing `n_isolators`
/// trees only contribute to [`length`](Self::length). With an integer score
/// scale every leaf coefficient is `round(weight · value · scale)`, so each
/// leaf is off by at most `1/scale` in unscaled units.
#[derive(Debug, Clone)]
pub struct EnsembleAggregator {
    trees: Vec<TreeVar>,
    weights: Vec<f64>,
    n_isolators: usize,
    score_scale: Option<u32>,
    function: Array2<LinExpr>,
}

impl EnsembleAggregator {
    /// Aggregate compiled trees.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyEnsemble`] without trees
    /// - [`ConfigError::TooManyIsolators`] if no tree is left to score
    /// - [`ConsistencyError::ShapeMismatch`] if a tree's shape differs from the first
    /// - [`ConfigError::WeightLength`] / [`ConfigError::InvalidWeight`] for bad weights
    pub fn new(
        trees: Vec<TreeVar>,
        weights: Option<Vec<f64>>,
        n_isolators: usize,
        score_scale: Option<u32>,
    ) -> Result<Self, Error> {
        let Some(first) = trees.first() else {
            return Err(ConfigError::EmptyEnsemble.into());
        };
        if n_isolators >= trees.len() {
            return Err(ConfigError::TooManyIsolators {
                n_trees: trees.len(),
                n_isolators,
            }
            .into());
        }
        let expected = first.shape();
        if let Some((tree, got)) = trees
            .iter()
            .map(TreeVar::shape)
            .enumerate()
            .find(|(_, shape)| *shape != expected)
        {
            return Err(ConsistencyError::ShapeMismatch {
                tree,
                expected,
                got,
            }
            .into());
        }

        let n_estimators = trees.len() - n_isolators;
        let weights = weights.unwrap_or_else(|| vec![1.0; n_estimators]);
        validate_weights(&weights, n_estimators)?;

        let function = aggregate(&trees[..n_estimators], &weights, score_scale, expected);
        Ok(Self {
            trees,
            weights,
            n_isolators,
            score_scale,
            function,
        })
    }

    /// Score expressions for explicit per-estimator weights.
    ///
    /// Entry `[slot, class]` is `Σ_t w_t · Σ_leaf act(leaf)·value(leaf)[slot, class]`.
    pub fn weighted_function(&self, weights: &[f64]) -> Result<Array2<LinExpr>, ConfigError> {
        validate_weights(weights, self.n_estimators())?;
        Ok(aggregate(
            self.estimators(),
            weights,
            self.score_scale,
            self.shape(),
        ))
    }

    /// Score expressions at the stored weights, shape `(n_outputs, n_classes)`.
    #[inline]
    pub fn function(&self) -> &Array2<LinExpr> {
        &self.function
    }

    /// Total isolation path length over the isolator trees.
    pub fn length(&self) -> LinExpr {
        self.isolators().iter().map(TreeVar::length).sum()
    }

    #[inline]
    pub fn trees(&self) -> &[TreeVar] {
        &self.trees
    }

    #[inline]
    pub fn estimators(&self) -> &[TreeVar] {
        &self.trees[..self.n_estimators()]
    }

    #[inline]
    pub fn isolators(&self) -> &[TreeVar] {
        &self.trees[self.n_estimators()..]
    }

    #[inline]
    pub fn n_estimators(&self) -> usize {
        self.trees.len() - self.n_isolators
    }

    #[inline]
    pub fn n_isolators(&self) -> usize {
        self.n_isolators
    }

    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Integer scale applied to leaf values, if any.
    #[inline]
    pub fn score_scale(&self) -> Option<u32> {
        self.score_scale
    }

    /// `(n_outputs, n_classes)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.trees[0].shape()
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.shape().1
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.shape().0
    }
}

fn aggregate(
    estimators: &[TreeVar],
    weights: &[f64],
    score_scale: Option<u32>,
    shape: (usize, usize),
) -> Array2<LinExpr> {
    let coefficient = |value: f64| match score_scale {
        Some(scale) => (value * scale as f64).round(),
        None => value,
    };

    let mut function = Array2::from_shape_fn(shape, |_| LinExpr::new());
    for (tree, &w) in estimators.iter().zip(weights) {
        for leaf in tree.leaves() {
            for ((slot, class), &value) in leaf.values.indexed_iter() {
                let coef = coefficient(w * value);
                if coef != 0.0 {
                    function[[slot, class]].add_term(leaf.activation, coef);
                }
            }
        }
    }
    function
}
