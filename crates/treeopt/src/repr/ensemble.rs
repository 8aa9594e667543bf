//! Fitted tree ensemble (collection of weighted trees).

use ndarray::Array2;

use super::schema::FeatureValue;
use super::tree::Tree;
use crate::error::{ConfigError, ConsistencyError, DomainError, Error};
use crate::utils::{argmax_lowest, average_path_length};

/// Weighted ensemble of decision trees.
///
/// The first `n_estimators` trees are scored: their leaf values, scaled by
/// the per-estimator weights, sum to the per-class score. The trailing
/// `n_isolators` trees are auxiliary isolation trees; they take part in
/// compilation but not in the score.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    trees: Vec<Tree>,
    weights: Vec<f64>,
    n_isolators: usize,
}

impl Ensemble {
    /// Create an ensemble.
    ///
    /// `weights` defaults to all ones and must have one non-negative entry per
    /// estimator. All trees must share the first tree's output shape.
    pub fn new(
        trees: Vec<Tree>,
        weights: Option<Vec<f64>>,
        n_isolators: usize,
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
            .map(Tree::shape)
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

        Ok(Self {
            trees,
            weights,
            n_isolators,
        })
    }

    /// Ensemble of equally weighted estimators without isolators.
    pub fn from_trees(trees: Vec<Tree>) -> Result<Self, Error> {
        Self::new(trees, None, 0)
    }

    /// Number of trees, including isolators.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of scored trees.
    #[inline]
    pub fn n_estimators(&self) -> usize {
        self.trees.len() - self.n_isolators
    }

    #[inline]
    pub fn n_isolators(&self) -> usize {
        self.n_isolators
    }

    /// All trees: estimators first, then isolators.
    #[inline]
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    #[inline]
    pub fn estimators(&self) -> &[Tree] {
        &self.trees[..self.n_estimators()]
    }

    #[inline]
    pub fn isolators(&self) -> &[Tree] {
        &self.trees[self.n_estimators()..]
    }

    /// Per-estimator weights.
    #[inline]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// `(n_outputs, n_classes)` of every tree.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.trees[0].shape()
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.shape().0
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.shape().1
    }

    /// Weighted sum of the estimators' leaf values for a sample.
    pub fn scores(&self, sample: &[FeatureValue]) -> Result<Array2<f64>, ConsistencyError> {
        self.weighted_scores(sample, &self.weights)
    }

    /// Like [`scores`](Self::scores) with explicit weights.
    pub fn weighted_scores(
        &self,
        sample: &[FeatureValue],
        weights: &[f64],
    ) -> Result<Array2<f64>, ConsistencyError> {
        let mut out = Array2::zeros(self.shape());
        for (tree, &w) in self.estimators().iter().zip(weights) {
            let leaf = tree.leaf_for(sample)?;
            if let Some(leaf) = tree.leaf(leaf) {
                out.scaled_add(w, &leaf.values);
            }
        }
        Ok(out)
    }

    /// Predicted class for output `slot`; ties go to the lowest class index.
    pub fn predict(&self, sample: &[FeatureValue], slot: usize) -> Result<usize, Error> {
        if slot >= self.n_outputs() {
            return Err(DomainError::SlotOutOfRange {
                slot,
                n_outputs: self.n_outputs(),
            }
            .into());
        }
        let scores = self.scores(sample)?;
        Ok(argmax_lowest(scores.row(slot).iter().copied()).unwrap_or(0))
    }

    /// Total isolation path length of a sample over the isolators.
    ///
    /// Each isolator contributes the depth of the reached leaf plus the
    /// average path length of the samples stored there.
    pub fn path_length(&self, sample: &[FeatureValue]) -> Result<f64, ConsistencyError> {
        let mut total = 0.0;
        for tree in self.isolators() {
            let leaf = tree.leaf_for(sample)?;
            let n_samples = tree.leaf(leaf).map_or(0, |l| l.n_samples);
            let depth = tree.depth(leaf).unwrap_or_default();
            total += depth as f64 + average_path_length(n_samples);
        }
        Ok(total)
    }
}

pub(crate) fn validate_weights(weights: &[f64], n_estimators: usize) -> Result<(), ConfigError> {
    if weights.len() != n_estimators {
        return Err(ConfigError::WeightLength {
            expected: n_estimators,
            got: weights.len(),
        });
    }
    if let Some((index, &value)) = weights
        .iter()
        .enumerate()
        .find(|(_, w)| !w.is_finite() || **w < 0.0)
    {
        return Err(ConfigError::InvalidWeight { index, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::tree::{Leaf, Node};
    use approx::assert_abs_diff_eq;

    fn stump(left: [f64; 2], right: [f64; 2]) -> Tree {
        Tree::new(Node::threshold(0, 1.0, Node::leaf(left), Node::leaf(right))).unwrap()
    }

    #[test]
    fn empty_ensemble_rejected() {
        assert_eq!(
            Ensemble::from_trees(vec![]).unwrap_err(),
            Error::Config(ConfigError::EmptyEnsemble)
        );
    }

    #[test]
    fn weight_length_must_match_estimators() {
        let trees = vec![stump([1.0, 0.0], [0.0, 1.0]), stump([1.0, 0.0], [0.0, 1.0])];
        let err = Ensemble::new(trees, Some(vec![1.0, 1.0, 1.0]), 0).unwrap_err();
        assert_eq!(
            err,
            Error::Config(ConfigError::WeightLength { expected: 2, got: 3 })
        );
    }

    #[test]
    fn negative_weight_rejected() {
        let err = Ensemble::new(vec![stump([1.0, 0.0], [0.0, 1.0])], Some(vec![-1.0]), 0)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::InvalidWeight { index: 0, .. })
        ));
    }

    #[test]
    fn shape_mismatch_is_consistency_error() {
        let three = Tree::new(Node::leaf([1.0, 0.0, 0.0])).unwrap();
        let err = Ensemble::from_trees(vec![stump([1.0, 0.0], [0.0, 1.0]), three]).unwrap_err();
        assert!(matches!(
            err,
            Error::Consistency(ConsistencyError::ShapeMismatch { tree: 1, .. })
        ));
    }

    #[test]
    fn isolators_need_an_estimator() {
        let err = Ensemble::new(vec![stump([1.0, 0.0], [0.0, 1.0])], None, 1).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::TooManyIsolators { .. })
        ));
    }

    #[test]
    fn weighted_scores_sum_estimators() {
        let trees = vec![stump([1.0, 0.0], [0.0, 1.0]), stump([0.25, 0.75], [0.5, 0.5])];
        let ensemble = Ensemble::new(trees, Some(vec![2.0, 1.0]), 0).unwrap();

        let low = [FeatureValue::Number(0.0)];
        let scores = ensemble.scores(&low).unwrap();
        assert_abs_diff_eq!(scores[[0, 0]], 2.25);
        assert_abs_diff_eq!(scores[[0, 1]], 0.75);
        assert_eq!(ensemble.predict(&low, 0).unwrap(), 0);

        let high = [FeatureValue::Number(3.0)];
        assert_eq!(ensemble.predict(&high, 0).unwrap(), 1);
        assert!(matches!(
            ensemble.predict(&high, 1),
            Err(Error::Domain(DomainError::SlotOutOfRange { .. }))
        ));
    }

    #[test]
    fn isolators_excluded_from_scores() {
        let isolator = Tree::new(Node::threshold(
            0,
            1.0,
            Node::Leaf(Leaf::new([0.0, 0.0]).with_samples(3)),
            Node::Leaf(Leaf::new([0.0, 0.0]).with_samples(1)),
        ))
        .unwrap();
        let ensemble =
            Ensemble::new(vec![stump([1.0, 0.0], [0.0, 1.0]), isolator], None, 1).unwrap();
        assert_eq!(ensemble.n_estimators(), 1);
        assert_eq!(ensemble.weights(), &[1.0]);

        let sample = [FeatureValue::Number(0.0)];
        let scores = ensemble.scores(&sample).unwrap();
        assert_abs_diff_eq!(scores[[0, 0]], 1.0);
        assert_abs_diff_eq!(
            ensemble.path_length(&sample).unwrap(),
            1.0 + average_path_length(3)
        );
    }
}
