//! Conversion between runtime types and schema types.
//!
//! Runtime to schema conversions are lossless `From` impls. The reverse
//! direction is `TryFrom` and re-validates everything the runtime
//! constructors check.

use ndarray::Array2;

use super::error::ReadError;
use super::schema::{
    EnsembleSchema, FeatureDomainSchema, FeatureEntrySchema, NodeSchema, ProblemSchema,
    SCHEMA_VERSION,
};
use super::Problem;
use crate::repr::{Ensemble, Feature, FeatureKind, FeatureSchema, Leaf, Node, Split, Tree};

// =============================================================================
// Features
// =============================================================================

impl From<(&str, &Feature)> for FeatureEntrySchema {
    fn from((name, feature): (&str, &Feature)) -> Self {
        let levels = || feature.levels().map(<[f64]>::to_vec).unwrap_or_default();
        let domain = match feature.kind() {
            FeatureKind::Continuous => FeatureDomainSchema::Continuous { levels: levels() },
            FeatureKind::Discrete => FeatureDomainSchema::Discrete { levels: levels() },
            FeatureKind::Binary => FeatureDomainSchema::Binary,
            FeatureKind::OneHot => FeatureDomainSchema::OneHot {
                codes: feature.codes().map(<[String]>::to_vec).unwrap_or_default(),
            },
        };
        Self {
            name: name.to_string(),
            domain,
        }
    }
}

impl TryFrom<FeatureDomainSchema> for Feature {
    type Error = ReadError;

    fn try_from(schema: FeatureDomainSchema) -> Result<Self, Self::Error> {
        Ok(match schema {
            FeatureDomainSchema::Continuous { levels } => Feature::continuous(levels)?,
            FeatureDomainSchema::Discrete { levels } => Feature::discrete(levels)?,
            FeatureDomainSchema::Binary => Feature::binary(),
            FeatureDomainSchema::OneHot { codes } => Feature::one_hot(codes)?,
        })
    }
}

// =============================================================================
// Trees
// =============================================================================

impl From<&Node> for NodeSchema {
    fn from(node: &Node) -> Self {
        match node {
            Node::Leaf(leaf) => NodeSchema::Leaf {
                values: leaf.values.outer_iter().map(|row| row.to_vec()).collect(),
                n_samples: leaf.n_samples,
            },
            Node::Split { split, left, right } => {
                let left = Box::new(NodeSchema::from(left.as_ref()));
                let right = Box::new(NodeSchema::from(right.as_ref()));
                match split {
                    Split::Threshold { feature, threshold } => NodeSchema::Threshold {
                        feature: *feature,
                        threshold: *threshold,
                        left,
                        right,
                    },
                    Split::Categories { feature, codes } => NodeSchema::Categories {
                        feature: *feature,
                        codes: codes.clone(),
                        left,
                        right,
                    },
                }
            }
        }
    }
}

impl TryFrom<NodeSchema> for Node {
    type Error = ReadError;

    fn try_from(schema: NodeSchema) -> Result<Self, Self::Error> {
        Ok(match schema {
            NodeSchema::Leaf { values, n_samples } => {
                let n_outputs = values.len();
                let n_classes = values.first().map_or(0, Vec::len);
                if values.iter().any(|row| row.len() != n_classes) {
                    return Err(ReadError::Validation(
                        "leaf value rows have different lengths".into(),
                    ));
                }
                let flat: Vec<f64> = values.into_iter().flatten().collect();
                let values = Array2::from_shape_vec((n_outputs, n_classes), flat)
                    .map_err(|e| ReadError::Validation(format!("leaf values: {e}")))?;
                Node::Leaf(Leaf::with_outputs(values).with_samples(n_samples))
            }
            NodeSchema::Threshold {
                feature,
                threshold,
                left,
                right,
            } => Node::threshold(
                feature,
                threshold,
                Node::try_from(*left)?,
                Node::try_from(*right)?,
            ),
            NodeSchema::Categories {
                feature,
                codes,
                left,
                right,
            } => Node::categories(
                feature,
                codes,
                Node::try_from(*left)?,
                Node::try_from(*right)?,
            ),
        })
    }
}

// =============================================================================
// Ensemble / Problem
// =============================================================================

impl From<&Ensemble> for EnsembleSchema {
    fn from(ensemble: &Ensemble) -> Self {
        Self {
            trees: ensemble
                .trees()
                .iter()
                .map(|t| NodeSchema::from(&t.to_node()))
                .collect(),
            weights: Some(ensemble.weights().to_vec()),
            n_isolators: ensemble.n_isolators(),
        }
    }
}

impl TryFrom<EnsembleSchema> for Ensemble {
    type Error = ReadError;

    fn try_from(schema: EnsembleSchema) -> Result<Self, Self::Error> {
        let trees = schema
            .trees
            .into_iter()
            .map(|node| -> Result<Tree, ReadError> { Ok(Tree::new(Node::try_from(node)?)?) })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Ensemble::new(trees, schema.weights, schema.n_isolators)?)
    }
}

impl From<&Problem> for ProblemSchema {
    fn from(problem: &Problem) -> Self {
        Self {
            version: SCHEMA_VERSION,
            features: problem
                .schema
                .iter()
                .map(FeatureEntrySchema::from)
                .collect(),
            ensemble: EnsembleSchema::from(&problem.ensemble),
            config: problem.config.clone(),
        }
    }
}

impl TryFrom<ProblemSchema> for Problem {
    type Error = ReadError;

    fn try_from(schema: ProblemSchema) -> Result<Self, Self::Error> {
        if schema.version != SCHEMA_VERSION {
            return Err(ReadError::UnsupportedVersion(schema.version));
        }
        let mut features = FeatureSchema::new();
        for entry in schema.features {
            features.push(entry.name, Feature::try_from(entry.domain)?)?;
        }
        let ensemble = Ensemble::try_from(schema.ensemble)?;
        schema.config.validate()?;

        for (t, tree) in ensemble.trees().iter().enumerate() {
            if let Some(index) = tree.split_features().find(|&f| f >= features.len()) {
                return Err(ReadError::Validation(format!(
                    "tree {t} splits on feature {index}, schema has {}",
                    features.len()
                )));
            }
        }

        Ok(Problem {
            schema: features,
            ensemble,
            config: schema.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_round_trip_keeps_shape_and_samples() {
        let node = Node::threshold(
            0,
            1.0,
            Node::Leaf(Leaf::new([0.2, 0.8]).with_samples(4)),
            Node::categories(1, ["a"], Node::leaf([1.0, 0.0]), Node::leaf([0.0, 1.0])),
        );
        let schema = NodeSchema::from(&node);
        assert_eq!(Node::try_from(schema).unwrap(), node);
    }

    #[test]
    fn ragged_leaf_rejected() {
        let schema = NodeSchema::Leaf {
            values: vec![vec![1.0, 0.0], vec![1.0]],
            n_samples: 0,
        };
        assert!(matches!(Node::try_from(schema), Err(ReadError::Validation(_))));
    }

    #[test]
    fn invalid_levels_rejected() {
        let schema = FeatureDomainSchema::Continuous { levels: vec![1.0] };
        assert!(matches!(Feature::try_from(schema), Err(ReadError::Validation(_))));
    }
}
