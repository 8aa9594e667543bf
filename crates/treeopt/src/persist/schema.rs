//! Schema types for problem serialization.
//!
//! These types provide a stable JSON format independent of the runtime
//! types in [`repr`](crate::repr). Keeping them separate lets the format
//! evolve on its own and gives every read a validation step.

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;

/// Current format version.
pub const SCHEMA_VERSION: u32 = 1;

/// Domain of one input column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDomainSchema {
    Continuous { levels: Vec<f64> },
    Discrete { levels: Vec<f64> },
    Binary,
    OneHot { codes: Vec<String> },
}

/// Named input column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntrySchema {
    pub name: String,
    #[serde(flatten)]
    pub domain: FeatureDomainSchema,
}

/// Tree node (recursive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeSchema {
    /// `value < threshold` goes left.
    Threshold {
        feature: usize,
        threshold: f64,
        left: Box<NodeSchema>,
        right: Box<NodeSchema>,
    },
    /// Codes in `codes` go right.
    Categories {
        feature: usize,
        codes: Vec<String>,
        left: Box<NodeSchema>,
        right: Box<NodeSchema>,
    },
    /// Leaf values as `[output][class]`.
    Leaf {
        values: Vec<Vec<f64>>,
        #[serde(default, skip_serializing_if = "is_zero")]
        n_samples: usize,
    },
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

/// Fitted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleSchema {
    /// Trees in order: estimators, then isolators.
    pub trees: Vec<NodeSchema>,
    /// Per-estimator weights; all ones when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub n_isolators: usize,
}

/// Complete compilation problem: schema, ensemble and configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemSchema {
    pub version: u32,
    pub features: Vec<FeatureEntrySchema>,
    pub ensemble: EnsembleSchema,
    #[serde(default)]
    pub config: ModelConfig,
}
