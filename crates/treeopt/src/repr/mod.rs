//! Canonical, immutable representations of the compilation inputs.
//!
//! - [`Feature`] / [`FeatureSchema`]: per-column domains in input order
//! - [`Tree`] / [`Node`]: fitted decision trees
//! - [`Ensemble`]: weighted trees plus auxiliary isolators

pub mod ensemble;
pub mod feature;
pub mod schema;
pub mod tree;

pub use ensemble::Ensemble;
pub use feature::{Feature, FeatureKind};
pub use schema::{FeatureSchema, FeatureValue};
pub use tree::{Leaf, Node, NodeId, Split, Tree};
