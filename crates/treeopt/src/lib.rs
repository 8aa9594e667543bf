//! treeopt: compile fitted tree ensembles into optimization models.
//!
//! A fitted ensemble of decision trees plus a schema describing each input
//! column is turned into a linear program over integer, binary or continuous
//! variables. The program can then be queried for counterfactuals: inputs
//! that make the ensemble predict a chosen class while staying close to a
//! reference point.
//!
//! # Key Types
//!
//! - [`FeatureSchema`] / [`Feature`] - Column domains (continuous, discrete, binary, one-hot)
//! - [`Ensemble`] / [`Tree`] - Fitted trees, optional weights and isolators
//! - [`Model`] - Compiled program plus queries and their cleanup
//! - [`ModelConfig`] - Backend, margin, score scale and flow configuration
//! - [`EnumerationSolver`] - Exact reference solver for integer programs
//!
//! # Workflow
//!
//! Build a [`Model`], call [`Model::build`], add queries with
//! [`Model::set_majority_class`] and [`Model::add_objective`], solve, then
//! [`Model::cleanup`] to return to the base model. See the [`encode::model`]
//! module for a complete example.
//!
//! # Persistence
//!
//! [`persist::Problem`] reads and writes schema, ensemble and config as JSON.

pub mod config;
pub mod encode;
pub mod error;
pub mod explain;
pub mod persist;
pub mod program;
pub mod repr;
pub mod solve;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Inputs
pub use repr::{Ensemble, Feature, FeatureKind, FeatureSchema, FeatureValue, Node, Tree};

// Compilation
pub use config::ModelConfig;
pub use encode::{BackendKind, FlowType, Model};

// Results
pub use explain::Explanation;
pub use solve::{EnumerationSolver, Outcome, Solution, Solver};

// Errors
pub use error::{ConfigError, ConsistencyError, DomainError, Error, Result};
