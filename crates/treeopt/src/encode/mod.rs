//! Compilation of a schema and an ensemble into a [`Program`](crate::program::Program).
//!
//! Compilation runs leaf-first:
//!
//! 1. [`FeatureVar`]: variables and consistency constraints per feature
//! 2. [`TreeVar`]: node activations and flow constraints per tree
//! 3. [`EnsembleAggregator`]: weighted per-class score expressions
//!
//! [`Model`] drives the order, attaches queries and retracts them through
//! the [`GarbageTracker`]. The [`Backend`] decides variable domains and
//! arithmetic without touching the compilation logic.

pub mod backend;
pub mod ensemble;
pub mod feature;
pub mod garbage;
pub mod model;
pub mod tree;

pub use backend::{Backend, BackendKind, CpBackend, Encoding, MipBackend};
pub use ensemble::EnsembleAggregator;
pub use feature::FeatureVar;
pub use garbage::{Artifact, BatchId, GarbageTracker};
pub use model::Model;
pub use tree::{FlowType, LeafVar, TreeVar};
