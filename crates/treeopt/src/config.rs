//! Compilation and solver configuration with builder pattern.
//!
//! [`ModelConfig`] selects the backend family and the numeric constants used
//! when compiling an ensemble. It uses the `bon` crate for builder generation
//! and is validated when the builder finishes.
//!
//! # Example
//!
//! ```
//! use treeopt::config::ModelConfig;
//! use treeopt::encode::BackendKind;
//!
//! // All defaults: CP backend
//! let config = ModelConfig::builder().build().unwrap();
//!
//! // MIP backend with a larger class margin
//! let config = ModelConfig::builder()
//!     .backend(BackendKind::Mip)
//!     .epsilon(1e-3)
//!     .build()
//!     .unwrap();
//! ```

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::encode::{BackendKind, FlowType};
use crate::error::ConfigError;

/// Default majority-class margin, `2^-16`.
pub const DEFAULT_EPSILON: f64 = 1.0 / 65536.0;

/// Default integer scale applied to leaf values by the CP backend.
pub const DEFAULT_SCORE_SCALE: u32 = 10_000;

// =============================================================================
// ModelConfig
// =============================================================================

/// Configuration of a [`Model`](crate::encode::Model).
///
/// # Structure
///
/// - **Backend**: which variable encoding family to compile into
/// - **Margin**: strict-dominance margin of majority-class constraints
/// - **Scaling**: integer scale of leaf values (CP backend only)
/// - **Flow**: domain of node activations (MIP backend only)
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
#[serde(default)]
pub struct ModelConfig {
    /// Backend family. Default: `Cp`.
    #[builder(default)]
    pub backend: BackendKind,

    /// Margin by which the target class must beat lower-indexed classes.
    /// Default: `2^-16`.
    ///
    /// The CP backend rounds it up to at least one scaled unit.
    #[builder(default = DEFAULT_EPSILON)]
    pub epsilon: f64,

    /// Leaf values are multiplied by this factor and rounded before entering
    /// integer constraints. Default: 10000.
    #[builder(default = DEFAULT_SCORE_SCALE)]
    pub score_scale: u32,

    /// Domain of node activation variables. Default: `Binary`.
    #[builder(default)]
    pub flow: FlowType,
}

impl<S: model_config_builder::IsComplete> ModelConfigBuilder<S> {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidEpsilon`] if `epsilon` is not finite and positive
    /// - [`ConfigError::InvalidScoreScale`] if `score_scale == 0`
    pub fn build(self) -> Result<ModelConfig, ConfigError> {
        let config = self.__build_internal();
        config.validate()?;
        Ok(config)
    }
}

impl ModelConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(ConfigError::InvalidEpsilon(self.epsilon));
        }
        if self.score_scale == 0 {
            return Err(ConfigError::InvalidScoreScale(self.score_scale));
        }
        Ok(())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            epsilon: DEFAULT_EPSILON,
            score_scale: DEFAULT_SCORE_SCALE,
            flow: FlowType::default(),
        }
    }
}

// =============================================================================
// SolverOptions
// =============================================================================

/// Options of the reference [`EnumerationSolver`](crate::solve::EnumerationSolver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    /// Maximum number of search nodes before giving up. Default: 5,000,000.
    pub node_limit: u64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            node_limit: 5_000_000,
        }
    }
}
