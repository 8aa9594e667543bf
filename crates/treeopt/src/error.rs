//! Error types.
//!
//! Errors fall into three categories:
//! - [`ConfigError`]: malformed input configuration (ensemble, levels, norms, call order)
//! - [`DomainError`]: an accessor or query invoked against an incompatible feature or class
//! - [`ConsistencyError`]: the ensemble and the feature schema disagree
//!
//! All of them are raised eagerly by the call that detects the violation.
//! [`Error`] wraps the three for APIs that can fail in more than one way.

/// Invalid configuration or call order.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The ensemble has no trees.
    #[error("at least one tree is required")]
    EmptyEnsemble,

    /// The number of weights does not match the number of scored trees.
    #[error("expected {expected} weights (one per estimator), got {got}")]
    WeightLength { expected: usize, got: usize },

    /// A weight is negative or not finite.
    #[error("weight {index} must be finite and non-negative, got {value}")]
    InvalidWeight { index: usize, value: f64 },

    /// Isolators would leave no scored tree.
    #[error("{n_isolators} isolators leave no estimator among {n_trees} trees")]
    TooManyIsolators { n_trees: usize, n_isolators: usize },

    /// Only the L1 norm is supported by the objective.
    #[error("unsupported norm: {0}")]
    UnsupportedNorm(u32),

    /// The reference vector does not match the schema's column count.
    #[error("expected {expected} values, got {got}")]
    ReferenceLength { expected: usize, got: usize },

    /// A reference value is NaN or infinite.
    #[error("reference value {index} must be finite, got {value}")]
    NonFiniteReference { index: usize, value: f64 },

    /// Levels cannot contain NaN values.
    #[error("levels cannot contain NaN values")]
    NanLevel,

    /// Levels must be finite.
    #[error("levels must be finite, got {0}")]
    NonFiniteLevel(f64),

    /// Numeric features need at least two distinct levels.
    #[error("numeric features need at least 2 distinct levels, got {0}")]
    TooFewLevels(usize),

    /// One-hot features need at least one code.
    #[error("one-hot features need at least one code")]
    EmptyCodes,

    /// A column name appears twice in the schema.
    #[error("duplicate feature name: {0}")]
    DuplicateFeature(String),

    /// `build()` was invoked on an already built model.
    #[error("model is already built")]
    AlreadyBuilt,

    /// A query was issued before `build()`.
    #[error("model must be built before adding constraints or objectives")]
    NotBuilt,

    /// Majority-class margin must be positive.
    #[error("epsilon must be finite and positive, got {0}")]
    InvalidEpsilon(f64),

    /// Score scale must be at least one.
    #[error("score_scale must be >= 1, got {0}")]
    InvalidScoreScale(u32),
}

/// An accessor or query is incompatible with the feature type or class range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Levels only exist on continuous and discrete features.
    #[error("levels can only be accessed for numeric features")]
    NotNumeric,

    /// Codes only exist on one-hot features.
    #[error("codes can only be accessed for one-hot encoded features")]
    NotOneHot,

    /// Levels can only be added to continuous features.
    #[error("levels can only be added to continuous features")]
    NotContinuous,

    /// One-hot features have no scalar variable.
    #[error("scalar value is not available for one-hot encoded features")]
    OneHotScalar,

    /// The code is not registered on the feature.
    #[error("unknown code: {0}")]
    UnknownCode(String),

    /// Ladder index is past the end of the ladder.
    #[error("ladder index {index} out of range for {len} indicators")]
    LadderIndex { index: usize, len: usize },

    /// Code index is past the end of the feature's codes.
    #[error("code index {index} out of range for {len} codes")]
    CodeIndex { index: usize, len: usize },

    /// Target class is not produced by the ensemble.
    #[error("expected class < {n_classes}, got {class}")]
    ClassOutOfRange { class: usize, n_classes: usize },

    /// Output slot is not produced by the ensemble.
    #[error("expected slot < {n_outputs}, got {slot}")]
    SlotOutOfRange { slot: usize, n_outputs: usize },

    /// The L1 objective has no encoding for this feature.
    #[error("L1 objective is not supported for one-hot encoded feature {feature}")]
    UnsupportedObjective { feature: String },

    /// No feature with this name exists in the schema.
    #[error("unknown feature: {0}")]
    UnknownFeature(String),
}

/// The ensemble, the schema or a solution disagree with each other.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsistencyError {
    /// A split threshold is not one of the feature's registered levels.
    #[error("threshold {threshold} of feature {feature} is not a registered level")]
    ThresholdNotInLevels { feature: String, threshold: f64 },

    /// A tree's output shape differs from the first tree's.
    #[error("tree {tree} has shape {got:?}, expected {expected:?}")]
    ShapeMismatch {
        tree: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// Leaves within one tree have different shapes.
    #[error("leaf shape {got:?} differs from {expected:?} within the same tree")]
    LeafShape {
        expected: (usize, usize),
        got: (usize, usize),
    },

    /// A split references a feature index outside the schema.
    #[error("split references feature {index}, schema has {n_features}")]
    UnknownFeature { index: usize, n_features: usize },

    /// Split type is not compatible with the feature type.
    #[error("{split} split cannot be applied to {kind} feature {feature}")]
    SplitKind {
        feature: String,
        split: &'static str,
        kind: &'static str,
    },

    /// A categorical split references a code the feature does not define.
    #[error("categorical split on {feature} references unknown code {code}")]
    UnknownSplitCode { feature: String, code: String },

    /// Threshold splits on binary features must separate 0 from 1.
    #[error("threshold {threshold} on binary feature {feature} does not separate 0 and 1")]
    BinaryThreshold { feature: String, threshold: f64 },

    /// A sample value cannot be routed through a split.
    #[error("sample value for feature {index} does not match the split on it")]
    SampleMismatch { index: usize },

    /// A solution cannot be decoded for this feature.
    #[error("cannot decode feature {feature}: {reason}")]
    Decode { feature: String, reason: String },
}

/// Any error raised by this crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Consistency(#[from] ConsistencyError),
}

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
