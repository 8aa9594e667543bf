//! Feature domain descriptors.
//!
//! A [`Feature`] describes the admissible values of one input column:
//!
//! - **Continuous**: real values discretized by ascending `levels`
//! - **Discrete**: values restricted to the registered `levels`
//! - **Binary**: `0` or `1`
//! - **One-hot**: exactly one of a set of category `codes`
//!
//! Levels are the split boundaries the ensemble may use. They are kept sorted
//! and deduplicated; only continuous features may grow new levels afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DomainError, Error};

/// Logical domain of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Real-valued feature discretized by levels.
    Continuous,
    /// Numeric feature taking one of its levels.
    Discrete,
    /// Categorical feature encoded as one indicator per code.
    OneHot,
    /// 0/1 feature.
    Binary,
}

impl FeatureKind {
    /// Short lowercase name, used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Discrete => "discrete",
            Self::OneHot => "one-hot",
            Self::Binary => "binary",
        }
    }

    /// Returns true for continuous and discrete features.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Continuous | Self::Discrete)
    }
}

/// Immutable domain descriptor for one input column.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    kind: FeatureKind,
    levels: Vec<f64>,
    codes: Vec<String>,
}

impl Feature {
    /// Create a binary feature.
    pub fn binary() -> Self {
        Self {
            kind: FeatureKind::Binary,
            levels: Vec::new(),
            codes: Vec::new(),
        }
    }

    /// Create a continuous feature from its split levels.
    ///
    /// Levels are sorted and deduplicated. At least two distinct finite levels
    /// are required.
    pub fn continuous(levels: impl IntoIterator<Item = f64>) -> Result<Self, ConfigError> {
        Ok(Self {
            kind: FeatureKind::Continuous,
            levels: normalize_levels(levels)?,
            codes: Vec::new(),
        })
    }

    /// Create a discrete feature from its admissible values.
    pub fn discrete(levels: impl IntoIterator<Item = f64>) -> Result<Self, ConfigError> {
        Ok(Self {
            kind: FeatureKind::Discrete,
            levels: normalize_levels(levels)?,
            codes: Vec::new(),
        })
    }

    /// Create a one-hot encoded feature.
    ///
    /// Duplicate codes are dropped, keeping the first occurrence; the
    /// remaining order defines the indicator columns.
    pub fn one_hot<S: Into<String>>(codes: impl IntoIterator<Item = S>) -> Result<Self, ConfigError> {
        let mut unique: Vec<String> = Vec::new();
        for code in codes {
            let code = code.into();
            if !unique.contains(&code) {
                unique.push(code);
            }
        }
        if unique.is_empty() {
            return Err(ConfigError::EmptyCodes);
        }
        Ok(Self {
            kind: FeatureKind::OneHot,
            levels: Vec::new(),
            codes: unique,
        })
    }

    #[inline]
    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    #[inline]
    pub fn is_continuous(&self) -> bool {
        self.kind == FeatureKind::Continuous
    }

    #[inline]
    pub fn is_discrete(&self) -> bool {
        self.kind == FeatureKind::Discrete
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        self.kind == FeatureKind::Binary
    }

    #[inline]
    pub fn is_one_hot(&self) -> bool {
        self.kind == FeatureKind::OneHot
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        self.kind.is_numeric()
    }

    /// Sorted split levels of a numeric feature.
    pub fn levels(&self) -> Result<&[f64], DomainError> {
        if !self.is_numeric() {
            return Err(DomainError::NotNumeric);
        }
        Ok(&self.levels)
    }

    /// Category codes of a one-hot feature, in indicator order.
    pub fn codes(&self) -> Result<&[String], DomainError> {
        if !self.is_one_hot() {
            return Err(DomainError::NotOneHot);
        }
        Ok(&self.codes)
    }

    /// Position of `code` among the feature's codes.
    pub fn code_index(&self, code: &str) -> Result<usize, DomainError> {
        self.codes()?
            .iter()
            .position(|c| c == code)
            .ok_or_else(|| DomainError::UnknownCode(code.to_string()))
    }

    /// Merge additional levels into a continuous feature.
    ///
    /// The level set only grows; NaN values are rejected before anything
    /// is merged.
    pub fn add_levels(&mut self, levels: impl IntoIterator<Item = f64>) -> Result<(), Error> {
        if !self.is_continuous() {
            return Err(DomainError::NotContinuous.into());
        }
        let merged = self.levels.iter().copied().chain(levels);
        self.levels = normalize_levels(merged)?;
        Ok(())
    }

    /// Number of columns this feature occupies in a flat input vector.
    #[inline]
    pub fn n_columns(&self) -> usize {
        match self.kind {
            FeatureKind::OneHot => self.codes.len(),
            _ => 1,
        }
    }

    /// Number of ladder indicators (`len(levels) - 1`), zero for non-numeric features.
    #[inline]
    pub fn n_ladder(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Bucket index of `value`: the number of levels `<= value`, minus one.
    ///
    /// Values below the first level fall into bucket 0 and values at or above
    /// the last level into bucket `n_ladder()`. Bucket `k` reconstructs to
    /// `levels[k]`.
    pub fn bucket(&self, value: f64) -> Result<usize, DomainError> {
        let levels = self.levels()?;
        let above = levels.partition_point(|&l| l <= value);
        Ok(above.saturating_sub(1))
    }

    /// Index `j` such that `levels[j + 1] == threshold`.
    ///
    /// This is the ladder indicator separating `value < threshold` from
    /// `value >= threshold`. Returns `None` when the threshold is not a
    /// registered level or is the lowest level.
    pub fn ladder_index(&self, threshold: f64) -> Result<Option<usize>, DomainError> {
        let levels = self.levels()?;
        Ok(levels
            .iter()
            .skip(1)
            .position(|&l| l == threshold))
    }
}

/// Sort, deduplicate and validate a level set.
fn normalize_levels(levels: impl IntoIterator<Item = f64>) -> Result<Vec<f64>, ConfigError> {
    let mut out: Vec<f64> = levels.into_iter().collect();
    if out.iter().any(|l| l.is_nan()) {
        return Err(ConfigError::NanLevel);
    }
    if let Some(&l) = out.iter().find(|l| !l.is_finite()) {
        return Err(ConfigError::NonFiniteLevel(l));
    }
    out.sort_by(f64::total_cmp);
    out.dedup();
    if out.len() < 2 {
        return Err(ConfigError::TooFewLevels(out.len()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_sorted_and_deduplicated() {
        let f = Feature::continuous([3.0, 1.0, 2.0, 1.0, 0.0]).unwrap();
        assert_eq!(f.levels().unwrap(), &[0.0, 1.0, 2.0, 3.0]);
        assert_eq!(f.n_ladder(), 3);
        assert_eq!(f.n_columns(), 1);
    }

    #[test]
    fn malformed_levels_rejected_at_construction() {
        assert_eq!(Feature::continuous([1.0, f64::NAN]), Err(ConfigError::NanLevel));
        assert_eq!(Feature::discrete([1.0, 1.0]), Err(ConfigError::TooFewLevels(1)));
        assert!(matches!(
            Feature::continuous([0.0, f64::INFINITY]),
            Err(ConfigError::NonFiniteLevel(_))
        ));
        assert_eq!(
            Feature::one_hot(Vec::<String>::new()),
            Err(ConfigError::EmptyCodes)
        );
    }

    #[test]
    fn accessors_enforce_domain() {
        let b = Feature::binary();
        assert_eq!(b.levels(), Err(DomainError::NotNumeric));
        assert_eq!(b.codes(), Err(DomainError::NotOneHot));

        let c = Feature::one_hot(["red", "green", "red"]).unwrap();
        assert_eq!(c.codes().unwrap(), &["red".to_string(), "green".to_string()]);
        assert_eq!(c.n_columns(), 2);
        assert_eq!(c.levels(), Err(DomainError::NotNumeric));
        assert_eq!(c.code_index("green"), Ok(1));
        assert!(matches!(c.code_index("blue"), Err(DomainError::UnknownCode(_))));
    }

    #[test]
    fn add_levels_grows_continuous_only() {
        let mut f = Feature::continuous([0.0, 2.0]).unwrap();
        f.add_levels([1.0, 2.0]).unwrap();
        assert_eq!(f.levels().unwrap(), &[0.0, 1.0, 2.0]);

        let err = f.add_levels([f64::NAN]).unwrap_err();
        assert_eq!(err, Error::Config(ConfigError::NanLevel));
        assert_eq!(f.levels().unwrap(), &[0.0, 1.0, 2.0]);

        let mut d = Feature::discrete([0.0, 1.0]).unwrap();
        assert_eq!(
            d.add_levels([0.5]).unwrap_err(),
            Error::Domain(DomainError::NotContinuous)
        );
    }

    #[test]
    fn bucket_counts_levels_at_or_below() {
        let f = Feature::continuous([0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(f.bucket(-5.0), Ok(0));
        assert_eq!(f.bucket(0.0), Ok(0));
        assert_eq!(f.bucket(1.4), Ok(1));
        assert_eq!(f.bucket(2.0), Ok(2));
        assert_eq!(f.bucket(3.0), Ok(3));
        assert_eq!(f.bucket(10.0), Ok(3));
    }

    #[test]
    fn ladder_index_requires_exact_level() {
        let f = Feature::continuous([0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(f.ladder_index(1.0), Ok(Some(0)));
        assert_eq!(f.ladder_index(3.0), Ok(Some(2)));
        assert_eq!(f.ladder_index(0.0), Ok(None));
        assert_eq!(f.ladder_index(1.5), Ok(None));
    }
}
