//! Ordered feature schema and per-feature values.
//!
//! The schema maps column names to [`Feature`] descriptors in input order.
//! A flat input vector follows the same order, with one-hot features
//! expanded into one indicator column per code.

use std::collections::HashMap;
use std::fmt;

use ndarray::{Array1, ArrayView1};

use super::feature::Feature;
use crate::error::{ConfigError, ConsistencyError, DomainError, Error};

/// Value of a single feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureValue {
    /// Numeric or binary value.
    Number(f64),
    /// Selected code of a one-hot feature.
    Code(String),
}

impl FeatureValue {
    /// Numeric value, if this is not a code.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(v) => Some(*v),
            Self::Code(_) => None,
        }
    }

    /// Selected code, if this is a one-hot value.
    pub fn as_code(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Code(c) => Some(c),
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Code(c) => write!(f, "{c}"),
        }
    }
}

/// Ordered mapping from column name to feature descriptor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
    features: Vec<Feature>,
    index: HashMap<String, usize>,
}

impl FeatureSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema from `(name, feature)` pairs in column order.
    pub fn from_features<S: Into<String>>(
        features: impl IntoIterator<Item = (S, Feature)>,
    ) -> Result<Self, ConfigError> {
        let mut schema = Self::new();
        for (name, feature) in features {
            schema.push(name, feature)?;
        }
        Ok(schema)
    }

    /// Append a feature. Names must be unique.
    pub fn push(&mut self, name: impl Into<String>, feature: Feature) -> Result<(), ConfigError> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ConfigError::DuplicateFeature(name));
        }
        self.index.insert(name.clone(), self.features.len());
        self.names.push(name);
        self.features.push(feature);
        Ok(())
    }

    /// Number of features.
    #[inline]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Number of columns of a flat input vector.
    pub fn n_columns(&self) -> usize {
        self.features.iter().map(Feature::n_columns).sum()
    }

    /// Feature at position `idx`.
    #[inline]
    pub fn feature(&self, idx: usize) -> Option<&Feature> {
        self.features.get(idx)
    }

    /// Name of the feature at position `idx`.
    #[inline]
    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    /// Position of the feature called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Feature called `name`.
    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.index_of(name).map(|i| &self.features[i])
    }

    /// Column names in order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Iterate over `(name, feature)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.names.iter().map(String::as_str).zip(self.features.iter())
    }

    /// First flat column of every feature.
    pub fn column_offsets(&self) -> Vec<usize> {
        let mut offset = 0;
        self.features
            .iter()
            .map(|f| {
                let start = offset;
                offset += f.n_columns();
                start
            })
            .collect()
    }

    /// Merge levels into the continuous feature called `name`.
    pub fn add_levels(
        &mut self,
        name: &str,
        levels: impl IntoIterator<Item = f64>,
    ) -> Result<(), Error> {
        let idx = self
            .index_of(name)
            .ok_or_else(|| DomainError::UnknownFeature(name.to_string()))?;
        self.features[idx].add_levels(levels)
    }

    /// Split a flat input vector into per-feature values.
    ///
    /// One-hot columns are read as indicators: exactly one of them must be
    /// set (`>= 0.5`).
    pub fn parse_row(&self, row: ArrayView1<'_, f64>) -> Result<Vec<FeatureValue>, Error> {
        let expected = self.n_columns();
        if row.len() != expected {
            return Err(ConfigError::ReferenceLength {
                expected,
                got: row.len(),
            }
            .into());
        }

        let mut values = Vec::with_capacity(self.len());
        let mut col = 0;
        for (name, feature) in self.iter() {
            if let Ok(codes) = feature.codes() {
                let active: Vec<usize> = (0..codes.len())
                    .filter(|&k| row[col + k] >= 0.5)
                    .collect();
                let &[k] = active.as_slice() else {
                    return Err(ConsistencyError::Decode {
                        feature: name.to_string(),
                        reason: format!("expected one active indicator, got {}", active.len()),
                    }
                    .into());
                };
                values.push(FeatureValue::Code(codes[k].clone()));
            } else {
                values.push(FeatureValue::Number(row[col]));
            }
            col += feature.n_columns();
        }
        Ok(values)
    }

    /// Flatten per-feature values into an input vector.
    pub fn to_row(&self, values: &[FeatureValue]) -> Result<Array1<f64>, Error> {
        if values.len() != self.len() {
            return Err(ConfigError::ReferenceLength {
                expected: self.len(),
                got: values.len(),
            }
            .into());
        }

        let mut row = Array1::zeros(self.n_columns());
        let mut col = 0;
        for ((name, feature), value) in self.iter().zip(values) {
            match (feature.codes(), value) {
                (Ok(_), FeatureValue::Code(code)) => {
                    row[col + feature.code_index(code)?] = 1.0;
                }
                (Err(_), FeatureValue::Number(v)) => row[col] = *v,
                _ => {
                    return Err(ConsistencyError::Decode {
                        feature: name.to_string(),
                        reason: format!("value {value} does not match a {} feature", feature.kind().as_str()),
                    }
                    .into())
                }
            }
            col += feature.n_columns();
        }
        Ok(row)
    }
}
