//! Decoded solutions.

use std::collections::HashMap;
use std::fmt;

use ndarray::{Array1, ArrayView1};

use crate::error::Error;
use crate::repr::{FeatureSchema, FeatureValue};

/// One value per feature, read back from a solved assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    names: Vec<String>,
    values: Vec<FeatureValue>,
    row: Array1<f64>,
}

impl Explanation {
    /// Pair decoded values with the schema's columns.
    ///
    /// Fails if `values` does not match the schema's features.
    pub fn new(schema: &FeatureSchema, values: Vec<FeatureValue>) -> Result<Self, Error> {
        let row = schema.to_row(&values)?;
        Ok(Self {
            names: schema.names().to_vec(),
            values,
            row,
        })
    }

    /// Values in schema order.
    #[inline]
    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    /// Value of the feature called `name`.
    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.values[i])
    }

    /// `(name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.names.iter().map(String::as_str).zip(&self.values)
    }

    /// Name to value mapping.
    pub fn to_map(&self) -> HashMap<String, FeatureValue> {
        self.names.iter().cloned().zip(self.values.iter().cloned()).collect()
    }

    /// Flat input vector in column order; one-hot features expand to indicators.
    #[inline]
    pub fn row(&self) -> ArrayView1<'_, f64> {
        self.row.view()
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.row.to_vec()
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        Ok(())
    }
}
