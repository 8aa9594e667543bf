//! JSON persistence of compilation problems.
//!
//! A [`Problem`] bundles everything needed to build a [`Model`]: the feature
//! schema, the fitted ensemble and the model configuration. On disk it is a
//! versioned [`ProblemSchema`](schema::ProblemSchema) document; every read is
//! re-validated through the same constructors the runtime types use.
//!
//! ```
//! use std::io::Cursor;
//! use treeopt::persist::Problem;
//!
//! let json = r#"{
//!     "version": 1,
//!     "features": [{"name": "f", "kind": "binary"}],
//!     "ensemble": {"trees": [{
//!         "type": "threshold", "feature": 0, "threshold": 0.5,
//!         "left": {"type": "leaf", "values": [[1.0, 0.0]]},
//!         "right": {"type": "leaf", "values": [[0.0, 1.0]]}
//!     }]}
//! }"#;
//! let problem = Problem::read_json(Cursor::new(json)).unwrap();
//! assert_eq!(problem.ensemble.n_classes(), 2);
//! let mut model = problem.into_model().unwrap();
//! model.build().unwrap();
//! ```

mod convert;
mod error;
pub mod schema;

use std::io::{Read, Write};

pub use error::{ReadError, WriteError};
pub use schema::SCHEMA_VERSION;

use crate::config::ModelConfig;
use crate::encode::Model;
use crate::error::Error;
use crate::repr::{Ensemble, FeatureSchema};

/// Schema, ensemble and configuration of one compilation problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    pub schema: FeatureSchema,
    pub ensemble: Ensemble,
    pub config: ModelConfig,
}

impl Problem {
    pub fn new(schema: FeatureSchema, ensemble: Ensemble, config: ModelConfig) -> Self {
        Self {
            schema,
            ensemble,
            config,
        }
    }

    /// Read and validate a problem from JSON.
    pub fn read_json<R: Read>(reader: R) -> Result<Self, ReadError> {
        let schema: schema::ProblemSchema = serde_json::from_reader(reader)?;
        Self::try_from(schema)
    }

    /// Read and validate a problem from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ReadError> {
        let schema: schema::ProblemSchema = serde_json::from_str(json)?;
        Self::try_from(schema)
    }

    /// Write the problem as JSON.
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), WriteError> {
        serde_json::to_writer(writer, &schema::ProblemSchema::from(self))?;
        Ok(())
    }

    /// Write the problem as indented JSON.
    pub fn write_json_pretty<W: Write>(&self, writer: W) -> Result<(), WriteError> {
        serde_json::to_writer_pretty(writer, &schema::ProblemSchema::from(self))?;
        Ok(())
    }

    /// Unbuilt model over this problem.
    pub fn into_model(self) -> Result<Model, Error> {
        Model::new(self.schema, self.ensemble, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::BackendKind;
    use crate::repr::{Feature, Node, Tree};

    fn problem() -> Problem {
        let schema = FeatureSchema::from_features([
            ("age", Feature::continuous([0.0, 30.0, 60.0]).unwrap()),
            ("color", Feature::one_hot(["red", "green"]).unwrap()),
        ])
        .unwrap();
        let tree = Tree::new(Node::threshold(
            0,
            30.0,
            Node::leaf([1.0, 0.0]),
            Node::categories(1, ["green"], Node::leaf([0.4, 0.6]), Node::leaf([0.0, 1.0])),
        ))
        .unwrap();
        let iso = Tree::new(Node::threshold(0, 60.0, Node::leaf([0.0, 0.0]), Node::leaf([0.0, 0.0])))
            .unwrap();
        let ensemble = Ensemble::new(vec![tree, iso], Some(vec![0.5]), 1).unwrap();
        let config = ModelConfig::builder().backend(BackendKind::Mip).build().unwrap();
        Problem::new(schema, ensemble, config)
    }

    #[test]
    fn write_then_read_is_identity() {
        let original = problem();
        let mut buf = Vec::new();
        original.write_json(&mut buf).unwrap();
        let back = Problem::read_json(buf.as_slice()).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn rejects_unknown_version() {
        let mut buf = Vec::new();
        problem().write_json(&mut buf).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        value["version"] = 99.into();
        let err = Problem::from_json_str(&value.to_string()).unwrap_err();
        assert!(matches!(err, ReadError::UnsupportedVersion(99)));
    }

    #[test]
    fn rejects_split_on_missing_feature() {
        let json = r#"{
            "version": 1,
            "features": [{"name": "f", "kind": "binary"}],
            "ensemble": {"trees": [{
                "type": "threshold", "feature": 3, "threshold": 0.5,
                "left": {"type": "leaf", "values": [[1.0]]},
                "right": {"type": "leaf", "values": [[0.0]]}
            }]}
        }"#;
        let err = Problem::from_json_str(json).unwrap_err();
        assert!(matches!(err, ReadError::Validation(msg) if msg.contains("feature 3")));
    }

    #[test]
    fn malformed_json_is_a_json_error() {
        assert!(matches!(Problem::from_json_str("{"), Err(ReadError::Json(_))));
    }
}
