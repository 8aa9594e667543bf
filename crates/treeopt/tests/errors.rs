//! Error reporting across the public API.

use ndarray::array;
use rstest::rstest;

use treeopt::encode::Model;
use treeopt::repr::{Ensemble, Feature, FeatureSchema, Node, Tree};
use treeopt::{ConfigError, ConsistencyError, DomainError, Error, ModelConfig};

fn schema() -> FeatureSchema {
    FeatureSchema::from_features([
        ("age", Feature::continuous([0.0, 10.0, 20.0]).unwrap()),
        ("smoker", Feature::binary()),
        ("color", Feature::one_hot(["red", "green"]).unwrap()),
    ])
    .unwrap()
}

fn stump(split: fn(Node, Node) -> Node) -> Ensemble {
    let tree = Tree::new(split(Node::leaf([1.0, 0.0]), Node::leaf([0.0, 1.0]))).unwrap();
    Ensemble::from_trees(vec![tree]).unwrap()
}

fn build(ensemble: Ensemble) -> (Model, Result<(), Error>) {
    let mut model = Model::new(schema(), ensemble, ModelConfig::default()).unwrap();
    let result = model.build();
    (model, result)
}

// =============================================================================
// Build-time consistency
// =============================================================================

#[rstest]
#[case::threshold_not_a_level(|l, r| Node::threshold(0, 15.0, l, r))]
#[case::threshold_is_lowest_level(|l, r| Node::threshold(0, 0.0, l, r))]
#[case::binary_threshold_too_high(|l, r| Node::threshold(1, 1.5, l, r))]
#[case::binary_threshold_zero(|l, r| Node::threshold(1, 0.0, l, r))]
#[case::threshold_on_one_hot(|l, r| Node::threshold(2, 1.0, l, r))]
#[case::categories_on_numeric(|l, r| Node::categories(0, ["red"], l, r))]
#[case::unknown_code(|l, r| Node::categories(2, ["blue"], l, r))]
#[case::unknown_feature(|l, r| Node::threshold(7, 1.0, l, r))]
fn inconsistent_splits_leave_program_empty(#[case] split: fn(Node, Node) -> Node) {
    let (model, result) = build(stump(split));
    assert!(matches!(result, Err(Error::Consistency(_))), "got {result:?}");
    assert!(!model.is_built());
    assert_eq!(model.program().n_vars(), 0);
    assert_eq!(model.program().n_constraints(), 0);
}

#[test]
fn consistency_errors_name_the_feature() {
    let (_, result) = build(stump(|l, r| Node::threshold(0, 15.0, l, r)));
    assert_eq!(
        result.unwrap_err(),
        Error::Consistency(ConsistencyError::ThresholdNotInLevels {
            feature: "age".into(),
            threshold: 15.0,
        })
    );

    let (_, result) = build(stump(|l, r| Node::categories(2, ["blue"], l, r)));
    assert_eq!(
        result.unwrap_err().to_string(),
        "categorical split on color references unknown code blue"
    );
}

#[test]
fn mismatched_tree_shapes_are_rejected() {
    let two = Tree::new(Node::threshold(1, 1.0, Node::leaf([1.0, 0.0]), Node::leaf([0.0, 1.0])))
        .unwrap();
    let three = Tree::new(Node::leaf([1.0, 0.0, 0.0])).unwrap();
    let err = Ensemble::from_trees(vec![two, three]).unwrap_err();
    assert!(matches!(
        err,
        Error::Consistency(ConsistencyError::ShapeMismatch { tree: 1, .. })
    ));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn ensemble_configuration_errors() {
    assert_eq!(
        Ensemble::from_trees(vec![]).unwrap_err(),
        Error::Config(ConfigError::EmptyEnsemble)
    );

    let tree = || Tree::new(Node::leaf([1.0, 0.0])).unwrap();
    assert!(matches!(
        Ensemble::new(vec![tree(), tree()], Some(vec![1.0]), 0),
        Err(Error::Config(ConfigError::WeightLength { expected: 2, got: 1 }))
    ));
    assert!(matches!(
        Ensemble::new(vec![tree()], Some(vec![-1.0]), 0),
        Err(Error::Config(ConfigError::InvalidWeight { index: 0, .. }))
    ));
    assert!(matches!(
        Ensemble::new(vec![tree()], None, 1),
        Err(Error::Config(ConfigError::TooManyIsolators { .. }))
    ));
}

#[test]
fn feature_configuration_errors() {
    assert_eq!(Feature::continuous([1.0, 1.0]).unwrap_err(), ConfigError::TooFewLevels(1));
    assert_eq!(Feature::discrete([f64::NAN, 1.0]).unwrap_err(), ConfigError::NanLevel);
    assert_eq!(Feature::one_hot(Vec::<String>::new()).unwrap_err(), ConfigError::EmptyCodes);
    assert!(matches!(
        FeatureSchema::from_features([("a", Feature::binary()), ("a", Feature::binary())]),
        Err(ConfigError::DuplicateFeature(name)) if name == "a"
    ));
}

#[test]
fn invalid_model_config() {
    let ensemble = stump(|l, r| Node::threshold(1, 1.0, l, r));
    let config = ModelConfig {
        epsilon: 0.0,
        ..ModelConfig::default()
    };
    assert!(matches!(
        Model::new(schema(), ensemble, config),
        Err(Error::Config(ConfigError::InvalidEpsilon(_)))
    ));
    assert_eq!(
        ModelConfig::builder().score_scale(0).build().unwrap_err(),
        ConfigError::InvalidScoreScale(0)
    );
}

// =============================================================================
// Queries
// =============================================================================

#[test]
fn objective_rejects_one_hot_schema_without_side_effects() {
    let (mut model, result) = build(stump(|l, r| Node::threshold(1, 1.0, l, r)));
    result.unwrap();
    let before = model.program().n_vars();

    let err = model
        .add_objective(array![5.0, 1.0, 1.0, 0.0].view(), 1)
        .unwrap_err();
    assert_eq!(
        err,
        Error::Domain(DomainError::UnsupportedObjective {
            feature: "color".into()
        })
    );
    assert_eq!(model.program().n_vars(), before);
    assert!(model.program().objective().is_none());
    assert!(model.garbage().is_empty());
}

#[test]
fn feature_accessors_check_kind() {
    let (model, result) = build(stump(|l, r| Node::threshold(1, 1.0, l, r)));
    result.unwrap();

    let age = model.feature("age").unwrap();
    assert!(age.mu(1).is_ok());
    assert_eq!(age.mu(2).unwrap_err(), DomainError::LadderIndex { index: 2, len: 2 });
    assert_eq!(age.code(0).unwrap_err(), DomainError::NotOneHot);

    let color = model.feature("color").unwrap();
    assert_eq!(color.x().unwrap_err(), DomainError::OneHotScalar);
    assert_eq!(color.mu(0).unwrap_err(), DomainError::NotNumeric);
    assert_eq!(color.code(2).unwrap_err(), DomainError::CodeIndex { index: 2, len: 2 });
    assert!(color.code(1).is_ok());

    let smoker = model.feature("smoker").unwrap();
    assert!(smoker.x().is_ok());
    assert_eq!(smoker.mu(0).unwrap_err(), DomainError::NotNumeric);
}

#[test]
fn level_accessors_check_kind() {
    let s = schema();
    assert_eq!(s.get("smoker").unwrap().levels().unwrap_err(), DomainError::NotNumeric);
    assert_eq!(s.get("age").unwrap().codes().unwrap_err(), DomainError::NotOneHot);
    assert_eq!(
        s.get("color").unwrap().code_index("blue").unwrap_err(),
        DomainError::UnknownCode("blue".into())
    );

    let mut discrete = Feature::discrete([1.0, 2.0]).unwrap();
    assert!(matches!(
        discrete.add_levels([3.0]),
        Err(Error::Domain(DomainError::NotContinuous))
    ));
}
