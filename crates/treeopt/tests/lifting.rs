//! Property-based tests for the compiled encoding.
//!
//! Random trees over a mixed schema are compiled with every backend and flow
//! type. The canonical assignment of any input must satisfy the program, route
//! every tree to the leaf the tree itself picks and reproduce the ensemble's
//! scores.

use ndarray::Array1;
use proptest::collection::vec as prop_vec;
use proptest::prelude::*;

use treeopt::encode::{BackendKind, FlowType, Model};
use treeopt::repr::{Ensemble, Feature, FeatureSchema, Node, Tree};
use treeopt::ModelConfig;

// =============================================================================
// Generators
// =============================================================================

/// `x` continuous over `0..=3`, `n` discrete over `{1, 2, 5}`, `b` binary and
/// `c` one-hot over `{a, b, c}`.
fn schema() -> FeatureSchema {
    FeatureSchema::from_features([
        ("x", Feature::continuous([0.0, 1.0, 2.0, 3.0]).unwrap()),
        ("n", Feature::discrete([1.0, 2.0, 5.0]).unwrap()),
        ("b", Feature::binary()),
        ("c", Feature::one_hot(["a", "b", "c"]).unwrap()),
    ])
    .unwrap()
}

fn split(feature: usize, pick: usize, left: Node, right: Node) -> Node {
    match feature {
        0 => Node::threshold(0, [1.0, 2.0, 3.0][pick], left, right),
        1 => Node::threshold(1, [2.0, 5.0, 5.0][pick], left, right),
        2 => Node::threshold(2, [0.5, 1.0, 0.25][pick], left, right),
        _ => {
            let codes: &[&str] = match pick {
                0 => &["a"],
                1 => &["b", "c"],
                _ => &["c"],
            };
            Node::categories(3, codes.iter().copied(), left, right)
        }
    }
}

fn arb_node() -> impl Strategy<Value = Node> {
    let leaf = prop_vec(-2.0f64..2.0, 2).prop_map(Node::leaf);
    leaf.prop_recursive(4, 31, 2, |inner| {
        (0usize..4, 0usize..3, inner.clone(), inner)
            .prop_map(|(feature, pick, left, right)| split(feature, pick, left, right))
    })
}

fn arb_ensemble() -> impl Strategy<Value = Ensemble> {
    (prop_vec(arb_node(), 1..4), prop_vec(0.0f64..3.0, 3)).prop_map(|(nodes, weights)| {
        let trees: Vec<Tree> = nodes.into_iter().map(|n| Tree::new(n).unwrap()).collect();
        let weights = weights[..trees.len()].to_vec();
        Ensemble::new(trees, Some(weights), 0).unwrap()
    })
}

/// Flat input row: `[x, n, b, c=a, c=b, c=c]`.
fn arb_row() -> impl Strategy<Value = Array1<f64>> {
    (
        -1.0f64..4.0,
        prop::sample::select(vec![1.0, 2.0, 3.0, 5.0, 7.0]),
        prop::bool::ANY,
        0usize..3,
    )
        .prop_map(|(x, n, b, code)| {
            let mut row = Array1::zeros(6);
            row[0] = x;
            row[1] = n;
            row[2] = if b { 1.0 } else { 0.0 };
            row[3 + code] = 1.0;
            row
        })
}

fn arb_config() -> impl Strategy<Value = ModelConfig> {
    (
        prop_oneof![Just(BackendKind::Cp), Just(BackendKind::Mip)],
        prop_oneof![Just(FlowType::Binary), Just(FlowType::Continuous)],
    )
        .prop_map(|(backend, flow)| {
            ModelConfig::builder()
                .backend(backend)
                .flow(flow)
                .build()
                .unwrap()
        })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn lifted_input_is_feasible(
        ensemble in arb_ensemble(),
        row in arb_row(),
        config in arb_config(),
    ) {
        let mut model = Model::new(schema(), ensemble, config).unwrap();
        model.build().unwrap();

        let solution = model.assignment_for(row.view()).unwrap();
        let violations = model.program().violations(&solution, 1e-9);
        prop_assert!(violations.is_empty(), "violations: {:?}", violations);
    }

    #[test]
    fn exactly_one_leaf_is_active(
        ensemble in arb_ensemble(),
        row in arb_row(),
        config in arb_config(),
    ) {
        let mut model = Model::new(schema(), ensemble, config).unwrap();
        model.build().unwrap();

        let sample = model.schema().parse_row(row.view()).unwrap();
        let solution = model.assignment_for(row.view()).unwrap();
        let aggregator = model.aggregator().unwrap();

        for (var, tree) in aggregator.trees().iter().zip(model.ensemble().trees()) {
            let active: Vec<_> = var
                .leaves()
                .iter()
                .filter(|leaf| solution.value(leaf.activation) == 1.0)
                .map(|leaf| leaf.node)
                .collect();
            prop_assert_eq!(active.len(), 1);
            prop_assert_eq!(Some(active[0]), var.active_leaf(&solution));
            prop_assert_eq!(active[0], tree.leaf_for(&sample).unwrap());
        }
    }

    #[test]
    fn compiled_scores_match_ensemble(
        ensemble in arb_ensemble(),
        row in arb_row(),
        config in arb_config(),
    ) {
        let mut model = Model::new(schema(), ensemble, config).unwrap();
        model.build().unwrap();

        let sample = model.schema().parse_row(row.view()).unwrap();
        let solution = model.assignment_for(row.view()).unwrap();
        let expected = model.ensemble().scores(&sample).unwrap();
        let got = model.scores(&solution).unwrap();

        // CP rounds each weighted leaf value to 1 / score_scale
        let tol = 3.0 / f64::from(model.config().score_scale) + 1e-9;
        for (e, g) in expected.iter().zip(got.iter()) {
            prop_assert!((e - g).abs() <= tol, "expected {e}, got {g}");
        }
    }

    #[test]
    fn explained_input_routes_like_original(
        ensemble in arb_ensemble(),
        row in arb_row(),
        config in arb_config(),
    ) {
        let mut model = Model::new(schema(), ensemble, config).unwrap();
        model.build().unwrap();

        let sample = model.schema().parse_row(row.view()).unwrap();
        let solution = model.assignment_for(row.view()).unwrap();
        let explained = model.explain(&solution).unwrap();
        let decoded = model.schema().parse_row(explained.row()).unwrap();

        for tree in model.ensemble().trees() {
            prop_assert_eq!(tree.leaf_for(&decoded).unwrap(), tree.leaf_for(&sample).unwrap());
        }
    }
}
