//! Tree compilation.
//!
//! Every node of a [`Tree`] gets an activation variable. Activations obey
//! flow conservation from the root:
//!
//! ```text
//! act(root) == 1
//! act(parent) == act(left) + act(right)
//! ```
//!
//! and each child is bounded by its branch condition on the split feature:
//!
//! | split | left child | right child |
//! |---|---|---|
//! | numeric, `levels[j+1] == t` | `<= 1 - mu[j]` | `<= mu[j]` |
//! | binary, `0 < t <= 1` | `<= 1 - x` | `<= x` |
//! | categorical on codes `S` | `<= 1 - Σ_{c∈S} ind[c]` | `<= Σ_{c∈S} ind[c]` |
//!
//! Every branch condition is integral: ladder indicators referenced by a
//! split are made binary when activations are relaxed. By induction from the
//! root each activation is then 0 or 1 and exactly one leaf per tree is
//! active.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::backend::Backend;
use super::feature::FeatureVar;
use crate::error::ConsistencyError;
use crate::program::{LinExpr, Program, VarId, VarKind};
use crate::repr::{FeatureSchema, FeatureValue, NodeId, Split, Tree};
use crate::solve::Solution;
use crate::utils::average_path_length;

/// Domain of node activation variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    /// 0/1 activations.
    #[default]
    Binary,
    /// Activations relaxed to `[0, 1]`; integrality follows from the
    /// branch conditions, whose ladder indicators are kept binary.
    Continuous,
}

/// Branch condition of a split, resolved against the schema.
#[derive(Debug, Clone, PartialEq)]
enum Branch {
    Ladder { feature: usize, index: usize },
    Binary { feature: usize },
    Codes { feature: usize, codes: Vec<usize> },
}

/// Compiled leaf: activation plus the data its contribution needs.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafVar {
    pub node: NodeId,
    pub activation: VarId,
    /// Leaf values with shape `(n_outputs, n_classes)`.
    pub values: Array2<f64>,
    pub depth: usize,
    pub n_samples: usize,
}

/// Program variables of one compiled tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeVar {
    activations: Vec<VarId>,
    leaves: Vec<LeafVar>,
    shape: (usize, usize),
}

impl TreeVar {
    /// Check that every split of `tree` can be expressed over `schema`.
    pub fn check(tree: &Tree, schema: &FeatureSchema) -> Result<(), ConsistencyError> {
        resolve(tree, schema).map(|_| ())
    }

    /// Declare activations and flow constraints for `tree`.
    ///
    /// `features` are the compiled features of `schema`, in schema order.
    /// Nothing is added to `program` if a split cannot be resolved.
    pub fn build<B: Backend + ?Sized>(
        program: &mut Program,
        backend: &B,
        tree: &Tree,
        schema: &FeatureSchema,
        features: &[FeatureVar],
        index: usize,
    ) -> Result<Self, ConsistencyError> {
        let branches = resolve(tree, schema)?;
        let mut conditions = Vec::with_capacity(branches.len());
        for branch in &branches {
            conditions.push(match branch {
                None => None,
                Some(b) => Some(condition(b, features, schema)?),
            });
        }

        if backend.relaxed_flow() {
            for (branch, condition) in branches.iter().zip(&conditions) {
                if let (Some(Branch::Ladder { .. }), Some(cond)) = (branch, condition) {
                    for &(mu, _) in cond.terms() {
                        program.set_var_kind(mu, VarKind::Binary);
                    }
                }
            }
        }

        let activations: Vec<VarId> = (0..tree.n_nodes())
            .map(|n| backend.activation(program, &format!("t{index}.n{n}")))
            .collect();

        program.add_constraint(
            LinExpr::from(activations[0]).equals(1.0),
            format!("t{index}.root"),
        );

        for (node, condition) in conditions.into_iter().enumerate() {
            let (Some(right_cond), Some((left, right))) =
                (condition, tree.children(node as NodeId))
            else {
                continue;
            };
            let (parent, left, right) = (
                activations[node],
                activations[left as usize],
                activations[right as usize],
            );
            program.add_constraint(
                LinExpr::from(parent).equals(LinExpr::from(left) + right),
                format!("t{index}.n{node}.flow"),
            );
            program.add_constraint(
                LinExpr::from(left).leq(LinExpr::constant(1.0) - right_cond.clone()),
                format!("t{index}.n{node}.left"),
            );
            program.add_constraint(
                LinExpr::from(right).leq(right_cond),
                format!("t{index}.n{node}.right"),
            );
        }

        let leaves = tree
            .leaves()
            .iter()
            .filter_map(|&node| {
                tree.leaf(node).map(|leaf| LeafVar {
                    node,
                    activation: activations[node as usize],
                    values: leaf.values.clone(),
                    depth: tree.depth(node).unwrap_or_default(),
                    n_samples: leaf.n_samples,
                })
            })
            .collect();

        Ok(Self {
            activations,
            leaves,
            shape: tree.shape(),
        })
    }

    /// Activation of `node`.
    #[inline]
    pub fn activation(&self, node: NodeId) -> Option<VarId> {
        self.activations.get(node as usize).copied()
    }

    /// Activations of all nodes in preorder.
    #[inline]
    pub fn activations(&self) -> &[VarId] {
        &self.activations
    }

    /// Leaves in preorder.
    #[inline]
    pub fn leaves(&self) -> &[LeafVar] {
        &self.leaves
    }

    /// `(n_outputs, n_classes)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Isolation path length `Σ act(leaf)·(depth + c(n_samples))`.
    pub fn length(&self) -> LinExpr {
        let mut expr = LinExpr::new();
        for leaf in &self.leaves {
            expr.add_term(
                leaf.activation,
                leaf.depth as f64 + average_path_length(leaf.n_samples),
            );
        }
        expr
    }

    /// Leaf whose activation rounds to one.
    pub fn active_leaf(&self, solution: &Solution) -> Option<NodeId> {
        self.leaves
            .iter()
            .find(|l| solution.value(l.activation).round() == 1.0)
            .map(|l| l.node)
    }

    /// Activate the root-to-leaf path of `sample` in `solution`.
    pub fn lift(
        &self,
        tree: &Tree,
        sample: &[FeatureValue],
        solution: &mut Solution,
    ) -> Result<(), ConsistencyError> {
        for &act in &self.activations {
            solution.set(act, 0.0);
        }
        let mut node: NodeId = 0;
        loop {
            solution.set(self.activations[node as usize], 1.0);
            let (Some(split), Some((left, right))) = (tree.split(node), tree.children(node)) else {
                return Ok(());
            };
            let index = split.feature();
            let goes_right = sample
                .get(index)
                .and_then(|v| split.goes_right(v))
                .ok_or(ConsistencyError::SampleMismatch { index })?;
            node = if goes_right { right } else { left };
        }
    }
}

/// Resolve every split of `tree` against `schema`, in preorder.
///
/// Leaves map to `None`.
fn resolve(tree: &Tree, schema: &FeatureSchema) -> Result<Vec<Option<Branch>>, ConsistencyError> {
    (0..tree.n_nodes() as NodeId)
        .map(|node| tree.split(node).map(|s| resolve_split(s, schema)).transpose())
        .collect()
}

fn resolve_split(split: &Split, schema: &FeatureSchema) -> Result<Branch, ConsistencyError> {
    let index = split.feature();
    let (Some(feature), Some(name)) = (schema.feature(index), schema.name(index)) else {
        return Err(ConsistencyError::UnknownFeature {
            index,
            n_features: schema.len(),
        });
    };
    let kind_error = |split: &'static str| ConsistencyError::SplitKind {
        feature: name.to_string(),
        split,
        kind: feature.kind().as_str(),
    };

    match split {
        Split::Threshold { threshold, .. } => {
            if feature.is_binary() {
                if *threshold > 0.0 && *threshold <= 1.0 {
                    return Ok(Branch::Binary { feature: index });
                }
                return Err(ConsistencyError::BinaryThreshold {
                    feature: name.to_string(),
                    threshold: *threshold,
                });
            }
            match feature.ladder_index(*threshold) {
                Ok(Some(j)) => Ok(Branch::Ladder {
                    feature: index,
                    index: j,
                }),
                Ok(None) => Err(ConsistencyError::ThresholdNotInLevels {
                    feature: name.to_string(),
                    threshold: *threshold,
                }),
                Err(_) => Err(kind_error("threshold")),
            }
        }
        Split::Categories { codes, .. } => {
            if !feature.is_one_hot() {
                return Err(kind_error("categorical"));
            }
            let codes = codes
                .iter()
                .map(|code| {
                    feature
                        .code_index(code)
                        .map_err(|_| ConsistencyError::UnknownSplitCode {
                            feature: name.to_string(),
                            code: code.clone(),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Branch::Codes {
                feature: index,
                codes,
            })
        }
    }
}

/// Expression that is one iff the branch routes right.
fn condition(
    branch: &Branch,
    features: &[FeatureVar],
    schema: &FeatureSchema,
) -> Result<LinExpr, ConsistencyError> {
    let feature = match branch {
        Branch::Ladder { feature, .. } | Branch::Binary { feature } | Branch::Codes { feature, .. } => {
            *feature
        }
    };
    let var = features.get(feature).ok_or(ConsistencyError::UnknownFeature {
        index: feature,
        n_features: features.len(),
    })?;
    let domain = |e: crate::error::DomainError| ConsistencyError::Decode {
        feature: schema.name(feature).unwrap_or_default().to_string(),
        reason: e.to_string(),
    };

    Ok(match branch {
        Branch::Ladder { index, .. } => var.mu(*index).map_err(domain)?.into(),
        Branch::Binary { .. } => var.x().map_err(domain)?.into(),
        Branch::Codes { codes, .. } => codes
            .iter()
            .map(|&k| var.code(k).map(LinExpr::from))
            .sum::<Result<LinExpr, _>>()
            .map_err(domain)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::backend::CpBackend;
    use crate::repr::{Feature, Node};

    fn schema() -> FeatureSchema {
        FeatureSchema::from_features([
            ("age", Feature::continuous([0.0, 1.0, 2.0, 3.0]).unwrap()),
            ("color", Feature::one_hot(["red", "green", "blue"]).unwrap()),
            ("smoker", Feature::binary()),
        ])
        .unwrap()
    }

    fn compile(tree: &Tree) -> Result<(Program, Vec<FeatureVar>, TreeVar), ConsistencyError> {
        let schema = schema();
        let backend = CpBackend::new(100, 0.01);
        let mut p = Program::new();
        let features: Vec<_> = schema
            .iter()
            .map(|(n, f)| FeatureVar::build(&mut p, &backend, n, f))
            .collect();
        let t = TreeVar::build(&mut p, &backend, tree, &schema, &features, 0)?;
        Ok((p, features, t))
    }

    fn tree() -> Tree {
        Tree::new(Node::threshold(
            0,
            2.0,
            Node::categories(1, ["red", "blue"], Node::leaf([1.0, 0.0]), Node::leaf([0.0, 1.0])),
            Node::threshold(2, 1.0, Node::leaf([0.3, 0.7]), Node::leaf([0.6, 0.4])),
        ))
        .unwrap()
    }

    #[test]
    fn declares_flow_per_node() {
        let (p, _, t) = compile(&tree()).unwrap();
        assert_eq!(t.activations().len(), 7);
        assert_eq!(t.leaves().len(), 4);
        assert_eq!(t.shape(), (1, 2));
        // features: 4 + 3 + 1 vars, trees: 7
        assert_eq!(p.n_vars(), 15);
    }

    #[test]
    fn lifted_paths_are_feasible() {
        let tree = tree();
        let schema = schema();
        let (p, features, t) = compile(&tree).unwrap();
        let samples = [
            (vec![FeatureValue::Number(0.5), FeatureValue::Code("red".into()), FeatureValue::Number(0.0)], 3),
            (vec![FeatureValue::Number(1.9), FeatureValue::Code("green".into()), FeatureValue::Number(1.0)], 2),
            (vec![FeatureValue::Number(2.0), FeatureValue::Code("green".into()), FeatureValue::Number(0.0)], 5),
            (vec![FeatureValue::Number(7.0), FeatureValue::Code("blue".into()), FeatureValue::Number(1.0)], 6),
        ];
        for (sample, leaf) in samples {
            let mut s = Solution::zeros(&p);
            for ((f, (_, feature)), v) in features.iter().zip(schema.iter()).zip(&sample) {
                f.lift(feature, v, &mut s).unwrap();
            }
            t.lift(&tree, &sample, &mut s).unwrap();
            assert!(p.is_feasible(&s, 1e-9), "sample {sample:?}");
            assert_eq!(t.active_leaf(&s), Some(leaf));
            assert_eq!(tree.leaf_for(&sample).unwrap(), leaf);
        }
    }

    #[test]
    fn relaxed_flow_keeps_split_indicators_binary() {
        use crate::encode::backend::MipBackend;

        let schema = FeatureSchema::from_features([(
            "f",
            Feature::continuous([0.0, 1.0, 2.0, 3.0]).unwrap(),
        )])
        .unwrap();
        let tree = Tree::new(Node::threshold(0, 2.0, Node::leaf([1.0, 0.0]), Node::leaf([0.0, 1.0])))
            .unwrap();
        let backend = MipBackend::new(1e-3, FlowType::Continuous);
        let mut p = Program::new();
        let features = vec![FeatureVar::build(&mut p, &backend, "f", schema.feature(0).unwrap())];
        let t = TreeVar::build(&mut p, &backend, &tree, &schema, &features, 0).unwrap();

        let ladder = features[0].ladder();
        assert_eq!(p.var(ladder[0]).unwrap().kind, VarKind::Continuous);
        assert_eq!(p.var(ladder[1]).unwrap().kind, VarKind::Binary);
        assert_eq!(p.var(ladder[2]).unwrap().kind, VarKind::Continuous);
        assert_eq!(p.var(t.activations()[1]).unwrap().kind, VarKind::Continuous);

        // x = 1.5 with the flow split evenly between both leaves
        let mut s = Solution::zeros(&p);
        s.set(ladder[0], 1.0);
        s.set(ladder[1], 0.5);
        s.set(features[0].x().unwrap(), 1.5);
        s.set(t.activations()[0], 1.0);
        s.set(t.activations()[1], 0.5);
        s.set(t.activations()[2], 0.5);
        assert_eq!(p.violations(&s, 1e-9), vec![Err(ladder[1])]);
    }

    #[test]
    fn unknown_threshold_is_inconsistent() {
        let bad = Tree::new(Node::threshold(0, 1.5, Node::leaf([1.0]), Node::leaf([0.0]))).unwrap();
        assert!(matches!(
            compile(&bad),
            Err(ConsistencyError::ThresholdNotInLevels { threshold, .. }) if threshold == 1.5
        ));
    }

    #[test]
    fn split_kind_mismatches() {
        let threshold_on_codes =
            Tree::new(Node::threshold(1, 1.0, Node::leaf([1.0]), Node::leaf([0.0]))).unwrap();
        assert!(matches!(
            TreeVar::check(&threshold_on_codes, &schema()),
            Err(ConsistencyError::SplitKind { split: "threshold", .. })
        ));

        let codes_on_numeric =
            Tree::new(Node::categories(0, ["a"], Node::leaf([1.0]), Node::leaf([0.0]))).unwrap();
        assert!(matches!(
            TreeVar::check(&codes_on_numeric, &schema()),
            Err(ConsistencyError::SplitKind { split: "categorical", .. })
        ));

        let unknown_code =
            Tree::new(Node::categories(1, ["pink"], Node::leaf([1.0]), Node::leaf([0.0]))).unwrap();
        assert!(matches!(
            TreeVar::check(&unknown_code, &schema()),
            Err(ConsistencyError::UnknownSplitCode { .. })
        ));

        let binary_out_of_range =
            Tree::new(Node::threshold(2, 1.5, Node::leaf([1.0]), Node::leaf([0.0]))).unwrap();
        assert!(matches!(
            TreeVar::check(&binary_out_of_range, &schema()),
            Err(ConsistencyError::BinaryThreshold { .. })
        ));

        let missing = Tree::new(Node::threshold(9, 1.0, Node::leaf([1.0]), Node::leaf([0.0]))).unwrap();
        assert_eq!(
            TreeVar::check(&missing, &schema()),
            Err(ConsistencyError::UnknownFeature { index: 9, n_features: 3 })
        );
    }

    #[test]
    fn length_weights_leaves_by_depth_and_samples() {
        let tree = Tree::new(Node::threshold(
            2,
            1.0,
            Node::Leaf(crate::repr::Leaf::new([0.0]).with_samples(2)),
            Node::leaf([0.0]),
        ))
        .unwrap();
        let (_, _, t) = compile(&tree).unwrap();
        let length = t.length();
        let left = t.activation(1).unwrap();
        let right = t.activation(2).unwrap();
        assert_eq!(length.eval(|v| if v == left { 1.0 } else { 0.0 }), 2.0);
        assert_eq!(length.eval(|v| if v == right { 1.0 } else { 0.0 }), 1.0);
    }
}
