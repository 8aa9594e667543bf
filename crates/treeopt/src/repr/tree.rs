//! Decision tree representation.
//!
//! This module provides:
//! - [`Node`]: recursive, exclusively-owned tree structure used to describe a tree
//! - [`Tree`]: immutable, indexed tree built from a [`Node`]
//!
//! Nodes are numbered in preorder: the root is `0`, a split's left subtree
//! follows it directly and the right subtree comes after the left one. Leaf
//! order, depths and the output shape are derived once at construction.

use ndarray::Array2;
use super::schema::FeatureValue;
use crate::error::ConsistencyError;

/// Node identifier: index into the tree's preorder arrays.
pub type NodeId = u32;

// ============================================================================
// Split / Leaf / Node
// ============================================================================

/// Branch condition of an internal node.
#[derive(Debug, Clone, PartialEq)]
pub enum Split {
    /// Numeric split: go left if value < threshold.
    Threshold { feature: usize, threshold: f64 },
    /// Categorical split: go right if the code is in `codes`.
    Categories { feature: usize, codes: Vec<String> },
}

impl Split {
    /// Index of the feature this split tests.
    #[inline]
    pub fn feature(&self) -> usize {
        match self {
            Self::Threshold { feature, .. } | Self::Categories { feature, .. } => *feature,
        }
    }

    /// Whether a sample value is routed to the right child.
    ///
    /// Returns `None` when the value kind does not match the split kind.
    pub fn goes_right(&self, value: &FeatureValue) -> Option<bool> {
        match (self, value) {
            (Self::Threshold { threshold, .. }, FeatureValue::Number(v)) => Some(*v >= *threshold),
            (Self::Categories { codes, .. }, FeatureValue::Code(c)) => Some(codes.contains(c)),
            _ => None,
        }
    }
}

/// Per-output, per-class values stored at a leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// Leaf values with shape `(n_outputs, n_classes)`.
    pub values: Array2<f64>,
    /// Training samples that reached this leaf (used by isolation trees).
    pub n_samples: usize,
}

impl Leaf {
    /// Single-output leaf with one value per class.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        let values: Vec<f64> = values.into();
        Self {
            values: Array2::from_shape_fn((1, values.len()), |(_, j)| values[j]),
            n_samples: 0,
        }
    }

    /// Leaf with an explicit `(n_outputs, n_classes)` value matrix.
    pub fn with_outputs(values: Array2<f64>) -> Self {
        Self {
            values,
            n_samples: 0,
        }
    }

    /// Set the sample count.
    pub fn with_samples(mut self, n_samples: usize) -> Self {
        self.n_samples = n_samples;
        self
    }

    /// `(n_outputs, n_classes)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }
}

/// Recursive tree node. Each node exclusively owns its children.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Split {
        split: Split,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf(Leaf),
}

impl Node {
    /// Single-output leaf.
    pub fn leaf(values: impl Into<Vec<f64>>) -> Self {
        Self::Leaf(Leaf::new(values))
    }

    /// Numeric split: `value < threshold` goes left.
    pub fn threshold(feature: usize, threshold: f64, left: Node, right: Node) -> Self {
        Self::Split {
            split: Split::Threshold { feature, threshold },
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Categorical split: codes in `codes` go right.
    pub fn categories<S: Into<String>>(
        feature: usize,
        codes: impl IntoIterator<Item = S>,
        left: Node,
        right: Node,
    ) -> Self {
        Self::Split {
            split: Split::Categories {
                feature,
                codes: codes.into_iter().map(Into::into).collect(),
            },
            left: Box::new(left),
            right: Box::new(right),
        }
    }
}

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Split {
        split: Split,
        left: NodeId,
        right: NodeId,
    },
    Leaf(Leaf),
}

/// Immutable decision tree indexed in preorder.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    slots: Vec<Slot>,
    depths: Vec<usize>,
    leaves: Vec<NodeId>,
    max_depth: usize,
    shape: (usize, usize),
}

impl Tree {
    /// Index a tree. All leaves must share one `(n_outputs, n_classes)` shape.
    pub fn new(root: Node) -> Result<Self, ConsistencyError> {
        let mut tree = Self {
            slots: Vec::new(),
            depths: Vec::new(),
            leaves: Vec::new(),
            max_depth: 0,
            shape: (0, 0),
        };
        tree.flatten(root, 0);

        let mut leaves = tree.leaves.iter().map(|&id| tree.leaf_at(id));
        if let Some(first) = leaves.next() {
            let expected = first.shape();
            if let Some(bad) = leaves.find(|l| l.shape() != expected) {
                return Err(ConsistencyError::LeafShape {
                    expected,
                    got: bad.shape(),
                });
            }
            tree.shape = expected;
        }
        Ok(tree)
    }

    fn flatten(&mut self, node: Node, depth: usize) -> NodeId {
        let id = self.slots.len() as NodeId;
        self.depths.push(depth);
        self.max_depth = self.max_depth.max(depth);
        match node {
            Node::Leaf(leaf) => {
                self.slots.push(Slot::Leaf(leaf));
                self.leaves.push(id);
            }
            Node::Split { split, left, right } => {
                // Children are patched in once their subtrees are numbered.
                self.slots.push(Slot::Split {
                    split,
                    left: 0,
                    right: 0,
                });
                let l = self.flatten(*left, depth + 1);
                let r = self.flatten(*right, depth + 1);
                if let Slot::Split { left, right, .. } = &mut self.slots[id as usize] {
                    *left = l;
                    *right = r;
                }
            }
        }
        id
    }

    fn leaf_at(&self, id: NodeId) -> &Leaf {
        match &self.slots[id as usize] {
            Slot::Leaf(leaf) => leaf,
            Slot::Split { .. } => unreachable!("leaf index points at a split"),
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.slots.len()
    }

    /// Leaves in preorder.
    #[inline]
    pub fn leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    /// Depth of the deepest node (root has depth 0).
    #[inline]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// `(n_outputs, n_classes)` shared by all leaves.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        self.shape
    }

    #[inline]
    pub fn n_outputs(&self) -> usize {
        self.shape.0
    }

    #[inline]
    pub fn n_classes(&self) -> usize {
        self.shape.1
    }

    #[inline]
    fn slot(&self, node: NodeId) -> Option<&Slot> {
        self.slots.get(node as usize)
    }

    /// Whether `node` is a leaf; `false` for unknown nodes.
    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> bool {
        matches!(self.slot(node), Some(Slot::Leaf(_)))
    }

    /// Depth of `node`, `None` if the tree has no such node.
    #[inline]
    pub fn depth(&self, node: NodeId) -> Option<usize> {
        self.depths.get(node as usize).copied()
    }

    /// Split of an internal node.
    pub fn split(&self, node: NodeId) -> Option<&Split> {
        match self.slot(node)? {
            Slot::Split { split, .. } => Some(split),
            Slot::Leaf(_) => None,
        }
    }

    /// `(left, right)` children of an internal node.
    pub fn children(&self, node: NodeId) -> Option<(NodeId, NodeId)> {
        match self.slot(node)? {
            Slot::Split { left, right, .. } => Some((*left, *right)),
            Slot::Leaf(_) => None,
        }
    }

    /// Leaf stored at `node`.
    pub fn leaf(&self, node: NodeId) -> Option<&Leaf> {
        match self.slot(node)? {
            Slot::Leaf(leaf) => Some(leaf),
            Slot::Split { .. } => None,
        }
    }

    /// Nodes at the given depth, in preorder.
    pub fn nodes_at(&self, depth: usize) -> impl Iterator<Item = NodeId> + '_ {
        self.depths
            .iter()
            .enumerate()
            .filter(move |(_, &d)| d == depth)
            .map(|(i, _)| i as NodeId)
    }

    /// Features referenced by any split.
    pub fn split_features(&self) -> impl Iterator<Item = usize> + '_ {
        self.slots.iter().filter_map(|s| match s {
            Slot::Split { split, .. } => Some(split.feature()),
            Slot::Leaf(_) => None,
        })
    }

    /// Route a sample to its leaf.
    pub fn leaf_for(&self, sample: &[FeatureValue]) -> Result<NodeId, ConsistencyError> {
        let mut node: NodeId = 0;
        while let Slot::Split { split, left, right } = &self.slots[node as usize] {
            let index = split.feature();
            let right_branch = sample
                .get(index)
                .and_then(|v| split.goes_right(v))
                .ok_or(ConsistencyError::SampleMismatch { index })?;
            node = if right_branch { *right } else { *left };
        }
        Ok(node)
    }

    /// Rebuild the recursive representation.
    pub fn to_node(&self) -> Node {
        self.node_at(0)
    }

    fn node_at(&self, id: NodeId) -> Node {
        match &self.slots[id as usize] {
            Slot::Leaf(leaf) => Node::Leaf(leaf.clone()),
            Slot::Split { split, left, right } => Node::Split {
                split: split.clone(),
                left: Box::new(self.node_at(*left)),
                right: Box::new(self.node_at(*right)),
            },
        }
    }
}

impl TryFrom<Node> for Tree {
    type Error = ConsistencyError;

    fn try_from(root: Node) -> Result<Self, Self::Error> {
        Tree::new(root)
    }
}
