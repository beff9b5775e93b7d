//! # Computation Tree
//!
//! Matrix leaves plus four operators. Every child is owned by exactly one
//! parent.
//!
//! Evaluation happens in two phases:
//!
//! 1. **Associative rewrite** - `ADD(a, b, c, d)` becomes
//!    `ADD(ADD(ADD(a, b), c), d)` so every ADD/MULTIPLY is binary. Operand
//!    order is preserved, which keeps matrix multiplication correct.
//! 2. **Resolution** - the engine repeatedly takes the leftmost resolvable
//!    node in pre-order, computes it, and collapses it into a matrix leaf.

use std::fmt;

use lattice_core::RawMatrix;

use crate::error::{EngineError, EngineResult};

/// Operation carried by an inner node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    /// Element-wise sum of two matrices.
    Add,
    /// Matrix product of two matrices.
    Multiply,
    /// Element-wise sign flip.
    Negate,
    /// Row/column swap.
    Transpose,
}

impl Operator {
    /// True for operators that take a chain of operands.
    #[inline]
    #[must_use]
    pub const fn is_associative(self) -> bool {
        matches!(self, Self::Add | Self::Multiply)
    }

    /// Number of children after the associative rewrite.
    #[inline]
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::Add | Self::Multiply => 2,
            Self::Negate | Self::Transpose => 1,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Add => "ADD",
            Self::Multiply => "MULTIPLY",
            Self::Negate => "NEGATE",
            Self::Transpose => "TRANSPOSE",
        })
    }
}

/// Kind tag of a [`ComputationNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Resolved matrix leaf.
    Matrix,
    /// `ADD` node.
    Add,
    /// `MULTIPLY` node.
    Multiply,
    /// `NEGATE` node.
    Negate,
    /// `TRANSPOSE` node.
    Transpose,
}

impl From<Operator> for NodeKind {
    fn from(op: Operator) -> Self {
        match op {
            Operator::Add => Self::Add,
            Operator::Multiply => Self::Multiply,
            Operator::Negate => Self::Negate,
            Operator::Transpose => Self::Transpose,
        }
    }
}

/// One node of a matrix expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ComputationNode {
    /// A row-major matrix. Resolved nodes end up here too.
    Matrix(RawMatrix),
    /// An operator applied to its children, in order.
    Operation {
        /// The operator.
        op: Operator,
        /// Operands, left to right.
        children: Vec<ComputationNode>,
    },
}

impl ComputationNode {
    /// Creates a matrix leaf.
    #[must_use]
    pub fn matrix(rows: RawMatrix) -> Self {
        Self::Matrix(rows)
    }

    /// Creates an operator node.
    #[must_use]
    pub fn operation(op: Operator, children: Vec<ComputationNode>) -> Self {
        Self::Operation { op, children }
    }

    /// Creates an `ADD` over two or more operands.
    #[must_use]
    pub fn add(children: Vec<ComputationNode>) -> Self {
        Self::operation(Operator::Add, children)
    }

    /// Creates a `MULTIPLY` over two or more operands.
    #[must_use]
    pub fn multiply(children: Vec<ComputationNode>) -> Self {
        Self::operation(Operator::Multiply, children)
    }

    /// Creates a `NEGATE` of `child`.
    #[must_use]
    pub fn negate(child: ComputationNode) -> Self {
        Self::operation(Operator::Negate, vec![child])
    }

    /// Creates a `TRANSPOSE` of `child`.
    #[must_use]
    pub fn transpose(child: ComputationNode) -> Self {
        Self::operation(Operator::Transpose, vec![child])
    }

    /// Returns the node's kind tag.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Matrix(_) => NodeKind::Matrix,
            Self::Operation { op, .. } => NodeKind::from(*op),
        }
    }

    /// Returns the operator, or `None` for a leaf.
    #[must_use]
    pub fn operator(&self) -> Option<Operator> {
        match self {
            Self::Matrix(_) => None,
            Self::Operation { op, .. } => Some(*op),
        }
    }

    /// Returns true for a matrix leaf.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Matrix(_))
    }

    /// Returns the matrix of a leaf.
    #[must_use]
    pub fn as_matrix(&self) -> Option<&RawMatrix> {
        match self {
            Self::Matrix(rows) => Some(rows),
            Self::Operation { .. } => None,
        }
    }

    /// Consumes a leaf and returns its matrix.
    #[must_use]
    pub fn into_matrix(self) -> Option<RawMatrix> {
        match self {
            Self::Matrix(rows) => Some(rows),
            Self::Operation { .. } => None,
        }
    }

    /// Returns the children. Empty for a leaf.
    #[must_use]
    pub fn children(&self) -> &[ComputationNode] {
        match self {
            Self::Matrix(_) => &[],
            Self::Operation { children, .. } => children,
        }
    }

    /// Replaces this node with a leaf holding `result`. The children are
    /// dropped.
    pub fn resolve(&mut self, result: RawMatrix) {
        *self = Self::Matrix(result);
    }

    /// Rewrites every ADD/MULTIPLY with more than two children into a
    /// left-leaning chain of binary nodes, throughout the tree.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Structure`] for an ADD/MULTIPLY with fewer than
    /// two children or a NEGATE/TRANSPOSE without exactly one. The tree may be
    /// partially rewritten when that happens.
    pub fn associative_nesting(&mut self) -> EngineResult<()> {
        let Self::Operation { op, children } = self else {
            return Ok(());
        };
        let op = *op;

        if op.is_associative() {
            if children.len() < 2 {
                return Err(EngineError::Structure(format!(
                    "{op} needs at least 2 operands, found {}",
                    children.len()
                )));
            }
        } else if children.len() != 1 {
            return Err(EngineError::Structure(format!(
                "{op} needs exactly 1 operand, found {}",
                children.len()
            )));
        }

        for child in children.iter_mut() {
            child.associative_nesting()?;
        }

        if children.len() > 2 {
            let mut operands = std::mem::take(children).into_iter();
            // At least three operands, checked above.
            if let (Some(first), Some(second)) = (operands.next(), operands.next()) {
                let chain = operands.fold(Self::operation(op, vec![first, second]), |acc, next| {
                    Self::operation(op, vec![acc, next])
                });
                *self = chain;
            }
        }
        Ok(())
    }

    /// True for an operator node whose children are all matrix leaves.
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        match self {
            Self::Matrix(_) => false,
            Self::Operation { children, .. } => children.iter().all(Self::is_leaf),
        }
    }

    /// Returns the first resolvable node in pre-order, leftmost first.
    pub fn find_resolvable(&mut self) -> Option<&mut Self> {
        if self.is_resolvable() {
            return Some(self);
        }
        match self {
            Self::Matrix(_) => None,
            Self::Operation { children, .. } => children.iter_mut().find_map(Self::find_resolvable),
        }
    }

    /// Number of nodes in the tree, this one included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(Self::node_count).sum::<usize>()
    }
}

impl From<RawMatrix> for ComputationNode {
    fn from(rows: RawMatrix) -> Self {
        Self::Matrix(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(value: f64) -> ComputationNode {
        ComputationNode::matrix(vec![vec![value]])
    }

    #[test]
    fn test_kinds() {
        assert_eq!(leaf(1.0).kind(), NodeKind::Matrix);
        assert_eq!(ComputationNode::negate(leaf(1.0)).kind(), NodeKind::Negate);
        assert_eq!(
            ComputationNode::multiply(vec![leaf(1.0), leaf(2.0)]).operator(),
            Some(Operator::Multiply)
        );
        assert_eq!(Operator::Transpose.to_string(), "TRANSPOSE");
    }

    #[test]
    fn test_rewrite_builds_left_chain() {
        let mut node = ComputationNode::add(vec![leaf(1.0), leaf(2.0), leaf(3.0), leaf(4.0)]);
        node.associative_nesting().unwrap();

        let expected = ComputationNode::add(vec![
            ComputationNode::add(vec![
                ComputationNode::add(vec![leaf(1.0), leaf(2.0)]),
                leaf(3.0),
            ]),
            leaf(4.0),
        ]);
        assert_eq!(node, expected);
    }

    #[test]
    fn test_rewrite_recurses_into_children() {
        let mut node = ComputationNode::negate(ComputationNode::multiply(vec![
            leaf(1.0),
            leaf(2.0),
            leaf(3.0),
        ]));
        node.associative_nesting().unwrap();

        let inner = &node.children()[0];
        assert_eq!(inner.kind(), NodeKind::Multiply);
        assert_eq!(inner.children().len(), 2);
        assert_eq!(inner.children()[0].children(), &[leaf(1.0), leaf(2.0)]);
        assert_eq!(inner.children()[1], leaf(3.0));
    }

    #[test]
    fn test_rewrite_keeps_binary_nodes() {
        let mut node = ComputationNode::add(vec![leaf(1.0), leaf(2.0)]);
        let before = node.clone();
        node.associative_nesting().unwrap();
        assert_eq!(node, before);
    }

    #[test]
    fn test_rewrite_rejects_bad_arity() {
        let mut lonely = ComputationNode::add(vec![leaf(1.0)]);
        assert!(matches!(
            lonely.associative_nesting(),
            Err(EngineError::Structure(_))
        ));

        let mut crowded = ComputationNode::operation(Operator::Negate, vec![leaf(1.0), leaf(2.0)]);
        assert!(crowded.associative_nesting().is_err());

        let mut empty = ComputationNode::operation(Operator::Transpose, Vec::new());
        assert!(empty.associative_nesting().is_err());

        let mut nested = ComputationNode::add(vec![
            leaf(1.0),
            ComputationNode::operation(Operator::Multiply, Vec::new()),
        ]);
        assert!(nested.associative_nesting().is_err());
    }

    #[test]
    fn test_leaf_is_not_resolvable() {
        let mut node = leaf(1.0);
        assert!(!node.is_resolvable());
        assert!(node.find_resolvable().is_none());
    }

    #[test]
    fn test_find_resolvable_is_leftmost_preorder() {
        let mut root = ComputationNode::add(vec![
            ComputationNode::negate(leaf(1.0)),
            ComputationNode::transpose(leaf(2.0)),
        ]);

        let first = root.find_resolvable().unwrap();
        assert_eq!(first.kind(), NodeKind::Negate);
        first.resolve(vec![vec![-1.0]]);

        let second = root.find_resolvable().unwrap();
        assert_eq!(second.kind(), NodeKind::Transpose);
        second.resolve(vec![vec![2.0]]);

        let third = root.find_resolvable().unwrap();
        assert_eq!(third.kind(), NodeKind::Add);
        third.resolve(vec![vec![1.0]]);

        assert!(root.is_leaf());
        assert!(root.find_resolvable().is_none());
    }

    #[test]
    fn test_resolve_drops_children() {
        let mut node = ComputationNode::add(vec![leaf(1.0), leaf(2.0)]);
        assert_eq!(node.node_count(), 3);
        node.resolve(vec![vec![3.0]]);
        assert!(node.children().is_empty());
        assert_eq!(node.node_count(), 1);
        assert_eq!(node.into_matrix(), Some(vec![vec![3.0]]));
    }
}
