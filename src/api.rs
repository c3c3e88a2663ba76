use std::ops::Range;

use crate::buffer::Jacobian;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::float::Float;
use crate::interpreter::Interpreter;
use crate::tree::Tree;

/// Evaluate `tree` over dataset rows `range` with the given coefficients.
///
/// Returns one output per row. Non-finite outputs are returned as they are.
///
/// ```
/// use exprtape::{evaluate, Dataset, Node, NodeKind, Tree};
///
/// // x0 / x1
/// let tree = Tree::from_prefix(vec![
///     Node::binary(NodeKind::Div),
///     Node::variable(0),
///     Node::variable(1),
/// ])
/// .unwrap();
/// let data = Dataset::from_columns(vec![vec![4.0, 9.0], vec![2.0, 3.0]]).unwrap();
/// let y = evaluate(&tree, &data, 0..2, &[]).unwrap();
/// assert_eq!(y, vec![2.0, 3.0]);
/// ```
pub fn evaluate<F: Float>(
    tree: &Tree,
    dataset: &Dataset<F>,
    range: Range<usize>,
    coefficients: &[F],
) -> Result<Vec<F>> {
    Interpreter::new(tree, dataset)?.evaluate(coefficients, range)
}

/// Evaluate `tree` and its coefficient Jacobian over dataset rows `range`.
///
/// Returns `(primal, J)` where `J` is `range.len() x coefficients.len()`
/// and `J[(r, k)] = ∂f(row r)/∂c_k`.
///
/// ```
/// use exprtape::{evaluate_jacobian, Dataset, Node, NodeKind, Tree};
///
/// // c0 * x0
/// let tree = Tree::from_prefix(vec![
///     Node::binary(NodeKind::Mul),
///     Node::coefficient(0),
///     Node::variable(0),
/// ])
/// .unwrap();
/// let data = Dataset::from_columns(vec![vec![1.0, 2.0, 3.0]]).unwrap();
/// let (y, jac) = evaluate_jacobian(&tree, &data, 0..3, &[2.0]).unwrap();
/// assert_eq!(y, vec![2.0, 4.0, 6.0]);
/// assert_eq!(jac.column(0), &[1.0, 2.0, 3.0]);
/// ```
pub fn evaluate_jacobian<F: Float>(
    tree: &Tree,
    dataset: &Dataset<F>,
    range: Range<usize>,
    coefficients: &[F],
) -> Result<(Vec<F>, Jacobian<F>)> {
    Interpreter::new(tree, dataset)?.jacobian(coefficients, range)
}
