//! Error type shared by tree construction, evaluation and differentiation.
//!
//! Numeric domain violations (`log(0)`, `x / 0`, ...) are never errors: they
//! propagate as IEEE non-finite values and are left to the caller's fitness
//! policy.

use thiserror::Error;

use crate::node::NodeKind;

/// Error variants for tree evaluation and differentiation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A node carries a child count its kind has no rule for.
    #[error("{kind} does not support arity {arity}")]
    UnsupportedArity { kind: NodeKind, arity: u16 },

    /// The node sequence does not describe a single postfix tree, or a
    /// stored subtree size disagrees with the children.
    #[error("malformed tree at node {index}: {reason}")]
    MalformedTree { index: usize, reason: &'static str },

    /// Evaluation of a tree with no nodes.
    #[error("tree is empty")]
    EmptyTree,

    /// The coefficient vector is too short for the tree's slots.
    #[error("coefficient slot {slot} referenced but only {len} coefficients supplied")]
    CoefficientCount { slot: usize, len: usize },

    /// A variable leaf refers to a missing dataset column.
    #[error("variable column {column} not present in dataset with {columns} columns")]
    UnknownVariable { column: usize, columns: usize },

    /// The requested rows are not all inside the dataset.
    #[error("row range {start}..{end} outside dataset with {rows} rows")]
    RowRange { start: usize, end: usize, rows: usize },

    /// A caller-supplied buffer or column has the wrong length.
    #[error("{what}: expected length {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;
