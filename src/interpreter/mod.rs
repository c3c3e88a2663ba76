//! Batch evaluation and reverse-mode differentiation of a [`Tree`].
//!
//! An [`Interpreter`] binds a tree to the dataset its variable leaves read.
//! The forward pass walks nodes in increasing position (children first) and
//! fills one [`Values`](crate::buffer::Values) column per node. The reverse
//! pass walks them in decreasing position, seeding the root adjoint and
//! handing each child the derivative column its parent computed. Because a
//! tree node has exactly one parent, every adjoint is assigned once and
//! never accumulated.
//!
//! Row ranges longer than [`EvalConfig::batch_size`] are processed in
//! consecutive chunks that reuse the same buffers.

use std::ops::Range;

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::float::Float;
use crate::tree::Tree;

// Submodules: each adds impl blocks to Interpreter<'_, F>
mod forward;
mod jacobian;
mod reverse;

#[cfg(feature = "parallel")]
mod parallel;

pub use self::reverse::derivative;
#[cfg(feature = "parallel")]
pub use self::parallel::{evaluate_population_par, jacobian_population_par};

/// Settings for chunked evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvalConfig {
    /// Rows per forward/reverse pass (default: 64). Zero means the whole
    /// requested range in one pass.
    pub batch_size: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        EvalConfig { batch_size: 64 }
    }
}

/// A tree bound to a dataset.
///
/// Holds only shared references, so one interpreter can be used from many
/// threads as long as each thread passes its own buffers.
#[derive(Clone, Copy, Debug)]
pub struct Interpreter<'a, F: Float> {
    tree: &'a Tree,
    dataset: &'a Dataset<F>,
    config: EvalConfig,
}

impl<'a, F: Float> Interpreter<'a, F> {
    /// Bind `tree` to `dataset`.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyTree`] for a tree without nodes and
    /// [`Error::UnknownVariable`] if a variable leaf names a column the
    /// dataset does not have. Operator arities are checked when the nodes
    /// are dispatched.
    pub fn new(tree: &'a Tree, dataset: &'a Dataset<F>) -> Result<Self> {
        if tree.is_empty() {
            return Err(Error::EmptyTree);
        }
        debug_assert!(tree.validate().is_ok(), "subtree size invariant violated");
        if let Some(column) = tree.variable_columns().find(|&c| c >= dataset.cols()) {
            return Err(Error::UnknownVariable {
                column,
                columns: dataset.cols(),
            });
        }
        Ok(Interpreter {
            tree,
            dataset,
            config: EvalConfig::default(),
        })
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    pub fn tree(&self) -> &'a Tree {
        self.tree
    }

    #[inline]
    pub fn dataset(&self) -> &'a Dataset<F> {
        self.dataset
    }

    #[inline]
    pub fn config(&self) -> EvalConfig {
        self.config
    }

    /// Minimum length of the coefficient vector.
    #[inline]
    pub fn num_coefficients(&self) -> usize {
        self.tree.coefficient_count()
    }

    fn check_coefficients(&self, coefficients: &[F]) -> Result<()> {
        let needed = self.num_coefficients();
        if coefficients.len() < needed {
            return Err(Error::CoefficientCount {
                slot: needed - 1,
                len: coefficients.len(),
            });
        }
        Ok(())
    }

    /// Split `range` into consecutive chunks of at most `batch_size` rows.
    fn chunks(&self, range: Range<usize>) -> impl Iterator<Item = Range<usize>> {
        let step = if self.config.batch_size == 0 {
            range.len().max(1)
        } else {
            self.config.batch_size
        };
        let end = range.end;
        range
            .step_by(step)
            .map(move |start| start..(start + step).min(end))
    }
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::ShapeMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
