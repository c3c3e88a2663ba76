//! Batch evaluation and reverse-mode coefficient Jacobians for postfix
//! expression trees, as used by symbolic regression.
//!
//! A [`Tree`] is a flat array of [`Node`]s in postfix order. An
//! [`Interpreter`] binds it to a [`Dataset`] and evaluates it over a row
//! range, one [`Values`] column per node. A reverse sweep over the same
//! columns yields the [`Jacobian`] of the output with respect to the
//! coefficient vector, which [`objective`] turns into loss gradients.

pub mod api;
pub mod buffer;
pub mod dataset;
pub mod error;
pub mod float;
pub mod interpreter;
pub mod metrics;
pub mod node;
pub mod objective;
pub mod tree;

#[cfg(feature = "nalgebra")]
pub mod nalgebra_support;

pub use api::{evaluate, evaluate_jacobian};
pub use buffer::{Jacobian, ReverseBuffer, ReverseNode, Values, Workspace};
pub use dataset::{Dataset, Variable};
pub use error::{Error, Result};
pub use float::Float;
pub use interpreter::{derivative, EvalConfig, Interpreter};
pub use metrics::{fitness, ErrorMetric};
pub use node::{Node, NodeKind};
pub use objective::{
    LeastSquares, Likelihood, Loss, Objective, Poisson, PoissonLikelihood, SquaredError,
};
pub use tree::Tree;

#[cfg(feature = "parallel")]
pub use interpreter::{evaluate_population_par, jacobian_population_par};
