use std::ops::Range;

use rayon::prelude::*;

use crate::buffer::{Jacobian, Workspace};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::float::Float;
use crate::tree::Tree;

use super::{EvalConfig, Interpreter};

/// Evaluate many `(tree, coefficients)` models over the same rows in parallel.
///
/// Each rayon worker owns one [`Workspace`]; models never share mutable
/// state. Results are in input order and identical to serial evaluation.
pub fn evaluate_population_par<F: Float>(
    models: &[(&Tree, &[F])],
    dataset: &Dataset<F>,
    range: Range<usize>,
    config: EvalConfig,
) -> Result<Vec<Vec<F>>> {
    models
        .par_iter()
        .map_init(Workspace::<F>::new, |ws, &(tree, coefficients)| -> Result<Vec<F>> {
            let interpreter = Interpreter::new(tree, dataset)?.with_config(config);
            let mut out = vec![F::zero(); range.len()];
            interpreter.evaluate_into(coefficients, range.clone(), &mut ws.values, &mut out)?;
            Ok(out)
        })
        .collect()
}

/// Parallel [`Interpreter::jacobian`] over many models.
///
/// Returns `(primal, jacobian)` per model, in input order.
pub fn jacobian_population_par<F: Float>(
    models: &[(&Tree, &[F])],
    dataset: &Dataset<F>,
    range: Range<usize>,
    config: EvalConfig,
) -> Result<Vec<(Vec<F>, Jacobian<F>)>> {
    models
        .par_iter()
        .map_init(Workspace::<F>::new, |ws, &(tree, coefficients)| -> Result<_> {
            let interpreter = Interpreter::new(tree, dataset)?.with_config(config);
            let mut primal = vec![F::zero(); range.len()];
            let mut jac = Jacobian::zeros(0, 0);
            interpreter.jacobian_into(coefficients, range.clone(), ws, &mut primal, &mut jac)?;
            Ok((primal, jac))
        })
        .collect()
}
