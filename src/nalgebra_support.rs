//! nalgebra adapters for the interpreter's buffers.
//!
//! Both [`Jacobian`] and [`Values`] are column-major, so conversions are a
//! single copy via `DMatrix::from_column_slice`.

use std::ops::Range;

use nalgebra::{DMatrix, DVector, RealField};

use crate::buffer::{Jacobian, Values};
use crate::error::Result;
use crate::float::Float;
use crate::interpreter::Interpreter;

/// Copy a Jacobian into a `rows x coefficients` `DMatrix`.
pub fn jacobian_to_dmatrix<F: Float + RealField>(jac: &Jacobian<F>) -> DMatrix<F> {
    DMatrix::from_column_slice(jac.rows(), jac.cols(), jac.as_slice())
}

/// Copy forward-pass values into a `rows x nodes` `DMatrix`.
pub fn values_to_dmatrix<F: Float + RealField>(values: &Values<F>) -> DMatrix<F> {
    DMatrix::from_column_slice(values.rows(), values.cols(), values.as_slice())
}

/// Evaluate and differentiate, returning `(primal, J)` as nalgebra types.
pub fn jacobian_nalgebra<F: Float + RealField>(
    interpreter: &Interpreter<'_, F>,
    coefficients: &DVector<F>,
    range: Range<usize>,
) -> Result<(DVector<F>, DMatrix<F>)> {
    let (primal, jac) = interpreter.jacobian(coefficients.as_slice(), range)?;
    Ok((DVector::from_vec(primal), jacobian_to_dmatrix(&jac)))
}

/// Gauss-Newton approximation `JᵀJ` of the least-squares Hessian.
pub fn gauss_newton<F: Float + RealField>(jac: &Jacobian<F>) -> DMatrix<F> {
    let j = jacobian_to_dmatrix(jac);
    j.tr_mul(&j)
}

/// Fisher information `Jᵀ diag(w) J` for per-row weights `w`.
///
/// For a Poisson model with log link the weights are the predicted rates
/// `exp(f)`; for Gaussian noise they are `1 / σ²`.
pub fn fisher_information<F: Float + RealField>(jac: &Jacobian<F>, weights: &[F]) -> DMatrix<F> {
    debug_assert_eq!(weights.len(), jac.rows());
    let j = jacobian_to_dmatrix(jac);
    let mut wj = j.clone();
    for (mut row, &w) in wj.row_iter_mut().zip(weights) {
        row *= w;
    }
    j.tr_mul(&wj)
}
