use std::ops::Range;

use crate::buffer::{Jacobian, Workspace};
use crate::error::Result;
use crate::float::Float;

use super::check_len;

impl<F: Float> super::Interpreter<'_, F> {
    /// Evaluate the tree over `range` and assemble the Jacobian of the output
    /// with respect to the coefficient vector.
    ///
    /// `primal` receives one output per row. `jac` is reset to
    /// `range.len() x coefficients.len()`; column `k` is `∂f/∂c_k` per row.
    /// A slot referenced by several leaves gets the sum of their adjoints,
    /// slots the tree never references stay zero.
    pub fn jacobian_into(
        &self,
        coefficients: &[F],
        range: Range<usize>,
        ws: &mut Workspace<F>,
        primal: &mut [F],
        jac: &mut Jacobian<F>,
    ) -> Result<()> {
        check_len("primal buffer", range.len(), primal.len())?;
        self.check_coefficients(coefficients)?;
        self.dataset.check_range(&range)?;
        jac.reset(range.len(), coefficients.len());

        let nodes = self.tree.nodes();
        let root = nodes.len() - 1;
        let mut offset = 0;
        for chunk in self.chunks(range) {
            let len = chunk.len();
            self.forward(coefficients, chunk, &mut ws.values)?;
            primal[offset..offset + len].copy_from_slice(ws.values.col(root));

            self.reverse(&ws.values, &mut ws.reverse)?;
            for (j, node) in nodes.iter().enumerate() {
                let Some(slot) = node.coefficient_slot() else {
                    continue;
                };
                let column = &mut jac.column_mut(slot)[offset..offset + len];
                for (c, &a) in column.iter_mut().zip(ws.reverse.adjoint(j)) {
                    *c = *c + a;
                }
            }
            offset += len;
        }
        Ok(())
    }

    /// Allocating form of [`jacobian_into`](Self::jacobian_into).
    ///
    /// Returns `(primal, jacobian)`.
    pub fn jacobian(
        &self,
        coefficients: &[F],
        range: Range<usize>,
    ) -> Result<(Vec<F>, Jacobian<F>)> {
        let mut primal = vec![F::zero(); range.len()];
        let mut jac = Jacobian::zeros(0, 0);
        let mut ws = Workspace::new();
        self.jacobian_into(coefficients, range, &mut ws, &mut primal, &mut jac)?;
        Ok((primal, jac))
    }

    /// Vector-Jacobian product `Jᵀ·w` over `range`, without forming `J`.
    ///
    /// `weights` has one entry per row. Returns `(primal, gradient)` with
    /// `gradient.len() == coefficients.len()`.
    pub fn vjp(
        &self,
        coefficients: &[F],
        range: Range<usize>,
        weights: &[F],
        ws: &mut Workspace<F>,
    ) -> Result<(Vec<F>, Vec<F>)> {
        check_len("weights", range.len(), weights.len())?;
        self.check_coefficients(coefficients)?;
        self.dataset.check_range(&range)?;

        let nodes = self.tree.nodes();
        let root = nodes.len() - 1;
        let mut primal = vec![F::zero(); range.len()];
        let mut grad = vec![F::zero(); coefficients.len()];
        let mut offset = 0;
        for chunk in self.chunks(range) {
            let len = chunk.len();
            self.forward(coefficients, chunk, &mut ws.values)?;
            primal[offset..offset + len].copy_from_slice(ws.values.col(root));

            self.reverse_seeded(&ws.values, &weights[offset..offset + len], &mut ws.reverse)?;
            for (j, node) in nodes.iter().enumerate() {
                if let Some(slot) = node.coefficient_slot() {
                    grad[slot] = ws
                        .reverse
                        .adjoint(j)
                        .iter()
                        .fold(grad[slot], |acc, &a| acc + a);
                }
            }
            offset += len;
        }
        Ok((primal, grad))
    }
}
