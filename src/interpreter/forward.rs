use std::ops::Range;

use crate::buffer::{Values, Workspace};
use crate::error::Result;
use crate::float::Float;
use crate::node::{self, Node, NodeKind};

use super::check_len;

/// Column `j` of a column-major block with `rows` rows.
#[inline]
fn col<F>(block: &[F], rows: usize, j: usize) -> &[F] {
    &block[j * rows..(j + 1) * rows]
}

impl<F: Float> super::Interpreter<'_, F> {
    /// Forward pass over dataset rows `rows` into `values`.
    ///
    /// `values` is reshaped to `rows.len() x tree.len()`. Nodes are evaluated
    /// in increasing position, so every operand column is final before its
    /// parent reads it. Domain violations propagate as NaN/inf.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedArity`](crate::Error::UnsupportedArity) on the
    /// first node whose child count its kind does not support,
    /// [`Error::CoefficientCount`](crate::Error::CoefficientCount) and
    /// [`Error::RowRange`](crate::Error::RowRange) for bad arguments.
    pub fn forward(
        &self,
        coefficients: &[F],
        rows: Range<usize>,
        values: &mut Values<F>,
    ) -> Result<()> {
        self.check_coefficients(coefficients)?;
        self.dataset.check_range(&rows)?;

        let nodes = self.tree.nodes();
        values.resize(rows.len(), nodes.len());

        for (i, node) in nodes.iter().enumerate() {
            node.kind.check_arity(node.arity)?;
            let (done, out) = values.split_at_col_mut(i);
            self.eval_node(i, node, coefficients, &rows, done, out)?;
        }
        Ok(())
    }

    fn eval_node(
        &self,
        i: usize,
        node: &Node,
        coefficients: &[F],
        rows: &Range<usize>,
        done: &[F],
        out: &mut [F],
    ) -> Result<()> {
        let n = out.len();
        let mut children = self.tree.children(i).map(|(_, j)| col(done, n, j));

        match node.kind {
            NodeKind::Variable => {
                let column = self.dataset.values(node.operand as usize, rows.clone())?;
                out.copy_from_slice(column);
            }
            NodeKind::Coefficient => out.fill(coefficients[node.operand as usize]),
            NodeKind::Constant => out.fill(F::from_f64(node.value).unwrap_or_else(F::nan)),

            NodeKind::Add | NodeKind::Sub | NodeKind::Mul => {
                if let Some(first) = children.next() {
                    out.copy_from_slice(first);
                }
                if node.kind == NodeKind::Sub && node.arity == 1 {
                    out.iter_mut().for_each(|o| *o = -*o);
                    return Ok(());
                }
                for c in children {
                    for (o, &x) in out.iter_mut().zip(c) {
                        *o = match node.kind {
                            NodeKind::Add => *o + x,
                            NodeKind::Sub => *o - x,
                            _ => *o * x,
                        };
                    }
                }
            }

            NodeKind::Div => {
                let a = children.next().unwrap_or_default();
                match children.next() {
                    None => {
                        for (o, &x) in out.iter_mut().zip(a) {
                            *o = x.recip();
                        }
                    }
                    Some(b) => {
                        for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                            *o = x / y;
                        }
                    }
                }
            }

            NodeKind::Aq => {
                let a = children.next().unwrap_or_default();
                let b = children.next().unwrap_or_default();
                for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                    *o = x / (F::one() + y * y).sqrt();
                }
            }

            NodeKind::Pow => {
                let a = children.next().unwrap_or_default();
                let b = children.next().unwrap_or_default();
                for ((o, &x), &y) in out.iter_mut().zip(a).zip(b) {
                    *o = x.powf(y);
                }
            }

            kind => {
                let x = children.next().unwrap_or_default();
                for (o, &v) in out.iter_mut().zip(x) {
                    *o = node::eval_unary(kind, v);
                }
            }
        }
        Ok(())
    }

    /// Evaluate the tree over `range`, writing the root output into `out`.
    ///
    /// `values` is caller-owned scratch; pass the same buffer across calls
    /// to avoid reallocation.
    pub fn evaluate_into(
        &self,
        coefficients: &[F],
        range: Range<usize>,
        values: &mut Values<F>,
        out: &mut [F],
    ) -> Result<()> {
        check_len("output buffer", range.len(), out.len())?;
        self.check_coefficients(coefficients)?;
        self.dataset.check_range(&range)?;
        let root = self.tree.len() - 1;
        let mut offset = 0;
        for chunk in self.chunks(range) {
            let len = chunk.len();
            self.forward(coefficients, chunk, values)?;
            out[offset..offset + len].copy_from_slice(values.col(root));
            offset += len;
        }
        Ok(())
    }

    /// Evaluate the tree over `range`. Returns one value per row.
    pub fn evaluate(&self, coefficients: &[F], range: Range<usize>) -> Result<Vec<F>> {
        let mut out = vec![F::zero(); range.len()];
        let mut ws = Workspace::new();
        self.evaluate_into(coefficients, range, &mut ws.values, &mut out)?;
        Ok(out)
    }
}
