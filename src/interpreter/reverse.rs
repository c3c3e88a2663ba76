use crate::buffer::{ReverseBuffer, Values};
use crate::error::Result;
use crate::float::Float;
use crate::node::{sign, NodeKind};
use crate::tree::Tree;

use super::check_len;

/// The first two operand columns of node `i`.
#[inline]
fn operands<'v, F: Float>(tree: &Tree, values: &'v Values<F>, i: usize) -> [&'v [F]; 2] {
    let mut ch = tree.children(i).map(|(_, j)| values.col(j));
    let a = ch.next().unwrap_or_default();
    let b = ch.next().unwrap_or_default();
    [a, b]
}

/// `d[r] = f(p[r], x[r], y[r])` for a unary node with operand `x` and output `y`.
#[inline]
fn unary_rule<F: Float>(d: &mut [F], p: &[F], x: &[F], y: &[F], f: impl Fn(F, F, F) -> F) {
    for (((d, &p), &x), &y) in d.iter_mut().zip(p).zip(x).zip(y) {
        *d = f(p, x, y);
    }
}

/// Derivative rule table: write the derivative columns `D[k]` of node `i`.
///
/// Each rule multiplies the local partial derivative of node `i` with
/// respect to child slot `k` by the node's adjoint `P`, which must already
/// be final. Primal operands and the node's own output are read from
/// `values`. Leaves have no children and are left untouched.
///
/// Domain edges are not guarded: `log` at zero, `div` by zero or `pow` with
/// a negative base and fractional exponent produce non-finite columns.
///
/// # Errors
///
/// [`Error::UnsupportedArity`](crate::Error::UnsupportedArity) if the node's
/// arity has no rule (e.g. `div` with three children).
/// [`Error::ShapeMismatch`](crate::Error::ShapeMismatch) if `values` or `rev`
/// is not laid out for `tree` with the same row count; call
/// [`ReverseBuffer::resize`] first. Nothing is written on error.
///
/// # Panics
///
/// If `i` is not a node position of `tree`.
pub fn derivative<F: Float>(
    tree: &Tree,
    values: &Values<F>,
    rev: &mut ReverseBuffer<F>,
    i: usize,
) -> Result<()> {
    let node = tree.nodes()[i];
    node.kind.check_arity(node.arity)?;
    check_len("value columns", tree.len(), values.cols())?;
    check_len("reverse buffer nodes", tree.len(), rev.len())?;
    check_len("reverse buffer rows", values.rows(), rev.rows())?;
    check_len("derivative columns", node.arity as usize, rev.slots(i))?;
    let rows = values.rows();
    if node.is_leaf() || rows == 0 {
        return Ok(());
    }

    let one = F::one();
    let two = one + one;
    let three = two + one;

    let (p, d) = rev.rule_mut(i);
    let out = values.col(i);

    match node.kind {
        NodeKind::Add => {
            for dk in d.chunks_exact_mut(rows) {
                dk.copy_from_slice(p);
            }
        }

        NodeKind::Sub => {
            for ((k, _), dk) in tree.children(i).zip(d.chunks_exact_mut(rows)) {
                if k == 0 && node.arity > 1 {
                    dk.copy_from_slice(p);
                } else {
                    for (dv, &pv) in dk.iter_mut().zip(p) {
                        *dv = -pv;
                    }
                }
            }
        }

        NodeKind::Mul if node.arity == 2 => {
            let [a, b] = operands(tree, values, i);
            let (d0, d1) = d.split_at_mut(rows);
            for r in 0..rows {
                d0[r] = p[r] * b[r];
                d1[r] = p[r] * a[r];
            }
        }

        NodeKind::Mul => {
            for ((k, _), dk) in tree.children(i).zip(d.chunks_exact_mut(rows)) {
                dk.copy_from_slice(p);
                for (m, j) in tree.children(i) {
                    if m == k {
                        continue;
                    }
                    for (dv, &v) in dk.iter_mut().zip(values.col(j)) {
                        *dv = *dv * v;
                    }
                }
            }
        }

        NodeKind::Div if node.arity == 1 => {
            let [x, _] = operands(tree, values, i);
            unary_rule(d, p, x, out, |p, x, _| -p / (x * x));
        }

        NodeKind::Div => {
            let [a, b] = operands(tree, values, i);
            let (d0, d1) = d.split_at_mut(rows);
            for r in 0..rows {
                d0[r] = p[r] / b[r];
                d1[r] = -p[r] * a[r] / (b[r] * b[r]);
            }
        }

        NodeKind::Aq => {
            // out = a / sqrt(1 + b²); out / a and b·out³/a² rewritten so
            // that a = 0 stays finite.
            let [_, b] = operands(tree, values, i);
            let (d0, d1) = d.split_at_mut(rows);
            for r in 0..rows {
                let q = one + b[r] * b[r];
                d0[r] = p[r] / q.sqrt();
                d1[r] = -p[r] * b[r] * out[r] / q;
            }
        }

        NodeKind::Pow => {
            let [x, y] = operands(tree, values, i);
            let (d0, d1) = d.split_at_mut(rows);
            for r in 0..rows {
                d0[r] = p[r] * y[r] * x[r].powf(y[r] - one);
                d1[r] = p[r] * out[r] * x[r].ln();
            }
        }

        kind => {
            let [x, _] = operands(tree, values, i);
            match kind {
                NodeKind::Exp => unary_rule(d, p, x, out, |p, _, y| p * y),
                NodeKind::Log => unary_rule(d, p, x, out, |p, x, _| p / x),
                NodeKind::Log1p => unary_rule(d, p, x, out, |p, x, _| p / (x + one)),
                NodeKind::Logabs => unary_rule(d, p, x, out, |p, x, _| p * sign(x) / x.abs()),
                NodeKind::Sin => unary_rule(d, p, x, out, |p, x, _| p * x.cos()),
                NodeKind::Cos => unary_rule(d, p, x, out, |p, x, _| -p * x.sin()),
                NodeKind::Tan => unary_rule(d, p, x, out, |p, _, y| p * (y * y + one)),
                NodeKind::Tanh => unary_rule(d, p, x, out, |p, _, y| p * (one - y * y)),
                NodeKind::Asin => unary_rule(d, p, x, out, |p, x, _| p / (one - x * x).sqrt()),
                NodeKind::Acos => unary_rule(d, p, x, out, |p, x, _| -p / (one - x * x).sqrt()),
                NodeKind::Atan => unary_rule(d, p, x, out, |p, x, _| p / (one + x * x)),
                NodeKind::Sqrt => unary_rule(d, p, x, out, |p, _, y| p / (two * y)),
                NodeKind::Sqrtabs => unary_rule(d, p, x, out, |p, x, y| p * sign(x) / (two * y)),
                NodeKind::Cbrt => unary_rule(d, p, x, out, |p, _, y| p / (three * y * y)),
                k => unreachable!("{k} has no derivative rule"),
            }
        }
    }
    Ok(())
}

impl<F: Float> super::Interpreter<'_, F> {
    /// Reverse pass over a completed forward pass, seeding the root adjoint
    /// with one on every row.
    ///
    /// `rev` is reshaped to the tree and the batch; afterwards
    /// [`ReverseBuffer::adjoint`] at a coefficient leaf is the derivative of
    /// the tree output with respect to that leaf.
    pub fn reverse(&self, values: &Values<F>, rev: &mut ReverseBuffer<F>) -> Result<()> {
        self.reverse_sweep(values, None, rev)
    }

    /// Reverse pass with a per-row seed at the root.
    ///
    /// With `seed = w`, the coefficient-leaf adjoints summed over rows give
    /// `Jᵀ·w` without materialising the Jacobian.
    pub fn reverse_seeded(
        &self,
        values: &Values<F>,
        seed: &[F],
        rev: &mut ReverseBuffer<F>,
    ) -> Result<()> {
        check_len("root seed", values.rows(), seed.len())?;
        self.reverse_sweep(values, Some(seed), rev)
    }

    fn reverse_sweep(
        &self,
        values: &Values<F>,
        seed: Option<&[F]>,
        rev: &mut ReverseBuffer<F>,
    ) -> Result<()> {
        let nodes = self.tree.nodes();
        check_len("values columns", nodes.len(), values.cols())?;

        rev.resize(self.tree, values.rows());
        let root = nodes.len() - 1;
        match seed {
            Some(s) => rev.seed(root, s),
            None => rev.seed_ones(root),
        }

        // Every parent sits above its children, so by the time node i is
        // reached its single parent has already set its adjoint.
        for i in (0..nodes.len()).rev() {
            if nodes[i].is_leaf() {
                continue;
            }
            derivative(self.tree, values, rev, i)?;
            for (k, j) in self.tree.children(i) {
                rev.propagate(i, k, j);
            }
        }
        Ok(())
    }
}
