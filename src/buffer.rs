//! Caller-owned scratch buffers for the forward and reverse passes.
//!
//! None of these types hold state between calls beyond their allocations:
//! every pass resizes and overwrites them. Reusing one buffer across many
//! evaluations (of the same or different trees) avoids reallocating on the
//! hot path. Concurrent evaluations each need their own buffers.

use crate::float::Float;
use crate::tree::Tree;

/// Primal values: one column per tree node, one row per batch row.
///
/// Column `j` holds the output of node `j`; the last column is the tree's
/// output. Stored column-major so each column is a contiguous slice.
#[derive(Clone, Debug, Default)]
pub struct Values<F: Float> {
    data: Vec<F>,
    rows: usize,
    cols: usize,
}

impl<F: Float> Values<F> {
    pub fn new() -> Self {
        Values {
            data: Vec::new(),
            rows: 0,
            cols: 0,
        }
    }

    /// Pre-allocate for `rows x cols` without changing the shape.
    pub fn with_capacity(rows: usize, cols: usize) -> Self {
        Values {
            data: Vec::with_capacity(rows * cols),
            rows: 0,
            cols: 0,
        }
    }

    /// Reshape to `rows x cols`. Contents are unspecified afterwards.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.data.resize(rows * cols, F::zero());
        self.rows = rows;
        self.cols = cols;
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Column of node `j`.
    #[inline]
    pub fn col(&self, j: usize) -> &[F] {
        &self.data[j * self.rows..(j + 1) * self.rows]
    }

    #[inline]
    pub fn col_mut(&mut self, j: usize) -> &mut [F] {
        &mut self.data[j * self.rows..(j + 1) * self.rows]
    }

    /// Value of node `col` at batch row `row`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> F {
        self.data[col * self.rows + row]
    }

    /// All columns, column-major.
    #[inline]
    pub fn as_slice(&self) -> &[F] {
        &self.data
    }

    /// Split into the finished columns `0..j` (read-only, column-major) and
    /// column `j` (writable).
    #[inline]
    pub(crate) fn split_at_col_mut(&mut self, j: usize) -> (&[F], &mut [F]) {
        let (done, rest) = self.data.split_at_mut(j * self.rows);
        (done, &mut rest[..self.rows])
    }
}

/// Per-node reverse-pass state.
///
/// For every node `i` the buffer holds the adjoint column `P` (sensitivity of
/// the root to node `i`, seeded at the root) and one derivative column `D[k]`
/// per child slot. Derivative columns are packed: node `i` owns
/// `arity(i)` consecutive columns starting at its offset.
#[derive(Clone, Debug, Default)]
pub struct ReverseBuffer<F: Float> {
    rows: usize,
    adjoints: Vec<F>,
    partials: Vec<F>,
    offsets: Vec<usize>,
}

/// Read-only view of one node's reverse-pass state.
#[derive(Clone, Copy, Debug)]
pub struct ReverseNode<'a, F> {
    /// Adjoint column `P`.
    pub p: &'a [F],
    d: &'a [F],
    rows: usize,
}

impl<'a, F> ReverseNode<'a, F> {
    /// Derivative column for child slot `k`.
    pub fn d(&self, k: usize) -> &'a [F] {
        &self.d[k * self.rows..(k + 1) * self.rows]
    }

    /// Number of derivative columns (the node's arity).
    pub fn arity(&self) -> usize {
        if self.rows == 0 {
            0
        } else {
            self.d.len() / self.rows
        }
    }
}

impl<F: Float> ReverseBuffer<F> {
    pub fn new() -> Self {
        ReverseBuffer {
            rows: 0,
            adjoints: Vec::new(),
            partials: Vec::new(),
            offsets: Vec::new(),
        }
    }

    /// Lay the buffer out for `tree` and `rows` batch rows, zeroing every
    /// adjoint.
    pub fn resize(&mut self, tree: &Tree, rows: usize) {
        self.rows = rows;
        self.offsets.clear();
        let mut next = 0;
        for node in tree.nodes() {
            self.offsets.push(next);
            next += node.arity as usize;
        }
        self.offsets.push(next);
        self.partials.resize(next * rows, F::zero());
        self.adjoints.clear();
        self.adjoints.resize(tree.len() * rows, F::zero());
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of nodes the buffer is laid out for.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adjoint column `P` of node `j`.
    #[inline]
    pub fn adjoint(&self, j: usize) -> &[F] {
        &self.adjoints[j * self.rows..(j + 1) * self.rows]
    }

    /// Derivative column `D[k]` of node `i`.
    #[inline]
    pub fn partial(&self, i: usize, k: usize) -> &[F] {
        let col = self.offsets[i] + k;
        &self.partials[col * self.rows..(col + 1) * self.rows]
    }

    /// Number of derivative columns reserved for node `i`.
    #[inline]
    pub(crate) fn slots(&self, i: usize) -> usize {
        self.offsets[i + 1] - self.offsets[i]
    }

    /// Adjoint and derivative columns of node `i`.
    pub fn node(&self, i: usize) -> ReverseNode<'_, F> {
        let (lo, hi) = (self.offsets[i], self.offsets[i + 1]);
        ReverseNode {
            p: self.adjoint(i),
            d: &self.partials[lo * self.rows..hi * self.rows],
            rows: self.rows,
        }
    }

    /// Fill the adjoint of node `j` with `seed`.
    #[inline]
    pub(crate) fn seed(&mut self, j: usize, seed: &[F]) {
        let rows = self.rows;
        self.adjoints[j * rows..(j + 1) * rows].copy_from_slice(seed);
    }

    #[inline]
    pub(crate) fn seed_ones(&mut self, j: usize) {
        let rows = self.rows;
        self.adjoints[j * rows..(j + 1) * rows].fill(F::one());
    }

    /// Adjoint of node `i` (read-only) together with its derivative columns
    /// (writable, `arity * rows` long).
    #[inline]
    pub(crate) fn rule_mut(&mut self, i: usize) -> (&[F], &mut [F]) {
        let rows = self.rows;
        let (lo, hi) = (self.offsets[i], self.offsets[i + 1]);
        (
            &self.adjoints[i * rows..(i + 1) * rows],
            &mut self.partials[lo * rows..hi * rows],
        )
    }

    /// Set the adjoint of node `j` from derivative column `D[k]` of its parent `i`.
    #[inline]
    pub(crate) fn propagate(&mut self, i: usize, k: usize, j: usize) {
        let rows = self.rows;
        let col = self.offsets[i] + k;
        self.adjoints[j * rows..(j + 1) * rows]
            .copy_from_slice(&self.partials[col * rows..(col + 1) * rows]);
    }
}

/// The scratch pair a full evaluate-and-differentiate call needs.
#[derive(Clone, Debug, Default)]
pub struct Workspace<F: Float> {
    pub values: Values<F>,
    pub reverse: ReverseBuffer<F>,
}

impl<F: Float> Workspace<F> {
    pub fn new() -> Self {
        Workspace {
            values: Values::new(),
            reverse: ReverseBuffer::new(),
        }
    }
}

/// Dense `rows x coefficients` Jacobian of the tree output, column-major.
///
/// Column `k` is the derivative of the output with respect to coefficient
/// slot `k` at every row of the evaluated range.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Jacobian<F: Float> {
    data: Vec<F>,
    rows: usize,
    cols: usize,
}

impl<F: Float> Jacobian<F> {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Jacobian {
            data: vec![F::zero(); rows * cols],
            rows,
            cols,
        }
    }

    /// Reshape to `rows x cols` and zero every entry.
    pub fn reset(&mut self, rows: usize, cols: usize) {
        self.data.clear();
        self.data.resize(rows * cols, F::zero());
        self.rows = rows;
        self.cols = cols;
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> F {
        self.data[col * self.rows + row]
    }

    #[inline]
    pub fn column(&self, k: usize) -> &[F] {
        &self.data[k * self.rows..(k + 1) * self.rows]
    }

    #[inline]
    pub fn column_mut(&mut self, k: usize) -> &mut [F] {
        &mut self.data[k * self.rows..(k + 1) * self.rows]
    }

    /// All entries, column-major.
    #[inline]
    pub fn as_slice(&self) -> &[F] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<F> {
        self.data
    }

    /// `Jᵀ · v`, written into `out` (length [`cols`](Self::cols)).
    pub fn tr_mul(&self, v: &[F], out: &mut [F]) {
        debug_assert_eq!(v.len(), self.rows);
        debug_assert_eq!(out.len(), self.cols);
        for (k, o) in out.iter_mut().enumerate() {
            *o = self
                .column(k)
                .iter()
                .zip(v)
                .fold(F::zero(), |acc, (&j, &w)| acc + j * w);
        }
    }
}
