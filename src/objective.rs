//! Coefficient-fitting objectives built on the coefficient Jacobian.
//!
//! An [`Objective`] is what an external optimizer (gradient descent,
//! L-BFGS, ...) consumes: a scalar loss and its gradient with respect to the
//! coefficient vector. Step and line-search logic live with the optimizer.
//!
//! Stochastic variants evaluate a random contiguous sub-range per call. The
//! random stream is an explicit value owned by the objective, so concurrent
//! objectives each carry an independent, separately seeded generator.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::Rng;

use crate::buffer::{Jacobian, Workspace};
use crate::error::{Error, Result};
use crate::float::Float;
use crate::interpreter::Interpreter;

/// Trait for optimization objectives over a coefficient vector.
///
/// Methods take `&mut self` to allow eval counting, internal buffers and
/// random mini-batch draws.
pub trait Objective<F: Float> {
    /// Number of coefficients.
    fn dim(&self) -> usize;

    /// Evaluate the objective and its gradient at `x`.
    ///
    /// Returns `(f(x), ∇f(x))`.
    fn eval_grad(&mut self, x: &[F]) -> Result<(F, Vec<F>)>;

    /// Evaluate the objective only.
    fn eval(&mut self, x: &[F]) -> Result<F> {
        Ok(self.eval_grad(x)?.0)
    }
}

/// Per-row loss between a prediction `f` and an observation `y`.
pub trait Loss<F: Float> {
    fn loss(&self, f: F, y: F) -> F;
    /// `∂loss/∂f`.
    fn dloss(&self, f: F, y: F) -> F;
}

/// `½ (f - y)²`: Gaussian negative log-likelihood up to constants.
#[derive(Clone, Copy, Debug, Default)]
pub struct SquaredError;

impl<F: Float> Loss<F> for SquaredError {
    #[inline]
    fn loss(&self, f: F, y: F) -> F {
        let r = f - y;
        r * r / (F::one() + F::one())
    }

    #[inline]
    fn dloss(&self, f: F, y: F) -> F {
        f - y
    }
}

/// Poisson negative log-likelihood up to constants.
///
/// With `log_link` the tree predicts `ln λ` (`exp(f) - y f`), otherwise it
/// predicts `λ` directly (`f - y ln f`).
#[derive(Clone, Copy, Debug)]
pub struct Poisson {
    pub log_link: bool,
}

impl Default for Poisson {
    fn default() -> Self {
        Poisson { log_link: true }
    }
}

impl<F: Float> Loss<F> for Poisson {
    #[inline]
    fn loss(&self, f: F, y: F) -> F {
        if self.log_link {
            f.exp() - y * f
        } else {
            f - y * f.ln()
        }
    }

    #[inline]
    fn dloss(&self, f: F, y: F) -> F {
        if self.log_link {
            f.exp() - y
        } else {
            F::one() - y / f
        }
    }
}

/// Pick `batch_size` consecutive rows of `range` uniformly at random.
///
/// Returns `range` unchanged if `batch_size` is zero or not smaller than it.
pub fn select_random_range<R: Rng>(
    rng: &mut R,
    range: Range<usize>,
    batch_size: usize,
) -> Range<usize> {
    if batch_size == 0 || batch_size >= range.len() {
        return range;
    }
    let start = range.start + rng.random_range(0..=range.len() - batch_size);
    start..start + batch_size
}

/// Summed per-row [`Loss`] of a tree's predictions against a target column.
///
/// `target[r]` is the observation for dataset row `range.start + r`.
pub struct Likelihood<'a, F: Float, L, R = StdRng> {
    interpreter: Interpreter<'a, F>,
    target: &'a [F],
    range: Range<usize>,
    loss: L,
    batch: Option<(usize, R)>,
    ws: Workspace<F>,
    primal: Vec<F>,
    weights: Vec<F>,
    jac: Jacobian<F>,
    func_evals: usize,
    jacobian_evals: usize,
}

impl<'a, F: Float, L: Loss<F>> Likelihood<'a, F, L> {
    /// Full-batch likelihood over `range`.
    ///
    /// # Errors
    ///
    /// [`Error::ShapeMismatch`] unless `target.len() == range.len()`,
    /// [`Error::RowRange`] if `range` lies outside the dataset.
    pub fn new(
        interpreter: Interpreter<'a, F>,
        target: &'a [F],
        range: Range<usize>,
        loss: L,
    ) -> Result<Self> {
        if target.len() != range.len() {
            return Err(Error::ShapeMismatch {
                what: "target column",
                expected: range.len(),
                actual: target.len(),
            });
        }
        interpreter.dataset().check_range(&range)?;
        Ok(Likelihood {
            interpreter,
            target,
            range,
            loss,
            batch: None,
            ws: Workspace::new(),
            primal: Vec::new(),
            weights: Vec::new(),
            jac: Jacobian::zeros(0, 0),
            func_evals: 0,
            jacobian_evals: 0,
        })
    }
}

impl<'a, F: Float, L: Loss<F>, R: Rng> Likelihood<'a, F, L, R> {
    /// Evaluate on `batch_size` random consecutive rows per call, drawn from `rng`.
    pub fn with_batch<R2: Rng>(self, batch_size: usize, rng: R2) -> Likelihood<'a, F, L, R2> {
        Likelihood {
            interpreter: self.interpreter,
            target: self.target,
            range: self.range,
            loss: self.loss,
            batch: Some((batch_size, rng)),
            ws: self.ws,
            primal: self.primal,
            weights: self.weights,
            jac: self.jac,
            func_evals: self.func_evals,
            jacobian_evals: self.jacobian_evals,
        }
    }

    /// Number of observations (rows of the full range).
    pub fn num_observations(&self) -> usize {
        self.range.len()
    }

    /// Number of objective evaluations performed so far.
    pub fn func_evals(&self) -> usize {
        self.func_evals
    }

    /// Number of Jacobian evaluations performed so far.
    pub fn jacobian_evals(&self) -> usize {
        self.jacobian_evals
    }

    /// Jacobian from the most recent [`eval_grad`](Objective::eval_grad).
    pub fn last_jacobian(&self) -> &Jacobian<F> {
        &self.jac
    }

    fn next_rows(&mut self) -> Range<usize> {
        match &mut self.batch {
            Some((size, rng)) => select_random_range(rng, self.range.clone(), *size),
            None => self.range.clone(),
        }
    }

    fn target_rows(&self, rows: &Range<usize>) -> &'a [F] {
        let lo = rows.start - self.range.start;
        &self.target[lo..lo + rows.len()]
    }
}

impl<F: Float, L: Loss<F>, R: Rng> Objective<F> for Likelihood<'_, F, L, R> {
    fn dim(&self) -> usize {
        self.interpreter.num_coefficients()
    }

    fn eval_grad(&mut self, x: &[F]) -> Result<(F, Vec<F>)> {
        self.func_evals += 1;
        self.jacobian_evals += 1;
        let rows = self.next_rows();
        let target = self.target_rows(&rows);

        self.primal.resize(rows.len(), F::zero());
        self.interpreter
            .jacobian_into(x, rows, &mut self.ws, &mut self.primal, &mut self.jac)?;

        self.weights.clear();
        let mut value = F::zero();
        for (&f, &y) in self.primal.iter().zip(target) {
            value = value + self.loss.loss(f, y);
            self.weights.push(self.loss.dloss(f, y));
        }
        let mut grad = vec![F::zero(); x.len()];
        self.jac.tr_mul(&self.weights, &mut grad);
        Ok((value, grad))
    }

    fn eval(&mut self, x: &[F]) -> Result<F> {
        self.func_evals += 1;
        let rows = self.next_rows();
        let target = self.target_rows(&rows);

        self.primal.resize(rows.len(), F::zero());
        self.interpreter
            .evaluate_into(x, rows, &mut self.ws.values, &mut self.primal)?;
        Ok(self
            .primal
            .iter()
            .zip(target)
            .fold(F::zero(), |acc, (&f, &y)| acc + self.loss.loss(f, y)))
    }
}

/// `½ Σ (f - y)²` over a row range.
pub type LeastSquares<'a, F, R = StdRng> = Likelihood<'a, F, SquaredError, R>;

/// Poisson negative log-likelihood over a row range.
pub type PoissonLikelihood<'a, F, R = StdRng> = Likelihood<'a, F, Poisson, R>;

/// Full-batch least-squares objective `½ Σ (f - y)²`, gradient `Jᵀ (f - y)`.
pub fn least_squares<'a, F: Float>(
    interpreter: Interpreter<'a, F>,
    target: &'a [F],
    range: Range<usize>,
) -> Result<LeastSquares<'a, F>> {
    Likelihood::new(interpreter, target, range, SquaredError)
}

/// Full-batch Poisson objective, see [`Poisson`].
pub fn poisson<'a, F: Float>(
    interpreter: Interpreter<'a, F>,
    target: &'a [F],
    range: Range<usize>,
    log_link: bool,
) -> Result<PoissonLikelihood<'a, F>> {
    Likelihood::new(interpreter, target, range, Poisson { log_link })
}
