//! Error metrics over predicted and target columns, and the mapping from
//! raw error to fitness.
//!
//! Predictions containing NaN or infinities are not rejected here; they
//! yield a non-finite error, which [`fitness`] turns into the worst
//! possible value so that the search can continue.

use crate::float::Float;

/// Regression error metric. All variants are "smaller is better" except
/// [`C2`](ErrorMetric::C2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorMetric {
    /// Mean squared error.
    Mse,
    /// Root mean squared error.
    Rmse,
    /// Mean squared error divided by the target variance.
    Nmse,
    /// Mean absolute error.
    Mae,
    /// Negated coefficient of determination.
    R2,
    /// Squared Pearson correlation.
    C2,
}

impl ErrorMetric {
    /// Evaluate the metric. `estimated` and `target` must have equal length.
    pub fn eval<F: Float>(self, estimated: &[F], target: &[F]) -> F {
        debug_assert_eq!(estimated.len(), target.len());
        match self {
            ErrorMetric::Mse => mean_squared_error(estimated, target),
            ErrorMetric::Rmse => mean_squared_error(estimated, target).sqrt(),
            ErrorMetric::Nmse => normalized_mean_squared_error(estimated, target),
            ErrorMetric::Mae => mean_absolute_error(estimated, target),
            ErrorMetric::R2 => -r2_score(estimated, target),
            ErrorMetric::C2 => {
                let r = correlation(estimated, target);
                r * r
            }
        }
    }
}

fn count<F: Float>(n: usize) -> F {
    F::from_usize(n).unwrap_or_else(F::nan)
}

fn mean<F: Float>(x: &[F]) -> F {
    x.iter().fold(F::zero(), |acc, &v| acc + v) / count(x.len())
}

fn variance<F: Float>(x: &[F]) -> F {
    let m = mean(x);
    x.iter().fold(F::zero(), |acc, &v| acc + (v - m) * (v - m)) / count(x.len())
}

pub fn mean_squared_error<F: Float>(estimated: &[F], target: &[F]) -> F {
    let sse = estimated
        .iter()
        .zip(target)
        .fold(F::zero(), |acc, (&e, &t)| acc + (e - t) * (e - t));
    sse / count(estimated.len())
}

pub fn normalized_mean_squared_error<F: Float>(estimated: &[F], target: &[F]) -> F {
    mean_squared_error(estimated, target) / variance(target)
}

pub fn mean_absolute_error<F: Float>(estimated: &[F], target: &[F]) -> F {
    let sae = estimated
        .iter()
        .zip(target)
        .fold(F::zero(), |acc, (&e, &t)| acc + (e - t).abs());
    sae / count(estimated.len())
}

/// `1 - SSres / SStot`.
pub fn r2_score<F: Float>(estimated: &[F], target: &[F]) -> F {
    let m = mean(target);
    let (ss_res, ss_tot) = estimated
        .iter()
        .zip(target)
        .fold((F::zero(), F::zero()), |(res, tot), (&e, &t)| {
            (res + (t - e) * (t - e), tot + (t - m) * (t - m))
        });
    F::one() - ss_res / ss_tot
}

/// Pearson correlation coefficient.
pub fn correlation<F: Float>(x: &[F], y: &[F]) -> F {
    let (mx, my) = (mean(x), mean(y));
    let (sxy, sxx, syy) = x.iter().zip(y).fold(
        (F::zero(), F::zero(), F::zero()),
        |(sxy, sxx, syy), (&a, &b)| {
            let (dx, dy) = (a - mx, b - my);
            (sxy + dx * dy, sxx + dx * dx, syy + dy * dy)
        },
    );
    sxy / (sxx * syy).sqrt()
}

/// Least-squares `(scale, offset)` mapping `estimated` onto `target`.
///
/// A non-finite scale (constant prediction) falls back to `1`.
pub fn linear_scaling<F: Float>(estimated: &[F], target: &[F]) -> (F, F) {
    let (mx, my) = (mean(estimated), mean(target));
    let (cov, var) = estimated
        .iter()
        .zip(target)
        .fold((F::zero(), F::zero()), |(cov, var), (&e, &t)| {
            (cov + (e - mx) * (t - my), var + (e - mx) * (e - mx))
        });
    let mut scale = cov / var;
    if !scale.is_finite() {
        scale = F::one();
    }
    (scale, my - scale * mx)
}

/// Fitness of a prediction column.
///
/// With `scale`, `estimated` is first rewritten in place by
/// [`linear_scaling`]. A non-finite error becomes `F::max_value()`.
pub fn fitness<F: Float>(metric: ErrorMetric, estimated: &mut [F], target: &[F], scale: bool) -> F {
    if scale {
        let (a, b) = linear_scaling(estimated, target);
        for e in estimated.iter_mut() {
            *e = a * *e + b;
        }
    }
    let err = metric.eval(estimated, target);
    if err.is_finite() {
        err
    } else {
        F::max_value()
    }
}
