use argmin::core::{CostFunction, Executor, State};
use argmin::solver::neldermead::NelderMead;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::{ArimaOrder, Forecast, ForecastStep, ModelError};

/// Simplex edge length in the unconstrained parameter space.
const SEARCH_STEP: f64 = 0.3;

/// Standard deviation of CSS values across the simplex at which the search
/// stops.
const SEARCH_TOLERANCE: f64 = 1e-10;

/// Iteration budget per estimated coefficient.
const ITERATIONS_PER_PARAMETER: u64 = 1_000;

/// Partial autocorrelations are kept inside `(-1, 1)` by `tanh`; clamping the
/// argument keeps them away from the boundary where `tanh` rounds to 1.
const MAX_RAW_PARAMETER: f64 = 10.0;

/// Conditional sum of squares of a centered series, as a function of the
/// unconstrained AR and MA parameters.
struct ConditionalSumOfSquares<'a> {
    centered: &'a [f64],
    p: usize,
}

impl CostFunction for ConditionalSumOfSquares<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, raw: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        let (ar, ma) = coefficients(raw, self.p);
        let css = conditional_residuals(self.centered, &ar, &ma).1;
        Ok(if css.is_finite() { css } else { f64::INFINITY })
    }
}

/// Minimizes the CSS with Nelder–Mead, starting from white noise.
///
/// Returns the best unconstrained parameters and the iterations used.
fn minimize_css(centered: &[f64], p: usize, q: usize) -> Result<(Vec<f64>, u64), ModelError> {
    let dims = p + q;
    if dims == 0 {
        return Ok((Vec::new(), 0));
    }

    let start = vec![0.0; dims];
    let mut simplex = Vec::with_capacity(dims + 1);
    simplex.push(start.clone());
    for i in 0..dims {
        let mut vertex = start.clone();
        vertex[i] += SEARCH_STEP;
        simplex.push(vertex);
    }

    let budget_scale = u64::try_from(dims).unwrap_or(u64::MAX);
    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(SEARCH_TOLERANCE)
        .map_err(|e| ModelError::Numeric(e.to_string()))?;
    let result = Executor::new(ConditionalSumOfSquares { centered, p }, solver)
        .configure(|state| state.max_iters(ITERATIONS_PER_PARAMETER.saturating_mul(budget_scale)))
        .run()
        .map_err(|e| ModelError::Numeric(e.to_string()))?;

    let state = result.state();
    let best = state
        .get_best_param()
        .cloned()
        .ok_or(ModelError::NonFinite { stage: "fit" })?;
    Ok((best, state.get_iter()))
}

/// Two-sided critical value of the standard normal for `confidence`.
fn critical_value(confidence: f64) -> Result<f64, ModelError> {
    let normal = Normal::new(0.0, 1.0).map_err(|e| ModelError::Numeric(e.to_string()))?;
    Ok(normal.inverse_cdf(0.5 + confidence / 2.0))
}

/// Entry point for fitting ARIMA models.
pub struct Arima;

impl Arima {
    /// Fits an ARIMA model of the given order by conditional sum of squares.
    ///
    /// # Errors
    ///
    /// * [`ModelError::InvalidOrder`] if `order` is out of range
    /// * [`ModelError::NonFiniteInput`] if `series` contains NaN or infinity
    /// * [`ModelError::InsufficientData`] if `series` has fewer than
    ///   [`ArimaOrder::min_observations`] values
    /// * [`ModelError::NonFinite`] if the fit does not converge to finite
    ///   values
    /// * [`ModelError::Numeric`] if the optimizer fails
    pub fn fit(series: &[f64], order: ArimaOrder) -> Result<FittedArima, ModelError> {
        order.validate()?;

        if series.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteInput);
        }

        let needed = order.min_observations();
        if series.len() < needed {
            return Err(ModelError::InsufficientData {
                needed,
                got: series.len(),
            });
        }

        let p = usize::from(order.p);
        let q = usize::from(order.q);

        let mut last_levels = Vec::with_capacity(usize::from(order.d));
        let mut differenced = series.to_vec();
        for _ in 0..order.d {
            let Some(&last) = differenced.last() else {
                return Err(ModelError::InsufficientData {
                    needed,
                    got: series.len(),
                });
            };
            last_levels.push(last);
            differenced = difference(&differenced);
        }

        let mean = if order.d == 0 {
            differenced.iter().sum::<f64>() / len_f64(&differenced)
        } else {
            0.0
        };
        let centered: Vec<f64> = differenced.iter().map(|v| v - mean).collect();

        let (raw, iterations) = minimize_css(&centered, p, q)?;

        let (ar, ma) = coefficients(&raw, p);
        let (residuals, css) = conditional_residuals(&centered, &ar, &ma);
        #[allow(clippy::cast_precision_loss)]
        let sigma2 = css / (centered.len() - p) as f64;

        if !sigma2.is_finite()
            || !mean.is_finite()
            || ar.iter().chain(&ma).any(|c| !c.is_finite())
        {
            return Err(ModelError::NonFinite { stage: "fit" });
        }

        log::debug!(
            "Fitted {order} in {iterations} iterations: ar={ar:?} ma={ma:?} sigma2={sigma2:.4}"
        );

        Ok(FittedArima {
            order,
            ar,
            ma,
            mean,
            sigma2,
            last_levels,
            centered,
            residuals,
        })
    }
}

/// A fitted model, ready to forecast.
#[derive(Debug, Clone)]
pub struct FittedArima {
    order: ArimaOrder,
    ar: Vec<f64>,
    ma: Vec<f64>,
    mean: f64,
    sigma2: f64,
    /// Last value of the series at each differencing level, outermost first.
    last_levels: Vec<f64>,
    /// Differenced series minus `mean`.
    centered: Vec<f64>,
    residuals: Vec<f64>,
}

impl FittedArima {
    /// The fitted order.
    #[must_use]
    pub const fn order(&self) -> ArimaOrder {
        self.order
    }

    /// AR coefficients `φ₁..φₚ` for `φ(B) = 1 - Σ φᵢ Bⁱ`.
    #[must_use]
    pub fn ar(&self) -> &[f64] {
        &self.ar
    }

    /// MA coefficients `θ₁..θ_q` for `θ(B) = 1 + Σ θⱼ Bʲ`.
    #[must_use]
    pub fn ma(&self) -> &[f64] {
        &self.ma
    }

    /// Estimated mean of the undifferenced series (0 when `d > 0`).
    #[must_use]
    pub const fn mean(&self) -> f64 {
        self.mean
    }

    /// Innovation variance estimate.
    #[must_use]
    pub const fn sigma2(&self) -> f64 {
        self.sigma2
    }

    /// Forecasts `steps` values past the end of the series with bounds at
    /// the given confidence level (e.g. `0.95`).
    ///
    /// # Errors
    ///
    /// * [`ModelError::InvalidConfidence`] if `confidence` is not in `(0, 1)`
    /// * [`ModelError::NonFinite`] if any forecast value is not finite
    pub fn forecast(&self, steps: usize, confidence: f64) -> Result<Forecast, ModelError> {
        if confidence.is_nan() || confidence <= 0.0 || confidence >= 1.0 {
            return Err(ModelError::InvalidConfidence(confidence));
        }
        let z = critical_value(confidence)?;

        let mut values = self.centered.clone();
        let mut shocks = self.residuals.clone();
        for _ in 0..steps {
            let t = values.len();
            let ar: f64 = self
                .ar
                .iter()
                .enumerate()
                .map(|(i, phi)| phi * values[t - 1 - i])
                .sum();
            let ma: f64 = self
                .ma
                .iter()
                .enumerate()
                .filter(|(j, _)| *j < t)
                .map(|(j, theta)| theta * shocks[t - 1 - j])
                .sum();
            values.push(ar + ma);
            shocks.push(0.0);
        }

        let mut means: Vec<f64> = values[self.centered.len()..]
            .iter()
            .map(|v| v + self.mean)
            .collect();
        for &last in self.last_levels.iter().rev() {
            let mut level = last;
            for v in &mut means {
                level += *v;
                *v = level;
            }
        }

        let psi = psi_weights(&self.ar, &self.ma, usize::from(self.order.d), steps);
        let mut variance_sum = 0.0;
        let steps = means
            .into_iter()
            .zip(psi)
            .map(|(mean, psi)| {
                variance_sum += psi * psi;
                let std_error = (self.sigma2 * variance_sum).sqrt();
                ForecastStep {
                    mean,
                    lower: z.mul_add(-std_error, mean),
                    upper: z.mul_add(std_error, mean),
                    std_error,
                }
            })
            .collect::<Vec<_>>();

        if steps
            .iter()
            .any(|s| !(s.mean.is_finite() && s.lower.is_finite() && s.upper.is_finite()))
        {
            return Err(ModelError::NonFinite { stage: "forecast" });
        }

        Ok(Forecast { confidence, steps })
    }
}

#[allow(clippy::cast_precision_loss)]
fn len_f64(values: &[f64]) -> f64 {
    values.len() as f64
}

fn difference(series: &[f64]) -> Vec<f64> {
    series.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Maps unconstrained values to partial autocorrelations via `tanh`, then to
/// polynomial coefficients via the Durbin–Levinson recursion. The result
/// `c` makes `1 - Σ cᵢ Bⁱ` have all roots outside the unit circle.
fn stationary_coefficients(raw: &[f64]) -> Vec<f64> {
    let mut coefficients: Vec<f64> = Vec::with_capacity(raw.len());
    for (k, &u) in raw.iter().enumerate() {
        let r = u.clamp(-MAX_RAW_PARAMETER, MAX_RAW_PARAMETER).tanh();
        let previous = coefficients.clone();
        for (j, c) in coefficients.iter_mut().enumerate() {
            *c = r.mul_add(-previous[k - 1 - j], previous[j]);
        }
        coefficients.push(r);
    }
    coefficients
}

/// Splits a raw parameter vector into stationary AR and invertible MA
/// coefficients.
fn coefficients(raw: &[f64], p: usize) -> (Vec<f64>, Vec<f64>) {
    let ar = stationary_coefficients(&raw[..p]);
    let ma = stationary_coefficients(&raw[p..])
        .into_iter()
        .map(|c| -c)
        .collect();
    (ar, ma)
}

/// One-step residuals conditioned on zero pre-sample shocks, and their sum
/// of squares. The first `ar.len()` residuals are zero and excluded.
fn conditional_residuals(x: &[f64], ar: &[f64], ma: &[f64]) -> (Vec<f64>, f64) {
    let mut residuals = vec![0.0; x.len()];
    let mut css = 0.0;

    for t in ar.len()..x.len() {
        let mut e = x[t];
        for (i, phi) in ar.iter().enumerate() {
            e -= phi * x[t - 1 - i];
        }
        for (j, theta) in ma.iter().enumerate().take(t) {
            e -= theta * residuals[t - 1 - j];
        }
        residuals[t] = e;
        css += e * e;
    }

    (residuals, css)
}

/// First `count` ψ-weights of `θ(B) / (φ(B)(1 - B)^d)`.
fn psi_weights(ar: &[f64], ma: &[f64], d: usize, count: usize) -> Vec<f64> {
    let mut polynomial = Vec::with_capacity(ar.len() + d + 1);
    polynomial.push(1.0);
    polynomial.extend(ar.iter().map(|phi| -phi));
    for _ in 0..d {
        let mut next = vec![0.0; polynomial.len() + 1];
        for (i, c) in polynomial.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c;
        }
        polynomial = next;
    }
    let full_ar: Vec<f64> = polynomial[1..].iter().map(|c| -c).collect();

    let mut psi: Vec<f64> = Vec::with_capacity(count);
    for j in 0..count {
        if j == 0 {
            psi.push(1.0);
            continue;
        }
        let mut value = ma.get(j - 1).copied().unwrap_or(0.0);
        for (i, phi) in full_ar.iter().enumerate().take(j) {
            value += phi * psi[j - 1 - i];
        }
        psi.push(value);
    }
    psi
}
