#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! ARIMA(p, d, q) fitting and forecasting.
//!
//! Models are fitted by conditional sum of squares (CSS), minimized with
//! `argmin`'s Nelder–Mead solver. The AR and MA coefficients are searched
//! in an unconstrained space that maps onto the stationary and invertible
//! regions through partial autocorrelations, so every fitted model can be
//! forecast. A mean term is estimated only for
//! undifferenced models (`d == 0`).
//!
//! ```
//! use crime_dash_forecast::{Arima, ArimaOrder};
//!
//! let series: Vec<f64> = (0..24).map(|t| 100.0 + 3.0 * f64::from(t)).collect();
//! let fitted = Arima::fit(&series, ArimaOrder::new(1, 1, 1)?)?;
//! let forecast = fitted.forecast(12, 0.95)?;
//! assert_eq!(forecast.steps.len(), 12);
//! # Ok::<(), crime_dash_forecast::ModelError>(())
//! ```

mod arima;

pub use arima::{Arima, FittedArima};

use serde::{Deserialize, Serialize};

/// Largest supported autoregressive order.
pub const MAX_P: u8 = 5;

/// Largest supported differencing order.
pub const MAX_D: u8 = 2;

/// Largest supported moving-average order.
pub const MAX_Q: u8 = 5;

/// Errors from fitting or forecasting.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    /// The requested order is outside the supported range.
    #[error("ARIMA order ({p}, {d}, {q}) is out of range (p <= {MAX_P}, d <= {MAX_D}, q <= {MAX_Q})")]
    InvalidOrder {
        /// Autoregressive order.
        p: u8,
        /// Differencing order.
        d: u8,
        /// Moving-average order.
        q: u8,
    },

    /// The series is too short for the requested order.
    #[error("Need at least {needed} observations for this model, got {got}")]
    InsufficientData {
        /// Minimum observations for the order.
        needed: usize,
        /// Observations supplied.
        got: usize,
    },

    /// The input series contains NaN or infinite values.
    #[error("Series contains non-finite values")]
    NonFiniteInput,

    /// Fitting or forecasting produced a non-finite value.
    #[error("Model {stage} produced non-finite values")]
    NonFinite {
        /// `"fit"` or `"forecast"`.
        stage: &'static str,
    },

    /// The optimizer or the normal distribution reported an error.
    #[error("Numeric routine failed: {0}")]
    Numeric(String),

    /// The confidence level is not strictly between 0 and 1.
    #[error("Confidence level {0} must lie strictly between 0 and 1")]
    InvalidConfidence(f64),
}

/// The `(p, d, q)` order of an ARIMA model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArimaOrder {
    /// Autoregressive order.
    pub p: u8,
    /// Differencing order.
    pub d: u8,
    /// Moving-average order.
    pub q: u8,
}

impl Default for ArimaOrder {
    fn default() -> Self {
        Self { p: 1, d: 1, q: 1 }
    }
}

impl std::fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ARIMA({}, {}, {})", self.p, self.d, self.q)
    }
}

impl ArimaOrder {
    /// Creates a validated order.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidOrder`] if any component exceeds its
    /// maximum.
    pub fn new(p: u8, d: u8, q: u8) -> Result<Self, ModelError> {
        let order = Self { p, d, q };
        match order.validate() {
            Ok(()) => Ok(order),
            Err(e) => Err(e),
        }
    }

    /// Checks every component against its maximum.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidOrder`] if any component exceeds its
    /// maximum.
    pub const fn validate(&self) -> Result<(), ModelError> {
        if self.p > MAX_P || self.d > MAX_D || self.q > MAX_Q {
            return Err(ModelError::InvalidOrder {
                p: self.p,
                d: self.d,
                q: self.q,
            });
        }
        Ok(())
    }

    /// Fewest observations a series needs to fit this order.
    #[must_use]
    pub const fn min_observations(&self) -> usize {
        self.p as usize + self.d as usize + self.q as usize + 3
    }
}

/// One forecast horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastStep {
    /// Point forecast.
    pub mean: f64,
    /// Lower confidence bound.
    pub lower: f64,
    /// Upper confidence bound.
    pub upper: f64,
    /// Standard error of the point forecast.
    pub std_error: f64,
}

/// Point forecasts and confidence bounds for consecutive horizons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    /// Confidence level of the bounds, e.g. `0.95`.
    pub confidence: f64,
    /// One entry per horizon, nearest first.
    pub steps: Vec<ForecastStep>,
}
