//! Monthly ARIMA forecast view.

use std::collections::BTreeMap;
use std::path::Path;

use crime_dash_analytics_models::{
    FORECAST_CONFIDENCE, FORECAST_STEPS, ForecastPoint, ForecastView, TimeFilter, TimeTrendPoint,
    ViewOutcome,
};
use crime_dash_database::queries;
use crime_dash_forecast::{Arima, ArimaOrder};

use crate::{AnalyticsError, outcome, with_store};

/// Months since year 0 for a (year, month) pair.
fn month_index(year: i32, month: u8) -> i64 {
    i64::from(year) * 12 + i64::from(month) - 1
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn from_month_index(index: i64) -> (i32, u8) {
    (index.div_euclid(12) as i32, (index.rem_euclid(12) + 1) as u8)
}

/// Fills every missing period between the first and last observation with
/// a zero count. `stride` is 1 for a monthly series, 12 when the series
/// holds one month per year.
fn fill_gaps(points: &[TimeTrendPoint], stride: i64) -> Vec<TimeTrendPoint> {
    let counts: BTreeMap<i64, i64> = points
        .iter()
        .map(|p| (month_index(p.year, p.month), p.count))
        .collect();

    let (Some((&first, _)), Some((&last, _))) = (counts.first_key_value(), counts.last_key_value())
    else {
        return Vec::new();
    };

    let mut filled = Vec::new();
    let mut index = first;
    while index <= last {
        let (year, month) = from_month_index(index);
        filled.push(TimeTrendPoint {
            year,
            month,
            count: counts.get(&index).copied().unwrap_or(0),
        });
        index += stride;
    }
    filled
}

fn compute(
    store_path: &Path,
    filter: &TimeFilter,
    order: ArimaOrder,
) -> Result<ForecastView, AnalyticsError> {
    order.validate()?;
    let points = with_store(store_path, filter, |conn| queries::time_trend(conn, filter))?;

    let stride = if filter.month.is_some() { 12 } else { 1 };
    let history = fill_gaps(&points, stride);
    let Some(last) = history.last() else {
        return Ok(ForecastView {
            order,
            confidence: FORECAST_CONFIDENCE,
            history,
            forecast: Vec::new(),
        });
    };

    #[allow(clippy::cast_precision_loss)]
    let series: Vec<f64> = history.iter().map(|p| p.count as f64).collect();
    let fitted = Arima::fit(&series, order)?;
    log::debug!(
        "Fitted {order} on {} periods: ar={:?} ma={:?} sigma2={:.3}",
        series.len(),
        fitted.ar(),
        fitted.ma(),
        fitted.sigma2(),
    );
    let forecast = fitted.forecast(FORECAST_STEPS, FORECAST_CONFIDENCE)?;

    let last_index = month_index(last.year, last.month);
    let points = forecast
        .steps
        .into_iter()
        .zip(1..)
        .map(|(step, ahead)| {
            let (year, month) = from_month_index(last_index + ahead * stride);
            ForecastPoint { year, month, step }
        })
        .collect();

    Ok(ForecastView {
        order,
        confidence: forecast.confidence,
        history,
        forecast: points,
    })
}

/// Forecasts monthly crime totals [`FORECAST_STEPS`] months ahead with an
/// ARIMA model of the given order.
///
/// The history is the filtered time trend with missing months filled with
/// zero. With a month filter the series holds that month for each year and
/// the forecast steps a year at a time. An empty store or filter yields
/// [`ViewOutcome::Empty`]; a series too short for `order` yields a model
/// error.
#[must_use]
pub fn forecast(
    store_path: &Path,
    filter: &TimeFilter,
    order: ArimaOrder,
) -> ViewOutcome<ForecastView> {
    outcome("forecast", compute(store_path, filter, order))
}
