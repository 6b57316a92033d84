#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crime dashboard server.
//!
//! Query parameters arrive as raw strings so that a malformed value is
//! reported as a [`FilterError`] in the normal outcome envelope instead of
//! a bare extractor rejection.

use std::str::FromStr;

use crime_dash_analytics_models::{FilterError, TimeFilter};
use crime_dash_forecast::ArimaOrder;
use serde::{Deserialize, Serialize};

/// Service status returned by `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Whether the store file exists.
    pub store_available: bool,
}

/// Query parameters accepted by every view endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewQueryParams {
    /// Single year.
    pub year: Option<String>,
    /// First year of a range.
    pub year_from: Option<String>,
    /// Last year of a range.
    pub year_to: Option<String>,
    /// Month (1-12).
    pub month: Option<String>,
    /// Autoregressive order (forecast only).
    pub p: Option<String>,
    /// Differencing order (forecast only).
    pub d: Option<String>,
    /// Moving-average order (forecast only).
    pub q: Option<String>,
}

fn parse_param<T: FromStr>(name: &'static str, value: Option<&str>) -> Result<Option<T>, FilterError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse().map_err(|_| FilterError::Unparseable {
                name,
                value: v.to_string(),
            })
        })
        .transpose()
}

impl ViewQueryParams {
    /// The validated time filter these parameters describe.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if a value does not parse or the filter is
    /// invalid.
    pub fn time_filter(&self) -> Result<TimeFilter, FilterError> {
        TimeFilter::from_parts(
            parse_param("year", self.year.as_deref())?,
            parse_param("yearFrom", self.year_from.as_deref())?,
            parse_param("yearTo", self.year_to.as_deref())?,
            parse_param("month", self.month.as_deref())?,
        )
    }

    /// The forecast order, with missing components taken from
    /// [`ArimaOrder::default`]. Range checks are left to the model.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Unparseable`] if a component is not a small
    /// non-negative integer.
    pub fn arima_order(&self) -> Result<ArimaOrder, FilterError> {
        let default = ArimaOrder::default();
        Ok(ArimaOrder {
            p: parse_param("p", self.p.as_deref())?.unwrap_or(default.p),
            d: parse_param("d", self.d.as_deref())?.unwrap_or(default.d),
            q: parse_param("q", self.q.as_deref())?.unwrap_or(default.q),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_dash_analytics_models::{MAX_YEAR, MIN_YEAR, YearFilter};

    fn params(query: &[(&str, &str)]) -> ViewQueryParams {
        let map: serde_json::Map<String, serde_json::Value> = query
            .iter()
            .map(|(k, v)| ((*k).to_string(), serde_json::Value::from(*v)))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    #[test]
    fn no_params_is_unfiltered() {
        assert_eq!(params(&[]).time_filter().unwrap(), TimeFilter::all());
    }

    #[test]
    fn parses_single_year_and_month() {
        let filter = params(&[("year", "2008"), ("month", "7")])
            .time_filter()
            .unwrap();
        assert_eq!(filter, TimeFilter::year(2008).with_month(7));
    }

    #[test]
    fn parses_year_range() {
        let filter = params(&[("yearFrom", "2008"), ("yearTo", "2010")])
            .time_filter()
            .unwrap();
        assert_eq!(filter.years, YearFilter::Range { from: 2008, to: 2010 });
    }

    #[test]
    fn open_ended_ranges_use_bounds() {
        let from = params(&[("yearFrom", "2012")]).time_filter().unwrap();
        assert_eq!(
            from.years,
            YearFilter::Range {
                from: 2012,
                to: MAX_YEAR
            }
        );

        let to = params(&[("yearTo", "2012")]).time_filter().unwrap();
        assert_eq!(
            to.years,
            YearFilter::Range {
                from: MIN_YEAR,
                to: 2012
            }
        );
    }

    #[test]
    fn blank_values_are_ignored() {
        let filter = params(&[("year", " "), ("month", "")]).time_filter().unwrap();
        assert_eq!(filter, TimeFilter::all());
    }

    #[test]
    fn rejects_malformed_values() {
        let err = params(&[("year", "20x8")]).time_filter().unwrap_err();
        assert_eq!(
            err,
            FilterError::Unparseable {
                name: "year",
                value: "20x8".to_string()
            }
        );
        assert!(params(&[("month", "-1")]).time_filter().is_err());
    }

    #[test]
    fn rejects_invalid_filters() {
        assert_eq!(
            params(&[("month", "13")]).time_filter().unwrap_err(),
            FilterError::MonthOutOfRange(13)
        );
        assert_eq!(
            params(&[("year", "2008"), ("yearTo", "2010")])
                .time_filter()
                .unwrap_err(),
            FilterError::AmbiguousYears
        );
        assert!(matches!(
            params(&[("yearFrom", "2011"), ("yearTo", "2009")]).time_filter(),
            Err(FilterError::InvertedRange { .. })
        ));
    }

    #[test]
    fn order_defaults_and_overrides() {
        assert_eq!(params(&[]).arima_order().unwrap(), ArimaOrder::default());

        let order = params(&[("p", "2"), ("q", "0")]).arima_order().unwrap();
        assert_eq!(order, ArimaOrder { p: 2, d: 1, q: 0 });

        assert!(params(&[("d", "one")]).arima_order().is_err());
    }

    #[test]
    fn health_is_camel_case() {
        let json = serde_json::to_value(ApiHealth {
            healthy: true,
            version: "0.1.0".to_string(),
            store_available: false,
        })
        .unwrap();
        assert_eq!(json["storeAvailable"], false);
    }
}
