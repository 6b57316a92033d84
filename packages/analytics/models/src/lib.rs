#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filter, result, and outcome types for the dashboard views.
//!
//! Every view takes a [`TimeFilter`] and returns a [`ViewOutcome`] wrapping
//! one of the row types below. Outcomes are what crosses into the
//! presentation layer: low-level store or model errors are reduced to an
//! [`ErrorKind`] and a message.

pub mod filter;

pub use filter::{FilterError, MAX_YEAR, MIN_YEAR, TimeFilter, YearFilter};

use crime_dash_forecast::{ArimaOrder, ForecastStep};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Number of rows in the type-vs-arrest view.
pub const TOP_TYPES_LIMIT: usize = 10;

/// Horizon of the forecast view, in months.
pub const FORECAST_STEPS: usize = 12;

/// Confidence level of the forecast view's bounds.
pub const FORECAST_CONFIDENCE: f64 = 0.95;

/// The named views.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum View {
    /// Crimes per (year, month).
    TimeTrend,
    /// Crimes per hour of day.
    Hourly,
    /// Crimes per location description.
    Locations,
    /// Top primary types with arrest counts.
    TypeArrests,
    /// Arrest rate per primary type.
    ArrestStats,
    /// Per-type share and monthly distribution statistics.
    DetailedStats,
    /// Dataset-wide totals.
    Summary,
    /// ARIMA forecast of monthly totals.
    Forecast,
}

impl View {
    /// Short human-readable title.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::TimeTrend => "Crimes over time",
            Self::Hourly => "Crimes by hour of day",
            Self::Locations => "Crimes by location",
            Self::TypeArrests => "Top crime types vs. arrests",
            Self::ArrestStats => "Arrest rate by crime type",
            Self::DetailedStats => "Detailed statistics by crime type",
            Self::Summary => "Summary",
            Self::Forecast => "Monthly forecast",
        }
    }
}

/// Crimes in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeTrendPoint {
    /// Year.
    pub year: i32,
    /// Month (1-12).
    pub month: u8,
    /// Number of crimes.
    pub count: i64,
}

/// Crimes in one hour of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HourlyCount {
    /// Hour (0-23).
    pub hour: u8,
    /// Number of crimes.
    pub count: i64,
}

/// Crimes at one kind of location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCount {
    /// Location description, e.g. `STREET`.
    pub location_description: String,
    /// Number of crimes.
    pub count: i64,
}

/// Crimes and arrests for one primary type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeArrestCount {
    /// Primary type, e.g. `THEFT`.
    pub primary_type: String,
    /// Number of crimes.
    pub count: i64,
    /// Number of crimes with an arrest.
    pub arrests: i64,
}

/// Arrest rate for one primary type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrestStatistic {
    /// Primary type.
    pub primary_type: String,
    /// Number of crimes.
    pub count: i64,
    /// Number of crimes with an arrest.
    pub arrests: i64,
    /// `arrests / count`, in `[0, 1]`.
    pub arrest_rate: f64,
}

/// Share and monthly distribution statistics for one primary type.
///
/// The monthly figures are computed over this type's per-month counts,
/// counting only months in which it occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedStatistic {
    /// Primary type.
    pub primary_type: String,
    /// Number of crimes.
    pub count: i64,
    /// Percentage of all crimes in the filtered set.
    pub share_percent: f64,
    /// Mean crimes per month.
    pub monthly_mean: f64,
    /// Fewest crimes in a month.
    pub monthly_min: i64,
    /// Most crimes in a month.
    pub monthly_max: i64,
    /// Sample standard deviation of monthly counts; absent with one month.
    pub monthly_std_dev: Option<f64>,
    /// Median monthly count.
    pub monthly_median: f64,
}

/// Dataset-wide totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Number of crimes.
    pub total_crimes: i64,
    /// Number of crimes with an arrest.
    pub total_arrests: i64,
    /// `total_arrests / total_crimes`.
    pub arrest_rate: f64,
    /// Distinct primary types.
    pub distinct_types: i64,
    /// `total_crimes / distinct_types`.
    pub mean_crimes_per_type: f64,
}

/// A forecast month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPoint {
    /// Year.
    pub year: i32,
    /// Month (1-12).
    pub month: u8,
    /// Point forecast and bounds.
    #[serde(flatten)]
    pub step: ForecastStep,
}

/// Monthly history plus forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastView {
    /// Model order used.
    pub order: ArimaOrder,
    /// Confidence level of the bounds.
    pub confidence: f64,
    /// Observed monthly totals, months without crimes filled with zero.
    pub history: Vec<TimeTrendPoint>,
    /// Forecast months following the history.
    pub forecast: Vec<ForecastPoint>,
}

/// Category of a failed view.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ErrorKind {
    /// The store could not be opened or queried.
    Store,
    /// The filter was invalid.
    Filter,
    /// The forecast model could not be fitted.
    Model,
}

/// Result of a view, as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "body", rename_all = "camelCase")]
pub enum ViewOutcome<T> {
    /// The view produced data.
    Data(T),
    /// The view ran but matched nothing.
    Empty,
    /// The view failed.
    Error {
        /// Failure category.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
    },
}

impl<T> ViewOutcome<T> {
    /// Wraps data, reporting [`ViewOutcome::Empty`] when it has no rows.
    pub fn from_data(data: T) -> Self
    where
        T: ViewData,
    {
        if data.is_empty_data() {
            Self::Empty
        } else {
            Self::Data(data)
        }
    }

    /// An error outcome.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// The data, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Data(data) => Some(data),
            Self::Empty | Self::Error { .. } => None,
        }
    }

    /// The error kind, if this is an error.
    #[must_use]
    pub const fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            Self::Data(_) | Self::Empty => None,
        }
    }

    /// Whether this outcome is [`ViewOutcome::Empty`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Transforms the data, keeping empty and error outcomes.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ViewOutcome<U> {
        match self {
            Self::Data(data) => ViewOutcome::Data(f(data)),
            Self::Empty => ViewOutcome::Empty,
            Self::Error { kind, message } => ViewOutcome::Error { kind, message },
        }
    }
}

/// Data that may contain no rows.
pub trait ViewData {
    /// Whether there is nothing to show.
    fn is_empty_data(&self) -> bool;
}

impl<T> ViewData for Vec<T> {
    fn is_empty_data(&self) -> bool {
        self.is_empty()
    }
}

impl ViewData for Summary {
    fn is_empty_data(&self) -> bool {
        self.total_crimes == 0
    }
}

impl ViewData for ForecastView {
    fn is_empty_data(&self) -> bool {
        self.history.is_empty()
    }
}

/// The data of any view, for callers that pick the view at runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ViewBody {
    TimeTrend(Vec<TimeTrendPoint>),
    Hourly(Vec<HourlyCount>),
    Locations(Vec<LocationCount>),
    TypeArrests(Vec<TypeArrestCount>),
    ArrestStats(Vec<ArrestStatistic>),
    DetailedStats(Vec<DetailedStatistic>),
    Summary(Summary),
    Forecast(ForecastView),
}
