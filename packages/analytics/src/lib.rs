#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Dashboard views over the crime store.
//!
//! Every view validates its [`TimeFilter`], opens its own read-only
//! connection, runs one statement, and reports a [`ViewOutcome`]. Store,
//! filter, and model errors never escape as errors; they are logged and
//! reduced to [`ViewOutcome::Error`].

pub mod forecast;

use std::path::Path;

use crime_dash_analytics_models::{
    ArrestStatistic, DetailedStatistic, ErrorKind, FilterError, HourlyCount, LocationCount,
    Summary, TOP_TYPES_LIMIT, TimeFilter, TimeTrendPoint, TypeArrestCount, View, ViewBody,
    ViewData, ViewOutcome,
};
use crime_dash_database::{DbError, queries, store};
use crime_dash_forecast::{ArimaOrder, ModelError};
use crime_dash_incident_models::StoredIncident;
use duckdb::Connection;

pub use forecast::forecast;

/// Errors that can occur while computing a view.
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsError {
    /// The store could not be opened or queried.
    #[error(transparent)]
    Database(#[from] DbError),

    /// The filter was rejected.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// The forecast model could not be fitted.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl AnalyticsError {
    /// The category reported to the presentation layer.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_) => ErrorKind::Store,
            Self::Filter(_) => ErrorKind::Filter,
            Self::Model(_) => ErrorKind::Model,
        }
    }
}

/// Reduces a view result to an outcome, logging failures.
pub(crate) fn outcome<T: ViewData>(view: &str, result: Result<T, AnalyticsError>) -> ViewOutcome<T> {
    match result {
        Ok(data) => ViewOutcome::from_data(data),
        Err(e) => {
            let kind = e.kind();
            match kind {
                ErrorKind::Store => log::error!("{view} view failed: {e}"),
                ErrorKind::Filter | ErrorKind::Model => log::warn!("{view} view failed: {e}"),
            }
            ViewOutcome::error(kind, e.to_string())
        }
    }
}

/// Validates `filter`, opens `store_path` read-only, and runs `query`.
fn with_store<T>(
    store_path: &Path,
    filter: &TimeFilter,
    query: impl FnOnce(&Connection) -> Result<T, DbError>,
) -> Result<T, AnalyticsError> {
    filter.validate()?;
    let conn = store::open_read_only(store_path)?;
    store::require_table(&conn, store_path)?;
    Ok(query(&conn)?)
}

/// Crimes per (year, month), chronological.
#[must_use]
pub fn time_trend(store_path: &Path, filter: &TimeFilter) -> ViewOutcome<Vec<TimeTrendPoint>> {
    outcome(
        "time-trend",
        with_store(store_path, filter, |conn| queries::time_trend(conn, filter)),
    )
}

/// Crimes per hour of day.
#[must_use]
pub fn hourly_distribution(store_path: &Path, filter: &TimeFilter) -> ViewOutcome<Vec<HourlyCount>> {
    outcome(
        "hourly",
        with_store(store_path, filter, |conn| {
            queries::hourly_distribution(conn, filter)
        }),
    )
}

/// Crimes per location description, most frequent first.
#[must_use]
pub fn location_distribution(
    store_path: &Path,
    filter: &TimeFilter,
) -> ViewOutcome<Vec<LocationCount>> {
    outcome(
        "locations",
        with_store(store_path, filter, |conn| {
            queries::location_distribution(conn, filter)
        }),
    )
}

/// The [`TOP_TYPES_LIMIT`] most frequent primary types with their arrests.
#[must_use]
pub fn type_vs_arrest(store_path: &Path, filter: &TimeFilter) -> ViewOutcome<Vec<TypeArrestCount>> {
    outcome(
        "type-arrests",
        with_store(store_path, filter, |conn| {
            queries::type_vs_arrest(conn, filter, TOP_TYPES_LIMIT)
        }),
    )
}

/// Arrest rate per primary type.
#[must_use]
pub fn arrest_statistics(
    store_path: &Path,
    filter: &TimeFilter,
) -> ViewOutcome<Vec<ArrestStatistic>> {
    outcome(
        "arrest-stats",
        with_store(store_path, filter, |conn| {
            queries::arrest_statistics(conn, filter)
        }),
    )
}

/// Share and monthly distribution statistics per primary type.
#[must_use]
pub fn detailed_statistics(
    store_path: &Path,
    filter: &TimeFilter,
) -> ViewOutcome<Vec<DetailedStatistic>> {
    outcome(
        "detailed-stats",
        with_store(store_path, filter, |conn| {
            queries::detailed_statistics(conn, filter)
        }),
    )
}

/// Totals over the filtered set.
#[must_use]
pub fn summary(store_path: &Path, filter: &TimeFilter) -> ViewOutcome<Summary> {
    outcome(
        "summary",
        with_store(store_path, filter, |conn| queries::summary(conn, filter)),
    )
}

/// The first `limit` stored incidents by case number.
#[must_use]
pub fn sample_incidents(store_path: &Path, limit: u32) -> ViewOutcome<Vec<StoredIncident>> {
    outcome(
        "sample",
        with_store(store_path, &TimeFilter::all(), |conn| {
            store::sample_incidents(conn, limit)
        }),
    )
}

/// Runs the view named by `view`. `order` is only used by
/// [`View::Forecast`].
#[must_use]
pub fn run_view(
    store_path: &Path,
    view: View,
    filter: &TimeFilter,
    order: ArimaOrder,
) -> ViewOutcome<ViewBody> {
    match view {
        View::TimeTrend => time_trend(store_path, filter).map(ViewBody::TimeTrend),
        View::Hourly => hourly_distribution(store_path, filter).map(ViewBody::Hourly),
        View::Locations => location_distribution(store_path, filter).map(ViewBody::Locations),
        View::TypeArrests => type_vs_arrest(store_path, filter).map(ViewBody::TypeArrests),
        View::ArrestStats => arrest_statistics(store_path, filter).map(ViewBody::ArrestStats),
        View::DetailedStats => {
            detailed_statistics(store_path, filter).map(ViewBody::DetailedStats)
        }
        View::Summary => summary(store_path, filter).map(ViewBody::Summary),
        View::Forecast => forecast(store_path, filter, order).map(ViewBody::Forecast),
    }
}
