//! Incident and store builders for tests of this crate and the crates
//! that read the store. Enabled by the `test-utils` feature.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use crime_dash_incident_models::StoredIncident;

use crate::store;

/// A minimal incident with the fields the views group on, on the first of
/// the month.
///
/// # Panics
///
/// Panics if `(year, month, hour)` is not a valid timestamp.
#[must_use]
pub fn incident(
    case_number: &str,
    (year, month, hour): (i32, u32, u32),
    primary_type: &str,
    location: Option<&str>,
    arrest: bool,
) -> StoredIncident {
    let occurred_at = NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .expect("valid fixture timestamp");
    StoredIncident {
        case_number: case_number.to_string(),
        id: Some(1),
        occurred_at,
        primary_type: Some(primary_type.to_string()),
        description: None,
        location_description: location.map(str::to_string),
        arrest,
        domestic: false,
        beat: Some(111),
        district: Some(1),
        ward: None,
        community_area: None,
        fbi_code: Some("06".to_string()),
        latitude: Some(41.88),
        longitude: Some(-87.63),
        year,
        month,
        day: 1,
        hour,
        x_coordinate: None,
        y_coordinate: None,
        location: None,
    }
}

/// Provisions `incidents.duckdb` under `dir` and inserts `incidents`.
///
/// # Panics
///
/// Panics if the store cannot be provisioned or written.
#[must_use]
pub fn store_with(dir: &Path, incidents: &[StoredIncident]) -> PathBuf {
    let path = dir.join("incidents.duckdb");
    store::provision(&path, false).expect("provision fixture store");
    let mut conn = store::open(&path).expect("open fixture store");
    store::insert_incidents(&mut conn, incidents, |_| {}).expect("insert fixture incidents");
    path
}
