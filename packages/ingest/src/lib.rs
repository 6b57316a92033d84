#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Loads canonical incident files into the `DuckDB` store.
//!
//! [`load`] converts every row of a canonical CSV file into a typed
//! [`StoredIncident`] before touching the store, so a bad flag value aborts
//! the load with nothing written. [`pipeline::run`] chains normalize,
//! provision, and load.

pub mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crime_dash_database::{DbError, store};
use crime_dash_incident_models::{
    CanonicalIncident, Column, StoredIncident, parse_any_timestamp,
};
use crime_dash_ingest_models::LoadReport;
use crime_dash_normalize::progress::StageProgress;
use crime_dash_normalize::reader::LenientCsv;
use crime_dash_normalize::{ColumnIndex, NormalizeError};

/// Errors that can occur while loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The input file could not be read or lacks a required column.
    #[error(transparent)]
    Input(#[from] NormalizeError),

    /// A row's `Date` is not a recognizable timestamp.
    #[error("{}:{line}: unparseable timestamp {value:?}", path.display())]
    InvalidTimestamp {
        /// The input file.
        path: PathBuf,
        /// Line the row starts on.
        line: u64,
        /// The offending value.
        value: String,
    },

    /// A flag column holds a value outside the strict mapping.
    #[error(
        "{}:{line}: invalid {} value {value:?} (expected true/false/1/0/1.0/0.0 or empty)",
        path.display(),
        column.raw_name()
    )]
    InvalidFlag {
        /// The input file.
        path: PathBuf,
        /// Line the row starts on.
        line: u64,
        /// The flag column.
        column: Column,
        /// The offending value.
        value: String,
    },

    /// The store rejected the operation.
    #[error(transparent)]
    Database(#[from] DbError),
}

/// Logs numeric fields that held text but were stored as NULL.
fn log_dropped_numbers(line: u64, canonical: &CanonicalIncident, stored: &StoredIncident) {
    let checks = [
        (Column::Id, &canonical.id, stored.id.is_none()),
        (Column::Beat, &canonical.beat, stored.beat.is_none()),
        (Column::District, &canonical.district, stored.district.is_none()),
        (Column::Ward, &canonical.ward, stored.ward.is_none()),
        (
            Column::CommunityArea,
            &canonical.community_area,
            stored.community_area.is_none(),
        ),
        (Column::Latitude, &canonical.latitude, stored.latitude.is_none()),
        (Column::Longitude, &canonical.longitude, stored.longitude.is_none()),
        (
            Column::XCoordinate,
            &canonical.x_coordinate,
            stored.x_coordinate.is_none(),
        ),
        (
            Column::YCoordinate,
            &canonical.y_coordinate,
            stored.y_coordinate.is_none(),
        ),
    ];

    for (column, text, dropped) in checks {
        if dropped && !text.trim().is_empty() {
            log::debug!("line {line}: storing unparseable {column} {text:?} as NULL");
        }
    }
}

/// Reads and converts every row of a canonical file.
///
/// Returns the converted rows, the number of rows read, and the number
/// skipped for an empty case number.
fn read_incidents(input: &Path) -> Result<(Vec<StoredIncident>, u64, u64), LoadError> {
    let mut csv = LenientCsv::open(input)?;
    let index = ColumnIndex::resolve(&csv)?;

    let mut incidents = Vec::new();
    let mut rows_missing_key = 0u64;
    let mut row = Vec::new();

    while csv.next_row(&mut row)? {
        let line = csv.line();

        if index.get(&row, Column::CaseNumber).is_empty() {
            log::debug!("line {line}: skipping row without a case number");
            rows_missing_key += 1;
            continue;
        }

        let Some(canonical) = index.to_canonical(&row, parse_any_timestamp) else {
            return Err(LoadError::InvalidTimestamp {
                path: input.to_path_buf(),
                line,
                value: index.get(&row, Column::Date).to_string(),
            });
        };

        let stored = StoredIncident::try_from(&canonical).map_err(|e| LoadError::InvalidFlag {
            path: input.to_path_buf(),
            line,
            column: e.column,
            value: e.value,
        })?;

        log_dropped_numbers(line, &canonical, &stored);
        incidents.push(stored);
    }

    let stats = csv.finish();
    if stats.rows_malformed > 0 {
        log::warn!(
            "Skipped {} malformed rows in {}",
            stats.rows_malformed,
            input.display()
        );
    }

    Ok((incidents, stats.rows_read, rows_missing_key))
}

/// Appends the canonical file at `input` to the store at `store_path`.
///
/// The store must already be provisioned. Every row is validated before
/// the insert starts, and the insert runs in one transaction. Rows with an
/// empty case number are skipped; within the file only the first row per
/// case number is kept; rows whose case number is already stored are
/// skipped.
///
/// # Errors
///
/// * [`LoadError::Input`] if the file cannot be read or lacks a column
/// * [`LoadError::InvalidTimestamp`]/[`LoadError::InvalidFlag`] if a row
///   cannot be converted; nothing is written
/// * [`LoadError::Database`] if the store is missing, unprovisioned, or
///   rejects the insert
pub fn load(
    store_path: &Path,
    input: &Path,
    progress: &Arc<dyn StageProgress>,
) -> Result<LoadReport, LoadError> {
    let start = Instant::now();

    if !store_path.exists() {
        return Err(DbError::MissingStore {
            path: store_path.to_path_buf(),
        }
        .into());
    }
    let mut conn = store::open(store_path)?;
    store::require_table(&conn, store_path)?;

    progress.reading(input);
    let (incidents, rows_read, rows_missing_key) = read_incidents(input)?;
    log::info!(
        "Read {rows_read} rows from {} ({} to insert)",
        input.display(),
        incidents.len(),
    );

    progress.begin("Inserting", incidents.len() as u64);
    let summary = store::insert_incidents(&mut conn, &incidents, |n| progress.advance(n))?;

    let report = LoadReport {
        rows_read,
        rows_missing_key,
        rows_duplicate_in_batch: summary.duplicates_in_batch,
        rows_inserted: summary.inserted,
        rows_skipped_existing: summary.skipped_existing,
        duration: start.elapsed(),
    };

    log::info!(
        "Loaded {} rows into {} ({} already stored, {} duplicates, {} without case number) in {:.1}s",
        report.rows_inserted,
        store_path.display(),
        report.rows_skipped_existing,
        report.rows_duplicate_in_batch,
        report.rows_missing_key,
        report.duration.as_secs_f64(),
    );
    progress.finish(format!("{} rows inserted", report.rows_inserted));

    Ok(report)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crime_dash_normalize::progress::silent;
    use std::fs;

    pub const CANONICAL_HEADER: &str = "ID,CaseNumber,Date,PrimaryType,Description,\
LocationDescription,Arrest,Domestic,Beat,District,Ward,CommunityArea,FBICode,Latitude,\
Longitude,Year,Month,Day,Hour,XCoordinate,YCoordinate,Location";

    pub fn canonical_row(case: &str, arrest: &str, domestic: &str) -> String {
        format!(
            "10508693,{case},2016-05-03 23:40:00,BATTERY,DOMESTIC BATTERY SIMPLE,APARTMENT,\
{arrest},{domestic},1022,10.0,24.0,29.0,08B,41.864073157,-87.706818608,2016,5,3,23,\
1154907.0,1893681.0,\"(41.864073157, -87.706818608)\""
        )
    }

    fn write_file(dir: &Path, rows: &[String]) -> PathBuf {
        let path = dir.join("canonical.csv");
        let mut text = format!("{CANONICAL_HEADER}\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn provisioned_store(dir: &Path) -> PathBuf {
        let path = dir.join("store.duckdb");
        store::provision(&path, false).unwrap();
        path
    }

    fn stored(path: &Path) -> Vec<StoredIncident> {
        let conn = store::open_read_only(path).unwrap();
        store::sample_incidents(&conn, 100).unwrap()
    }

    #[test]
    fn loads_and_converts_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = provisioned_store(dir.path());
        let input = write_file(
            dir.path(),
            &[
                canonical_row("HZ1", "True", "False"),
                canonical_row("HZ2", "0", "1.0"),
            ],
        );

        let report = load(&store_path, &input, &silent()).unwrap();

        assert_eq!(report.rows_read, 2);
        assert_eq!(report.rows_inserted, 2);
        let rows = stored(&store_path);
        assert!(rows[0].arrest && !rows[0].domestic);
        assert!(!rows[1].arrest && rows[1].domestic);
        assert_eq!(rows[0].district, Some(10));
        assert_eq!(rows[0].year, 2016);
        assert_eq!(rows[0].hour, 23);
    }

    #[test]
    fn second_load_of_same_file_inserts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = provisioned_store(dir.path());
        let input = write_file(
            dir.path(),
            &[
                canonical_row("HZ1", "False", "False"),
                canonical_row("HZ2", "False", "False"),
            ],
        );

        let first = load(&store_path, &input, &silent()).unwrap();
        let second = load(&store_path, &input, &silent()).unwrap();

        assert_eq!(first.rows_inserted, 2);
        assert_eq!(second.rows_inserted, 0);
        assert_eq!(second.rows_skipped_existing, 2);
        assert_eq!(stored(&store_path).len(), 2);
    }

    #[test]
    fn invalid_flag_aborts_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = provisioned_store(dir.path());
        let input = write_file(
            dir.path(),
            &[
                canonical_row("HZ1", "False", "False"),
                canonical_row("HZ2", "maybe", "False"),
            ],
        );

        let err = load(&store_path, &input, &silent()).unwrap_err();

        match err {
            LoadError::InvalidFlag {
                line,
                column,
                value,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, Column::Arrest);
                assert_eq!(value, "maybe");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(stored(&store_path).is_empty());
    }

    #[test]
    fn rows_without_case_number_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = provisioned_store(dir.path());
        let input = write_file(
            dir.path(),
            &[
                canonical_row("", "False", "False"),
                canonical_row("HZ2", "False", "False"),
            ],
        );

        let report = load(&store_path, &input, &silent()).unwrap();

        assert_eq!(report.rows_missing_key, 1);
        assert_eq!(report.rows_inserted, 1);
    }

    #[test]
    fn duplicate_case_numbers_keep_first() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = provisioned_store(dir.path());
        let input = write_file(
            dir.path(),
            &[
                canonical_row("HZ1", "True", "False"),
                canonical_row("HZ1", "False", "False"),
            ],
        );

        let report = load(&store_path, &input, &silent()).unwrap();

        assert_eq!(report.rows_duplicate_in_batch, 1);
        assert!(stored(&store_path)[0].arrest);
    }

    #[test]
    fn accepts_raw_header_names() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = provisioned_store(dir.path());
        let input = dir.path().join("raw_names.csv");
        let header = Column::ALL.map(Column::raw_name).join(",");
        fs::write(
            &input,
            format!("{header}\n{}\n", canonical_row("HZ9", "true", "false")),
        )
        .unwrap();

        let report = load(&store_path, &input, &silent()).unwrap();

        assert_eq!(report.rows_inserted, 1);
    }

    #[test]
    fn unprovisioned_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("bare.duckdb");
        drop(store::open(&store_path).unwrap());
        let input = write_file(dir.path(), &[canonical_row("HZ1", "0", "0")]);

        let err = load(&store_path, &input, &silent()).unwrap_err();

        assert!(matches!(
            err,
            LoadError::Database(DbError::MissingTable { .. })
        ));
    }

    #[test]
    fn missing_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_file(dir.path(), &[canonical_row("HZ1", "0", "0")]);

        let err = load(&dir.path().join("none.duckdb"), &input, &silent()).unwrap_err();

        assert!(matches!(
            err,
            LoadError::Database(DbError::MissingStore { .. })
        ));
    }

    #[test]
    fn bad_timestamp_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let store_path = provisioned_store(dir.path());
        let row = canonical_row("HZ1", "0", "0").replace("2016-05-03 23:40:00", "yesterday");
        let input = write_file(dir.path(), &[row]);

        let err = load(&store_path, &input, &silent()).unwrap_err();

        assert!(matches!(err, LoadError::InvalidTimestamp { line: 2, .. }));
    }
}
