#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Raw export normalizer.
//!
//! Turns one or more raw city crime exports into a single canonical CSV
//! file: rows with unparseable timestamps are dropped, calendar fields are
//! derived, columns are projected onto [`Column::ALL`], and exact duplicate
//! rows are removed. See [`normalize`].

pub mod concat;
pub mod output;
pub mod progress;
pub mod reader;

use std::collections::HashSet;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use crime_dash_incident_models::{CalendarParts, CanonicalIncident, Column};
use crime_dash_ingest_models::{NormalizeConfig, NormalizeReport};

pub use concat::concat_raw;
pub use crime_dash_incident_models::parse_raw_timestamp as parse_incident_timestamp;

use crate::output::write_atomically;
use crate::progress::StageProgress;
use crate::reader::LenientCsv;

/// Errors that can occur while normalizing or concatenating exports.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// No input files were configured.
    #[error("No input files given")]
    NoInputs,

    /// An input file could not be opened or read.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// The input file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// An input file lacks a required column.
    #[error("{} is missing required column {:?}", path.display(), column.raw_name())]
    MissingColumn {
        /// The input file.
        path: PathBuf,
        /// The missing column.
        column: Column,
    },

    /// The output file could not be written.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// The output file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A record could not be serialized.
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Derives the calendar fields stored alongside every incident.
#[must_use]
pub fn derive_calendar(timestamp: &NaiveDateTime) -> CalendarParts {
    CalendarParts::from(timestamp)
}

/// Position of every non-derived canonical column within one input's header.
pub struct ColumnIndex {
    positions: [usize; Column::ALL.len()],
}

impl ColumnIndex {
    /// Resolves positions by normalized header name, so both `Case Number`
    /// and `CaseNumber` match. The first matching header wins.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::MissingColumn`] for the first non-derived
    /// column the header lacks.
    pub fn resolve<R: Read>(csv: &LenientCsv<R>) -> Result<Self, NormalizeError> {
        let mut positions = [usize::MAX; Column::ALL.len()];

        for (i, header) in csv.headers().iter().enumerate() {
            if let Some(column) = Column::from_header(header) {
                let slot = &mut positions[column as usize];
                if *slot == usize::MAX {
                    *slot = i;
                }
            }
        }

        for column in Column::ALL {
            if !column.is_derived() && positions[column as usize] == usize::MAX {
                return Err(NormalizeError::MissingColumn {
                    path: csv.path().to_path_buf(),
                    column,
                });
            }
        }

        Ok(Self { positions })
    }

    /// The value of `column` in `row`, or `""` for derived columns.
    #[must_use]
    pub fn get<'a>(&self, row: &'a [String], column: Column) -> &'a str {
        row.get(self.positions[column as usize])
            .map_or("", String::as_str)
    }

    /// Builds a canonical row, re-deriving the calendar fields. Returns
    /// `None` when `parse_timestamp` rejects the `Date` value.
    pub fn to_canonical(
        &self,
        row: &[String],
        parse_timestamp: impl Fn(&str) -> Option<NaiveDateTime>,
    ) -> Option<CanonicalIncident> {
        let occurred_at = parse_timestamp(self.get(row, Column::Date))?;
        let calendar = derive_calendar(&occurred_at);
        let text = |column| self.get(row, column).to_string();

        Some(CanonicalIncident {
            id: text(Column::Id),
            case_number: text(Column::CaseNumber),
            occurred_at,
            primary_type: text(Column::PrimaryType),
            description: text(Column::Description),
            location_description: text(Column::LocationDescription),
            arrest: text(Column::Arrest),
            domestic: text(Column::Domestic),
            beat: text(Column::Beat),
            district: text(Column::District),
            ward: text(Column::Ward),
            community_area: text(Column::CommunityArea),
            fbi_code: text(Column::FbiCode),
            latitude: text(Column::Latitude),
            longitude: text(Column::Longitude),
            year: calendar.year,
            month: calendar.month,
            day: calendar.day,
            hour: calendar.hour,
            x_coordinate: text(Column::XCoordinate),
            y_coordinate: text(Column::YCoordinate),
            location: text(Column::Location),
        })
    }
}

/// Normalizes the configured raw exports into one canonical CSV file.
///
/// Every input is opened and its header checked before anything is
/// written. Rows are concatenated in file order; rows whose `Date` does
/// not match the raw timestamp format are dropped, the calendar fields are
/// derived, and exact duplicates (after projection) are removed keeping the
/// first occurrence. The output replaces `config.output` atomically.
///
/// # Errors
///
/// * [`NormalizeError::NoInputs`] if `config.inputs` is empty
/// * [`NormalizeError::Read`] if an input cannot be opened or read
/// * [`NormalizeError::MissingColumn`] if an input lacks a canonical column
/// * [`NormalizeError::Write`]/[`NormalizeError::Csv`] if the output cannot
///   be written; no partial output is left behind
pub fn normalize(
    config: &NormalizeConfig,
    progress: &Arc<dyn StageProgress>,
) -> Result<NormalizeReport, NormalizeError> {
    if config.inputs.is_empty() {
        return Err(NormalizeError::NoInputs);
    }

    let start = Instant::now();

    let sources = config
        .inputs
        .iter()
        .map(|path| {
            let csv = LenientCsv::open(path)?;
            let index = ColumnIndex::resolve(&csv)?;
            Ok((csv, index))
        })
        .collect::<Result<Vec<_>, NormalizeError>>()?;

    progress.begin("Normalizing", sources.len() as u64);

    let mut inputs = Vec::with_capacity(sources.len());
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    let mut rows_bad_timestamp = 0u64;
    let mut rows_duplicate = 0u64;

    for (mut csv, index) in sources {
        progress.reading(csv.path());

        let mut row = Vec::new();
        while csv.next_row(&mut row)? {
            let Some(incident) = index.to_canonical(&row, parse_incident_timestamp) else {
                rows_bad_timestamp += 1;
                continue;
            };
            if seen.insert(incident.clone()) {
                rows.push(incident);
            } else {
                rows_duplicate += 1;
            }
        }

        let stats = csv.finish();
        log::info!(
            "Read {} rows from {} ({} malformed)",
            stats.rows_read,
            stats.path.display(),
            stats.rows_malformed,
        );
        progress.file_done(&stats);
        inputs.push(stats);
    }
    drop(seen);

    write_atomically(&config.output, |writer| {
        writer.write_record(Column::ALL.iter().map(AsRef::<str>::as_ref))?;
        for incident in &rows {
            writer.serialize(incident)?;
        }
        Ok(())
    })?;

    let report = NormalizeReport {
        inputs,
        rows_bad_timestamp,
        rows_duplicate,
        rows_written: rows.len() as u64,
        duration: start.elapsed(),
    };

    log::info!(
        "Normalized {} rows into {} ({} bad timestamps, {} duplicates) in {:.1}s",
        report.rows_written,
        config.output.display(),
        report.rows_bad_timestamp,
        report.rows_duplicate,
        report.duration.as_secs_f64(),
    );
    progress.finish(format!("{} rows written", report.rows_written));

    Ok(report)
}
