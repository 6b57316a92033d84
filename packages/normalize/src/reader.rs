//! Lenient CSV reading for raw exports.
//!
//! The city exports contain rows with stray delimiters, truncated lines and
//! the occasional byte sequence that is not UTF-8. [`LenientCsv`] yields
//! every row it can make sense of and counts the rest instead of failing.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use crime_dash_ingest_models::InputStats;

use crate::NormalizeError;

/// Row-by-row reader that skips rows it cannot use.
///
/// Rows with more fields than the header are skipped, rows with fewer
/// fields are padded with empty values, and invalid UTF-8 is replaced.
pub struct LenientCsv<R: Read> {
    path: PathBuf,
    headers: Vec<String>,
    reader: csv::Reader<R>,
    record: csv::ByteRecord,
    rows_read: u64,
    rows_malformed: u64,
}

impl LenientCsv<BufReader<File>> {
    /// Opens a file and reads its header row.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Read`] if the file cannot be opened or its
    /// header cannot be read.
    pub fn open(path: &Path) -> Result<Self, NormalizeError> {
        let file = File::open(path).map_err(|source| NormalizeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(path, BufReader::new(file))
    }
}

impl<R: Read> LenientCsv<R> {
    /// Wraps any reader. `path` is only used for error messages and stats.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Read`] if the header row cannot be read.
    pub fn from_reader(path: &Path, reader: R) -> Result<Self, NormalizeError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(true)
            .from_reader(reader);

        let headers = reader
            .byte_headers()
            .map_err(|e| NormalizeError::Read {
                path: path.to_path_buf(),
                source: e.into(),
            })?
            .iter()
            .map(|h| String::from_utf8_lossy(h).trim().to_string())
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            reader,
            record: csv::ByteRecord::new(),
            rows_read: 0,
            rows_malformed: 0,
        })
    }

    /// Header names, trimmed.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// The file this reader was opened on.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the next usable row into `row`, replacing its contents with
    /// exactly `headers().len()` trimmed values. Returns `false` at end of
    /// input.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Read`] on an I/O failure mid-file.
    /// Unparseable rows are skipped and counted instead.
    pub fn next_row(&mut self, row: &mut Vec<String>) -> Result<bool, NormalizeError> {
        loop {
            match self.reader.read_byte_record(&mut self.record) {
                Ok(false) => return Ok(false),
                Ok(true) => {}
                Err(e) if e.is_io_error() => {
                    return Err(NormalizeError::Read {
                        path: self.path.clone(),
                        source: e.into(),
                    });
                }
                Err(e) => {
                    log::debug!("{}: skipping unreadable row: {e}", self.path.display());
                    self.rows_malformed += 1;
                    continue;
                }
            }

            if self.record.len() > self.headers.len() {
                log::debug!(
                    "{}: skipping row at line {} with {} fields (header has {})",
                    self.path.display(),
                    self.record.position().map_or(0, csv::Position::line),
                    self.record.len(),
                    self.headers.len(),
                );
                self.rows_malformed += 1;
                continue;
            }

            row.clear();
            row.extend(
                self.record
                    .iter()
                    .map(|f| String::from_utf8_lossy(f).trim().to_string()),
            );
            row.resize(self.headers.len(), String::new());
            self.rows_read += 1;
            return Ok(true);
        }
    }

    /// Line number where the most recently returned row starts.
    #[must_use]
    pub fn line(&self) -> u64 {
        self.record.position().map_or(0, csv::Position::line)
    }

    /// Consumes the reader and returns its counters.
    #[must_use]
    pub fn finish(self) -> InputStats {
        InputStats {
            path: self.path,
            rows_read: self.rows_read,
            rows_malformed: self.rows_malformed,
        }
    }
}
