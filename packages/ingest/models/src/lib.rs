#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Pipeline configuration and ingestion report types.
//!
//! [`PipelineConfig`] is the explicit set of paths every stage receives;
//! nothing in the pipeline reads ambient paths or the working directory on
//! its own. It can be loaded from a TOML file and overridden field by field
//! by the CLI.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the persistent store.
pub const DEFAULT_STORE_PATH: &str = "data/chicago_crimes.duckdb";

/// Default location of the normalized intermediate file.
pub const DEFAULT_NORMALIZED_OUTPUT: &str = "data/processed/Chicago_Crimes_2008_to_2017.csv";

/// Errors that can occur while loading a [`PipelineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        /// Path of the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Paths for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw exports to normalize, in concatenation order.
    pub inputs: Vec<PathBuf>,
    /// Where the normalizer writes its consolidated output.
    pub normalized_output: PathBuf,
    /// The store file the loader appends to and the views read from.
    pub store_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            inputs: vec![
                PathBuf::from("data/raw/Chicago_Crimes_2008_to_2011.csv"),
                PathBuf::from("data/raw/Chicago_Crimes_2012_to_2017.csv"),
            ],
            normalized_output: PathBuf::from(DEFAULT_NORMALIZED_OUTPUT),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl PipelineConfig {
    /// Parses a config from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid TOML or a key
    /// has the wrong type.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// The normalizer's slice of this config.
    #[must_use]
    pub fn normalize_config(&self) -> NormalizeConfig {
        NormalizeConfig {
            inputs: self.inputs.clone(),
            output: self.normalized_output.clone(),
        }
    }
}

/// Inputs and output of one normalizer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Raw exports, in concatenation order.
    pub inputs: Vec<PathBuf>,
    /// Consolidated output file.
    pub output: PathBuf,
}

/// Per-input counters from a normalizer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputStats {
    /// The input file.
    pub path: PathBuf,
    /// Rows successfully read.
    pub rows_read: u64,
    /// Rows skipped because the CSV reader could not parse them or they had
    /// more fields than the header.
    pub rows_malformed: u64,
}

/// Result of a completed normalizer run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    /// Counters for each input, in input order.
    pub inputs: Vec<InputStats>,
    /// Rows dropped because their timestamp did not parse.
    pub rows_bad_timestamp: u64,
    /// Rows dropped as exact duplicates.
    pub rows_duplicate: u64,
    /// Rows written to the output.
    pub rows_written: u64,
    /// How long the run took.
    pub duration: Duration,
}

impl NormalizeReport {
    /// Total rows read across all inputs.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.inputs.iter().map(|i| i.rows_read).sum()
    }

    /// Total malformed rows skipped across all inputs.
    #[must_use]
    pub fn rows_malformed(&self) -> u64 {
        self.inputs.iter().map(|i| i.rows_malformed).sum()
    }
}

/// Result of a completed load run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    /// Rows read from the canonical file.
    pub rows_read: u64,
    /// Rows skipped because their case reference was empty.
    pub rows_missing_key: u64,
    /// Rows dropped because an earlier row in the same batch had the same
    /// case reference.
    pub rows_duplicate_in_batch: u64,
    /// Rows appended to the store.
    pub rows_inserted: u64,
    /// Rows skipped because the store already held their case reference.
    pub rows_skipped_existing: u64,
    /// How long the load took.
    pub duration: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_config() {
        let config = PipelineConfig::from_toml_str(
            r#"
            inputs = ["a.csv", "b.csv"]
            normalized_output = "out/merged.csv"
            store_path = "out/crimes.duckdb"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.inputs,
            vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]
        );
        assert_eq!(config.normalized_output, PathBuf::from("out/merged.csv"));
        assert_eq!(config.store_path, PathBuf::from("out/crimes.duckdb"));
    }

    #[test]
    fn missing_keys_use_defaults() {
        let config = PipelineConfig::from_toml_str(r#"store_path = "x.duckdb""#).unwrap();
        assert_eq!(config.store_path, PathBuf::from("x.duckdb"));
        assert_eq!(config.inputs, PipelineConfig::default().inputs);
        assert_eq!(
            config.normalized_output,
            PathBuf::from(DEFAULT_NORMALIZED_OUTPUT)
        );
    }

    #[test]
    fn rejects_wrong_types() {
        let err = PipelineConfig::from_toml_str("inputs = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PipelineConfig::load(Path::new("/nonexistent/crime_dash.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/crime_dash.toml"));
    }

    #[test]
    fn report_totals() {
        let report = NormalizeReport {
            inputs: vec![
                InputStats {
                    path: PathBuf::from("a.csv"),
                    rows_read: 3,
                    rows_malformed: 1,
                },
                InputStats {
                    path: PathBuf::from("b.csv"),
                    rows_read: 4,
                    rows_malformed: 0,
                },
            ],
            rows_bad_timestamp: 1,
            rows_duplicate: 1,
            rows_written: 5,
            duration: Duration::from_millis(5),
        };
        assert_eq!(report.rows_read(), 7);
        assert_eq!(report.rows_malformed(), 1);
    }
}
