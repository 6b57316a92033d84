#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` store for Chicago crime incidents.
//!
//! The store is a single `DuckDB` file holding one table,
//! [`store::TABLE_NAME`], keyed by case number. [`store`] owns the schema
//! and the append path; [`queries`] holds the read-only aggregation
//! queries behind each dashboard view. Every filter value reaches SQL as a
//! bound parameter.

#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures;
pub mod paths;
pub mod queries;
pub mod store;

use std::path::PathBuf;

/// Errors that can occur during store operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` returned an error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The store file does not exist.
    #[error("Store {} does not exist", path.display())]
    MissingStore {
        /// Path of the store file.
        path: PathBuf,
    },

    /// The store has not been provisioned.
    #[error("Store {} has no {} table; provision it first", path.display(), store::TABLE_NAME)]
    MissingTable {
        /// Path of the store file.
        path: PathBuf,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
