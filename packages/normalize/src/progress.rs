//! Stage progress for the normalize, concat and load steps.
//!
//! A stage first announces how many units it will process: input files for
//! normalize and concat, rows for the store insert. It then reports each
//! file as it is opened and finished, along with that file's row counts.

use std::path::Path;
use std::sync::Arc;

use crime_dash_ingest_models::InputStats;

/// Receives progress from a pipeline stage.
pub trait StageProgress: Send + Sync {
    /// A stage named `stage` starts over `total` units.
    fn begin(&self, stage: &str, total: u64);

    /// Reading of `path` has started.
    fn reading(&self, path: &Path);

    /// A file has been read to the end. Counts as one unit.
    fn file_done(&self, stats: &InputStats) {
        log::debug!(
            "{}: {} rows, {} malformed",
            stats.path.display(),
            stats.rows_read,
            stats.rows_malformed,
        );
        self.advance(1);
    }

    /// `units` more units are done.
    fn advance(&self, units: u64);

    /// The stage is over.
    fn finish(&self, summary: String);
}

/// Discards all progress.
pub struct Silent;

impl StageProgress for Silent {
    fn begin(&self, _stage: &str, _total: u64) {}
    fn reading(&self, _path: &Path) {}
    fn advance(&self, _units: u64) {}
    fn finish(&self, _summary: String) {}
}

#[must_use]
pub fn silent() -> Arc<dyn StageProgress> {
    Arc::new(Silent)
}
