#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the crime dashboard CLI.
//!
//! [`init_logger`] routes `log` output through `indicatif-log-bridge` so log
//! lines are suspended while bars redraw, and [`IndicatifProgress`] renders
//! pipeline progress reported through [`StageProgress`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crime_dash_ingest_models::InputStats;
use crime_dash_normalize::progress::StageProgress;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] behind [`StageProgress`].
///
/// Starts as a spinner and becomes a bar once a stage begins. Each finished
/// input file gets its own line with its row counts.
pub struct IndicatifProgress {
    bar: ProgressBar,
    counted_style: ProgressStyle,
}

impl IndicatifProgress {
    fn new(
        multi: &MultiProgress,
        message: &str,
        spinner_template: &str,
        bar_template: &str,
    ) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template(spinner_template)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let counted_style = ProgressStyle::with_template(bar_template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self { bar, counted_style }
    }

    /// Progress for a stage that works file by file (normalize, concat).
    #[must_use]
    pub fn files_bar(multi: &MultiProgress, message: &str) -> Arc<dyn StageProgress> {
        Arc::new(Self::new(
            multi,
            message,
            "{spinner:.cyan} {msg} [{elapsed}]",
            "  {msg} {wide_bar:.cyan/dim} {pos}/{len} files [{elapsed}]",
        ))
    }

    /// Progress for the store insert, whose total is known once the input
    /// has been read.
    #[must_use]
    pub fn insert_bar(multi: &MultiProgress, message: &str) -> Arc<dyn StageProgress> {
        Arc::new(Self::new(
            multi,
            message,
            "{spinner:.yellow} {msg}",
            "  {msg} {wide_bar:.yellow/dim} {pos}/{len} {percent}% [{eta}]",
        ))
    }
}

impl StageProgress for IndicatifProgress {
    fn begin(&self, stage: &str, total: u64) {
        self.bar.set_message(stage.to_string());
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.counted_style.clone());
    }

    fn reading(&self, path: &Path) {
        self.bar.set_message(format!("Reading {}", path.display()));
    }

    fn file_done(&self, stats: &InputStats) {
        self.bar.println(file_line(stats));
        self.bar.inc(1);
    }

    fn advance(&self, units: u64) {
        self.bar.inc(units);
    }

    fn finish(&self, summary: String) {
        self.bar.finish_with_message(summary);
    }
}

fn file_line(stats: &InputStats) -> String {
    let name = stats
        .path
        .file_name()
        .map_or_else(|| stats.path.display().to_string(), |n| n.to_string_lossy().into_owned());
    if stats.rows_malformed == 0 {
        format!("  {name}: {} rows", stats.rows_read)
    } else {
        format!(
            "  {name}: {} rows, {} malformed",
            stats.rows_read, stats.rows_malformed
        )
    }
}

/// Installs `pretty_env_logger` (driven by `RUST_LOG`) behind
/// `indicatif-log-bridge`.
///
/// Returns the [`MultiProgress`] every progress bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A logger may already be installed in tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
