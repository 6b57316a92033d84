//! The full normalize, provision, load sequence.

use std::sync::Arc;

use crime_dash_database::store;
use crime_dash_ingest_models::{LoadReport, NormalizeReport, PipelineConfig};
use crime_dash_normalize::normalize;
use crime_dash_normalize::progress::StageProgress;

use crate::{LoadError, load};

/// Reports from both stages of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub normalize: NormalizeReport,
    pub load: LoadReport,
}

/// Normalizes the configured inputs, provisions the store, and loads the
/// normalized file into it.
///
/// With `recreate` the incidents table is dropped and rebuilt first;
/// otherwise existing rows are kept and only new case numbers are added.
///
/// # Errors
///
/// Returns [`LoadError`] from whichever stage fails first. A failed
/// normalize leaves the store untouched.
pub fn run(
    config: &PipelineConfig,
    recreate: bool,
    progress: &Arc<dyn StageProgress>,
) -> Result<PipelineReport, LoadError> {
    log::info!(
        "Running pipeline: {} inputs -> {} -> {}",
        config.inputs.len(),
        config.normalized_output.display(),
        config.store_path.display(),
    );

    let normalize_report = normalize(&config.normalize_config(), progress)?;
    store::provision(&config.store_path, recreate)?;
    let load_report = load(&config.store_path, &config.normalized_output, progress)?;

    Ok(PipelineReport {
        normalize: normalize_report,
        load: load_report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crime_dash_normalize::progress::silent;
    use std::fs;
    use std::path::Path;

    const RAW_HEADER: &str = ",ID,Case Number,Date,Block,IUCR,Primary Type,Description,\
Location Description,Arrest,Domestic,Beat,District,Ward,Community Area,FBI Code,\
X Coordinate,Y Coordinate,Year,Updated On,Latitude,Longitude,Location";

    fn raw_row(index: u32, case: &str, date: &str, primary_type: &str) -> String {
        format!(
            "{index},{index}00,{case},{date},043XX W 5TH AVE,0486,{primary_type},SIMPLE,\
STREET,False,True,1132,11.0,24.0,26.0,08B,1148262.0,1895574.0,2016,05/10/2016 03:56:50 PM,\
41.87,-87.73,\"(41.87, -87.73)\""
        )
    }

    fn write_raw(dir: &Path, name: &str, rows: &[String]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut text = format!("{RAW_HEADER}\n");
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn config(dir: &Path) -> PipelineConfig {
        let first = write_raw(
            dir,
            "a.csv",
            &[
                raw_row(0, "HZ1", "05/03/2016 11:40:00 PM", "BATTERY"),
                raw_row(1, "HZ2", "not a date", "THEFT"),
            ],
        );
        let second = write_raw(
            dir,
            "b.csv",
            &[
                raw_row(0, "HZ3", "01/15/2017 08:00:00 AM", "THEFT"),
                raw_row(0, "HZ1", "05/03/2016 11:40:00 PM", "BATTERY"),
            ],
        );

        PipelineConfig {
            inputs: vec![first, second],
            normalized_output: dir.join("processed/merged.csv"),
            store_path: dir.join("db/crimes.duckdb"),
        }
    }

    #[test]
    fn runs_all_stages() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let report = run(&config, false, &silent()).unwrap();

        assert_eq!(report.normalize.rows_bad_timestamp, 1);
        assert_eq!(report.normalize.rows_duplicate, 1);
        assert_eq!(report.normalize.rows_written, 2);
        assert_eq!(report.load.rows_inserted, 2);

        let conn = store::open_read_only(&config.store_path).unwrap();
        assert_eq!(store::record_count(&conn).unwrap(), 2);
    }

    #[test]
    fn rerun_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        run(&config, false, &silent()).unwrap();
        let second = run(&config, false, &silent()).unwrap();

        assert_eq!(second.load.rows_inserted, 0);
        assert_eq!(second.load.rows_skipped_existing, 2);
    }

    #[test]
    fn recreate_reloads_from_scratch() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        run(&config, false, &silent()).unwrap();
        let second = run(&config, true, &silent()).unwrap();

        assert_eq!(second.load.rows_inserted, 2);
    }

    #[test]
    fn failed_normalize_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.inputs.push(dir.path().join("missing.csv"));

        let err = run(&config, false, &silent()).unwrap_err();

        assert!(matches!(err, LoadError::Input(_)));
        assert!(!config.store_path.exists());
    }
}
