//! Verbatim concatenation of raw exports.
//!
//! Used to merge the yearly archive files into one raw export before
//! normalizing. Unlike [`crate::normalize`], rows are copied as-is: no
//! timestamp parsing, projection or deduplication.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crime_dash_incident_models::normalize_header;
use crime_dash_ingest_models::InputStats;

use crate::NormalizeError;
use crate::output::write_atomically;
use crate::progress::StageProgress;
use crate::reader::LenientCsv;

/// For each output column, the position of the matching column in one
/// input, if it has one.
fn column_mapping(target: &[String], headers: &[String]) -> Vec<Option<usize>> {
    target
        .iter()
        .map(|name| {
            headers.iter().position(|h| h == name).or_else(|| {
                let wanted = normalize_header(name);
                headers.iter().position(|h| normalize_header(h) == wanted)
            })
        })
        .collect()
}

/// Concatenates raw exports under the header of the first input.
///
/// Later inputs are matched to that header by column name: their extra
/// columns are dropped and absent columns are written empty. Rows are read
/// with the same lenient policy as the normalizer.
///
/// # Errors
///
/// * [`NormalizeError::NoInputs`] if `inputs` is empty
/// * [`NormalizeError::Read`] if an input cannot be opened or read
/// * [`NormalizeError::Write`]/[`NormalizeError::Csv`] if the output cannot
///   be written; no partial output is left behind
pub fn concat_raw(
    inputs: &[PathBuf],
    output: &Path,
    progress: &Arc<dyn StageProgress>,
) -> Result<Vec<InputStats>, NormalizeError> {
    let sources = inputs
        .iter()
        .map(|path| LenientCsv::open(path))
        .collect::<Result<Vec<_>, _>>()?;

    let header = sources
        .first()
        .map(|csv| csv.headers().to_vec())
        .ok_or(NormalizeError::NoInputs)?;

    progress.begin("Concatenating", sources.len() as u64);

    let stats = write_atomically(output, |writer| {
        writer.write_record(&header)?;

        let mut stats = Vec::with_capacity(sources.len());
        let mut row = Vec::new();

        for mut csv in sources {
            progress.reading(csv.path());
            let mapping = column_mapping(&header, csv.headers());

            while csv.next_row(&mut row)? {
                writer.write_record(
                    mapping
                        .iter()
                        .map(|i| i.and_then(|i| row.get(i)).map_or("", String::as_str)),
                )?;
            }

            let input = csv.finish();
            log::info!(
                "Appended {} rows from {} ({} malformed)",
                input.rows_read,
                input.path.display(),
                input.rows_malformed,
            );
            progress.file_done(&input);
            stats.push(input);
        }

        Ok(stats)
    })?;

    progress.finish(format!("Wrote {}", output.display()));

    Ok(stats)
}
