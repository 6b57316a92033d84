//! All-or-nothing output files.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::NormalizeError;

/// Sibling path the output is staged in before the final rename.
fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "output".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Writes a CSV file by staging it next to `path` and renaming it into
/// place once `write` succeeds. On any failure the staged file is removed
/// and `path` is left untouched.
///
/// Parent directories are created as needed. The writer does not emit a
/// header row of its own.
///
/// # Errors
///
/// Returns [`NormalizeError::Write`] if the staged file cannot be created,
/// flushed, or renamed, and any error returned by `write`.
pub fn write_atomically<T>(
    path: &Path,
    write: impl FnOnce(&mut csv::Writer<File>) -> Result<T, NormalizeError>,
) -> Result<T, NormalizeError> {
    let write_err = |source| NormalizeError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let staging = staging_path(path);
    let file = File::create(&staging).map_err(write_err)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    let result = write(&mut writer).and_then(|value| {
        writer.flush().map_err(write_err)?;
        drop(writer);
        fs::rename(&staging, path).map_err(write_err)?;
        Ok(value)
    });

    if result.is_err() {
        if let Err(e) = fs::remove_file(&staging) {
            log::debug!("Could not remove {}: {e}", staging.display());
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");

        write_atomically(&path, |w| {
            w.write_record(["a", "b"])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n");
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let result: Result<(), _> = write_atomically(&path, |w| {
            w.write_record(["partial"])?;
            Err(NormalizeError::NoInputs)
        });

        assert!(result.is_err());
        assert!(!path.exists());
        assert!(!staging_path(&path).exists());
    }

    #[test]
    fn failure_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "old\n").unwrap();

        let result: Result<(), _> = write_atomically(&path, |_| Err(NormalizeError::NoInputs));

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");
    }
}
