//! Directory of CSV files as a table store.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::{CsvReadOptions, CsvWriter, DataFrame, SerReader, SerWriter};
use sales_model::OutputFormat;

use crate::error::{Result, StoreError};
use crate::store::{TableStore, resolve_format, target_key};

/// Tables are the `.csv` files directly inside `root`; identifiers are file names.
#[derive(Debug, Clone)]
pub struct LocalTableStore {
    root: PathBuf,
}

impl LocalTableStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TableStore for LocalTableStore {
    fn list_available(&self, tag: &str) -> Result<BTreeSet<String>> {
        let files = list_csv_files(&self.root)?;
        let identifiers = files
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .filter(|name| name.starts_with(tag))
            .map(str::to_string)
            .collect();
        Ok(identifiers)
    }

    fn fetch(&self, identifier: &str) -> Result<DataFrame> {
        let path = self.root.join(identifier);
        if !path.is_file() {
            return Err(StoreError::NotFound {
                identifier: identifier.to_string(),
            });
        }
        tracing::debug!(path = %path.display(), "reading table");
        let df = read_csv_frame(&path)?;
        tracing::debug!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            "table read"
        );
        Ok(df)
    }

    fn persist(&self, frame: &mut DataFrame, identifier: &str, format: &str) -> Result<String> {
        let format = resolve_format(format)?;
        if !self.root.is_dir() {
            return Err(StoreError::DirectoryNotFound {
                path: self.root.clone(),
            });
        }
        let key = target_key(identifier, format);
        let path = self.root.join(&key);
        // Written beside the target and renamed, so a failed write never leaves a
        // truncated report behind.
        let partial = self.root.join(format!(".{key}.partial"));
        if let Err(error) = write_frame(frame, &partial, format) {
            let _ = std::fs::remove_file(&partial);
            return Err(error);
        }
        std::fs::rename(&partial, &path).map_err(|source| StoreError::FileWrite {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), rows = frame.height(), "table written");
        Ok(key)
    }
}

/// Lists all CSV files in a directory.
///
/// Returns files sorted by filename.
fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(StoreError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }

    let mut files = Vec::new();

    let entries = std::fs::read_dir(dir).map_err(|e| StoreError::DirectoryRead {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry_result in entries {
        let entry = entry_result.map_err(|e| StoreError::DirectoryRead {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

        if is_csv {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(files)
}

/// Reads a CSV file with a single header row. Column types are inferred from
/// the whole file.
fn read_csv_frame(path: &Path) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| StoreError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .finish()
        .map_err(|e| StoreError::CsvParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn write_frame(frame: &mut DataFrame, path: &Path, format: OutputFormat) -> Result<()> {
    let mut file = File::create(path).map_err(|source| StoreError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        OutputFormat::Csv => CsvWriter::new(&mut file)
            .include_header(true)
            .finish(frame)
            .map_err(|e| StoreError::CsvWrite {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        for name in &["SALESDATA.csv", "CUSTOMERS.csv", "notes.txt"] {
            std::fs::write(dir.path().join(name), "A,B\n1,x\n").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();
        dir
    }

    #[test]
    fn test_list_csv_files_sorted_and_filtered() {
        let dir = create_test_dir();
        let files = list_csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|path| path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["CUSTOMERS.csv", "SALESDATA.csv"]);
    }

    #[test]
    fn test_list_csv_files_not_a_directory() {
        let dir = TempDir::new().unwrap();
        let result = list_csv_files(&dir.path().join("missing"));
        assert!(matches!(result, Err(StoreError::DirectoryNotFound { .. })));
    }

    #[test]
    fn test_read_csv_frame_shape() {
        let dir = create_test_dir();
        let df = read_csv_frame(&dir.path().join("SALESDATA.csv")).unwrap();
        assert_eq!(df.height(), 1);
        assert_eq!(df.width(), 2);
    }
}
