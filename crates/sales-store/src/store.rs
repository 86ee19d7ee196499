//! The table store boundary.

use std::collections::BTreeSet;

use polars::prelude::DataFrame;
use sales_model::OutputFormat;

use crate::error::{Result, StoreError};

/// Named row-sets in, one named row-set out.
pub trait TableStore {
    /// Identifiers of every fetchable table whose name starts with `tag`.
    /// An empty tag lists everything.
    fn list_available(&self, tag: &str) -> Result<BTreeSet<String>>;

    /// Returns the whole table. Fails with [`StoreError::NotFound`] when absent.
    fn fetch(&self, identifier: &str) -> Result<DataFrame>;

    /// Writes `frame` under `identifier` in `format` and returns the stored key.
    ///
    /// Fails with [`StoreError::UnsupportedFormat`] before writing anything
    /// when the format is not recognized.
    fn persist(&self, frame: &mut DataFrame, identifier: &str, format: &str) -> Result<String>;
}

/// Parses a configured format name.
pub fn resolve_format(format: &str) -> Result<OutputFormat> {
    OutputFormat::from_extension(format).ok_or_else(|| StoreError::UnsupportedFormat {
        format: format.to_string(),
    })
}

/// Key a persisted table is stored under: `<identifier>.<extension>`.
pub fn target_key(identifier: &str, format: OutputFormat) -> String {
    format!("{identifier}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_format() {
        assert_eq!(resolve_format("csv").unwrap(), OutputFormat::Csv);
        assert!(matches!(
            resolve_format("parquet"),
            Err(StoreError::UnsupportedFormat { format }) if format == "parquet"
        ));
    }

    #[test]
    fn test_target_key() {
        assert_eq!(target_key("sales-report", OutputFormat::Csv), "sales-report.csv");
    }
}
