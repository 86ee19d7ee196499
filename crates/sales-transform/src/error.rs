//! Error types for the report transformation stages.

use polars::prelude::{DataFrame, PolarsError};
use sales_common::missing_columns;
use thiserror::Error;

/// Errors that abort a report run. None of them is retried.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A configured column is absent from a table.
    #[error("column '{column}' not found in {table} table")]
    Schema { table: String, column: String },

    /// A cell that must be parsed (date, year, month) could not be.
    #[error("invalid {column} value '{value}' at row {row}")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    /// Gap-year synthesis has nothing to average.
    #[error("insufficient reference data for year {year}: {reason}")]
    InsufficientReferenceData { year: i32, reason: String },

    /// No customer key can be stamped on synthesized rows.
    #[error(
        "gap year {year} has no genuine rows to pick a backfill customer key from; \
         set synthesis.backfill_customer_key"
    )]
    UndefinedBackfillCustomer { year: i32 },

    /// A stratum cannot be fit.
    #[error("cannot impute '{column}' for year {year}: {reason}")]
    Imputation {
        column: String,
        year: i32,
        reason: String,
    },

    #[error("DataFrame operation failed: {0}")]
    Polars(#[from] PolarsError),
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// Fails with [`TransformError::Schema`] naming the first absent column.
pub(crate) fn require_columns<'a>(
    df: &DataFrame,
    table: &str,
    columns: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    match missing_columns(df, columns).into_iter().next() {
        Some(column) => Err(TransformError::Schema {
            table: table.to_string(),
            column,
        }),
        None => Ok(()),
    }
}
