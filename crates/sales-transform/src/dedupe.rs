use std::collections::BTreeSet;

use polars::prelude::{BooleanChunked, DataFrame, NewChunkedArray, PolarsResult};
use sales_common::{column_f64s, column_strings, format_numeric};

use crate::error::Result;

/// Removes rows identical to an earlier row in every column, keeping the
/// first occurrence. Nulls compare equal to each other but not to any value,
/// and `-0.0` equals `0.0`.
pub fn drop_duplicate_rows(df: &mut DataFrame) -> Result<usize> {
    if df.height() == 0 {
        return Ok(0);
    }
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let columns = names
        .iter()
        .map(|name| key_column(df, name))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut seen = BTreeSet::new();
    let mut keep = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let composite: Vec<Option<&str>> = columns
            .iter()
            .map(|values| values[idx].as_deref())
            .collect();
        keep.push(seen.insert(composite));
    }
    let removed = keep.iter().filter(|kept| !**kept).count();
    if removed > 0 {
        let mask = BooleanChunked::from_slice("dedupe".into(), &keep);
        *df = df.filter(&mask)?;
    }
    Ok(removed)
}

/// Cell text used for comparison. Float zeros lose their sign.
fn key_column(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    if !df.column(name)?.dtype().is_float() {
        return column_strings(df, name);
    }
    Ok(column_f64s(df, name)?
        .into_iter()
        .map(|value| value.map(|v| format_numeric(if v == 0.0 { 0.0 } else { v })))
        .collect())
}
