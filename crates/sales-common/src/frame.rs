//! Whole-column extraction and row gathering.
//!
//! Stages work on plain vectors pulled out of a frame and rebuild a `Series`
//! afterwards, so every helper here returns one value per row in row order.

use polars::prelude::{AnyValue, Column, DataFrame, DataType, NamedFrom, PolarsResult, Series};

use crate::any_value::{any_to_f64, any_to_i64, any_to_text};

/// Returns true when the frame has a column with this exact name.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Returns the names from `names` that the frame does not have, in input order.
pub fn missing_columns<'a>(df: &DataFrame, names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !has_column(df, name))
        .map(str::to_string)
        .collect()
}

/// Reads a column as text. `Null` stays `None`; every other value is rendered.
pub fn column_strings(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<String>>> {
    let column = df.column(name)?;
    (0..column.len())
        .map(|idx| column.get(idx).map(any_to_text))
        .collect()
}

/// Reads a column as `f64`. Nulls and unparseable values are `None`.
pub fn column_f64s(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?;
    (0..column.len())
        .map(|idx| column.get(idx).map(any_to_f64))
        .collect()
}

/// Reads a column as `i64`. Floats are truncated; nulls stay `None`.
pub fn column_i64s(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let column = df.column(name)?;
    (0..column.len())
        .map(|idx| column.get(idx).map(any_to_i64))
        .collect()
}

/// Builds a new series by picking rows of `column`; `None` produces a null.
///
/// Integer, float, boolean and date columns keep their dtype. Anything else
/// comes back as text.
pub fn gather_column(column: &Column, indices: &[Option<usize>]) -> PolarsResult<Series> {
    let name = column.name().clone();
    let dtype = column.dtype().clone();
    if dtype.is_integer() {
        let values = pick(column, indices, any_to_i64)?;
        return Series::new(name, values).cast(&dtype);
    }
    if dtype.is_float() {
        let values = pick(column, indices, any_to_f64)?;
        return Series::new(name, values).cast(&dtype);
    }
    match dtype {
        DataType::Boolean => {
            let values = pick(column, indices, |value| match value {
                AnyValue::Boolean(flag) => Some(flag),
                _ => None,
            })?;
            Ok(Series::new(name, values))
        }
        DataType::Date => {
            let values = pick(column, indices, |value| match value {
                AnyValue::Date(days) => Some(days),
                _ => None,
            })?;
            Series::new(name, values).cast(&DataType::Date)
        }
        _ => {
            let values = pick(column, indices, any_to_text)?;
            Ok(Series::new(name, values))
        }
    }
}

fn pick<T>(
    column: &Column,
    indices: &[Option<usize>],
    convert: impl Fn(AnyValue<'_>) -> Option<T>,
) -> PolarsResult<Vec<Option<T>>> {
    indices
        .iter()
        .map(|idx| match idx {
            Some(row) => column.get(*row).map(&convert),
            None => Ok(None),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{IntoColumn, df};

    #[test]
    fn test_missing_columns_keeps_input_order() {
        let df = df! { "A" => &[1i64], "C" => &[2i64] }.unwrap();
        assert_eq!(missing_columns(&df, ["B", "A", "D"]), vec!["B", "D"]);
        assert!(has_column(&df, "C"));
    }

    #[test]
    fn test_column_strings_keeps_nulls() {
        let df = df! { "City" => &[Some("Austin"), None, Some("")] }.unwrap();
        let values = column_strings(&df, "City").unwrap();
        assert_eq!(
            values,
            vec![Some("Austin".to_string()), None, Some(String::new())]
        );
    }

    #[test]
    fn test_column_f64s_reads_integers_and_text() {
        let df = df! {
            "Amount" => &[Some(10i64), None],
            "Text" => &["2.5", "x"],
        }
        .unwrap();
        assert_eq!(column_f64s(&df, "Amount").unwrap(), vec![Some(10.0), None]);
        assert_eq!(column_f64s(&df, "Text").unwrap(), vec![Some(2.5), None]);
    }

    #[test]
    fn test_gather_column_preserves_dtype_and_fills_nulls() {
        let column = Series::new("Qty".into(), &[5i64, 7, 9]).into_column();
        let gathered = gather_column(&column, &[Some(2), None, Some(0)]).unwrap();
        assert_eq!(gathered.dtype(), &DataType::Int64);
        assert_eq!(gathered.get(0).unwrap(), AnyValue::Int64(9));
        assert_eq!(gathered.get(1).unwrap(), AnyValue::Null);
        assert_eq!(gathered.get(2).unwrap(), AnyValue::Int64(5));
    }

    #[test]
    fn test_gather_column_text() {
        let column = Series::new("Region".into(), &["East", "West"]).into_column();
        let gathered = gather_column(&column, &[Some(1), None]).unwrap();
        assert_eq!(gathered.get(0).unwrap(), AnyValue::String("West"));
        assert_eq!(gathered.get(1).unwrap(), AnyValue::Null);
    }
}
