//! Year and month collapsed into a first-of-month date.

use polars::prelude::{DataFrame, DataType, NamedFrom, Series};
use sales_common::column_i64s;
use sales_model::EtlConfig;

use crate::calendar::{days_since_epoch, parse_year_month};
use crate::error::{Result, TransformError, require_columns};
use crate::join::JOINED;

#[derive(Debug, Clone)]
pub struct DateKeySpec {
    pub year: String,
    pub month: String,
    pub date_key: String,
}

impl DateKeySpec {
    pub fn from_config(config: &EtlConfig) -> Self {
        let target = &config.columns.target;
        Self {
            year: target.year.clone(),
            month: target.month.clone(),
            date_key: target.date_key.clone(),
        }
    }
}

/// Replaces `year` and `month` with a `Date` column on the first day of that
/// month. The key text is the year followed by the unpadded month.
pub fn build_date_key(df: DataFrame, spec: &DateKeySpec) -> Result<DataFrame> {
    require_columns(&df, JOINED, [spec.year.as_str(), spec.month.as_str()])?;
    let years = column_i64s(&df, &spec.year)?;
    let months = column_i64s(&df, &spec.month)?;

    let mut days = Vec::with_capacity(years.len());
    for (row, (year, month)) in years.into_iter().zip(months).enumerate() {
        let text = match (year, month) {
            (Some(year), Some(month)) => format!("{year}{month}"),
            _ => String::new(),
        };
        let date = parse_year_month(&text).ok_or_else(|| TransformError::InvalidValue {
            column: spec.date_key.clone(),
            row,
            value: text.clone(),
        })?;
        days.push(days_since_epoch(date));
    }

    let mut df = df.drop(&spec.year)?.drop(&spec.month)?;
    let keys = Series::new(spec.date_key.as_str().into(), days).cast(&DataType::Date)?;
    df.with_column(keys)?;
    Ok(df)
}
