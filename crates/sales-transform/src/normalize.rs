//! Transaction normalization: column pruning, renaming, typing and the
//! year/month split of the transaction date.

use polars::prelude::{DataFrame, NamedFrom, Series};
use sales_common::{column_f64s, column_i64s, column_strings};
use sales_model::EtlConfig;

use crate::calendar::{parse_transaction_date, year_month};
use crate::error::{Result, TransformError, require_columns};

const TABLE: &str = "sales";

/// Column names used by [`normalize_transactions`].
#[derive(Debug, Clone)]
pub struct NormalizeSpec {
    pub dropped: Vec<String>,
    /// Source name and report name of each monetary measure.
    pub renamed: Vec<(String, String)>,
    pub date: String,
    /// Source name and report name of the customer key.
    pub customer_key: (String, String),
    pub discount: String,
    pub quantity: String,
    pub year: String,
    pub month: String,
}

impl NormalizeSpec {
    pub fn from_config(config: &EtlConfig) -> Self {
        let source = &config.columns.source;
        let target = &config.columns.target;
        Self {
            dropped: source.dropped.clone(),
            renamed: vec![
                (source.amount.clone(), target.revenue.clone()),
                (source.cost_amount.clone(), target.cost.clone()),
                (source.margin_amount.clone(), target.margin.clone()),
            ],
            date: source.date.clone(),
            customer_key: (source.customer_key.clone(), target.customer_key.clone()),
            discount: source.discount_amount.clone(),
            quantity: source.sale_quantity.clone(),
            year: target.year.clone(),
            month: target.month.clone(),
        }
    }
}

/// Drops unused columns, renames measures, coerces types and replaces the
/// transaction date with integer `year` and `month` columns.
///
/// Row count and order are unchanged. Monetary measures and the discount
/// become `Float64`, the quantity `Int64` and the customer key text.
pub fn normalize_transactions(df: DataFrame, spec: &NormalizeSpec) -> Result<DataFrame> {
    require_columns(&df, TABLE, spec.dropped.iter().map(String::as_str))?;
    require_columns(
        &df,
        TABLE,
        spec.renamed
            .iter()
            .map(|(source, _)| source.as_str())
            .chain([
                spec.date.as_str(),
                spec.customer_key.0.as_str(),
                spec.discount.as_str(),
                spec.quantity.as_str(),
            ]),
    )?;

    let mut df = df;
    for name in &spec.dropped {
        df = df.drop(name)?;
    }

    let (years, months) = split_dates(&df, &spec.date)?;
    df = df.drop(&spec.date)?;

    for (source, target) in spec.renamed.iter().chain([&spec.customer_key]) {
        if source != target {
            df.rename(source, target.as_str().into())?;
        }
    }

    let key = &spec.customer_key.1;
    let keys: Vec<Option<String>> = column_strings(&df, key)?
        .into_iter()
        .map(|value| value.map(|text| text.trim().to_string()))
        .collect();
    df.with_column(Series::new(key.as_str().into(), keys))?;

    for (_, name) in &spec.renamed {
        coerce_float(&mut df, name)?;
    }
    coerce_float(&mut df, &spec.discount)?;
    let quantities = column_i64s(&df, &spec.quantity)?;
    df.with_column(Series::new(spec.quantity.as_str().into(), quantities))?;

    df.with_column(Series::new(spec.year.as_str().into(), years))?;
    df.with_column(Series::new(spec.month.as_str().into(), months))?;

    tracing::debug!(rows = df.height(), columns = df.width(), "transactions normalized");
    Ok(df)
}

fn coerce_float(df: &mut DataFrame, name: &str) -> Result<()> {
    let values = column_f64s(df, name)?;
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Parses every transaction date. A null or unparseable date aborts the run.
fn split_dates(df: &DataFrame, column_name: &str) -> Result<(Vec<i32>, Vec<i32>)> {
    let column = df.column(column_name)?;
    let mut years = Vec::with_capacity(column.len());
    let mut months = Vec::with_capacity(column.len());
    for idx in 0..column.len() {
        let value = column.get(idx)?;
        let rendered = value.to_string();
        let Some(date) = parse_transaction_date(value) else {
            return Err(TransformError::InvalidValue {
                column: column_name.to_string(),
                row: idx,
                value: rendered,
            });
        };
        let (year, month) = year_month(date);
        years.push(year);
        months.push(month as i32);
    }
    Ok((years, months))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::{DataType, df};

    fn spec() -> NormalizeSpec {
        NormalizeSpec {
            dropped: vec!["U/M".to_string()],
            renamed: vec![
                ("Sales Amount".to_string(), "Revenue".to_string()),
                ("Sales Cost Amount".to_string(), "COGS".to_string()),
                ("Sales Margin Amount".to_string(), "Profit Amount".to_string()),
            ],
            date: "DateKey".to_string(),
            customer_key: ("CustKey".to_string(), "CustKey".to_string()),
            discount: "Discount Amount".to_string(),
            quantity: "Sales Quantity".to_string(),
            year: "year".to_string(),
            month: "month".to_string(),
        }
    }

    fn test_df() -> DataFrame {
        df! {
            "CustKey" => &[10015i64, 10016],
            "DateKey" => &["2017-05-09", "2019-12-31"],
            "U/M" => &["EA", "EA"],
            "Sales Amount" => &[100i64, 250],
            "Sales Cost Amount" => &[60.5f64, 100.0],
            "Sales Margin Amount" => &[39.5f64, 150.0],
            "Discount Amount" => &[Some(1.5f64), None],
            "Sales Quantity" => &[2i64, 5],
            "Item" => &["Widget", "Gadget"],
        }
        .unwrap()
    }

    #[test]
    fn test_normalize_renames_and_splits_date() {
        let df = normalize_transactions(test_df(), &spec()).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "CustKey",
                "Revenue",
                "COGS",
                "Profit Amount",
                "Discount Amount",
                "Sales Quantity",
                "Item",
                "year",
                "month",
            ]
        );
        assert_eq!(df.column("year").unwrap().dtype(), &DataType::Int32);
        assert_eq!(column_i64s(&df, "month").unwrap(), vec![Some(5), Some(12)]);
        assert_eq!(df.column("Revenue").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("CustKey").unwrap().dtype(), &DataType::String);
        assert_eq!(
            column_strings(&df, "CustKey").unwrap(),
            vec![Some("10015".to_string()), Some("10016".to_string())]
        );
        assert_eq!(column_f64s(&df, "Discount Amount").unwrap()[1], None);
    }

    #[test]
    fn test_missing_dropped_column_is_schema_error() {
        let df = test_df().drop("U/M").unwrap();
        let error = normalize_transactions(df, &spec()).unwrap_err();
        assert!(matches!(error, TransformError::Schema { column, .. } if column == "U/M"));
    }

    #[test]
    fn test_unparseable_date_reports_row() {
        let mut df = test_df();
        df.with_column(Series::new("DateKey".into(), &["2017-05-09", "later"]))
            .unwrap();
        let error = normalize_transactions(df, &spec()).unwrap_err();
        assert!(matches!(
            error,
            TransformError::InvalidValue { row: 1, ref column, .. } if column == "DateKey"
        ));
    }
}
