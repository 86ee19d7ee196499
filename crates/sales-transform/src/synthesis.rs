//! Gap-year reconstruction.
//!
//! The gap year's source data is incomplete, so one row per month of the
//! comparison window is synthesized from the mean of the two reference
//! years' monthly totals. Genuine gap-year rows are kept alongside.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use polars::prelude::{
    BooleanChunked, DataFrame, IntoColumn, NamedFrom, NewChunkedArray, PolarsResult, Series,
};
use sales_common::{column_f64s, column_i64s, column_strings};
use sales_model::EtlConfig;

use crate::calendar::{month_end, year_month};
use crate::error::{Result, TransformError, require_columns};

const TABLE: &str = "sales";
const MEASURES: usize = 5;

/// Monthly measure totals keyed by month number, in [`SynthesisSpec::measures`] order.
pub type MonthlyTotals = BTreeMap<u32, [f64; MEASURES]>;

#[derive(Debug, Clone)]
pub struct SynthesisSpec {
    pub gap_year: i32,
    pub reference_years: [i32; 2],
    pub months: RangeInclusive<u32>,
    pub customer_key: String,
    pub revenue: String,
    pub cost: String,
    pub margin: String,
    pub discount: String,
    /// Averaged like the other measures, then truncated to an integer.
    pub quantity: String,
    pub year: String,
    pub month: String,
}

impl SynthesisSpec {
    pub fn from_config(config: &EtlConfig) -> Result<Self> {
        let synthesis = &config.synthesis;
        let reference_years = match synthesis.reference_years.as_slice() {
            [first, second] => [*first, *second],
            other => {
                return Err(TransformError::InsufficientReferenceData {
                    year: synthesis.gap_year,
                    reason: format!("expected two reference years, got {other:?}"),
                });
            }
        };
        let source = &config.columns.source;
        let target = &config.columns.target;
        Ok(Self {
            gap_year: synthesis.gap_year,
            reference_years,
            months: synthesis.months(),
            customer_key: target.customer_key.clone(),
            revenue: target.revenue.clone(),
            cost: target.cost.clone(),
            margin: target.margin.clone(),
            discount: source.discount_amount.clone(),
            quantity: source.sale_quantity.clone(),
            year: target.year.clone(),
            month: target.month.clone(),
        })
    }

    pub fn measures(&self) -> [&str; MEASURES] {
        [
            &self.revenue,
            &self.cost,
            &self.margin,
            &self.discount,
            &self.quantity,
        ]
    }
}

/// Transactions partitioned by whether they fall in the gap year.
#[derive(Debug, Clone)]
pub struct GapYearSplit {
    /// Every row outside the gap year, in input order.
    pub baseline: DataFrame,
    /// Genuine gap-year rows, in input order.
    pub genuine: DataFrame,
}

pub fn split_gap_year(df: &DataFrame, spec: &SynthesisSpec) -> Result<GapYearSplit> {
    require_columns(df, TABLE, [spec.year.as_str()])?;
    let gap_year = i64::from(spec.gap_year);
    let in_gap: Vec<bool> = column_i64s(df, &spec.year)?
        .into_iter()
        .map(|year| year == Some(gap_year))
        .collect();
    let outside: Vec<bool> = in_gap.iter().map(|flag| !flag).collect();
    let genuine = df.filter(&BooleanChunked::from_slice("gap_year".into(), &in_gap))?;
    let baseline = df.filter(&BooleanChunked::from_slice("baseline".into(), &outside))?;
    Ok(GapYearSplit { baseline, genuine })
}

/// Customer with the highest total revenue among genuine gap-year rows.
///
/// Ties go to the lexicographically smallest key.
pub fn best_customer_key(genuine: &DataFrame, spec: &SynthesisSpec) -> Result<String> {
    require_columns(
        genuine,
        TABLE,
        [spec.customer_key.as_str(), spec.revenue.as_str()],
    )?;
    let keys = column_strings(genuine, &spec.customer_key)?;
    let revenues = column_f64s(genuine, &spec.revenue)?;

    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for (key, revenue) in keys.into_iter().zip(revenues) {
        if let Some(key) = key.filter(|key| !key.trim().is_empty()) {
            *totals.entry(key).or_insert(0.0) += revenue.unwrap_or(0.0);
        }
    }

    let mut best: Option<(&String, f64)> = None;
    for (key, total) in &totals {
        if best.is_none_or(|(_, top)| *total > top) {
            best = Some((key, *total));
        }
    }
    best.map(|(key, _)| key.clone())
        .ok_or(TransformError::UndefinedBackfillCustomer {
            year: spec.gap_year,
        })
}

/// Sums each measure per month over the rows of `year` inside the window.
/// Missing measures count as zero.
pub fn monthly_totals(df: &DataFrame, year: i32, spec: &SynthesisSpec) -> Result<MonthlyTotals> {
    let years = column_i64s(df, &spec.year)?;
    let months = column_i64s(df, &spec.month)?;
    let measures = spec
        .measures()
        .iter()
        .map(|name| column_f64s(df, name))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut totals = MonthlyTotals::new();
    for row in 0..df.height() {
        if years[row] != Some(i64::from(year)) {
            continue;
        }
        let Some(month) = months[row].and_then(|month| u32::try_from(month).ok()) else {
            continue;
        };
        if !spec.months.contains(&month) {
            continue;
        }
        let sums = totals.entry(month).or_insert([0.0; MEASURES]);
        for (sum, values) in sums.iter_mut().zip(&measures) {
            *sum += values[row].unwrap_or(0.0);
        }
    }

    if totals.is_empty() {
        return Err(TransformError::InsufficientReferenceData {
            year,
            reason: format!(
                "no rows in months {}..={}",
                spec.months.start(),
                spec.months.end()
            ),
        });
    }
    Ok(totals)
}

/// Mean of the two reference years' totals for every month of the window.
///
/// A month only one reference year has takes that year's totals.
pub fn average_reference_months(
    first: &MonthlyTotals,
    second: &MonthlyTotals,
    spec: &SynthesisSpec,
) -> Result<MonthlyTotals> {
    let mut averaged = MonthlyTotals::new();
    for month in spec.months.clone() {
        let available: Vec<&[f64; MEASURES]> =
            [first.get(&month), second.get(&month)].into_iter().flatten().collect();
        if available.is_empty() {
            return Err(TransformError::InsufficientReferenceData {
                year: spec.gap_year,
                reason: format!(
                    "month {month} has no rows in {} or {}",
                    spec.reference_years[0], spec.reference_years[1]
                ),
            });
        }
        let mut mean = [0.0; MEASURES];
        for (idx, slot) in mean.iter_mut().enumerate() {
            let total: f64 = available.iter().map(|sums| sums[idx]).sum();
            *slot = total / available.len() as f64;
        }
        averaged.insert(month, mean);
    }
    Ok(averaged)
}

/// Rebuilds the gap year and returns the full transaction set.
///
/// Output order is the non-gap rows, then genuine gap-year rows, then one
/// synthesized row per window month. Every gap-year row without a customer
/// key, synthesized or genuine, gets `backfill_key`.
pub fn synthesize_gap_year(
    split: &GapYearSplit,
    spec: &SynthesisSpec,
    backfill_key: &str,
) -> Result<DataFrame> {
    require_columns(
        &split.baseline,
        TABLE,
        spec.measures().into_iter().chain([
            spec.customer_key.as_str(),
            spec.year.as_str(),
            spec.month.as_str(),
        ]),
    )?;

    let first = monthly_totals(&split.baseline, spec.reference_years[0], spec)?;
    let second = monthly_totals(&split.baseline, spec.reference_years[1], spec)?;
    let averaged = average_reference_months(&first, &second, spec)?;

    let synthetic = synthetic_rows(&split.baseline, &averaged, spec, backfill_key)?;
    let mut gap_rows = split.genuine.vstack(&synthetic)?;
    backfill_customer_key(&mut gap_rows, &spec.customer_key, backfill_key)?;

    tracing::debug!(
        gap_year = spec.gap_year,
        genuine = split.genuine.height(),
        synthesized = synthetic.height(),
        "gap year rebuilt"
    );
    Ok(split.baseline.vstack(&gap_rows)?)
}

/// One row per averaged month shaped like `template`. Columns that carry no
/// measure, key or period are null.
fn synthetic_rows(
    template: &DataFrame,
    averaged: &MonthlyTotals,
    spec: &SynthesisSpec,
    backfill_key: &str,
) -> Result<DataFrame> {
    let height = averaged.len();
    let mut periods = Vec::with_capacity(height);
    for month in averaged.keys() {
        // Stamped with the month's last day, then reduced to year and month.
        let date = month_end(spec.gap_year, *month).ok_or_else(|| {
            TransformError::InsufficientReferenceData {
                year: spec.gap_year,
                reason: format!("month {month} is not a calendar month"),
            }
        })?;
        periods.push(year_month(date));
    }

    let measures = spec.measures();
    let mut columns = Vec::with_capacity(template.width());
    for column in template.get_columns() {
        let name = column.name().clone();
        let series = if let Some(position) = measures.iter().position(|m| *m == name.as_str()) {
            let values: Vec<f64> = averaged.values().map(|sums| sums[position]).collect();
            if name.as_str() == spec.quantity {
                let truncated: Vec<i64> = values.iter().map(|value| value.trunc() as i64).collect();
                Series::new(name, truncated)
            } else {
                Series::new(name, values)
            }
        } else if name.as_str() == spec.customer_key {
            Series::new(name, vec![backfill_key; height])
        } else if name.as_str() == spec.year {
            let years: Vec<i32> = periods.iter().map(|(year, _)| *year).collect();
            Series::new(name, years)
        } else if name.as_str() == spec.month {
            let months: Vec<i32> = periods.iter().map(|(_, month)| *month as i32).collect();
            Series::new(name, months)
        } else {
            Series::full_null(name, height, column.dtype())
        };
        columns.push(series.cast(column.dtype())?.into_column());
    }
    Ok(DataFrame::new(columns)?)
}

fn backfill_customer_key(df: &mut DataFrame, column: &str, key: &str) -> Result<()> {
    let keys: Vec<String> = column_strings(df, column)?
        .into_iter()
        .map(|value| value.unwrap_or_else(|| key.to_string()))
        .collect();
    df.with_column(Series::new(column.into(), keys))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;

    fn spec() -> SynthesisSpec {
        SynthesisSpec {
            gap_year: 2018,
            reference_years: [2017, 2019],
            months: 4..=12,
            customer_key: "CustKey".to_string(),
            revenue: "Revenue".to_string(),
            cost: "COGS".to_string(),
            margin: "Profit Amount".to_string(),
            discount: "Discount Amount".to_string(),
            quantity: "Sales Quantity".to_string(),
            year: "year".to_string(),
            month: "month".to_string(),
        }
    }

    fn narrow_spec() -> SynthesisSpec {
        SynthesisSpec {
            months: 6..=6,
            ..spec()
        }
    }

    fn test_df() -> DataFrame {
        df! {
            "CustKey" => &[Some("A"), Some("B"), Some("C"), None, Some("C")],
            "Revenue" => &[60.0f64, 40.0, 200.0, 75.0, 25.0],
            "COGS" => &[30.0f64, 20.0, 100.0, 10.0, 5.0],
            "Profit Amount" => &[30.0f64, 20.0, 100.0, 65.0, 20.0],
            "Discount Amount" => &[Some(1.0f64), None, Some(3.0), None, None],
            "Sales Quantity" => &[2i64, 1, 4, 1, 1],
            "Item" => &["x", "y", "z", "w", "v"],
            "year" => &[2017i32, 2017, 2019, 2018, 2018],
            "month" => &[6i32, 6, 6, 6, 7],
        }
        .unwrap()
    }

    #[test]
    fn test_split_preserves_order() {
        let split = split_gap_year(&test_df(), &spec()).unwrap();
        assert_eq!(split.baseline.height(), 3);
        assert_eq!(split.genuine.height(), 2);
        assert_eq!(
            column_strings(&split.genuine, "Item").unwrap(),
            vec![Some("w".to_string()), Some("v".to_string())]
        );
    }

    #[test]
    fn test_monthly_mean_of_reference_years() {
        let split = split_gap_year(&test_df(), &spec()).unwrap();
        let out = synthesize_gap_year(&split, &narrow_spec(), "C").unwrap();
        assert_eq!(out.height(), 6);
        let revenue = column_f64s(&out, "Revenue").unwrap();
        assert_eq!(revenue[5], Some(150.0));
        let quantity = column_i64s(&out, "Sales Quantity").unwrap();
        // (3 + 4) / 2 truncated
        assert_eq!(quantity[5], Some(3));
        let discount = column_f64s(&out, "Discount Amount").unwrap();
        assert_eq!(discount[5], Some(2.0));
        assert_eq!(column_i64s(&out, "year").unwrap()[5], Some(2018));
        assert_eq!(column_i64s(&out, "month").unwrap()[5], Some(6));
        assert_eq!(column_strings(&out, "Item").unwrap()[5], None);
    }

    #[test]
    fn test_backfill_covers_synthetic_and_genuine_gaps() {
        let split = split_gap_year(&test_df(), &spec()).unwrap();
        let out = synthesize_gap_year(&split, &narrow_spec(), "C").unwrap();
        let keys = column_strings(&out, "CustKey").unwrap();
        assert_eq!(keys[3], Some("C".to_string()));
        assert_eq!(keys[5], Some("C".to_string()));
        assert!(keys.iter().all(Option::is_some));
    }

    #[test]
    fn test_month_with_single_reference_year() {
        let df = df! {
            "CustKey" => &["A", "B"],
            "Revenue" => &[100.0f64, 80.0],
            "COGS" => &[1.0f64, 1.0],
            "Profit Amount" => &[1.0f64, 1.0],
            "Discount Amount" => &[0.0f64, 0.0],
            "Sales Quantity" => &[1i64, 1],
            "year" => &[2017i32, 2019],
            "month" => &[4i32, 5],
        }
        .unwrap();
        let spec = SynthesisSpec {
            months: 4..=5,
            ..spec()
        };
        let split = split_gap_year(&df, &spec).unwrap();
        let out = synthesize_gap_year(&split, &spec, "A").unwrap();
        let revenue = column_f64s(&out, "Revenue").unwrap();
        assert_eq!(&revenue[2..], &[Some(100.0), Some(80.0)]);
    }

    #[test]
    fn test_missing_reference_year_is_error() {
        let df = test_df()
            .filter(&BooleanChunked::from_slice(
                "keep".into(),
                &[true, true, false, true, true],
            ))
            .unwrap();
        let split = split_gap_year(&df, &spec()).unwrap();
        let error = synthesize_gap_year(&split, &spec(), "A").unwrap_err();
        assert!(matches!(
            error,
            TransformError::InsufficientReferenceData { year: 2019, .. }
        ));
    }

    #[test]
    fn test_month_in_neither_reference_year_is_error() {
        let split = split_gap_year(&test_df(), &spec()).unwrap();
        let spec = SynthesisSpec {
            months: 6..=7,
            ..spec()
        };
        let error = synthesize_gap_year(&split, &spec, "A").unwrap_err();
        assert!(matches!(
            error,
            TransformError::InsufficientReferenceData { year: 2018, ref reason } if reason.contains("month 7")
        ));
    }

    #[test]
    fn test_best_customer_key() {
        let genuine = df! {
            "CustKey" => &[Some("B"), Some("A"), None, Some("B"), Some("A")],
            "Revenue" => &[Some(10.0f64), Some(15.0), Some(500.0), Some(5.0), None],
        }
        .unwrap();
        // A and B tie at 15; the smaller key wins.
        assert_eq!(best_customer_key(&genuine, &spec()).unwrap(), "A");
    }

    #[test]
    fn test_best_customer_key_without_rows() {
        let genuine = df! {
            "CustKey" => &[None::<&str>],
            "Revenue" => &[1.0f64],
        }
        .unwrap();
        assert!(matches!(
            best_customer_key(&genuine, &spec()),
            Err(TransformError::UndefinedBackfillCustomer { year: 2018 })
        ));
    }
}
