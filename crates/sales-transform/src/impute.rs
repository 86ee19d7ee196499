//! Stratified missing-value imputation.
//!
//! Rows are grouped by calendar year. Each imputer is fit on the rows of a
//! single stratum and fills only that stratum, writing back by row index so
//! the frame's row order never changes.

use std::collections::BTreeMap;

use polars::prelude::{DataFrame, NamedFrom, PolarsResult, Series};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sales_common::{column_f64s, column_i64s, column_strings};
use sales_model::EtlConfig;

use crate::error::{Result, TransformError, require_columns};
use crate::join::JOINED;

#[derive(Debug, Clone)]
pub struct ImputationSpec {
    pub year: String,
    /// Numeric column filled with its stratum median.
    pub median_column: String,
    /// Text columns filled with `placeholder`.
    pub categorical_columns: Vec<String>,
    pub placeholder: String,
    /// Columns filled with a value drawn from the stratum's observed values.
    pub sample_columns: Vec<String>,
    /// Numeric columns whose row sum seeds each draw.
    pub seed_columns: Vec<String>,
}

impl ImputationSpec {
    pub fn from_config(config: &EtlConfig) -> Self {
        let source = &config.columns.source;
        let target = &config.columns.target;
        Self {
            year: target.year.clone(),
            median_column: source.discount_amount.clone(),
            categorical_columns: vec![source.item_class.clone(), source.item.clone()],
            placeholder: config.imputation.placeholder.clone(),
            sample_columns: vec![
                source.city.clone(),
                source.state.clone(),
                target.address.clone(),
            ],
            seed_columns: vec![
                target.revenue.clone(),
                target.cost.clone(),
                target.margin_percent.clone(),
                source.sale_quantity.clone(),
                source.discount_amount.clone(),
            ],
        }
    }
}

/// Row indices sharing one calendar year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stratum {
    pub year: i32,
    pub rows: Vec<usize>,
}

/// Groups rows by year, ascending. A row without a year is an error.
pub fn strata(df: &DataFrame, year_column: &str) -> Result<Vec<Stratum>> {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (row, year) in column_i64s(df, year_column)?.into_iter().enumerate() {
        let year = year.and_then(|year| i32::try_from(year).ok()).ok_or_else(|| {
            TransformError::InvalidValue {
                column: year_column.to_string(),
                row,
                value: year.map(|year| year.to_string()).unwrap_or_default(),
            }
        })?;
        groups.entry(year).or_default().push(row);
    }
    Ok(groups
        .into_iter()
        .map(|(year, rows)| Stratum { year, rows })
        .collect())
}

/// Median of the stratum's present values; the mean of the middle pair for
/// an even count.
pub fn fit_median(values: &[Option<f64>], stratum: &Stratum) -> Option<f64> {
    let mut present: Vec<f64> = stratum.rows.iter().filter_map(|row| values[*row]).collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);
    let mid = present.len() / 2;
    if present.len() % 2 == 0 {
        Some((present[mid - 1] + present[mid]) / 2.0)
    } else {
        Some(present[mid])
    }
}

/// Observed values of one column within one stratum, in row order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplePool {
    values: Vec<String>,
}

impl SamplePool {
    pub fn fit(values: &[Option<String>], stratum: &Stratum) -> Option<Self> {
        let values: Vec<String> = stratum
            .rows
            .iter()
            .filter_map(|row| values[*row].clone())
            .collect();
        (!values.is_empty()).then_some(Self { values })
    }

    /// Same seed, same value. The index is the first ChaCha8 word modulo
    /// the pool size.
    pub fn draw(&self, seed: u64) -> &str {
        &self.values[Self::index(seed, self.values.len())]
    }

    fn index(seed: u64, len: usize) -> usize {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (rng.next_u64() % len as u64) as usize
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Seed for a row: the truncated sum of its seed columns, missing values
/// counting as zero. Non-finite or negative sums clamp into `u64`.
pub fn row_seed(values: impl IntoIterator<Item = Option<f64>>) -> u64 {
    let sum: f64 = values.into_iter().flatten().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return 0;
    }
    sum.trunc() as u64
}

/// Runs the median, categorical and random-sample imputers over every stratum.
pub fn impute_by_year(df: DataFrame, spec: &ImputationSpec) -> Result<DataFrame> {
    require_columns(
        &df,
        JOINED,
        [spec.year.as_str(), spec.median_column.as_str()]
            .into_iter()
            .chain(spec.categorical_columns.iter().map(String::as_str))
            .chain(spec.sample_columns.iter().map(String::as_str))
            .chain(spec.seed_columns.iter().map(String::as_str)),
    )?;
    let strata = strata(&df, &spec.year)?;
    let mut df = df;

    impute_median(&mut df, &strata, &spec.median_column)?;
    for column in &spec.categorical_columns {
        impute_placeholder(&mut df, &strata, column, &spec.placeholder)?;
    }

    // Seeds read the frame after median imputation.
    let seed_values = spec
        .seed_columns
        .iter()
        .map(|name| column_f64s(&df, name))
        .collect::<PolarsResult<Vec<_>>>()?;
    let seeds: Vec<u64> = (0..df.height())
        .map(|row| row_seed(seed_values.iter().map(|values| values[row])))
        .collect();
    for column in &spec.sample_columns {
        impute_random_sample(&mut df, &strata, column, &seeds)?;
    }

    Ok(df)
}

fn impute_median(df: &mut DataFrame, strata: &[Stratum], column: &str) -> Result<()> {
    let mut values = column_f64s(df, column)?;
    for stratum in strata {
        let median = fit_median(&values, stratum).ok_or_else(|| TransformError::Imputation {
            column: column.to_string(),
            year: stratum.year,
            reason: "no non-missing values to take a median of".to_string(),
        })?;
        let mut filled = 0usize;
        for row in &stratum.rows {
            if values[*row].is_none() {
                values[*row] = Some(median);
                filled += 1;
            }
        }
        tracing::debug!(column, year = stratum.year, median, filled, "median imputation");
    }
    df.with_column(Series::new(column.into(), values))?;
    Ok(())
}

fn impute_placeholder(
    df: &mut DataFrame,
    strata: &[Stratum],
    column: &str,
    placeholder: &str,
) -> Result<()> {
    let mut values = column_strings(df, column)?;
    for stratum in strata {
        for row in &stratum.rows {
            if values[*row].is_none() {
                values[*row] = Some(placeholder.to_string());
            }
        }
    }
    df.with_column(Series::new(column.into(), values))?;
    Ok(())
}

fn impute_random_sample(
    df: &mut DataFrame,
    strata: &[Stratum],
    column: &str,
    seeds: &[u64],
) -> Result<()> {
    let mut values = column_strings(df, column)?;
    for stratum in strata {
        let missing: Vec<usize> = stratum
            .rows
            .iter()
            .copied()
            .filter(|row| values[*row].is_none())
            .collect();
        if missing.is_empty() {
            continue;
        }
        let pool = SamplePool::fit(&values, stratum).ok_or_else(|| TransformError::Imputation {
            column: column.to_string(),
            year: stratum.year,
            reason: "no observed values to sample from".to_string(),
        })?;
        for row in &missing {
            values[*row] = Some(pool.draw(seeds[*row]).to_string());
        }
        tracing::debug!(
            column,
            year = stratum.year,
            pool = pool.len(),
            filled = missing.len(),
            "random sample imputation"
        );
    }
    df.with_column(Series::new(column.into(), values))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;
    use proptest::prelude::*;

    fn spec() -> ImputationSpec {
        ImputationSpec {
            year: "year".to_string(),
            median_column: "Discount Amount".to_string(),
            categorical_columns: vec!["Item".to_string()],
            placeholder: "Missing".to_string(),
            sample_columns: vec!["City".to_string()],
            seed_columns: vec!["Revenue".to_string(), "Discount Amount".to_string()],
        }
    }

    fn test_df() -> DataFrame {
        df! {
            "year" => &[2017i32, 2017, 2017, 2018, 2018, 2019],
            "Discount Amount" => &[Some(10.0f64), Some(30.0), None, Some(5.0), None, Some(1.0)],
            "Item" => &[Some("bolt"), None, Some("nut"), None, Some("gear"), Some("pin")],
            "City" => &[Some("Austin"), Some("Dallas"), None, None, Some("Reno"), Some("Tulsa")],
            "Revenue" => &[100.0f64, 200.0, 300.0, 400.0, 500.0, 600.0],
        }
        .unwrap()
    }

    #[test]
    fn test_strata_sorted_by_year() {
        let groups = strata(&test_df(), "year").unwrap();
        let years: Vec<i32> = groups.iter().map(|stratum| stratum.year).collect();
        assert_eq!(years, vec![2017, 2018, 2019]);
        assert_eq!(groups[0].rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_fit_median() {
        let values = vec![Some(10.0), Some(30.0), Some(20.0), None, Some(40.0)];
        let odd = Stratum { year: 2017, rows: vec![0, 1, 2, 3] };
        let even = Stratum { year: 2017, rows: vec![0, 1, 2, 4] };
        let empty = Stratum { year: 2017, rows: vec![3] };
        assert_eq!(fit_median(&values, &odd), Some(20.0));
        assert_eq!(fit_median(&values, &even), Some(25.0));
        assert_eq!(fit_median(&values, &empty), None);
    }

    #[test]
    fn test_impute_by_year_fills_within_stratum() {
        let df = impute_by_year(test_df(), &spec()).unwrap();
        let discounts = column_f64s(&df, "Discount Amount").unwrap();
        assert_eq!(discounts[2], Some(20.0));
        assert_eq!(discounts[4], Some(5.0));
        let items = column_strings(&df, "Item").unwrap();
        assert_eq!(items[1].as_deref(), Some("Missing"));
        assert_eq!(items[3].as_deref(), Some("Missing"));
        let cities = column_strings(&df, "City").unwrap();
        assert!(matches!(cities[2].as_deref(), Some("Austin" | "Dallas")));
        assert_eq!(cities[3].as_deref(), Some("Reno"));
        assert_eq!(cities[5].as_deref(), Some("Tulsa"));
    }

    #[test]
    fn test_impute_by_year_is_deterministic() {
        let first = impute_by_year(test_df(), &spec()).unwrap();
        let second = impute_by_year(test_df(), &spec()).unwrap();
        assert!(first.equals_missing(&second));
    }

    #[test]
    fn test_empty_median_stratum_is_error() {
        let df = df! {
            "year" => &[2017i32, 2019],
            "Discount Amount" => &[Some(1.0f64), None],
            "Item" => &["a", "b"],
            "City" => &["x", "y"],
            "Revenue" => &[1.0f64, 2.0],
        }
        .unwrap();
        let error = impute_by_year(df, &spec()).unwrap_err();
        assert!(matches!(
            error,
            TransformError::Imputation { year: 2019, ref column, .. } if column == "Discount Amount"
        ));
    }

    #[test]
    fn test_empty_sample_pool_is_error() {
        let df = df! {
            "year" => &[2018i32, 2018],
            "Discount Amount" => &[1.0f64, 2.0],
            "Item" => &["a", "b"],
            "City" => &[None::<&str>, None],
            "Revenue" => &[1.0f64, 2.0],
        }
        .unwrap();
        let error = impute_by_year(df, &spec()).unwrap_err();
        assert!(matches!(
            error,
            TransformError::Imputation { year: 2018, ref column, .. } if column == "City"
        ));
    }

    #[test]
    fn test_row_seed() {
        assert_eq!(row_seed([Some(100.5), None, Some(2.9)]), 103);
        assert_eq!(row_seed([None, None]), 0);
        assert_eq!(row_seed([Some(-5.0)]), 0);
        assert_eq!(row_seed([Some(f64::INFINITY)]), 0);
    }

    #[test]
    fn test_draw_index_is_pinned() {
        let picks: Vec<usize> = [0u64, 42, 103, 1234]
            .into_iter()
            .map(|seed| SamplePool::index(seed, 10))
            .collect();
        assert_eq!(picks, vec![2, 7, 2, 3]);
        let picks: Vec<usize> = [0u64, 42, 103, 1234]
            .into_iter()
            .map(|seed| SamplePool::index(seed, 7))
            .collect();
        assert_eq!(picks, vec![6, 5, 6, 5]);

        let values: Vec<Option<String>> = (0..10).map(|idx| Some(format!("v{idx}"))).collect();
        let stratum = Stratum { year: 2017, rows: (0..10).collect() };
        let pool = SamplePool::fit(&values, &stratum).unwrap();
        assert_eq!(pool.draw(42), "v7");
    }

    proptest! {
        #[test]
        fn median_ignores_row_order(mut values in prop::collection::vec(-1.0e6f64..1.0e6, 1..40)) {
            let stratum = Stratum { year: 2017, rows: (0..values.len()).collect() };
            let forward: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
            let expected = fit_median(&forward, &stratum);
            values.reverse();
            let reversed: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
            prop_assert_eq!(fit_median(&reversed, &stratum), expected);
        }

        #[test]
        fn draw_is_stable_and_from_pool(seed in any::<u64>(), size in 1usize..20) {
            let values: Vec<Option<String>> = (0..size).map(|idx| Some(format!("v{idx}"))).collect();
            let stratum = Stratum { year: 2017, rows: (0..size).collect() };
            let pool = SamplePool::fit(&values, &stratum).unwrap();
            let drawn = pool.draw(seed);
            prop_assert_eq!(drawn, pool.draw(seed));
            prop_assert!(values.iter().flatten().any(|value| value == drawn));
        }
    }
}
