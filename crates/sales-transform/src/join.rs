//! Dimension joins and the derived fields computed on the joined frame.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use polars::prelude::{DataFrame, DataType, NamedFrom, PlSmallStr, Series};
use sales_common::{column_f64s, column_strings, gather_column, has_column};
use sales_model::EtlConfig;

use crate::error::{Result, require_columns};

/// Table label used in errors raised after the joins.
pub const JOINED: &str = "joined";

/// Suffix given to a right-hand column whose name is already taken.
pub const COLLISION_SUFFIX: &str = "_right";

/// Text cell the extracts use for "no value". Empty strings are kept.
pub const BLANK_SENTINEL: &str = " ";

#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub customer_key: String,
    /// Key column of the customer table, renamed to `customer_key`.
    pub customer_number: String,
    pub address_number: String,
    pub region_code: String,
    pub division: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub address: String,
    pub revenue: String,
    pub margin: String,
    pub margin_percent: String,
    pub dropped_after_join: Vec<String>,
}

impl JoinSpec {
    pub fn from_config(config: &EtlConfig) -> Self {
        let source = &config.columns.source;
        let target = &config.columns.target;
        Self {
            customer_key: target.customer_key.clone(),
            customer_number: source.customer_number.clone(),
            address_number: source.address_number.clone(),
            region_code: source.region_code.clone(),
            division: source.division.clone(),
            city: source.city.clone(),
            state: source.state.clone(),
            country: source.country.clone(),
            address: target.address.clone(),
            revenue: target.revenue.clone(),
            margin: target.margin.clone(),
            margin_percent: target.margin_percent.clone(),
            dropped_after_join: source.dropped_after_join.clone(),
        }
    }
}

/// The four dimension tables joined onto the transactions.
#[derive(Debug, Clone, Copy)]
pub struct Dimensions<'a> {
    pub customers: &'a DataFrame,
    pub customer_addresses: &'a DataFrame,
    pub regions: &'a DataFrame,
    pub divisions: &'a DataFrame,
}

/// Left join on a single key compared as trimmed text.
///
/// Every left row survives exactly once and keeps its position. When the
/// right table repeats a key its first row is used. Right columns whose
/// names already exist on the left get [`COLLISION_SUFFIX`].
pub fn left_join(
    left: &DataFrame,
    right: &DataFrame,
    key: &str,
    tables: (&str, &str),
) -> Result<DataFrame> {
    require_columns(left, tables.0, [key])?;
    require_columns(right, tables.1, [key])?;

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut duplicates = 0usize;
    for (row, value) in column_strings(right, key)?.into_iter().enumerate() {
        let Some(value) = value else { continue };
        match index.entry(value.trim().to_string()) {
            Entry::Occupied(_) => duplicates += 1,
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
        }
    }
    if duplicates > 0 {
        tracing::warn!(
            table = tables.1,
            key,
            duplicates,
            "duplicate join keys, first row used"
        );
    }

    let picks: Vec<Option<usize>> = column_strings(left, key)?
        .iter()
        .map(|value| {
            value
                .as_deref()
                .and_then(|value| index.get(value.trim()).copied())
        })
        .collect();
    let unmatched = picks.iter().filter(|pick| pick.is_none()).count();

    let mut joined = left.clone();
    for column in right.get_columns() {
        if column.name().as_str() == key {
            continue;
        }
        let mut series = gather_column(column, &picks)?;
        if has_column(&joined, column.name()) {
            let renamed = format!("{}{COLLISION_SUFFIX}", column.name());
            series.rename(PlSmallStr::from(renamed));
        }
        joined.with_column(series)?;
    }

    tracing::debug!(
        left = tables.0,
        right = tables.1,
        key,
        rows = joined.height(),
        unmatched,
        "left join"
    );
    Ok(joined)
}

/// Customers with their address and region attributes, keyed by the report
/// customer key.
pub fn build_customer_dimension(dimensions: &Dimensions<'_>, spec: &JoinSpec) -> Result<DataFrame> {
    let with_address = left_join(
        dimensions.customers,
        dimensions.customer_addresses,
        &spec.address_number,
        ("customer", "customer address"),
    )?;
    let mut customers = left_join(
        &with_address,
        dimensions.regions,
        &spec.region_code,
        ("customer", "region"),
    )?;
    if spec.customer_number != spec.customer_key
        && has_column(&customers, &spec.customer_number)
        && !has_column(&customers, &spec.customer_key)
    {
        customers.rename(&spec.customer_number, spec.customer_key.as_str().into())?;
    }
    Ok(customers)
}

/// Joins customers (with address and region) and divisions onto the
/// transactions.
pub fn join_dimensions(
    transactions: &DataFrame,
    dimensions: &Dimensions<'_>,
    spec: &JoinSpec,
) -> Result<DataFrame> {
    let customers = build_customer_dimension(dimensions, spec)?;
    let joined = left_join(
        transactions,
        &customers,
        &spec.customer_key,
        ("sales", "customer"),
    )?;
    left_join(
        &joined,
        dimensions.divisions,
        &spec.division,
        ("sales", "division"),
    )
}

/// Turns cells equal to [`BLANK_SENTINEL`] into nulls in every text column.
pub fn blank_to_null(mut df: DataFrame) -> Result<DataFrame> {
    let text_columns: Vec<PlSmallStr> = df
        .get_columns()
        .iter()
        .filter(|column| column.dtype() == &DataType::String)
        .map(|column| column.name().clone())
        .collect();
    for name in text_columns {
        let values: Vec<Option<String>> = column_strings(&df, &name)?
            .into_iter()
            .map(|value| value.filter(|text| text != BLANK_SENTINEL))
            .collect();
        df.with_column(Series::new(name, values))?;
    }
    Ok(df)
}

/// Adds `City,State,Country`; null when any component is null. Empty
/// components still leave their comma.
pub fn add_address(mut df: DataFrame, spec: &JoinSpec) -> Result<DataFrame> {
    require_columns(
        &df,
        JOINED,
        [spec.city.as_str(), spec.state.as_str(), spec.country.as_str()],
    )?;
    let cities = column_strings(&df, &spec.city)?;
    let states = column_strings(&df, &spec.state)?;
    let countries = column_strings(&df, &spec.country)?;
    let addresses: Vec<Option<String>> = cities
        .into_iter()
        .zip(states)
        .zip(countries)
        .map(|((city, state), country)| Some(format!("{},{},{}", city?, state?, country?)))
        .collect();
    df.with_column(Series::new(spec.address.as_str().into(), addresses))?;
    Ok(df)
}

/// Adds margin / revenue * 100; null when revenue is zero or either is null.
pub fn add_margin_percent(mut df: DataFrame, spec: &JoinSpec) -> Result<DataFrame> {
    require_columns(&df, JOINED, [spec.margin.as_str(), spec.revenue.as_str()])?;
    let margins = column_f64s(&df, &spec.margin)?;
    let revenues = column_f64s(&df, &spec.revenue)?;
    let percents: Vec<Option<f64>> = margins
        .into_iter()
        .zip(revenues)
        .map(|(margin, revenue)| match (margin, revenue) {
            (Some(margin), Some(revenue)) if revenue != 0.0 => Some(margin / revenue * 100.0),
            _ => None,
        })
        .collect();
    df.with_column(Series::new(spec.margin_percent.as_str().into(), percents))?;
    Ok(df)
}

/// Removes columns that must all be present.
pub fn drop_columns(mut df: DataFrame, names: &[String], table: &str) -> Result<DataFrame> {
    require_columns(&df, table, names.iter().map(String::as_str))?;
    for name in names {
        df = df.drop(name)?;
    }
    Ok(df)
}

/// Joins, cleans blanks, derives address and margin percentage, then drops
/// the columns the report does not carry.
pub fn reconcile(
    transactions: &DataFrame,
    dimensions: &Dimensions<'_>,
    spec: &JoinSpec,
) -> Result<DataFrame> {
    let joined = join_dimensions(transactions, dimensions, spec)?;
    debug_assert_eq!(joined.height(), transactions.height());
    let df = blank_to_null(joined)?;
    let df = add_address(df, spec)?;
    let df = add_margin_percent(df, spec)?;
    drop_columns(df, &spec.dropped_after_join, JOINED)
}
