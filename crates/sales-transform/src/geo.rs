//! Coordinates looked up from the composite address.

use std::collections::HashMap;

use polars::prelude::{DataFrame, NamedFrom, Series};
use sales_common::{column_f64s, column_strings};
use sales_model::EtlConfig;

use crate::error::{Result, require_columns};
use crate::join::JOINED;

const TABLE: &str = "geocode";

#[derive(Debug, Clone)]
pub struct GeoSpec {
    /// Composite address column of the report frame. Removed after lookup.
    pub address: String,
    pub geocode_address: String,
    pub geocode_latitude: String,
    pub geocode_longitude: String,
    pub latitude: String,
    pub longitude: String,
}

impl GeoSpec {
    pub fn from_config(config: &EtlConfig) -> Self {
        let source = &config.columns.source;
        let target = &config.columns.target;
        Self {
            address: target.address.clone(),
            geocode_address: source.geocode_address.clone(),
            geocode_latitude: source.latitude.clone(),
            geocode_longitude: source.longitude.clone(),
            latitude: target.latitude.clone(),
            longitude: target.longitude.clone(),
        }
    }
}

type Coordinates = (Option<f64>, Option<f64>);

/// Adds latitude and longitude by exact address match, then drops the
/// address column. Unknown and null addresses get null coordinates; the
/// first geocode row wins for a repeated address.
pub fn attach_coordinates(df: DataFrame, geocodes: &DataFrame, spec: &GeoSpec) -> Result<DataFrame> {
    require_columns(&df, JOINED, [spec.address.as_str()])?;
    require_columns(
        geocodes,
        TABLE,
        [
            spec.geocode_address.as_str(),
            spec.geocode_latitude.as_str(),
            spec.geocode_longitude.as_str(),
        ],
    )?;

    let lookup = coordinate_lookup(geocodes, spec)?;
    let addresses = column_strings(&df, &spec.address)?;
    let mut latitudes = Vec::with_capacity(addresses.len());
    let mut longitudes = Vec::with_capacity(addresses.len());
    let mut unmatched = 0usize;
    for address in &addresses {
        let (latitude, longitude) = match address.as_deref().and_then(|key| lookup.get(key)) {
            Some(found) => *found,
            None => {
                unmatched += 1;
                (None, None)
            }
        };
        latitudes.push(latitude);
        longitudes.push(longitude);
    }
    if unmatched > 0 {
        tracing::info!(unmatched, "addresses without coordinates");
    }

    let mut df = df;
    df.with_column(Series::new(spec.latitude.as_str().into(), latitudes))?;
    df.with_column(Series::new(spec.longitude.as_str().into(), longitudes))?;
    Ok(df.drop(&spec.address)?)
}

fn coordinate_lookup(geocodes: &DataFrame, spec: &GeoSpec) -> Result<HashMap<String, Coordinates>> {
    let addresses = column_strings(geocodes, &spec.geocode_address)?;
    let latitudes = column_f64s(geocodes, &spec.geocode_latitude)?;
    let longitudes = column_f64s(geocodes, &spec.geocode_longitude)?;
    let mut lookup = HashMap::with_capacity(addresses.len());
    for ((address, latitude), longitude) in addresses.into_iter().zip(latitudes).zip(longitudes) {
        if let Some(address) = address {
            lookup.entry(address).or_insert((latitude, longitude));
        }
    }
    Ok(lookup)
}
