//! Job configuration loaded from TOML.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Complete configuration of one report run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EtlConfig {
    pub store: StoreConfig,
    pub tables: SourceTables,
    pub columns: ColumnConfig,
    pub synthesis: SynthesisConfig,
    pub imputation: ImputationConfig,
    pub output: OutputConfig,
}

/// Where the local table store reads sources and writes the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("data/source"),
            target_dir: PathBuf::from("data/target"),
        }
    }
}

/// Identifiers of the six source tables in the table store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceTables {
    pub sales: String,
    pub customers: String,
    pub customer_addresses: String,
    pub divisions: String,
    pub regions: String,
    pub geocodes: String,
}

impl Default for SourceTables {
    fn default() -> Self {
        Self {
            sales: "SALESDATA.csv".to_string(),
            customers: "CUSTOMERS.csv".to_string(),
            customer_addresses: "CUSTOMERADDRESS.csv".to_string(),
            divisions: "DIVISION.csv".to_string(),
            regions: "REGION.csv".to_string(),
            geocodes: "GPS.csv".to_string(),
        }
    }
}

impl SourceTables {
    /// All identifiers in extraction order.
    pub fn identifiers(&self) -> [&str; 6] {
        [
            &self.sales,
            &self.customers,
            &self.customer_addresses,
            &self.divisions,
            &self.regions,
            &self.geocodes,
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColumnConfig {
    pub source: SourceColumns,
    pub target: TargetColumns,
}

/// Column names as they appear in the source extracts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceColumns {
    /// Transaction columns removed before any processing.
    pub dropped: Vec<String>,
    /// Columns removed once the dimension joins and derived fields are done.
    pub dropped_after_join: Vec<String>,
    pub date: String,
    pub customer_key: String,
    /// Customer key column of the customer table.
    pub customer_number: String,
    pub amount: String,
    pub cost_amount: String,
    pub margin_amount: String,
    pub discount_amount: String,
    pub sale_quantity: String,
    pub address_number: String,
    pub region_code: String,
    pub division: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub item_class: String,
    pub item: String,
    /// Address text column of the geocode table.
    pub geocode_address: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for SourceColumns {
    fn default() -> Self {
        Self {
            dropped: strings(&[
                "U/M",
                "Unnamed: 20",
                "Unnamed: 21",
                "Sales Price",
                "Order Number",
                "Line Number",
                "Invoice Number",
                "Item Number",
                "Invoice Date",
                "List Price",
                "Promised Delivery Date",
                "Sales Amount Based on List Price",
                "Sales Rep",
            ]),
            dropped_after_join: strings(&[
                "Customer Address 1",
                "Customer Address 2",
                "Customer Address 3",
                "Customer Address 4",
                "Zip Code",
                "Division",
                "Region Code",
                "Phone",
                "CustKey",
                "Country",
                "Search Type",
                "Profit Amount",
                "Business Unit",
                "Line of Business",
                "Business Family",
                "Address Number",
                "Customer",
                "Regional Sales Mgr",
            ]),
            date: "DateKey".to_string(),
            customer_key: "CustKey".to_string(),
            customer_number: "Customer Number".to_string(),
            amount: "Sales Amount".to_string(),
            cost_amount: "Sales Cost Amount".to_string(),
            margin_amount: "Sales Margin Amount".to_string(),
            discount_amount: "Discount Amount".to_string(),
            sale_quantity: "Sales Quantity".to_string(),
            address_number: "Address Number".to_string(),
            region_code: "Region Code".to_string(),
            division: "Division".to_string(),
            city: "City".to_string(),
            state: "State".to_string(),
            country: "Country".to_string(),
            item_class: "Item Class".to_string(),
            item: "Item".to_string(),
            geocode_address: "Address".to_string(),
            latitude: "latitude".to_string(),
            longitude: "longitude".to_string(),
        }
    }
}

/// Column names of the emitted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetColumns {
    pub customer_key: String,
    pub revenue: String,
    pub cost: String,
    pub margin: String,
    pub year: String,
    pub month: String,
    pub date_key: String,
    pub address: String,
    pub margin_percent: String,
    pub latitude: String,
    pub longitude: String,
}

impl Default for TargetColumns {
    fn default() -> Self {
        Self {
            customer_key: "CustKey".to_string(),
            revenue: "Revenue".to_string(),
            cost: "COGS".to_string(),
            margin: "Profit Amount".to_string(),
            year: "year".to_string(),
            month: "month".to_string(),
            date_key: "Datekey".to_string(),
            address: "Address".to_string(),
            margin_percent: "Profit_Margin_%".to_string(),
            latitude: "lat".to_string(),
            longitude: "lon".to_string(),
        }
    }
}

/// Gap-year reconstruction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisConfig {
    /// Calendar year rebuilt from its neighbours.
    pub gap_year: i32,
    /// The two years whose monthly sums are averaged.
    pub reference_years: Vec<i32>,
    /// First month (inclusive) of the comparable window.
    pub first_month: u32,
    /// Last month (inclusive) of the comparable window.
    pub last_month: u32,
    /// Customer key stamped on synthesized rows. When unset the top-revenue
    /// customer among genuine gap-year rows is used, and the run fails if
    /// there are none.
    pub backfill_customer_key: Option<String>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            gap_year: 2018,
            reference_years: vec![2017, 2019],
            first_month: 4,
            last_month: 12,
            backfill_customer_key: None,
        }
    }
}

impl SynthesisConfig {
    pub fn months(&self) -> std::ops::RangeInclusive<u32> {
        self.first_month..=self.last_month
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImputationConfig {
    /// Literal written into missing item class / item cells.
    pub placeholder: String,
}

impl Default for ImputationConfig {
    fn default() -> Self {
        Self {
            placeholder: "Missing".to_string(),
        }
    }
}

/// Identifier and format of the persisted report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub key: String,
    /// Format name as written in the config. Checked by the table store when
    /// persisting.
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            key: "sales-report".to_string(),
            format: "csv".to_string(),
        }
    }
}

/// Reads and validates a TOML config file.
pub fn load_config(path: &Path) -> Result<EtlConfig> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: EtlConfig = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Parses and validates config text. Missing sections take their defaults.
pub fn parse_config(contents: &str) -> Result<EtlConfig> {
    let config: EtlConfig = toml::from_str(contents).map_err(|source| ConfigError::Toml {
        path: PathBuf::from("<inline>"),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

impl EtlConfig {
    pub fn validate(&self) -> Result<()> {
        let synthesis = &self.synthesis;
        let distinct: BTreeSet<i32> = synthesis.reference_years.iter().copied().collect();
        if synthesis.reference_years.len() != 2 || distinct.len() != 2 {
            return Err(ConfigError::invalid(format!(
                "synthesis.reference_years must name two distinct years, got {:?}",
                synthesis.reference_years
            )));
        }
        if distinct.contains(&synthesis.gap_year) {
            return Err(ConfigError::invalid(format!(
                "gap year {} cannot also be a reference year",
                synthesis.gap_year
            )));
        }
        if !(1..=12).contains(&synthesis.first_month)
            || !(1..=12).contains(&synthesis.last_month)
            || synthesis.first_month > synthesis.last_month
        {
            return Err(ConfigError::invalid(format!(
                "synthesis month window {}..={} is not within 1..=12",
                synthesis.first_month, synthesis.last_month
            )));
        }
        if let Some(key) = &synthesis.backfill_customer_key
            && key.trim().is_empty()
        {
            return Err(ConfigError::invalid(
                "synthesis.backfill_customer_key is set but empty",
            ));
        }
        for (field, value) in [
            ("tables.sales", &self.tables.sales),
            ("tables.customers", &self.tables.customers),
            ("tables.customer_addresses", &self.tables.customer_addresses),
            ("tables.divisions", &self.tables.divisions),
            ("tables.regions", &self.tables.regions),
            ("tables.geocodes", &self.tables.geocodes),
            ("output.key", &self.output.key),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}
