//! Integration tests for config loading.

use std::io::Write;

use sales_model::{ConfigError, EtlConfig, load_config, parse_config};
use tempfile::NamedTempFile;

#[test]
fn test_empty_config_takes_defaults() {
    let config = parse_config("").unwrap();
    assert_eq!(config, EtlConfig::default());
}

#[test]
fn test_partial_sections_override_defaults() {
    let config = parse_config(
        r#"
[tables]
sales = "sales.csv"

[columns.target]
revenue = "Net Revenue"

[synthesis]
gap_year = 2021
reference_years = [2020, 2022]
backfill_customer_key = "10015"

[output]
key = "monthly"
"#,
    )
    .unwrap();

    assert_eq!(config.tables.sales, "sales.csv");
    assert_eq!(config.tables.customers, "CUSTOMERS.csv");
    assert_eq!(config.columns.target.revenue, "Net Revenue");
    assert_eq!(config.columns.target.cost, "COGS");
    assert_eq!(config.synthesis.gap_year, 2021);
    assert_eq!(config.synthesis.first_month, 4);
    assert_eq!(
        config.synthesis.backfill_customer_key.as_deref(),
        Some("10015")
    );
    assert_eq!(config.output.key, "monthly");
    assert_eq!(config.output.format, "csv");
}

#[test]
fn test_unknown_field_is_rejected() {
    let error = parse_config("[synthesis]\ngap_yr = 2018\n").unwrap_err();
    assert!(matches!(error, ConfigError::Toml { .. }));
}

#[test]
fn test_invalid_reference_years_message() {
    let error = parse_config("[synthesis]\nreference_years = [2017]\n").unwrap_err();
    insta::assert_snapshot!(
        error.to_string(),
        @"invalid config: synthesis.reference_years must name two distinct years, got [2017]"
    );
}

#[test]
fn test_empty_output_key_message() {
    let error = parse_config("[output]\nkey = \"  \"\n").unwrap_err();
    insta::assert_snapshot!(error.to_string(), @"invalid config: output.key must not be empty");
}

#[test]
fn test_load_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "[store]\nsource_dir = \"in\"\ntarget_dir = \"out\"\n\n[imputation]\nplaceholder = \"Unknown\"\n"
    )
    .unwrap();

    let config = load_config(file.path()).unwrap();
    assert_eq!(config.store.source_dir.to_str(), Some("in"));
    assert_eq!(config.store.target_dir.to_str(), Some("out"));
    assert_eq!(config.imputation.placeholder, "Unknown");
}

#[test]
fn test_load_config_missing_file() {
    let error = load_config(std::path::Path::new("/definitely/not/here.toml")).unwrap_err();
    assert!(matches!(error, ConfigError::Io { .. }));
}

#[test]
fn test_shipped_config_matches_defaults() {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/sales.toml");
    let config = load_config(&path).unwrap();
    assert_eq!(config, EtlConfig::default());
}
