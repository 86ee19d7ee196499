//! Extract, transform and load around a pair of table stores.
//!
//! 1. **Extract**: check the six source tables exist and fetch them
//! 2. **Transform**: run the report stages in `sales_transform`
//! 3. **Load**: persist the report under the configured key and format

use std::time::Instant;

use anyhow::{Context, Result};
use polars::prelude::DataFrame;
use tracing::{info, info_span};

use sales_model::{EtlConfig, OutputConfig, SourceTables};
use sales_store::{StoreError, TableStore};
use sales_transform::{ReportOutcome, SourceFrames, build_sales_report};

use crate::types::RunReport;

/// Fetches every configured source table.
///
/// Fails with [`StoreError::NotFound`] listing all absent identifiers before
/// anything is read.
pub fn extract(store: &dyn TableStore, tables: &SourceTables) -> Result<SourceFrames> {
    info_span!("extract").in_scope(|| -> Result<SourceFrames> {
        let start = Instant::now();
        let available = store.list_available("").context("list source tables")?;
        let missing: Vec<&str> = tables
            .identifiers()
            .into_iter()
            .filter(|identifier| !available.contains(*identifier))
            .collect();
        if !missing.is_empty() {
            return Err(StoreError::NotFound {
                identifier: missing.join(", "),
            }
            .into());
        }

        let fetch = |identifier: &str| -> Result<DataFrame> {
            store
                .fetch(identifier)
                .with_context(|| format!("fetch {identifier}"))
        };
        let sources = SourceFrames {
            sales: fetch(&tables.sales)?,
            customers: fetch(&tables.customers)?,
            customer_addresses: fetch(&tables.customer_addresses)?,
            divisions: fetch(&tables.divisions)?,
            regions: fetch(&tables.regions)?,
            geocodes: fetch(&tables.geocodes)?,
        };
        info!(
            sales_rows = sources.sales.height(),
            duration_ms = start.elapsed().as_millis(),
            "extract complete"
        );
        Ok(sources)
    })
}

pub fn transform(sources: SourceFrames, config: &EtlConfig) -> Result<ReportOutcome> {
    build_sales_report(sources, config).context("build sales report")
}

/// Persists the report and returns its key.
pub fn load(store: &dyn TableStore, frame: &mut DataFrame, output: &OutputConfig) -> Result<String> {
    info_span!("load").in_scope(|| -> Result<String> {
        let start = Instant::now();
        let key = store
            .persist(frame, &output.key, &output.format)
            .with_context(|| format!("persist {}", output.key))?;
        info!(
            key = %key,
            rows = frame.height(),
            duration_ms = start.elapsed().as_millis(),
            "load complete"
        );
        Ok(key)
    })
}

/// Runs the whole job. With `dry_run` the report is built but not persisted.
pub fn run_job(
    source: &dyn TableStore,
    target: &dyn TableStore,
    config: &EtlConfig,
    dry_run: bool,
) -> Result<RunReport> {
    let sources = extract(source, &config.tables)?;
    let mut outcome = transform(sources, config)?;
    let output_key = if dry_run {
        info!("dry run, report not persisted");
        None
    } else {
        Some(load(target, &mut outcome.frame, &config.output)?)
    };
    Ok(RunReport {
        output_key,
        rows: outcome.frame.height(),
        columns: outcome
            .frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect(),
        backfill_customer_key: outcome.backfill_customer_key,
        synthesized_rows: outcome.synthesized_rows,
        duplicates_removed: outcome.duplicates_removed,
        stages: outcome.stages,
    })
}
