//! The transformation as a sequence of explicit stages.
//!
//! 1. **Normalize**: prune, rename and type the transactions
//! 2. **Synthesize**: rebuild the gap year from its reference years
//! 3. **Join**: attach customer, address, region and division attributes
//! 4. **Impute**: fill missing values per calendar year
//! 5. **Enrich**: look up coordinates for the composite address
//! 6. **Deduplicate**: drop exact duplicate rows
//! 7. **Date key**: collapse year and month into a date
//!
//! Extraction and loading happen around this in the table store.

use std::fmt;
use std::time::Instant;

use polars::prelude::DataFrame;
use sales_model::EtlConfig;
use serde::Serialize;
use tracing::{Span, info, info_span};

use crate::date_key::{DateKeySpec, build_date_key};
use crate::dedupe::drop_duplicate_rows;
use crate::error::Result;
use crate::geo::{GeoSpec, attach_coordinates};
use crate::impute::{ImputationSpec, impute_by_year};
use crate::join::{Dimensions, JoinSpec, reconcile};
use crate::normalize::{NormalizeSpec, normalize_transactions};
use crate::synthesis::{SynthesisSpec, best_customer_key, split_gap_year, synthesize_gap_year};

/// The six extracted source tables.
#[derive(Debug, Clone)]
pub struct SourceFrames {
    pub sales: DataFrame,
    pub customers: DataFrame,
    pub customer_addresses: DataFrame,
    pub divisions: DataFrame,
    pub regions: DataFrame,
    pub geocodes: DataFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Normalize,
    Synthesize,
    Join,
    Impute,
    Enrich,
    Deduplicate,
    DateKey,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::Synthesize => "synthesize",
            Stage::Join => "join",
            Stage::Impute => "impute",
            Stage::Enrich => "enrich",
            Stage::Deduplicate => "deduplicate",
            Stage::DateKey => "date_key",
        }
    }

    fn span(self) -> Span {
        match self {
            Stage::Normalize => info_span!("normalize"),
            Stage::Synthesize => info_span!("synthesize"),
            Stage::Join => info_span!("join"),
            Stage::Impute => info_span!("impute"),
            Stage::Enrich => info_span!("enrich"),
            Stage::Deduplicate => info_span!("deduplicate"),
            Stage::DateKey => info_span!("date_key"),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row counts around one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub rows_in: usize,
    pub rows_out: usize,
    pub duration_ms: u64,
}

/// The finished report frame and what happened on the way.
#[derive(Debug, Clone)]
pub struct ReportOutcome {
    pub frame: DataFrame,
    pub stages: Vec<StageReport>,
    /// Customer key stamped on synthesized gap-year rows.
    pub backfill_customer_key: String,
    pub synthesized_rows: usize,
    pub duplicates_removed: usize,
}

struct StageLog {
    stages: Vec<StageReport>,
}

impl StageLog {
    fn run<T>(
        &mut self,
        stage: Stage,
        rows_in: usize,
        body: impl FnOnce() -> Result<T>,
        rows_out: impl FnOnce(&T) -> usize,
    ) -> Result<T> {
        stage.span().in_scope(|| {
            let start = Instant::now();
            let output = body()?;
            let report = StageReport {
                stage,
                rows_in,
                rows_out: rows_out(&output),
                duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            };
            info!(
                rows_in = report.rows_in,
                rows_out = report.rows_out,
                duration_ms = report.duration_ms,
                "{stage} complete"
            );
            self.stages.push(report);
            Ok(output)
        })
    }
}

/// Runs every transformation stage over the extracted tables.
pub fn build_sales_report(sources: SourceFrames, config: &EtlConfig) -> Result<ReportOutcome> {
    let normalize_spec = NormalizeSpec::from_config(config);
    let synthesis_spec = SynthesisSpec::from_config(config)?;
    let join_spec = JoinSpec::from_config(config);
    let imputation_spec = ImputationSpec::from_config(config);
    let geo_spec = GeoSpec::from_config(config);
    let date_key_spec = DateKeySpec::from_config(config);

    let SourceFrames {
        sales,
        customers,
        customer_addresses,
        divisions,
        regions,
        geocodes,
    } = sources;
    let mut log = StageLog { stages: Vec::new() };

    let rows = sales.height();
    let normalized = log.run(
        Stage::Normalize,
        rows,
        || normalize_transactions(sales, &normalize_spec),
        DataFrame::height,
    )?;

    let (complete, backfill_customer_key) = log.run(
        Stage::Synthesize,
        normalized.height(),
        || {
            let split = split_gap_year(&normalized, &synthesis_spec)?;
            let key = match &config.synthesis.backfill_customer_key {
                Some(key) => key.trim().to_string(),
                None => best_customer_key(&split.genuine, &synthesis_spec)?,
            };
            info!(
                gap_year = synthesis_spec.gap_year,
                genuine_rows = split.genuine.height(),
                backfill_customer_key = %key,
                "gap year split"
            );
            Ok((synthesize_gap_year(&split, &synthesis_spec, &key)?, key))
        },
        |(frame, _)| frame.height(),
    )?;
    let synthesized_rows = complete.height().saturating_sub(normalized.height());
    drop(normalized);

    let dimensions = Dimensions {
        customers: &customers,
        customer_addresses: &customer_addresses,
        regions: &regions,
        divisions: &divisions,
    };
    let joined = log.run(
        Stage::Join,
        complete.height(),
        || reconcile(&complete, &dimensions, &join_spec),
        DataFrame::height,
    )?;
    drop(complete);

    let imputed = log.run(
        Stage::Impute,
        joined.height(),
        || impute_by_year(joined, &imputation_spec),
        DataFrame::height,
    )?;

    let rows = imputed.height();
    let enriched = log.run(
        Stage::Enrich,
        rows,
        || attach_coordinates(imputed, &geocodes, &geo_spec),
        DataFrame::height,
    )?;

    let rows = enriched.height();
    let (deduplicated, duplicates_removed) = log.run(
        Stage::Deduplicate,
        rows,
        || {
            let mut frame = enriched;
            let removed = drop_duplicate_rows(&mut frame)?;
            Ok((frame, removed))
        },
        |(frame, _)| frame.height(),
    )?;

    let rows = deduplicated.height();
    let frame = log.run(
        Stage::DateKey,
        rows,
        || build_date_key(deduplicated, &date_key_spec),
        DataFrame::height,
    )?;

    Ok(ReportOutcome {
        frame,
        stages: log.stages,
        backfill_customer_key,
        synthesized_rows,
        duplicates_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(Stage::DateKey.to_string(), "date_key");
        assert_eq!(
            serde_json::to_string(&Stage::Deduplicate).ok(),
            Some("\"deduplicate\"".to_string())
        );
    }
}
