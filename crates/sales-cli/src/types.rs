use serde::Serialize;

use sales_transform::StageReport;

/// What one `run` did, printed as a table and optionally written as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Key the report was persisted under; `None` on a dry run.
    pub output_key: Option<String>,
    pub rows: usize,
    pub columns: Vec<String>,
    pub backfill_customer_key: String,
    pub synthesized_rows: usize,
    pub duplicates_removed: usize,
    pub stages: Vec<StageReport>,
}
