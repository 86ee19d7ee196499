//! Transformation stages of the sales report.
//!
//! Each stage takes a polars `DataFrame` and the column names it needs, taken
//! from [`sales_model::EtlConfig`], and returns a new frame. The
//! [`pipeline`] module runs them in order.

pub mod calendar;
pub mod date_key;
pub mod dedupe;
pub mod error;
pub mod geo;
pub mod impute;
pub mod join;
pub mod normalize;
pub mod pipeline;
pub mod synthesis;

pub use error::{Result, TransformError};
pub use pipeline::{ReportOutcome, SourceFrames, Stage, StageReport, build_sales_report};
