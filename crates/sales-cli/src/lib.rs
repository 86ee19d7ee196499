//! Library side of the `sales-etl` binary.

pub mod logging;
pub mod pipeline;
pub mod types;
