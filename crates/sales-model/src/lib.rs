//! Configuration model for the sales reporting job.
//!
//! The job is driven by one TOML file naming the six source tables, the
//! source and target column names, the gap-year synthesis window, the
//! imputation placeholder and the output key. Every section defaults to the
//! values the production job runs with.

pub mod config;
pub mod error;
pub mod format;

pub use config::{
    ColumnConfig, EtlConfig, ImputationConfig, OutputConfig, SourceColumns, SourceTables,
    StoreConfig, SynthesisConfig, TargetColumns, load_config, parse_config,
};
pub use error::{ConfigError, Result};
pub use format::OutputFormat;
