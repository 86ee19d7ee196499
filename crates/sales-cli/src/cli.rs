//! CLI argument definitions for the sales report job.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "sales-etl",
    version,
    about = "Sales report ETL - reconcile, rebuild and impute sales transactions",
    long_about = "Build the sales report from six source tables.\n\n\
                  Rebuilds the gap year from its reference years, joins customer,\n\
                  address, region and division attributes, imputes missing values\n\
                  per calendar year and writes one CSV report."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Extract the source tables, build the report and persist it.
    Run(RunArgs),

    /// List the tables available in the source directory.
    Tables(TablesArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Path to the job configuration (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Directory holding the source tables (overrides store.source_dir).
    #[arg(long = "source-dir", value_name = "DIR")]
    pub source_dir: Option<PathBuf>,

    /// Directory the report is written to (overrides store.target_dir).
    #[arg(long = "target-dir", value_name = "DIR")]
    pub target_dir: Option<PathBuf>,

    /// Output format name (overrides output.format).
    #[arg(long = "format", value_name = "FORMAT")]
    pub format: Option<String>,

    /// Build the report without persisting it.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Also write the run report as JSON.
    #[arg(long = "report-json", value_name = "PATH")]
    pub report_json: Option<PathBuf>,
}

#[derive(Parser)]
pub struct TablesArgs {
    /// Path to the job configuration (TOML).
    #[arg(value_name = "CONFIG")]
    pub config: PathBuf,

    /// Directory holding the source tables (overrides store.source_dir).
    #[arg(long = "source-dir", value_name = "DIR")]
    pub source_dir: Option<PathBuf>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
