use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::Table;
use tracing::info_span;

use sales_cli::pipeline::run_job;
use sales_cli::types::RunReport;
use sales_model::{EtlConfig, load_config};
use sales_store::{LocalTableStore, TableStore};

use crate::cli::{RunArgs, TablesArgs};
use crate::summary::apply_table_style;

pub fn run_report(args: &RunArgs) -> Result<RunReport> {
    let config = resolve_config(args)?;
    let span = info_span!("run", config = %args.config.display());
    let _guard = span.enter();

    let source = LocalTableStore::new(&config.store.source_dir);
    let target = LocalTableStore::new(&config.store.target_dir);
    if !args.dry_run {
        std::fs::create_dir_all(target.root()).with_context(|| {
            format!("create target directory {}", target.root().display())
        })?;
    }

    let report = run_job(&source, &target, &config, args.dry_run)?;
    if let Some(path) = &args.report_json {
        write_report_json(&report, path)?;
    }
    Ok(report)
}

pub fn run_tables(args: &TablesArgs) -> Result<()> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;
    if let Some(dir) = &args.source_dir {
        config.store.source_dir = dir.clone();
    }
    let store = LocalTableStore::new(&config.store.source_dir);
    let available = store.list_available("").context("list source tables")?;
    let configured = config.tables.identifiers();

    let mut table = Table::new();
    table.set_header(vec!["Table", "Configured"]);
    apply_table_style(&mut table);
    for identifier in &available {
        let role = if configured.contains(&identifier.as_str()) {
            "yes"
        } else {
            "-"
        };
        table.add_row(vec![identifier.as_str(), role]);
    }
    for identifier in configured {
        if !available.contains(identifier) {
            table.add_row(vec![identifier, "missing"]);
        }
    }
    println!("{table}");
    Ok(())
}

/// Loads the config file and applies command-line overrides.
fn resolve_config(args: &RunArgs) -> Result<EtlConfig> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("load config {}", args.config.display()))?;
    if let Some(dir) = &args.source_dir {
        config.store.source_dir = dir.clone();
    }
    if let Some(dir) = &args.target_dir {
        config.store.target_dir = dir.clone();
    }
    if let Some(format) = &args.format {
        config.output.format = format.clone();
    }
    Ok(config)
}

fn write_report_json(report: &RunReport, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("create report {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)
        .with_context(|| format!("write report {}", path.display()))?;
    Ok(())
}
