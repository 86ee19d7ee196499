use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use sales_cli::types::RunReport;

pub fn print_summary(report: &RunReport) {
    match &report.output_key {
        Some(key) => println!("Output: {key}"),
        None => println!("Output: (dry run, not persisted)"),
    }
    println!("Backfill customer key: {}", report.backfill_customer_key);
    println!("{}", stage_table(report));
}

/// Stage row counts plus a total line for the emitted report.
pub fn stage_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Stage"),
        header_cell("Rows in"),
        header_cell("Rows out"),
        header_cell("Change"),
        header_cell("ms"),
    ]);
    apply_table_style(&mut table);
    for index in 1..=4 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for stage in &report.stages {
        table.add_row(vec![
            Cell::new(stage.stage).fg(Color::Blue),
            Cell::new(stage.rows_in),
            Cell::new(stage.rows_out),
            change_cell(stage.rows_in, stage.rows_out),
            dim_cell(stage.duration_ms),
        ]);
    }
    table.add_row(vec![
        Cell::new("REPORT")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        dim_cell("-"),
        Cell::new(report.rows).add_attribute(Attribute::Bold),
        dim_cell(format!("{} cols", report.columns.len())),
        dim_cell("-"),
    ]);
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn change_cell(rows_in: usize, rows_out: usize) -> Cell {
    match rows_out.cmp(&rows_in) {
        std::cmp::Ordering::Greater => Cell::new(format!("+{}", rows_out - rows_in)).fg(Color::Green),
        std::cmp::Ordering::Less => Cell::new(format!("-{}", rows_in - rows_out)).fg(Color::Yellow),
        std::cmp::Ordering::Equal => dim_cell(0),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
