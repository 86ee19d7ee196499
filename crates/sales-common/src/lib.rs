//! Shared utilities for the sales reporting crates.
//!
//! This crate provides the polars helpers every stage leans on: `AnyValue`
//! conversions and whole-column extraction into plain Rust vectors.

pub mod any_value;
pub mod frame;

// Re-export commonly used functions at crate root for convenience
pub use any_value::{
    any_to_f64, any_to_i64, any_to_string, any_to_text, format_numeric, parse_f64, parse_i64,
};
pub use frame::{
    column_f64s, column_i64s, column_strings, gather_column, has_column, missing_columns,
};
