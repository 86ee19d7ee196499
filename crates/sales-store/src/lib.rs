//! Table store access for the sales reporting job.
//!
//! The reporting core only needs three things from storage: the list of
//! fetchable tables, a fully materialized table by identifier, and a place to
//! persist the finished report. [`TableStore`] is that boundary.
//!
//! - [`LocalTableStore`] reads and writes CSV files in a directory.
//! - [`MemoryTableStore`] keeps frames in memory.

mod error;
mod local;
mod memory;
mod store;

pub use error::{Result, StoreError};
pub use local::LocalTableStore;
pub use memory::MemoryTableStore;
pub use store::{TableStore, resolve_format, target_key};
