//! In-memory table store.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::DataFrame;

use crate::error::{Result, StoreError};
use crate::store::{TableStore, resolve_format, target_key};

/// Frames held in a map keyed by identifier.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: RefCell<BTreeMap<String, DataFrame>>,
}

impl MemoryTableStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(self, identifier: impl Into<String>, frame: DataFrame) -> Self {
        self.insert(identifier, frame);
        self
    }

    pub fn insert(&self, identifier: impl Into<String>, frame: DataFrame) {
        self.tables.borrow_mut().insert(identifier.into(), frame);
    }

    /// Returns a copy of a stored frame, if present.
    pub fn get(&self, identifier: &str) -> Option<DataFrame> {
        self.tables.borrow().get(identifier).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.borrow().is_empty()
    }
}

impl TableStore for MemoryTableStore {
    fn list_available(&self, tag: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .tables
            .borrow()
            .keys()
            .filter(|key| key.starts_with(tag))
            .cloned()
            .collect())
    }

    fn fetch(&self, identifier: &str) -> Result<DataFrame> {
        self.get(identifier).ok_or_else(|| StoreError::NotFound {
            identifier: identifier.to_string(),
        })
    }

    fn persist(&self, frame: &mut DataFrame, identifier: &str, format: &str) -> Result<String> {
        let key = target_key(identifier, resolve_format(format)?);
        self.insert(key.clone(), frame.clone());
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;

    #[test]
    fn test_list_available_by_tag() {
        let store = MemoryTableStore::new()
            .with_table("SALESDATA.csv", DataFrame::empty())
            .with_table("REGION.csv", DataFrame::empty());
        let all = store.list_available("").unwrap();
        assert_eq!(all.len(), 2);
        let sales = store.list_available("SALES").unwrap();
        assert_eq!(sales.into_iter().collect::<Vec<_>>(), vec!["SALESDATA.csv"]);
    }

    #[test]
    fn test_fetch_missing_table() {
        let store = MemoryTableStore::new();
        assert!(matches!(
            store.fetch("GPS.csv"),
            Err(StoreError::NotFound { identifier }) if identifier == "GPS.csv"
        ));
    }

    #[test]
    fn test_persist_rejects_unknown_format_without_storing() {
        let store = MemoryTableStore::new();
        let mut frame = df! { "A" => &[1i64] }.unwrap();
        let result = store.persist(&mut frame, "sales-report", "xlsx");
        assert!(matches!(result, Err(StoreError::UnsupportedFormat { .. })));
        assert!(store.is_empty());
    }

    #[test]
    fn test_persist_stores_under_target_key() {
        let store = MemoryTableStore::new();
        let mut frame = df! { "A" => &[1i64, 2] }.unwrap();
        let key = store.persist(&mut frame, "sales-report", "csv").unwrap();
        assert_eq!(key, "sales-report.csv");
        assert_eq!(store.get("sales-report.csv").unwrap().height(), 2);
    }
}
