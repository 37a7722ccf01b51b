//! In-process `RecordStore` implementation.
//!
//! Evaluates filters, sort keys, and record limits the way the hosted store does.
//! Used by tests and by the gateway's `dev-mode` build.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::record::{Direction, Fields, Record, RecordHandle, RecordStore, ScanQuery, Sort};

/// A record store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    ignore_sort: bool,
    unavailable: AtomicBool,
}

impl MemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose scans ignore sort keys and return records in
    /// insertion order.
    #[must_use]
    pub fn unordered() -> Self {
        Self {
            ignore_sort: true,
            ..Self::default()
        }
    }

    /// Make every subsequent operation fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Insert a record with exactly the given fields, bypassing the repository.
    pub fn insert_raw(&self, table: &str, fields: Fields) -> RecordHandle {
        let handle = Self::new_handle();
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(Record {
                id: handle.clone(),
                fields,
            });
        handle
    }

    /// Number of records in `table`.
    #[must_use]
    pub fn len(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, Vec::len)
    }

    /// Whether `table` holds no records.
    #[must_use]
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }

    fn new_handle() -> RecordHandle {
        RecordHandle::new(format!("rec{}", Uuid::new_v4().simple()))
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }
}

fn compare_field(sort: &Sort, a: &Record, b: &Record) -> Ordering {
    let ordering = match (a.fields.get(&sort.field), b.fields.get(&sort.field)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        _ => Ordering::Equal,
    };
    match sort.direction {
        Direction::Ascending => ordering,
        Direction::Descending => ordering.reverse(),
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn create(&self, table: &str, fields: Fields) -> Result<Record> {
        self.check_available()?;
        let record = Record {
            id: Self::new_handle(),
            fields,
        };
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn find(&self, table: &str, handle: &RecordHandle) -> Result<Record> {
        self.check_available()?;
        self.tables
            .lock()
            .get(table)
            .and_then(|records| records.iter().find(|r| &r.id == handle))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update(&self, table: &str, handle: &RecordHandle, fields: Fields) -> Result<Record> {
        self.check_available()?;
        let mut tables = self.tables.lock();
        let record = tables
            .get_mut(table)
            .and_then(|records| records.iter_mut().find(|r| &r.id == handle))
            .ok_or(StoreError::NotFound)?;
        record.fields.extend(fields);
        Ok(record.clone())
    }

    async fn destroy(&self, table: &str, handle: &RecordHandle) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.lock();
        let records = tables.get_mut(table).ok_or(StoreError::NotFound)?;
        let position = records
            .iter()
            .position(|r| &r.id == handle)
            .ok_or(StoreError::NotFound)?;
        records.remove(position);
        Ok(())
    }

    async fn scan(&self, table: &str, query: &ScanQuery) -> Result<Vec<Record>> {
        self.check_available()?;
        let mut records: Vec<Record> = self
            .tables
            .lock()
            .get(table)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| match &query.filter {
                        Some(filter) => filter.matches(&r.fields),
                        None => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !self.ignore_sort {
            records.sort_by(|a, b| {
                query
                    .sort
                    .iter()
                    .map(|s| compare_field(s, a, b))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        if let Some(max) = query.max_records {
            records.truncate(max);
        }
        Ok(records)
    }
}
