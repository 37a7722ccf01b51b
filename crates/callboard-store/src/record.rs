//! The external record model and the `RecordStore` trait.
//!
//! The external store is a spreadsheet-style service: tables of records, each with an
//! opaque string handle and a bag of named fields. Queries are scans filtered by a
//! formula and optionally sorted.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Named field values of a record.
pub type Fields = serde_json::Map<String, Value>;

/// The store's native, opaque record identifier (e.g. `rec8f2Kx...`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordHandle(String);

impl RecordHandle {
    /// Wrap a native handle.
    #[must_use]
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Borrow the handle as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordHandle({})", self.0)
    }
}

impl fmt::Display for RecordHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A record as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Native handle.
    pub id: RecordHandle,
    /// Field values. Empty fields may be omitted entirely by the store.
    #[serde(default)]
    pub fields: Fields,
}

/// A scan predicate.
///
/// Only the shapes the repository needs are representable: field equality and
/// disjunction.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `{field} = value`
    Eq {
        /// Field name.
        field: String,
        /// Value to compare against.
        value: Value,
    },
    /// `OR(a, b, ...)`. An empty disjunction matches nothing.
    Or(Vec<Filter>),
}

impl Filter {
    /// Build an equality predicate.
    #[must_use]
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Build a disjunction.
    #[must_use]
    pub fn any(filters: Vec<Self>) -> Self {
        Self::Or(filters)
    }

    /// Render the predicate as an Airtable formula.
    #[must_use]
    pub fn to_formula(&self) -> String {
        match self {
            Self::Eq { field, value } => format!("{{{field}}} = {}", formula_literal(value)),
            Self::Or(filters) if filters.is_empty() => "FALSE()".to_string(),
            Self::Or(filters) => {
                let parts: Vec<String> = filters.iter().map(Self::to_formula).collect();
                format!("OR({})", parts.join(", "))
            }
        }
    }

    /// Evaluate the predicate against a record's fields.
    #[must_use]
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Self::Eq { field, value } => {
                values_equal(fields.get(field).unwrap_or(&Value::Null), value)
            }
            Self::Or(filters) => filters.iter().any(|f| f.matches(fields)),
        }
    }
}

fn formula_literal(value: &Value) -> String {
    match value {
        Value::Null => "BLANK()".to_string(),
        Value::Bool(true) => "TRUE()".to_string(),
        Value::Bool(false) => "FALSE()".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        other => format!("\"{}\"", other.to_string().replace('"', "\\\"")),
    }
}

/// Equality with integer/float unification (`3` equals `3.0`).
#[allow(clippy::float_cmp)]
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

impl Direction {
    /// Airtable's name for the direction.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascending => "asc",
            Self::Descending => "desc",
        }
    }
}

/// A sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    /// Field to sort by.
    pub field: String,
    /// Direction.
    pub direction: Direction,
}

impl Sort {
    /// Sort by `field`, largest first.
    #[must_use]
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// Parameters for a scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanQuery {
    /// Only return records matching this predicate.
    pub filter: Option<Filter>,
    /// Sort keys, most significant first.
    pub sort: Vec<Sort>,
    /// Stop after this many records.
    pub max_records: Option<usize>,
}

impl ScanQuery {
    /// A scan of the whole table.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict the scan to records matching `filter`.
    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Add a sort key.
    #[must_use]
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }

    /// Limit the number of returned records.
    #[must_use]
    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }
}

/// CRUD and scan operations against the external record store.
///
/// All operations are a single logical round trip; implementations must not retry.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record and return it as stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the store rejects or cannot be reached.
    async fn create(&self, table: &str, fields: Fields) -> Result<Record>;

    /// Fetch a record by handle.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has this handle.
    async fn find(&self, table: &str, handle: &RecordHandle) -> Result<Record>;

    /// Write the given fields, leaving others untouched, and return the full record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has this handle.
    async fn update(&self, table: &str, handle: &RecordHandle, fields: Fields) -> Result<Record>;

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no record has this handle.
    async fn destroy(&self, table: &str, handle: &RecordHandle) -> Result<()>;

    /// List records matching `query`, following pagination to the end.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the store rejects or cannot be reached.
    async fn scan(&self, table: &str, query: &ScanQuery) -> Result<Vec<Record>>;
}
