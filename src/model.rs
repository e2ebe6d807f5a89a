//! # Data Model
//!
//! Records are structural key-value documents backed by `serde_json::Value`.
//! A dataset is the ordered, immutable sequence of records one linkage run sees.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Position of a record inside its dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordIndex(pub usize);

impl fmt::Display for RecordIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A structural document taking part in linkage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    value: Value,
}

impl Record {
    /// Wrap an arbitrary JSON value
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Build an object record from `(field, value)` pairs
    pub fn from_fields<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let object: Map<String, Value> = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value))
            .collect();
        Self::new(Value::Object(object))
    }

    /// The full structural value of this record
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Look up a top-level field; `None` for missing fields and non-object records
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.value.as_object().and_then(|object| object.get(name))
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// An ordered sequence of records from a single source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: RecordIndex) -> Option<&Record> {
        self.records.get(index.0)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordIndex, &Record)> + '_ {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| (RecordIndex(index), record))
    }

    /// Every unordered pair of distinct slots, `left < right`
    pub fn distinct_pairs(&self) -> impl Iterator<Item = (RecordIndex, RecordIndex)> + '_ {
        let len = self.records.len();
        (0..len).flat_map(move |left| {
            (left + 1..len).map(move |right| (RecordIndex(left), RecordIndex(right)))
        })
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<T: IntoIterator<Item = Record>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
