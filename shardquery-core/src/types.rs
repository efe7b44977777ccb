//! Core data types shared across the execution core: the native SQL value
//! union, and the ordered row representation executors forward to the
//! `ProcessingContext`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A native SQL value. Mirrors the column types the spec's data model calls
/// out (§3, §6): integer, text, date, timestamp, boolean, numeric, blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Date(chrono::NaiveDate),
    Timestamp(chrono::NaiveDateTime),
    Boolean(bool),
    Numeric(f64),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null => DataType::Null,
            Value::Integer(_) => DataType::Integer,
            Value::Text(_) => DataType::Text,
            Value::Date(_) => DataType::Date,
            Value::Timestamp(_) => DataType::Timestamp,
            Value::Boolean(_) => DataType::Boolean,
            Value::Numeric(_) => DataType::Numeric,
            Value::Blob(_) => DataType::Blob,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Date(d) => write!(f, "{d}"),
            Value::Timestamp(t) => write!(f, "{t}"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Numeric(n) => write!(f, "{n}"),
            Value::Blob(b) => write!(f, "<blob:{} bytes>", b.len()),
        }
    }
}

/// SQL column data types (§3 `KeysetField.dataType`, `FilterSpec.dataType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Null,
    Integer,
    Text,
    Date,
    Timestamp,
    Boolean,
    Numeric,
    Blob,
}

/// An ordered name -> value row, as emitted by a `ShardStore`.
///
/// Plain `HashMap` would not satisfy §4.8's "iterate in insertion order"
/// requirement for `KeysetManager::save`, so rows preserve the column order
/// the driver produced them in. `provincia` is a reserved key: the core
/// strips any inbound value for it and restamps with the shard's province
/// (§6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Row(pub Vec<(String, Value)>);

impl Row {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if let Some(entry) = self.0.iter_mut().find(|(k, _)| *k == name) {
            entry.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let pos = self.0.iter().position(|(k, _)| k == name)?;
        Some(self.0.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Strip the technical `row_id` column and any inbound `provincia`, then
    /// stamp the shard's province (spec §4.13, §4.15).
    pub fn restamp_province(&mut self, province: &str) {
        self.remove("row_id");
        self.remove("provincia");
        self.set("provincia", Value::Text(province.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_preserves_insertion_order() {
        let mut row = Row::new();
        row.set("b", Value::Integer(2));
        row.set("a", Value::Integer(1));
        let keys: Vec<_> = row.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn restamp_strips_and_replaces_provincia() {
        let mut row = Row::new();
        row.set("row_id", Value::Integer(42));
        row.set("provincia", Value::Text("stale".into()));
        row.set("monto", Value::Numeric(10.5));
        row.restamp_province("cordoba");
        assert!(row.get("row_id").is_none());
        assert_eq!(row.get("provincia"), Some(&Value::Text("cordoba".to_string())));
        assert_eq!(row.get("monto"), Some(&Value::Numeric(10.5)));
    }
}
