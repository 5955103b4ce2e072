//! Canonical values and row records.
//!
//! Drivers decode backend-native scalars into [`Value`] on read and encode
//! them back on write. The normalizer works purely on this representation.

use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;

/// Backend-neutral scalar.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL / missing field / missing property.
    Null,

    /// Boolean value.
    Bool(bool),

    /// 64-bit signed integer.
    Int(i64),

    /// 64-bit floating point.
    Float(f64),

    /// Text data.
    Text(String),

    /// Arbitrary-precision decimal.
    Decimal(Decimal),

    /// Calendar date without time.
    Date(NaiveDate),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),

    /// Timestamp with timezone offset.
    DateTimeTz(DateTime<FixedOffset>),

    /// A source value that could not be decoded into any of the above.
    /// Carries the reason; the normalizer rejects the row that holds it.
    Unsupported(String),
}

impl Value {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in log messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "string",
            Value::Decimal(_) => "decimal",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::DateTimeTz(_) => "datetime_tz",
            Value::Unsupported(_) => "unsupported",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::DateTimeTz(v) => f.write_str(&v.to_rfc3339()),
            Value::Unsupported(reason) => write!(f, "<unsupported: {}>", reason),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Value::DateTimeTz(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// One source row: field name to canonical value, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    fields: IndexMap<String, Value>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a record by zipping column names with values.
    pub fn from_columns(columns: &[String], values: Vec<Value>) -> Self {
        let fields = columns.iter().cloned().zip(values).collect();
        Self { fields }
    }

    /// Set a field. An existing field keeps its position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Values for the given columns in order; absent fields read as NULL.
    pub fn values_for(&self, columns: &[String]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| self.fields.get(c).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// Rename fields positionally: `source[i]` becomes `target[i]`.
    ///
    /// Fields not named in `source` are dropped. When `target` repeats a name
    /// the later position wins.
    pub fn remap(&self, source: &[String], target: &[String]) -> RowRecord {
        let mut out = RowRecord::new();
        for (src, dst) in source.iter().zip(target) {
            let value = self.fields.get(src).cloned().unwrap_or(Value::Null);
            out.insert(dst.clone(), value);
        }
        out
    }
}

impl FromIterator<(String, Value)> for RowRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
