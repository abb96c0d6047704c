//! Values passed to report sinks
//!
//! Sinks receive rows of [`Field`]s rather than strings so that typed
//! formats (JSON) keep numbers as numbers, while delimited text renders each
//! field through `Display`.

use std::fmt;

use serde::Serialize;

/// A single cell of a report row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Field {
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Null => Ok(()),
            Field::Int(n) => write!(f, "{n}"),
            Field::UInt(n) => write!(f, "{n}"),
            Field::Float(n) => write!(f, "{n}"),
            Field::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Field {
    fn from(n: i64) -> Self {
        Field::Int(n)
    }
}

impl From<u64> for Field {
    fn from(n: u64) -> Self {
        Field::UInt(n)
    }
}

impl From<u32> for Field {
    fn from(n: u32) -> Self {
        Field::UInt(u64::from(n))
    }
}

impl From<f64> for Field {
    fn from(n: f64) -> Self {
        Field::Float(n)
    }
}

impl From<String> for Field {
    fn from(s: String) -> Self {
        Field::Text(s)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Text(s.to_string())
    }
}

impl<T: Into<Field>> From<Option<T>> for Field {
    fn from(value: Option<T>) -> Self {
        value.map_or(Field::Null, Into::into)
    }
}
