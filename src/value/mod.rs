//! Value Module
//!
//! Timestamped scalars and the per-key series they are collected into.
//!
//! ## Responsibilities
//! - Tagged payloads (float, integer, boolean, string)
//! - Byte accounting (`size()`) used verbatim by the cache budget
//! - Last-write-wins merge of batches into an ordered series
//!
//! ## Size Model
//! ```text
//! ┌────────────┬───────────────┬─────────────────┐
//! │ Payload    │ Timestamp (8) │ Payload width   │
//! ├────────────┼───────────────┼─────────────────┤
//! │ Float      │ 8             │ 8               │
//! │ Integer    │ 8             │ 8               │
//! │ Boolean    │ 8             │ 1               │
//! │ String     │ 8             │ len(bytes)      │
//! └────────────┴───────────────┴─────────────────┘
//! ```

mod series;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use series::{mixed_types, Values};

/// Bytes charged for the timestamp of every value
pub const TIMESTAMP_SIZE: usize = 8;

/// Payload carried by a [`Value`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
}

/// Type tag of a [`Payload`], used to check series homogeneity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Float,
    Integer,
    Boolean,
    String,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Float => "float",
            ValueType::Integer => "integer",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Payload {
    /// Serialized width of the payload alone
    pub fn width(&self) -> usize {
        match self {
            Payload::Float(_) => 8,
            Payload::Integer(_) => 8,
            Payload::Boolean(_) => 1,
            Payload::String(s) => s.len(),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Payload::Float(_) => ValueType::Float,
            Payload::Integer(_) => ValueType::Integer,
            Payload::Boolean(_) => ValueType::Boolean,
            Payload::String(_) => ValueType::String,
        }
    }
}

impl From<f64> for Payload {
    fn from(v: f64) -> Self {
        Payload::Float(v)
    }
}

impl From<i64> for Payload {
    fn from(v: i64) -> Self {
        Payload::Integer(v)
    }
}

impl From<bool> for Payload {
    fn from(v: bool) -> Self {
        Payload::Boolean(v)
    }
}

impl From<String> for Payload {
    fn from(v: String) -> Self {
        Payload::String(v)
    }
}

impl From<&str> for Payload {
    fn from(v: &str) -> Self {
        Payload::String(v.to_string())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Float(v) => write!(f, "{}", v),
            Payload::Integer(v) => write!(f, "{}i", v),
            Payload::Boolean(v) => write!(f, "{}", v),
            Payload::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// A single timestamped value. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    /// Unix time in nanoseconds
    unix_nano: i64,
    payload: Payload,
}

impl Value {
    /// Create a value; no validation beyond type tagging
    pub fn new(unix_nano: i64, payload: impl Into<Payload>) -> Self {
        Self {
            unix_nano,
            payload: payload.into(),
        }
    }

    /// Timestamp in Unix nanoseconds
    pub fn unix_nano(&self) -> i64 {
        self.unix_nano
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn value_type(&self) -> ValueType {
        self.payload.value_type()
    }

    /// Bytes this value is charged against the cache budget
    pub fn size(&self) -> usize {
        TIMESTAMP_SIZE + self.payload.width()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.unix_nano, self.payload)
    }
}
