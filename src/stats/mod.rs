//! Statistics Module
//!
//! Explicitly constructed registry of named statistics sets.
//!
//! ## Lifecycle
//! ```text
//!   Registry::builder()        StatsBuilder::open()        Recorder::close() / drop
//!  ───────────────────► Declared ──────────────────► Open ─────────────────────────► Closed
//! ```
//!
//! - **Declared**: the owner declares every statistic (name + type + initial
//!   value) on a [`StatsBuilder`]. Nothing is visible to observers yet.
//! - **Open**: the builder is consumed into a [`Recorder`] and registered.
//!   The owner updates values through the recorder.
//! - **Closed**: the recorder is closed. The next [`Registry::collect`] still
//!   reports the set with its final values, then the registry drops it.
//!
//! Observers poll with [`Registry::collect`], [`Registry::for_each`] and
//! [`Registry::filter`], or subscribe to newly opened sets with
//! [`Registry::on_open`].
//!
//! There is no process-wide registry: whoever owns a [`Registry`] passes it
//! (as `Arc<Registry>`) to the components that publish statistics.

mod recorder;
mod registry;

use std::collections::BTreeMap;
use std::fmt;

pub use recorder::{Recorder, StatsBuilder};
pub use registry::{Registry, Subscription};

/// A single statistic value
#[derive(Debug, Clone, PartialEq)]
pub enum StatValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl StatValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            StatValue::Int(_) => "int",
            StatValue::Float(_) => "float",
            StatValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Int(v) => write!(f, "{}", v),
            StatValue::Float(v) => write!(f, "{}", v),
            StatValue::Str(v) => write!(f, "{:?}", v),
        }
    }
}

/// Lifecycle state of a statistics set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Declared,
    Open,
    Closed,
}

/// Point-in-time copy of one statistics set, as seen by an observer
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub key: String,
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub state: Lifecycle,
    pub values: BTreeMap<String, StatValue>,
}

impl StatsSnapshot {
    /// Integer statistic by name
    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(StatValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Float statistic by name
    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(StatValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    /// String statistic by name
    pub fn string(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(StatValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }
}
