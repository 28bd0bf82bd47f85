//! Statistics builder and recorder
//!
//! `StatsBuilder` is the declared state, `Recorder` the open/closed states.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{CacheError, Result};

use super::{Lifecycle, Registry, StatValue, StatsSnapshot};

/// Shared state of one registered statistics set
pub(super) struct StatsSet {
    key: String,
    name: String,
    tags: BTreeMap<String, String>,
    inner: RwLock<SetInner>,
}

struct SetInner {
    state: Lifecycle,
    values: BTreeMap<String, StatValue>,
}

impl StatsSet {
    pub(super) fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.read();
        StatsSnapshot {
            key: self.key.clone(),
            name: self.name.clone(),
            tags: self.tags.clone(),
            state: inner.state,
            values: inner.values.clone(),
        }
    }
}

/// Declares the statistics a component will record
pub struct StatsBuilder {
    registry: Arc<Registry>,
    key: String,
    name: String,
    tags: BTreeMap<String, String>,
    values: BTreeMap<String, StatValue>,
}

impl StatsBuilder {
    pub(super) fn new(
        registry: Arc<Registry>,
        key: String,
        name: String,
        tags: BTreeMap<String, String>,
    ) -> Self {
        Self {
            registry,
            key,
            name,
            tags,
            values: BTreeMap::new(),
        }
    }

    /// Declare an integer statistic
    pub fn declare_int(self, name: &str, initial: i64) -> Result<Self> {
        self.declare(name, StatValue::Int(initial))
    }

    /// Declare a float statistic
    pub fn declare_float(self, name: &str, initial: f64) -> Result<Self> {
        self.declare(name, StatValue::Float(initial))
    }

    /// Declare a string statistic
    pub fn declare_string(self, name: &str, initial: impl Into<String>) -> Result<Self> {
        self.declare(name, StatValue::Str(initial.into()))
    }

    fn declare(mut self, name: &str, initial: StatValue) -> Result<Self> {
        if self.values.contains_key(name) {
            return Err(CacheError::StatAlreadyDeclared(name.to_string()));
        }
        self.values.insert(name.to_string(), initial);
        Ok(self)
    }

    /// Always `Declared`; the builder is consumed on open
    pub fn state(&self) -> Lifecycle {
        Lifecycle::Declared
    }

    /// Register the set and return the recorder that owns it
    pub fn open(self) -> Recorder {
        let set = Arc::new(StatsSet {
            key: self.key,
            name: self.name,
            tags: self.tags,
            inner: RwLock::new(SetInner {
                state: Lifecycle::Open,
                values: self.values,
            }),
        });
        self.registry.register(Arc::clone(&set));
        Recorder { set }
    }
}

/// Owner-side handle used to update an open statistics set.
///
/// Dropping the recorder closes the set.
pub struct Recorder {
    set: Arc<StatsSet>,
}

impl Recorder {
    pub fn key(&self) -> &str {
        &self.set.key
    }

    pub fn state(&self) -> Lifecycle {
        self.set.inner.read().state
    }

    /// Set a level integer statistic
    pub fn set_int(&self, name: &str, value: i64) -> Result<()> {
        self.update(name, |v| match v {
            StatValue::Int(i) => {
                *i = value;
                true
            }
            _ => false,
        })
    }

    /// Add to a counter integer statistic
    pub fn add_int(&self, name: &str, delta: i64) -> Result<()> {
        self.update(name, |v| match v {
            StatValue::Int(i) => {
                *i = i.wrapping_add(delta);
                true
            }
            _ => false,
        })
    }

    /// Set a level float statistic
    pub fn set_float(&self, name: &str, value: f64) -> Result<()> {
        self.update(name, |v| match v {
            StatValue::Float(f) => {
                *f = value;
                true
            }
            _ => false,
        })
    }

    /// Add to a counter float statistic
    pub fn add_float(&self, name: &str, delta: f64) -> Result<()> {
        self.update(name, |v| match v {
            StatValue::Float(f) => {
                *f += delta;
                true
            }
            _ => false,
        })
    }

    /// Set a string statistic
    pub fn set_string(&self, name: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        self.update(name, |v| match v {
            StatValue::Str(s) => {
                *s = value;
                true
            }
            _ => false,
        })
    }

    /// Current values of this set
    pub fn snapshot(&self) -> StatsSnapshot {
        self.set.snapshot()
    }

    /// Close the set. Further updates fail with `StatsClosed`.
    pub fn close(&self) {
        self.set.inner.write().state = Lifecycle::Closed;
    }

    fn update<F>(&self, name: &str, apply: F) -> Result<()>
    where
        F: FnOnce(&mut StatValue) -> bool,
    {
        let mut inner = self.set.inner.write();
        if inner.state == Lifecycle::Closed {
            return Err(CacheError::StatsClosed(self.set.key.clone()));
        }

        let value = inner
            .values
            .get_mut(name)
            .ok_or_else(|| CacheError::StatNotDeclared(name.to_string()))?;
        let declared = value.type_name();
        if apply(value) {
            Ok(())
        } else {
            Err(CacheError::StatTypeMismatch {
                name: name.to_string(),
                declared,
            })
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.close();
    }
}
