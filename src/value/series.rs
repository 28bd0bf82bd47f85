//! Value series
//!
//! Ordered, timestamp-unique sequence of values for one key.

use std::ops::Deref;

use super::{Value, ValueType};

/// An ordered series of values for one key.
///
/// Invariant: sorted strictly ascending by timestamp, at most one value per
/// timestamp. Every constructor and merge re-establishes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    inner: Vec<Value>,
}

impl Values {
    /// Create an empty series
    pub fn new() -> Self {
        Self { inner: Vec::new() }
    }

    /// Build a series from values in arbitrary order.
    ///
    /// Later elements win over earlier ones that share a timestamp.
    pub fn from_unsorted(values: Vec<Value>) -> Self {
        Self {
            inner: deduplicate(values),
        }
    }

    /// Merge `incoming` over this series and return the result.
    ///
    /// `self` is left untouched; on equal timestamps the incoming value wins,
    /// and within `incoming` the later element wins.
    pub fn merged(&self, incoming: Vec<Value>) -> Values {
        let incoming = deduplicate(incoming);
        if self.inner.is_empty() {
            return Values { inner: incoming };
        }
        if incoming.is_empty() {
            return self.clone();
        }

        let mut out = Vec::with_capacity(self.inner.len() + incoming.len());
        let mut existing = self.inner.iter().peekable();
        let mut incoming = incoming.into_iter().peekable();

        loop {
            match (existing.peek(), incoming.peek()) {
                (Some(old), Some(new)) => {
                    if old.unix_nano() < new.unix_nano() {
                        out.push((*old).clone());
                        existing.next();
                    } else if old.unix_nano() > new.unix_nano() {
                        out.extend(incoming.next());
                    } else {
                        existing.next();
                        out.extend(incoming.next());
                    }
                }
                (Some(_), None) => {
                    out.extend(existing.cloned());
                    break;
                }
                (None, Some(_)) => {
                    out.extend(incoming);
                    break;
                }
                (None, None) => break,
            }
        }

        Values { inner: out }
    }

    /// Merge `incoming` into this series in place
    pub fn merge(&mut self, incoming: Vec<Value>) {
        *self = self.merged(incoming);
    }

    /// Sum of `Value::size()` over the series
    pub fn size(&self) -> usize {
        self.inner.iter().map(Value::size).sum()
    }

    /// Earliest timestamp, if any
    pub fn min_time(&self) -> Option<i64> {
        self.inner.first().map(Value::unix_nano)
    }

    /// Latest timestamp, if any
    pub fn max_time(&self) -> Option<i64> {
        self.inner.last().map(Value::unix_nano)
    }

    /// Values with `min <= t <= max`
    pub fn include(&self, min: i64, max: i64) -> Values {
        Values {
            inner: self
                .inner
                .iter()
                .filter(|v| v.unix_nano() >= min && v.unix_nano() <= max)
                .cloned()
                .collect(),
        }
    }

    /// Values outside `min <= t <= max`
    pub fn exclude(&self, min: i64, max: i64) -> Values {
        Values {
            inner: self
                .inner
                .iter()
                .filter(|v| v.unix_nano() < min || v.unix_nano() > max)
                .cloned()
                .collect(),
        }
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.inner
    }

    pub fn into_vec(self) -> Vec<Value> {
        self.inner
    }
}

impl Deref for Values {
    type Target = [Value];

    fn deref(&self) -> &[Value] {
        &self.inner
    }
}

impl From<Vec<Value>> for Values {
    fn from(values: Vec<Value>) -> Self {
        Values::from_unsorted(values)
    }
}

impl FromIterator<Value> for Values {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Values::from_unsorted(iter.into_iter().collect())
    }
}

impl IntoIterator for Values {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'a> IntoIterator for &'a Values {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

/// First pair of differing payload types in `values`, if any
pub fn mixed_types(values: &[Value]) -> Option<(ValueType, ValueType)> {
    let first = values.first()?.value_type();
    values
        .iter()
        .map(Value::value_type)
        .find(|t| *t != first)
        .map(|t| (first, t))
}

/// Sort ascending by timestamp, keeping the last occurrence of each timestamp.
fn deduplicate(mut values: Vec<Value>) -> Vec<Value> {
    if values.len() < 2 {
        return values;
    }

    // Fast path: already strictly ascending.
    if values.windows(2).all(|w| w[0].unix_nano() < w[1].unix_nano()) {
        return values;
    }

    // Stable sort keeps insertion order among equal timestamps.
    values.sort_by_key(Value::unix_nano);

    let mut out: Vec<Value> = Vec::with_capacity(values.len());
    for v in values {
        match out.last_mut() {
            Some(last) if last.unix_nano() == v.unix_nano() => *last = v,
            _ => out.push(v),
        }
    }
    out
}
