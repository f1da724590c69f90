// ============================================
// File: crates/aries-common/src/stats/statistic.rs
// ============================================
//! # Statistic Identity
//!
//! ## Main Functionality
//! - `Statistic`: metric name plus an unordered set of dimensions
//! - `StatisticFact`: one observed sample of a statistic
//!
//! ## ⚠️ Important Note for Next Developer
//! - Equality, ordering and hashing use the name and the dimension map.
//!   The map is a `BTreeMap`, so dimension insertion order never matters
//! - The key string `name;k=v;k=v;` is for display only; names or values
//!   containing `;` or `=` can render the same key for different statistics
//!
//! ## Last Modified
//! v0.1.0 - Initial statistic model

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::time::Timestamp;

#[derive(Debug)]
struct StatisticInner {
    name: String,
    dimensions: BTreeMap<String, String>,
    key: String,
}

/// Immutable metric identity.
///
/// Cloning is a reference-count increment; statistics are created once and
/// shared by every producer that records against them.
///
/// # Example
/// ```
/// use aries_common::stats::Statistic;
///
/// let a = Statistic::new("MessageReceived", [("Host", "city-1"), ("Kind", "tcp")]);
/// let b = Statistic::new("MessageReceived", [("Kind", "tcp"), ("Host", "city-1")]);
/// assert_eq!(a, b);
/// assert_eq!(a.key(), "MessageReceived;Host=city-1;Kind=tcp;");
/// ```
#[derive(Clone)]
pub struct Statistic {
    inner: Arc<StatisticInner>,
}

impl Statistic {
    /// Creates a statistic from a name and any iterable of dimension pairs.
    pub fn new<I, K, V>(name: impl Into<String>, dimensions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let dimensions = dimensions
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::from_parts(name.into(), dimensions)
    }

    /// Creates a statistic without dimensions.
    pub fn metric(name: impl Into<String>) -> Self {
        Self::from_parts(name.into(), BTreeMap::new())
    }

    pub(crate) fn from_parts(name: String, dimensions: BTreeMap<String, String>) -> Self {
        let mut key = String::with_capacity(name.len() + 1 + dimensions.len() * 16);
        key.push_str(&name);
        key.push(';');
        for (k, v) in &dimensions {
            key.push_str(k);
            key.push('=');
            key.push_str(v);
            key.push(';');
        }
        Self {
            inner: Arc::new(StatisticInner {
                name,
                dimensions,
                key,
            }),
        }
    }

    /// Metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// All dimensions, sorted by name.
    #[must_use]
    pub fn dimensions(&self) -> &BTreeMap<String, String> {
        &self.inner.dimensions
    }

    /// Value of a single dimension.
    #[must_use]
    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.inner.dimensions.get(name).map(String::as_str)
    }

    /// Canonical identity string.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.inner.key
    }
}

impl PartialEq for Statistic {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
            || (self.inner.name == other.inner.name
                && self.inner.dimensions == other.inner.dimensions)
    }
}

impl Eq for Statistic {}

impl Hash for Statistic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.name.hash(state);
        self.inner.dimensions.hash(state);
    }
}

impl PartialOrd for Statistic {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Statistic {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.inner
            .name
            .cmp(&other.inner.name)
            .then_with(|| self.inner.dimensions.cmp(&other.inner.dimensions))
    }
}

impl fmt::Debug for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Statistic({})", self.inner.key)
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.key)
    }
}

/// One observed sample.
#[derive(Debug, Clone)]
pub struct StatisticFact {
    /// What was observed.
    pub statistic: Statistic,
    /// When it was observed.
    pub timestamp: Timestamp,
    /// Observed value.
    pub value: f64,
}

impl StatisticFact {
    /// Creates a new fact.
    #[must_use]
    pub fn new(statistic: Statistic, timestamp: Timestamp, value: f64) -> Self {
        Self {
            statistic,
            timestamp,
            value,
        }
    }
}
