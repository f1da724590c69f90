// ============================================
// File: crates/aries-common/src/stats/query.rs
// ============================================
//! # Statistics Query
//!
//! ## Main Functionality
//! Describes which aggregations to select and how to regroup them:
//! - metric name (exact)
//! - dimension filter, where a value of [`WILDCARD`] groups by every
//!   observed value of that dimension
//! - inclusive time range
//! - target granularity for re-bucketing
//!
//! ## ⚠️ Important Note for Next Developer
//! - A dimension named in the filter must exist on the statistic, even
//!   for a wildcard. Dimensions NOT named are collapsed away
//! - An empty filter groups by metric name only
//!
//! ## Last Modified
//! v0.1.0 - Initial query model

use std::collections::BTreeMap;
use std::time::Duration;

use super::statistic::Statistic;
use crate::error::{CommonError, Result};
use crate::time::Timestamp;

/// Dimension value that matches anything and groups by the observed value.
pub const WILDCARD: &str = "*";

/// Dimensional query over the aggregation table.
///
/// # Example
/// ```
/// use aries_common::stats::StatisticsQuery;
/// use aries_common::time::Timestamp;
/// use std::time::Duration;
///
/// let query = StatisticsQuery::new(
///     "SessionOpened",
///     Timestamp::from_secs(0),
///     Timestamp::now(),
///     Duration::from_secs(300),
/// )
/// .dimension("Host", "*");
/// assert!(query.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct StatisticsQuery {
    metric: String,
    dimensions: BTreeMap<String, String>,
    start: Timestamp,
    end: Timestamp,
    granularity: Duration,
}

impl StatisticsQuery {
    /// Creates a query for `metric` over `[start, end]`.
    pub fn new(
        metric: impl Into<String>,
        start: Timestamp,
        end: Timestamp,
        granularity: Duration,
    ) -> Self {
        Self {
            metric: metric.into(),
            dimensions: BTreeMap::new(),
            start,
            end,
            granularity,
        }
    }

    /// Adds a dimension filter. Use [`WILDCARD`] to group by observed values.
    #[must_use]
    pub fn dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(name.into(), value.into());
        self
    }

    /// Metric name being queried.
    #[must_use]
    pub fn metric(&self) -> &str {
        &self.metric
    }

    /// Target bucket width.
    #[must_use]
    pub const fn granularity(&self) -> Duration {
        self.granularity
    }

    /// Checks the query is answerable.
    ///
    /// # Errors
    /// `CommonError::InvalidInput` for a zero granularity or an inverted range.
    pub fn validate(&self) -> Result<()> {
        if self.granularity.is_zero() {
            return Err(CommonError::invalid_input(
                "granularity",
                "must be greater than zero",
            ));
        }
        if self.start > self.end {
            return Err(CommonError::invalid_input(
                "range",
                "start must not be after end",
            ));
        }
        Ok(())
    }

    /// Returns `true` if an aggregation for `statistic` at `timestamp` is selected.
    #[must_use]
    pub fn matches(&self, statistic: &Statistic, timestamp: Timestamp) -> bool {
        if statistic.name() != self.metric {
            return false;
        }
        if timestamp < self.start || timestamp > self.end {
            return false;
        }
        self.dimensions.iter().all(|(name, wanted)| {
            statistic
                .dimension(name)
                .is_some_and(|actual| wanted == WILDCARD || wanted == actual)
        })
    }

    /// Builds the grouping identity for a matched statistic.
    ///
    /// Keeps only the filtered dimensions, substituting observed values for
    /// wildcards.
    #[must_use]
    pub fn project(&self, statistic: &Statistic) -> Statistic {
        let dimensions = self
            .dimensions
            .iter()
            .map(|(name, wanted)| {
                let value = if wanted == WILDCARD {
                    statistic.dimension(name).unwrap_or(WILDCARD).to_string()
                } else {
                    wanted.clone()
                };
                (name.clone(), value)
            })
            .collect();
        Statistic::from_parts(self.metric.clone(), dimensions)
    }
}
