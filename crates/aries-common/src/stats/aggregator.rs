// ============================================
// File: crates/aries-common/src/stats/aggregator.rs
// ============================================
//! # Statistics Aggregator
//!
//! ## Creation Reason
//! Folds raw facts from every registered collector into a rolling,
//! time-bucketed table that can be queried by dimension.
//!
//! ## Main Functionality
//! - `StatisticsAggregator::digest`: drain collectors, group, merge, purge
//! - `StatisticsAggregator::query`: select, re-key, merge
//! - `start_digest` / `stop_digest`: tokio interval task lifetime
//!
//! ## Main Logical Flow
//! 1. Drain every collector into one batch
//! 2. Group by `(statistic, timestamp rounded up to granularity)`
//! 3. Build min/max/sum/count/average per group
//! 4. Merge each group into the table entry with the same key
//! 5. Drop entries whose bucket is older than `now - retention`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Min, max, sum and count merge exactly. The average depends on
//!   `AverageMode`: `Weighted` is the true running mean, `Unweighted` is the
//!   legacy `(a + b) / 2` that drifts under uneven batch sizes. Only pick
//!   `Unweighted` when comparing against historical data produced that way
//! - The table lock is held for the merge and purge only, never while
//!   draining collectors
//! - The digest task holds a `Weak` reference; dropping the last `Arc`
//!   ends the task even without `stop_digest`
//!
//! ## Last Modified
//! v0.1.0 - Initial aggregator

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::collector::StatisticsCollector;
use super::query::StatisticsQuery;
use super::statistic::Statistic;
use crate::error::{CommonError, Result};
use crate::time::Timestamp;

/// Default bucket width for ingested facts.
pub const DEFAULT_GRANULARITY: Duration = Duration::from_secs(30);

/// Default age after which buckets are purged.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Default period of the digest timer.
pub const DEFAULT_DIGEST_INTERVAL: Duration = Duration::from_secs(10);

type AggregationKey = (Statistic, Timestamp);

// ============================================
// Configuration
// ============================================

/// How two averages are combined when aggregations merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AverageMode {
    /// Count-weighted running mean.
    #[default]
    Weighted,
    /// Legacy `(a + b) / 2`.
    Unweighted,
}

/// Aggregator tuning.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Bucket width for ingested facts.
    pub granularity: Duration,
    /// Buckets older than this are purged after each digest.
    pub retention: Duration,
    /// Period of the digest timer.
    pub digest_interval: Duration,
    /// Average merge rule.
    pub average_mode: AverageMode,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            granularity: DEFAULT_GRANULARITY,
            retention: DEFAULT_RETENTION,
            digest_interval: DEFAULT_DIGEST_INTERVAL,
            average_mode: AverageMode::default(),
        }
    }
}

// ============================================
// StatisticAggregation
// ============================================

/// Summary of every fact seen for one statistic in one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct StatisticAggregation {
    /// Statistic identity.
    pub statistic: Statistic,
    /// Bucket end (timestamp rounded up to the granularity).
    pub timestamp: Timestamp,
    /// Smallest value.
    pub min: f64,
    /// Largest value.
    pub max: f64,
    /// Sum of values.
    pub sum: f64,
    /// Number of values.
    pub count: u64,
    /// Mean value, see [`AverageMode`].
    pub average: f64,
}

impl StatisticAggregation {
    /// Builds an aggregation from one batch of values.
    ///
    /// `values` must not be empty.
    fn from_values(statistic: Statistic, timestamp: Timestamp, values: &[f64]) -> Self {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &value in values {
            min = min.min(value);
            max = max.max(value);
            sum += value;
        }
        let count = values.len() as u64;
        Self {
            statistic,
            timestamp,
            min,
            max,
            sum,
            count,
            average: if count == 0 { 0.0 } else { sum / count as f64 },
        }
    }

    /// Merges `other` into `self`.
    pub fn merge(&mut self, other: &Self, mode: AverageMode) {
        self.average = match mode {
            AverageMode::Weighted => {
                let total = self.count + other.count;
                if total == 0 {
                    0.0
                } else {
                    (self.average * self.count as f64 + other.average * other.count as f64)
                        / total as f64
                }
            }
            AverageMode::Unweighted => (self.average + other.average) / 2.0,
        };
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    fn rekeyed(mut self, statistic: Statistic, timestamp: Timestamp) -> Self {
        self.statistic = statistic;
        self.timestamp = timestamp;
        self
    }
}

// ============================================
// StatisticsAggregator
// ============================================

struct DigestTask {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Time-bucketed aggregation table fed by registered collectors.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use aries_common::stats::{Statistic, StatisticsAggregator, StatisticsCollector};
///
/// let aggregator = StatisticsAggregator::default();
/// let collector = Arc::new(StatisticsCollector::new());
/// aggregator.register_collector(Arc::clone(&collector));
///
/// collector.collect(&Statistic::metric("SessionOpened"), 1.0);
/// assert_eq!(aggregator.digest(), 1);
/// assert_eq!(aggregator.len(), 1);
/// ```
pub struct StatisticsAggregator {
    config: AggregatorConfig,
    collectors: RwLock<Vec<Arc<StatisticsCollector>>>,
    table: Mutex<HashMap<AggregationKey, StatisticAggregation>>,
    digest_task: Mutex<Option<DigestTask>>,
}

impl StatisticsAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            collectors: RwLock::new(Vec::new()),
            table: Mutex::new(HashMap::new()),
            digest_task: Mutex::new(None),
        }
    }

    /// Returns the aggregator configuration.
    #[must_use]
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Adds a collector to be drained on every digest.
    pub fn register_collector(&self, collector: Arc<StatisticsCollector>) {
        self.collectors.write().push(collector);
    }

    /// Number of registered collectors.
    #[must_use]
    pub fn collector_count(&self) -> usize {
        self.collectors.read().len()
    }

    /// Runs one digest pass against the current time.
    ///
    /// Returns the number of facts drained.
    pub fn digest(&self) -> usize {
        self.digest_at(Timestamp::now())
    }

    /// Runs one digest pass, purging relative to `now`.
    pub fn digest_at(&self, now: Timestamp) -> usize {
        let collectors: Vec<Arc<StatisticsCollector>> = self.collectors.read().clone();
        let facts: Vec<_> = collectors.iter().flat_map(|c| c.drain()).collect();
        let drained = facts.len();

        let mut groups: HashMap<AggregationKey, Vec<f64>> = HashMap::new();
        for fact in facts {
            let bucket = fact.timestamp.round_up(self.config.granularity);
            groups
                .entry((fact.statistic, bucket))
                .or_default()
                .push(fact.value);
        }

        let mut table = self.table.lock();
        for ((statistic, bucket), values) in groups {
            let batch = StatisticAggregation::from_values(statistic.clone(), bucket, &values);
            match table.entry((statistic, bucket)) {
                Entry::Occupied(mut existing) => {
                    existing.get_mut().merge(&batch, self.config.average_mode);
                }
                Entry::Vacant(slot) => {
                    slot.insert(batch);
                }
            }
        }
        let purged = Self::purge_locked(&mut table, now, self.config.retention);
        drop(table);

        trace!(drained, purged, "Statistics digest complete");
        drained
    }

    /// Removes buckets older than the retention window relative to `now`.
    ///
    /// Returns the number of buckets removed.
    pub fn purge_at(&self, now: Timestamp) -> usize {
        let mut table = self.table.lock();
        Self::purge_locked(&mut table, now, self.config.retention)
    }

    fn purge_locked(
        table: &mut HashMap<AggregationKey, StatisticAggregation>,
        now: Timestamp,
        retention: Duration,
    ) -> usize {
        let cutoff = now.saturating_sub(retention);
        let before = table.len();
        table.retain(|(_, bucket), _| *bucket >= cutoff);
        before - table.len()
    }

    /// Answers a dimensional query.
    ///
    /// Rows are ordered by bucket, then by statistic key.
    ///
    /// # Errors
    /// Returns `CommonError::InvalidInput` if the query fails validation.
    pub fn query(&self, query: &StatisticsQuery) -> Result<Vec<StatisticAggregation>> {
        query.validate()?;

        let mut selected: Vec<StatisticAggregation> = self
            .table
            .lock()
            .values()
            .filter(|agg| query.matches(&agg.statistic, agg.timestamp))
            .cloned()
            .collect();
        // Unweighted merges depend on order; merge oldest first.
        selected.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.statistic.cmp(&b.statistic))
        });

        let mut groups: HashMap<AggregationKey, StatisticAggregation> = HashMap::new();
        for agg in selected {
            let statistic = query.project(&agg.statistic);
            let bucket = agg.timestamp.round_up(query.granularity());
            match groups.entry((statistic.clone(), bucket)) {
                Entry::Occupied(mut existing) => {
                    existing.get_mut().merge(&agg, self.config.average_mode);
                }
                Entry::Vacant(slot) => {
                    slot.insert(agg.rekeyed(statistic, bucket));
                }
            }
        }

        let mut rows: Vec<_> = groups.into_values().collect();
        rows.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.statistic.cmp(&b.statistic))
        });
        Ok(rows)
    }

    /// Point-in-time copy of every stored aggregation.
    #[must_use]
    pub fn aggregations(&self) -> Vec<StatisticAggregation> {
        self.table.lock().values().cloned().collect()
    }

    /// Number of stored aggregations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Spawns the periodic digest task on the current tokio runtime.
    ///
    /// # Errors
    /// `CommonError::InvalidState` if the task is already running.
    pub fn start_digest(self: &Arc<Self>) -> Result<()> {
        let mut slot = self.digest_task.lock();
        if slot.is_some() {
            return Err(CommonError::invalid_state("digest stopped", "digest running"));
        }

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let weak: Weak<Self> = Arc::downgrade(self);
        let period = self.config.digest_interval;

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        debug!("Digest task received shutdown signal");
                        break;
                    }
                    _ = timer.tick() => {
                        let Some(aggregator) = weak.upgrade() else { break };
                        aggregator.digest();
                    }
                }
            }
        });

        *slot = Some(DigestTask {
            shutdown_tx,
            handle,
        });
        debug!(interval_ms = period.as_millis() as u64, "Digest task started");
        Ok(())
    }

    /// Stops the digest task and waits for it to finish.
    ///
    /// No-op if the task is not running.
    pub async fn stop_digest(&self) {
        let task = self.digest_task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown_tx.send(());
            let _ = task.handle.await;
            debug!("Digest task stopped");
        }
    }

    /// Returns `true` while the digest task is running.
    #[must_use]
    pub fn is_digesting(&self) -> bool {
        self.digest_task.lock().is_some()
    }
}

impl Default for StatisticsAggregator {
    fn default() -> Self {
        Self::new(AggregatorConfig::default())
    }
}

impl fmt::Debug for StatisticsAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatisticsAggregator")
            .field("config", &self.config)
            .field("collectors", &self.collector_count())
            .field("aggregations", &self.len())
            .field("digesting", &self.is_digesting())
            .finish()
    }
}
