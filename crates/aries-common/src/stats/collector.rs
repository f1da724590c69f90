// ============================================
// File: crates/aries-common/src/stats/collector.rs
// ============================================
//! # Statistics Collector
//!
//! ## Creation Reason
//! Producers on I/O tasks record facts concurrently while exactly one
//! digest pass drains them. A fixed-capacity lock-free queue gives O(1)
//! non-blocking enqueue with a hard memory ceiling.
//!
//! ## ⚠️ Important Note for Next Developer
//! - A full queue drops the new fact. This is load shedding, not an error;
//!   the `dropped()` counter exists for diagnostics only
//! - `drain()` pops at most `capacity` facts per call, so a producer that
//!   keeps pace cannot pin the digest in an endless loop
//!
//! ## Last Modified
//! v0.1.0 - Initial collector

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_queue::ArrayQueue;

use super::statistic::{Statistic, StatisticFact};
use crate::time::Timestamp;

/// Default number of facts held before new ones are dropped.
pub const DEFAULT_COLLECTOR_CAPACITY: usize = 10_000;

/// Bounded concurrent fact queue.
///
/// # Example
/// ```
/// use aries_common::stats::{Statistic, StatisticsCollector};
///
/// let collector = StatisticsCollector::with_capacity(2);
/// let stat = Statistic::metric("MessageReceived");
/// collector.collect(&stat, 1.0);
/// collector.collect(&stat, 1.0);
/// collector.collect(&stat, 1.0); // dropped
///
/// assert_eq!(collector.drain().len(), 2);
/// assert_eq!(collector.dropped(), 1);
/// ```
pub struct StatisticsCollector {
    queue: ArrayQueue<StatisticFact>,
    dropped: AtomicU64,
}

impl StatisticsCollector {
    /// Creates a collector with [`DEFAULT_COLLECTOR_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_COLLECTOR_CAPACITY)
    }

    /// Creates a collector holding at most `capacity` facts.
    ///
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            dropped: AtomicU64::new(0),
        }
    }

    /// Records `value` for `statistic` at the current time.
    pub fn collect(&self, statistic: &Statistic, value: f64) {
        self.collect_at(statistic, value, Timestamp::now());
    }

    /// Records `value` for `statistic` at an explicit time.
    pub fn collect_at(&self, statistic: &Statistic, value: f64, timestamp: Timestamp) {
        let fact = StatisticFact::new(statistic.clone(), timestamp, value);
        if self.queue.push(fact).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Removes and returns up to `capacity` queued facts.
    #[must_use]
    pub fn drain(&self) -> Vec<StatisticFact> {
        let limit = self.queue.capacity();
        let mut facts = Vec::with_capacity(self.queue.len().min(limit));
        while facts.len() < limit {
            match self.queue.pop() {
                Some(fact) => facts.push(fact),
                None => break,
            }
        }
        facts
    }

    /// Number of queued facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Maximum number of queued facts.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Total facts dropped because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Default for StatisticsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StatisticsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatisticsCollector")
            .field("len", &self.queue.len())
            .field("capacity", &self.queue.capacity())
            .field("dropped", &self.dropped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_overflow_keeps_exactly_capacity() {
        let collector = StatisticsCollector::with_capacity(100);
        let stat = Statistic::metric("MessageReceived");

        for i in 0..250 {
            collector.collect(&stat, f64::from(i));
        }

        let facts = collector.drain();
        assert_eq!(facts.len(), 100);
        assert_eq!(collector.dropped(), 150);
        assert!(collector.is_empty());

        // The oldest facts survive, the overflow is what got dropped.
        assert!((facts[0].value - 0.0).abs() < f64::EPSILON);
        assert!((facts[99].value - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_drain_empty() {
        let collector = StatisticsCollector::new();
        assert!(collector.drain().is_empty());
        assert_eq!(collector.capacity(), DEFAULT_COLLECTOR_CAPACITY);
    }

    #[test]
    fn test_accepts_again_after_drain() {
        let collector = StatisticsCollector::with_capacity(1);
        let stat = Statistic::metric("SessionOpened");

        collector.collect(&stat, 1.0);
        collector.collect(&stat, 1.0);
        assert_eq!(collector.drain().len(), 1);

        collector.collect(&stat, 1.0);
        assert_eq!(collector.len(), 1);
    }

    #[test]
    fn test_concurrent_producers() {
        let collector = Arc::new(StatisticsCollector::with_capacity(10_000));
        let stat = Statistic::metric("MessageSent");

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let collector = Arc::clone(&collector);
                let stat = stat.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        collector.collect(&stat, 1.0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(collector.drain().len(), 4_000);
        assert_eq!(collector.dropped(), 0);
    }
}
