// ============================================
// File: crates/aries-common/src/stats/mod.rs
// ============================================
//! # Statistics Pipeline
//!
//! ## Creation Reason
//! Operational counters (messages in/out, sessions opened/closed) are
//! recorded on the hot path of every connection. Recording must never
//! block, so facts go into a bounded queue and a timer-driven digest
//! folds them into time buckets off the message path.
//!
//! ## Main Functionality
//! - [`Statistic`]: Immutable metric identity (name + dimensions)
//! - [`StatisticsCollector`]: Bounded, lock-free fact queue
//! - [`StatisticsAggregator`]: Time-bucketed aggregation table with digest timer
//! - [`StatisticsQuery`]: Dimensional query with `*` wildcards
//!
//! ## Main Logical Flow
//! ```text
//! hot path ──collect()──► Collector (ArrayQueue, drop on full)
//!                               │
//!            digest timer ──────┘ drain()
//!                               ▼
//!                 Aggregator table[(statistic, bucket)]
//!                     merge ─► purge(retention)
//!                               │
//!                    query() ◄──┘ re-key by query granularity
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never make `collect()` wait; dropping facts under pressure is expected
//! - Aggregations are keyed by `(Statistic, bucket)` where bucket is the
//!   fact time rounded UP to the granularity
//!
//! ## Last Modified
//! v0.1.0 - Initial statistics pipeline

mod aggregator;
mod collector;
mod query;
mod statistic;

pub use aggregator::{
    AggregatorConfig, AverageMode, StatisticAggregation, StatisticsAggregator,
    DEFAULT_DIGEST_INTERVAL, DEFAULT_GRANULARITY, DEFAULT_RETENTION,
};
pub use collector::{StatisticsCollector, DEFAULT_COLLECTOR_CAPACITY};
pub use query::{StatisticsQuery, WILDCARD};
pub use statistic::{Statistic, StatisticFact};
