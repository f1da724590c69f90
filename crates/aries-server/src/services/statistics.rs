// ============================================
// File: crates/aries-server/src/services/statistics.rs
// ============================================
//! # Per-Instance Statistics
//!
//! ## Main Functionality
//! - `AriesStatistics`: the four hot-path counters of one server instance,
//!   each tagged `Host = <call sign>`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every counter is a single enqueue into the collector. It never blocks
//!   and silently drops when the collector is full
//! - The collector must be registered with the server's aggregator or the
//!   facts are never digested
//!
//! ## Last Modified
//! v0.1.0 - Initial statistics counters

use std::sync::Arc;

use aries_common::stats::{Statistic, StatisticsCollector};

/// Metric name: a message was decoded from a client.
pub const MESSAGE_RECEIVED: &str = "MessageReceived";
/// Metric name: a message was written to a client.
pub const MESSAGE_SENT: &str = "MessageSent";
/// Metric name: a session was opened.
pub const SESSION_OPENED: &str = "SessionOpened";
/// Metric name: a session was closed.
pub const SESSION_CLOSED: &str = "SessionClosed";
/// Dimension carrying the server call sign.
pub const HOST_DIMENSION: &str = "Host";

/// Hot-path counters for one server instance.
#[derive(Debug, Clone)]
pub struct AriesStatistics {
    collector: Arc<StatisticsCollector>,
    message_received: Statistic,
    message_sent: Statistic,
    session_opened: Statistic,
    session_closed: Statistic,
}

impl AriesStatistics {
    /// Creates the counters for `call_sign`, feeding `collector`.
    #[must_use]
    pub fn new(call_sign: &str, collector: Arc<StatisticsCollector>) -> Self {
        let stat = |name: &str| Statistic::new(name, [(HOST_DIMENSION, call_sign)]);
        Self {
            message_received: stat(MESSAGE_RECEIVED),
            message_sent: stat(MESSAGE_SENT),
            session_opened: stat(SESSION_OPENED),
            session_closed: stat(SESSION_CLOSED),
            collector,
        }
    }

    #[must_use]
    pub fn collector(&self) -> &Arc<StatisticsCollector> {
        &self.collector
    }

    pub fn message_received(&self) {
        self.collector.collect(&self.message_received, 1.0);
    }

    pub fn message_sent(&self) {
        self.collector.collect(&self.message_sent, 1.0);
    }

    pub fn session_opened(&self) {
        self.collector.collect(&self.session_opened, 1.0);
    }

    pub fn session_closed(&self) {
        self.collector.collect(&self.session_closed, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use aries_common::stats::{AggregatorConfig, StatisticsAggregator, StatisticsQuery, WILDCARD};
    use aries_common::time::Timestamp;

    #[test]
    fn test_counters_tagged_with_host() {
        let collector = Arc::new(StatisticsCollector::with_capacity(16));
        let stats = AriesStatistics::new("city-1", Arc::clone(&collector));

        stats.session_opened();
        stats.message_received();
        stats.message_received();
        stats.message_sent();
        stats.session_closed();

        let facts = collector.drain();
        assert_eq!(facts.len(), 5);
        assert!(facts
            .iter()
            .all(|f| f.statistic.dimension(HOST_DIMENSION) == Some("city-1")));
        assert_eq!(
            facts
                .iter()
                .filter(|f| f.statistic.name() == MESSAGE_RECEIVED)
                .count(),
            2
        );
    }

    #[test]
    fn test_counters_digest_per_host() {
        let aggregator = StatisticsAggregator::new(AggregatorConfig::default());
        for call_sign in ["city-1", "city-2"] {
            let collector = Arc::new(StatisticsCollector::with_capacity(16));
            aggregator.register_collector(Arc::clone(&collector));
            let stats = AriesStatistics::new(call_sign, collector);
            stats.message_received();
            stats.message_received();
        }
        aggregator.digest();

        let now = Timestamp::now();
        let query = StatisticsQuery::new(
            MESSAGE_RECEIVED,
            now.saturating_sub(Duration::from_secs(3600)),
            now.saturating_add(Duration::from_secs(3600)),
            Duration::from_secs(3600),
        )
        .dimension(HOST_DIMENSION, WILDCARD);

        let rows = aggregator.query(&query).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.count == 2 && (r.sum - 2.0).abs() < f64::EPSILON));
    }
}
