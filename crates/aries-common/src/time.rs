// ============================================
// File: crates/aries-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! The statistics pipeline buckets facts into fixed time windows and the
//! transport layer tracks per-connection activity. Both need a clock
//! representation that is cheap to copy and safe to share.
//!
//! ## Main Functionality
//! - `AtomicInstant`: Thread-safe wrapper around `Instant`
//! - `Timestamp`: Unix time in milliseconds with bucket rounding
//! - `unix_timestamp_millis`: Wall-clock helper
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Timestamp::round_up` rounds UP to the next bucket boundary; a value
//!   already on a boundary stays where it is. Aggregated rows and query
//!   ranges both depend on this, do not switch it to floor
//! - `AtomicInstant` stores nanoseconds since process start in an `AtomicU64`
//!
//! ## Last Modified
//! v0.1.0 - Millisecond timestamps with granularity rounding

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ============================================
// AtomicInstant
// ============================================

/// Thread-safe wrapper around [`Instant`] for concurrent access.
///
/// Stores nanoseconds elapsed since a process-wide reference instant.
///
/// # Example
/// ```
/// use aries_common::time::AtomicInstant;
/// use std::time::Instant;
///
/// let atomic = AtomicInstant::now();
/// atomic.store(Instant::now());
/// assert!(atomic.elapsed().as_secs() < 1);
/// ```
#[derive(Debug)]
pub struct AtomicInstant {
    nanos: AtomicU64,
}

impl AtomicInstant {
    fn reference() -> Instant {
        use std::sync::OnceLock;
        static REFERENCE: OnceLock<Instant> = OnceLock::new();
        *REFERENCE.get_or_init(Instant::now)
    }

    fn offset_of(instant: Instant) -> u64 {
        instant
            .checked_duration_since(Self::reference())
            .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }

    /// Creates a new `AtomicInstant` set to the current time.
    #[must_use]
    pub fn now() -> Self {
        Self {
            nanos: AtomicU64::new(Self::offset_of(Instant::now())),
        }
    }

    /// Loads the stored instant.
    #[must_use]
    pub fn load(&self) -> Instant {
        Self::reference() + Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }

    /// Stores a new instant.
    pub fn store(&self, instant: Instant) {
        self.nanos.store(Self::offset_of(instant), Ordering::Relaxed);
    }

    /// Updates to the current time.
    pub fn touch(&self) {
        self.store(Instant::now());
    }

    /// Returns the elapsed time since the stored instant.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.load().elapsed()
    }
}

impl Default for AtomicInstant {
    fn default() -> Self {
        Self::now()
    }
}

// ============================================
// Timestamp
// ============================================

/// Unix time in milliseconds.
///
/// Facts are stamped with the wall clock at the moment they are recorded;
/// the aggregator later rounds them up into granularity buckets.
///
/// # Example
/// ```
/// use aries_common::time::Timestamp;
/// use std::time::Duration;
///
/// let ts = Timestamp::from_millis(29_001);
/// assert_eq!(ts.round_up(Duration::from_secs(30)).as_millis(), 30_000);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Creates a timestamp from Unix milliseconds.
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Creates a timestamp from Unix seconds.
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Creates a timestamp for the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self(unix_timestamp_millis())
    }

    /// Returns the Unix timestamp in milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Returns the Unix timestamp in whole seconds.
    #[must_use]
    pub const fn as_secs(&self) -> i64 {
        self.0.div_euclid(1000)
    }

    /// Rounds up to the next multiple of `granularity`.
    ///
    /// A zero granularity leaves the timestamp unchanged.
    #[must_use]
    pub fn round_up(&self, granularity: Duration) -> Self {
        let g = i64::try_from(granularity.as_millis()).unwrap_or(i64::MAX);
        if g <= 0 {
            return *self;
        }
        let rem = self.0.rem_euclid(g);
        if rem == 0 {
            *self
        } else {
            Self(self.0.saturating_add(g - rem))
        }
    }

    /// Returns a timestamp `duration` earlier than this one.
    #[must_use]
    pub fn saturating_sub(&self, duration: Duration) -> Self {
        let d = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_sub(d))
    }

    /// Returns a timestamp `duration` later than this one.
    #[must_use]
    pub fn saturating_add(&self, duration: Duration) -> Self {
        let d = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(d))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.0)
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let millis = time
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX));
        Self(millis)
    }
}

// ============================================
// Utility Functions
// ============================================

/// Returns the current Unix timestamp in milliseconds.
///
/// A clock set before the epoch reads as zero.
#[must_use]
pub fn unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
