//! Day-granular time helpers.
//!
//! # Time Model
//! All timestamps are milliseconds since the Unix epoch (UTC). The board
//! works at day granularity: a "day timestamp" is a timestamp normalised to
//! UTC midnight with [`day_floor`].

use serde::{Deserialize, Serialize};

/// Milliseconds in one day.
pub const DAY_MS: i64 = 86_400_000;

/// Normalises a timestamp to UTC midnight of its day.
///
/// Uses Euclidean division, so timestamps before the epoch floor toward
/// the earlier day.
#[inline]
pub fn day_floor(time_ms: i64) -> i64 {
    time_ms.div_euclid(DAY_MS) * DAY_MS
}

/// Shifts a day timestamp by a whole number of days.
#[inline]
pub fn add_days(day_ms: i64, days: i64) -> i64 {
    day_ms + days * DAY_MS
}

/// Whole days from `from_ms` to `to_ms` (floored).
#[inline]
pub fn days_between(from_ms: i64, to_ms: i64) -> i64 {
    (to_ms - from_ms).div_euclid(DAY_MS)
}

/// A time interval [start, end).
///
/// Half-open interval: includes start, excludes end.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    /// Interval start (ms, inclusive).
    pub start_ms: i64,
    /// Interval end (ms, exclusive).
    pub end_ms: i64,
}

impl TimeWindow {
    /// Creates a new time window.
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// Window covering `days` whole days starting at the day of `start_ms`.
    pub fn days_from(start_ms: i64, days: i64) -> Self {
        let start = day_floor(start_ms);
        Self::new(start, add_days(start, days))
    }

    /// Duration of this window (ms).
    #[inline]
    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    /// Number of whole days covered.
    #[inline]
    pub fn day_count(&self) -> i64 {
        days_between(self.start_ms, self.end_ms).max(0)
    }

    /// Whether a timestamp falls within this window.
    #[inline]
    pub fn contains(&self, time_ms: i64) -> bool {
        time_ms >= self.start_ms && time_ms < self.end_ms
    }
}
