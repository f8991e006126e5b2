//! Types specific to time-keeping and windows.

use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Logical event time in milliseconds.
/// Eddy does not care about the epoch, only that the values are monotonic per source.
pub type Timestamp = u64;

/// A half-open interval `[start, end)` of event time.
///
/// Windows are plain values and double as part of the aggregation key.
/// They order by start first, which for tumbling windows of a fixed size is the
/// same as ordering by end.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Window {
    /// Inclusive start
    pub start: Timestamp,
    /// Exclusive end
    pub end: Timestamp,
}

impl Window {
    /// Create the window `[start, end)`
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        debug_assert!(start <= end, "Window start must not be after its end");
        Self { start, end }
    }

    /// Length of this window in milliseconds
    pub fn duration(&self) -> u64 {
        self.end - self.start
    }

    /// True if the timestamp lies within `[start, end)`
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

impl Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
