use std::hash::Hash;

use itertools::Itertools;
use tracing::debug;

use crate::types::{Timestamp, Window};

use super::AggregationTable;

/// Tracks the watermark and decides when windows are complete.
///
/// A window is complete once `window.end + allowed_lateness <= watermark`.
/// The watermark never decreases, advancing to a lower value is a no-op.
#[derive(Debug, Clone, Default)]
pub struct WindowTrigger {
    watermark: Option<Timestamp>,
    allowed_lateness: u64,
}

impl WindowTrigger {
    /// Create a trigger with no watermark observed yet
    pub fn new(allowed_lateness: u64) -> Self {
        Self {
            watermark: None,
            allowed_lateness,
        }
    }

    /// The highest watermark observed so far
    pub fn watermark(&self) -> Option<Timestamp> {
        self.watermark
    }

    /// True if the watermark has passed the end of this window plus the allowed lateness
    pub fn is_complete(&self, window: &Window) -> bool {
        self.watermark
            .is_some_and(|wm| window.end.saturating_add(self.allowed_lateness) <= wm)
    }

    /// Move the watermark to `max(current, new_watermark)` and flush every complete
    /// window from the table.
    ///
    /// Results are ordered by window start and then key. Windows which received late
    /// events after a previous flush are picked up again here, even if the watermark
    /// did not move.
    pub fn advance<K, A>(
        &mut self,
        new_watermark: Timestamp,
        table: &mut AggregationTable<K, A>,
    ) -> Vec<(K, Window, A)>
    where
        K: Hash + Eq + Ord,
    {
        let watermark = self
            .watermark
            .map_or(new_watermark, |wm| wm.max(new_watermark));
        if self.watermark.is_some_and(|wm| new_watermark < wm) {
            debug!("Ignoring watermark regression from {watermark} to {new_watermark}");
        }
        self.watermark = Some(watermark);

        let complete = table
            .open_windows()
            .take_while(|w| self.is_complete(w))
            .copied()
            .collect_vec();
        complete.iter().flat_map(|w| table.flush(w)).collect()
    }
}
