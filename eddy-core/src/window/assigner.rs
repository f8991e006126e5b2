use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, Window};

/// Assigns timestamps to fixed-size, non-overlapping windows aligned to timestamp `0`.
///
/// # Example
/// ```rust
/// use eddy::window::TumblingWindows;
/// use eddy::types::Window;
///
/// let windows = TumblingWindows::new(3000);
/// assert_eq!(windows.assign(52196), Window::new(51000, 54000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TumblingWindows {
    size: u64,
}

impl TumblingWindows {
    /// Create an assigner for windows of `size` milliseconds.
    ///
    /// **PANIC:** if size is `0`. Use [WindowConfig](crate::config::WindowConfig) to
    /// validate user supplied sizes beforehand.
    pub fn new(size: u64) -> Self {
        assert!(size > 0, "Window size must be greater than zero");
        Self { size }
    }

    /// Window size in milliseconds
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Return the window the given timestamp belongs to.
    ///
    /// **PANIC:** if that window would end after `u64::MAX`, see
    /// [try_assign](TumblingWindows::try_assign)
    #[inline]
    pub fn assign(&self, timestamp: Timestamp) -> Window {
        match self.try_assign(timestamp) {
            Some(window) => window,
            None => panic!("Timestamp {timestamp} is past the last complete window"),
        }
    }

    /// Return the window the given timestamp belongs to, or `None` for timestamps in the
    /// trailing partial window whose end does not fit into a [Timestamp].
    /// This always includes `u64::MAX` itself.
    #[inline]
    pub fn try_assign(&self, timestamp: Timestamp) -> Option<Window> {
        let start = timestamp - (timestamp % self.size);
        start
            .checked_add(self.size)
            .map(|end| Window::new(start, end))
    }
}

/// Return the tumbling window of `window_duration` milliseconds containing `timestamp`.
///
/// **PANIC:** if `window_duration` is `0` or the window would end after `u64::MAX`
pub fn assign(timestamp: Timestamp, window_duration: u64) -> Window {
    TumblingWindows::new(window_duration).assign(timestamp)
}
