//! Configuration of the windowing behaviour of a pipeline.
use std::{str::FromStr, time::Duration};

use bon::bon;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Timestamp;

/// What to do with events arriving for a window which has already been emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LatePolicy {
    /// Fold late events into a fresh accumulator for their (already emitted) window.
    /// The window is emitted again on the next watermark advance, producing a
    /// secondary result for the same key and window.
    #[default]
    Refire,
    /// Discard late events. Every key and window is emitted at most once.
    Drop,
}

impl FromStr for LatePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "refire" => Ok(Self::Refire),
            "drop" => Ok(Self::Drop),
            _ => Err(ConfigError::UnknownLatePolicy(s.to_owned())),
        }
    }
}

/// Window settings shared by all keys of a pipeline.
///
/// All durations are normalized to milliseconds, the unit of [Timestamp].
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use eddy::config::{LatePolicy, WindowConfig};
///
/// let config = WindowConfig::builder()
///     .window_duration(Duration::from_secs(3))
///     .allowed_lateness(Duration::from_millis(500))
///     .late_policy(LatePolicy::Drop)
///     .build()
///     .unwrap();
/// assert_eq!(config.window_size(), 3000);
/// assert_eq!(config.allowed_lateness(), 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    window_size: u64,
    allowed_lateness: u64,
    late_policy: LatePolicy,
}

#[bon]
impl WindowConfig {
    /// Create a new config, failing if the window duration is shorter than one
    /// millisecond or a duration does not fit into a [Timestamp].
    #[builder]
    pub fn new(
        window_duration: Duration,
        #[builder(default)] allowed_lateness: Duration,
        #[builder(default)] late_policy: LatePolicy,
    ) -> Result<Self, ConfigError> {
        let window_size = to_millis(window_duration)?;
        if window_size == 0 {
            return Err(ConfigError::ZeroWindowDuration(window_duration));
        }
        let allowed_lateness = to_millis(allowed_lateness)?;
        Ok(Self {
            window_size,
            allowed_lateness,
            late_policy,
        })
    }
}

impl WindowConfig {
    /// Length of every tumbling window in milliseconds
    pub fn window_size(&self) -> u64 {
        self.window_size
    }

    /// Time in milliseconds a window stays open after its end has been passed by the
    /// watermark.
    pub fn allowed_lateness(&self) -> u64 {
        self.allowed_lateness
    }

    /// What happens to events for windows which already fired
    pub fn late_policy(&self) -> LatePolicy {
        self.late_policy
    }
}

fn to_millis(duration: Duration) -> Result<Timestamp, ConfigError> {
    Timestamp::try_from(duration.as_millis()).map_err(|_| ConfigError::DurationOverflow(duration))
}

/// Errors for invalid window configurations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Windows must be at least one millisecond long
    #[error("Window duration must be at least one millisecond, got {0:?}")]
    ZeroWindowDuration(Duration),
    /// A duration exceeds the millisecond [Timestamp] range
    #[error("Duration {0:?} does not fit into a millisecond timestamp")]
    DurationOverflow(Duration),
    /// Late policy setting not recognized
    #[error("Unknown late policy '{0}', expected 'refire' or 'drop'")]
    UnknownLatePolicy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WindowConfig::builder()
            .window_duration(Duration::from_secs(3))
            .build()
            .unwrap();
        assert_eq!(config.window_size(), 3000);
        assert_eq!(config.allowed_lateness(), 0);
        assert_eq!(config.late_policy(), LatePolicy::Refire);
    }

    #[test]
    fn rejects_zero_window() {
        let err = WindowConfig::builder()
            .window_duration(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroWindowDuration(Duration::ZERO));
    }

    /// sub-millisecond windows truncate to zero and must be rejected too
    #[test]
    fn rejects_sub_millisecond_window() {
        let res = WindowConfig::builder()
            .window_duration(Duration::from_micros(999))
            .build();
        assert!(matches!(res, Err(ConfigError::ZeroWindowDuration(_))));
    }

    #[test]
    fn rejects_overflowing_duration() {
        let res = WindowConfig::builder()
            .window_duration(Duration::MAX)
            .build();
        assert!(matches!(res, Err(ConfigError::DurationOverflow(_))));
    }

    #[test]
    fn parse_late_policy() {
        assert_eq!("refire".parse::<LatePolicy>(), Ok(LatePolicy::Refire));
        assert_eq!("DROP".parse::<LatePolicy>(), Ok(LatePolicy::Drop));
        assert_eq!(
            "ignore".parse::<LatePolicy>(),
            Err(ConfigError::UnknownLatePolicy("ignore".to_owned()))
        );
    }
}
