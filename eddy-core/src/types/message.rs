//! Contains Eddy's message types.
//! Sources hand data and watermarks to the pipeline exclusively via [Message]s.

use serde::{Deserialize, Serialize};

use super::{Timestamp, Window};

/// A single keyed measurement flowing through a pipeline.
/// Events always include a key, a value and an event timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event<K, V> {
    /// Aggregation key, e.g. the car
    pub key: K,
    /// Measured value
    pub value: V,
    /// Event time in milliseconds
    pub timestamp: Timestamp,
}
impl<K, V> Event<K, V> {
    /// Create a new event
    pub fn new(key: K, value: V, timestamp: Timestamp) -> Self {
        Self {
            key,
            value,
            timestamp,
        }
    }
}

/// Content variants of a message produced by a source.
/// Most messages will be of the data flavour, i.e. events to be aggregated,
/// the watermark flavour asserts that no more events older than the given timestamp
/// are expected.
#[derive(Debug, Clone, PartialEq)]
pub enum Message<K, V> {
    /// An event to be aggregated
    Data(Event<K, V>),
    /// No events at or before this timestamp are expected anymore
    Watermark(Timestamp),
}

impl<K, V> From<Event<K, V>> for Message<K, V> {
    fn from(value: Event<K, V>) -> Self {
        Message::Data(value)
    }
}

/// The finalized aggregate of one key within one window.
/// This is what sinks receive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowResult<K, R> {
    /// Key the result was aggregated for
    pub key: K,
    /// Window the result covers
    pub window: Window,
    /// Finalized aggregate
    pub value: R,
}

impl<K, R> WindowResult<K, R> {
    /// Create a new result
    pub fn new(key: K, window: Window, value: R) -> Self {
        Self { key, window, value }
    }

    /// Inclusive start of the window this result was computed for
    pub fn window_start(&self) -> Timestamp {
        self.window.start
    }

    /// Exclusive end of the window this result was computed for
    pub fn window_end(&self) -> Timestamp {
        self.window.end
    }
}
