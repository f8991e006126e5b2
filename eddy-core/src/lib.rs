//! Eddy is a small engine for keyed tumbling-window aggregations over unbounded event streams.
//!
//! Events flow from a [Source](sources::Source) into a [Pipeline](runtime::Pipeline), which
//! assigns each event to a [Window](types::Window), folds it into a per key and window
//! accumulator and emits finalized [WindowResult](types::WindowResult)s to a
//! [Sink](sinks::Sink) whenever the watermark passes the end of a window.
pub mod aggregate;
pub mod config;
pub mod errorhandling;
pub mod keyed;
pub mod runtime;
pub mod sinks;
pub mod sources;
pub mod types;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;
