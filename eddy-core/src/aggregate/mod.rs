//! Pluggable aggregation logic.
//!
//! An [Aggregator] describes how values are combined into an accumulator and how an
//! accumulator is turned into a final result. The aggregation table and trigger never
//! look inside accumulators, so swapping e.g. [Average] for [Max] does not touch them.
mod average;
mod basic;

pub use average::{Average, AverageAccumulator};
pub use basic::{Count, Max, Min, Sum};

use thiserror::Error;

/// Combine and finalize logic for a windowed aggregation.
///
/// Accumulators are only ever created from a first value, there is no "empty"
/// accumulator. `combine` must be commutative and associative for results to be
/// independent of arrival order.
pub trait Aggregator<V>: 'static {
    /// Partial aggregate for one key within one window
    type Accumulator;
    /// Final result handed to the sink
    type Output;

    /// Create the accumulator for the first value of a key and window
    fn create(&self, value: V) -> Self::Accumulator;

    /// Fold another value into an existing accumulator
    fn combine(&self, accumulator: &mut Self::Accumulator, value: V);

    /// Turn an accumulator into the final result
    fn finalize(&self, accumulator: Self::Accumulator) -> Result<Self::Output, AggregateError>;
}

/// Errors raised when finalizing an accumulator
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    /// The accumulator never received a value. This breaks the invariant that
    /// accumulators only exist after at least one event.
    #[error("Cannot finalize an accumulator which never received a value")]
    EmptyAccumulator,
}
