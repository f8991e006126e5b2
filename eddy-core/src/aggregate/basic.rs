//! Simple aggregations whose accumulator is the result itself.
use super::{AggregateError, Aggregator};

/// Sum of all values in a window
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl<V> Aggregator<V> for Sum
where
    V: Into<f64>,
{
    type Accumulator = f64;
    type Output = f64;

    fn create(&self, value: V) -> f64 {
        value.into()
    }

    fn combine(&self, accumulator: &mut f64, value: V) {
        *accumulator += value.into();
    }

    fn finalize(&self, accumulator: f64) -> Result<f64, AggregateError> {
        Ok(accumulator)
    }
}

/// Number of values in a window
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl<V> Aggregator<V> for Count {
    type Accumulator = u64;
    type Output = u64;

    fn create(&self, _value: V) -> u64 {
        1
    }

    fn combine(&self, accumulator: &mut u64, _value: V) {
        *accumulator += 1;
    }

    fn finalize(&self, accumulator: u64) -> Result<u64, AggregateError> {
        if accumulator == 0 {
            return Err(AggregateError::EmptyAccumulator);
        }
        Ok(accumulator)
    }
}

/// Smallest value in a window
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

impl<V> Aggregator<V> for Min
where
    V: PartialOrd + 'static,
{
    type Accumulator = V;
    type Output = V;

    fn create(&self, value: V) -> V {
        value
    }

    fn combine(&self, accumulator: &mut V, value: V) {
        if value < *accumulator {
            *accumulator = value;
        }
    }

    fn finalize(&self, accumulator: V) -> Result<V, AggregateError> {
        Ok(accumulator)
    }
}

/// Largest value in a window
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl<V> Aggregator<V> for Max
where
    V: PartialOrd + 'static,
{
    type Accumulator = V;
    type Output = V;

    fn create(&self, value: V) -> V {
        value
    }

    fn combine(&self, accumulator: &mut V, value: V) {
        if value > *accumulator {
            *accumulator = value;
        }
    }

    fn finalize(&self, accumulator: V) -> Result<V, AggregateError> {
        Ok(accumulator)
    }
}
