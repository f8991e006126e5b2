use serde::{Deserialize, Serialize};

use super::{AggregateError, Aggregator};

/// Arithmetic mean of all values in a window
#[derive(Debug, Clone, Copy, Default)]
pub struct Average;

/// Running sum and count for [Average]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AverageAccumulator {
    /// Sum of all values
    pub sum: f64,
    /// Number of values
    pub count: u64,
}

impl<V> Aggregator<V> for Average
where
    V: Into<f64>,
{
    type Accumulator = AverageAccumulator;
    type Output = f64;

    fn create(&self, value: V) -> Self::Accumulator {
        AverageAccumulator {
            sum: value.into(),
            count: 1,
        }
    }

    fn combine(&self, accumulator: &mut Self::Accumulator, value: V) {
        accumulator.sum += value.into();
        accumulator.count += 1;
    }

    fn finalize(&self, accumulator: Self::Accumulator) -> Result<Self::Output, AggregateError> {
        if accumulator.count == 0 {
            return Err(AggregateError::EmptyAccumulator);
        }
        Ok(accumulator.sum / accumulator.count as f64)
    }
}
