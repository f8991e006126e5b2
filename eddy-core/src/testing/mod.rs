//! Helpers shared by the unit tests of this crate
use std::time::Duration;

use crate::{
    aggregate::Average,
    config::{LatePolicy, WindowConfig},
    runtime::Pipeline,
    sinks::VecSink,
    types::WindowResult,
};

pub(crate) type AvgResult = WindowResult<&'static str, f64>;

/// A pipeline averaging `f64` values in 3 second windows, writing into the returned sink
pub(crate) fn avg_pipeline(
    late_policy: LatePolicy,
    allowed_lateness_ms: u64,
) -> (
    Pipeline<&'static str, f64, Average, VecSink<AvgResult>>,
    VecSink<AvgResult>,
) {
    let config = WindowConfig::builder()
        .window_duration(Duration::from_secs(3))
        .allowed_lateness(Duration::from_millis(allowed_lateness_ms))
        .late_policy(late_policy)
        .build()
        .unwrap();
    let sink = VecSink::new();
    let pipeline = Pipeline::builder()
        .config(config)
        .aggregator(Average)
        .sink(sink.clone())
        .build();
    (pipeline, sink)
}

/// Take everything a [VecSink] collected so far
pub(crate) fn results_of<K, R>(sink: &VecSink<WindowResult<K, R>>) -> Vec<WindowResult<K, R>> {
    sink.drain_vec(..)
}

/// Route log output of the code under test through the test harness.
/// Safe to call from many tests, only the first call installs the subscriber.
pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
