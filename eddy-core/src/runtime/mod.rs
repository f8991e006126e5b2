//! Runtimes drive events from a source through the windowing logic into a sink.
//!
//! [Pipeline] runs everything on the calling thread. [MultiThreadRuntime] partitions keys
//! across worker threads, each owning a private [Pipeline].
mod pipeline;
pub mod threaded;

pub use pipeline::{FoldOutcome, Pipeline, PipelineError, PipelineState, PipelineStats};
pub use threaded::{MultiThreadRuntime, RuntimeError};

/// Cooperative stop signal for running pipelines.
/// Cancelling the token makes the driver stop reading its source, flush all open
/// windows and return.
pub use tokio_util::sync::CancellationToken;
