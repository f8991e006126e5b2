//! Sinks receive the finalized results of a pipeline
mod stdout;
mod vec_sink;

pub use stdout::StdOutSink;
pub use vec_sink::VecSink;

use crate::types::WindowResult;

/// A destination for window results, usually writing them to some external system.
///
/// Results arrive one per key and window, ordered by window start and then key within
/// every flush. Errors while writing are the sink's own concern, the pipeline does not
/// retry.
pub trait Sink<K, R> {
    /// Write a single result
    fn sink(&mut self, result: WindowResult<K, R>);

    /// Suspend this sink.
    /// Called once after the pipeline emitted its final results.
    /// Use this method to flush buffers or close connections
    fn suspend(&mut self) {}
}

impl<K, R, F> Sink<K, R> for F
where
    F: FnMut(WindowResult<K, R>),
{
    fn sink(&mut self, result: WindowResult<K, R>) {
        self(result)
    }
}
