//! Sources provide events and watermarks to a pipeline.
mod single_iterator;
mod watermarks;

pub use single_iterator::SingleIteratorSource;
pub use watermarks::{
    limit_out_of_orderness, now_millis, PeriodicWatermarks, WatermarkGenerator, WithWatermarks,
};

use crate::types::Message;

/// Implementation of a stream source.
///
/// Sources are pulled by the pipeline driver. `poll` may block while waiting for new input,
/// this is the only place a pipeline ever suspends.
pub trait Source<K, V> {
    /// Poll this source, possibly returning a message.
    /// Returning `None` means no message is available right now, it does not end the
    /// stream. Use [Source::is_finished] for that.
    fn poll(&mut self) -> Option<Message<K, V>>;

    /// Return true if this source will never produce another message
    fn is_finished(&mut self) -> bool;

    /// Suspend this source.
    /// Called once when the pipeline stops reading from it.
    /// Use this method to clean up any resources like external connections or
    /// file handles
    fn suspend(&mut self) {}
}

impl<K, V> Source<K, V> for Box<dyn Source<K, V> + Send> {
    fn poll(&mut self) -> Option<Message<K, V>> {
        self.as_mut().poll()
    }

    fn is_finished(&mut self) -> bool {
        self.as_mut().is_finished()
    }

    fn suspend(&mut self) {
        self.as_mut().suspend()
    }
}

/// Convenience combinators available on every [Source]
pub trait SourceExt<K, V>: Source<K, V> + Sized {
    /// Generate watermarks for this source using the given generator.
    /// See [WithWatermarks].
    fn with_watermarks<G>(self, generator: G) -> WithWatermarks<Self, G>
    where
        G: WatermarkGenerator<K, V>,
    {
        WithWatermarks::new(self, generator)
    }
}
impl<K, V, S: Source<K, V>> SourceExt<K, V> for S {}
