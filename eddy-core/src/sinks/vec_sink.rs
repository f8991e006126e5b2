use std::{
    ops::RangeBounds,
    sync::{Arc, Mutex},
};

use super::Sink;
use crate::types::WindowResult;

/// A Helper to write values into a shared vector and take them out
/// again.
/// This is mainly useful to extract results from a pipeline in unit tests.
/// This struct uses an `Arc<Mutex<Vec<T>>>` internally, so it can be freely
/// cloned
#[derive(Clone, Debug)]
pub struct VecSink<T> {
    inner: Arc<Mutex<Vec<T>>>,
}
impl<T> Default for VecSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> VecSink<T> {
    /// Create a new sink which collects all results into a `Vec`
    pub fn new() -> Self {
        VecSink {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Put a value into this sink
    pub fn give(&self, value: T) {
        self.lock().push(value)
    }

    /// Take the given range out of this sink
    pub fn drain_vec<R: RangeBounds<usize>>(&self, range: R) -> Vec<T> {
        self.lock().drain(range).collect()
    }

    /// Number of values currently held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True if no values are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<T>> {
        // a panic while holding the lock can not leave the Vec in an invalid state
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T> IntoIterator for VecSink<T> {
    type Item = T;

    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.drain_vec(..).into_iter()
    }
}

impl<K, R> Sink<K, R> for VecSink<WindowResult<K, R>> {
    fn sink(&mut self, result: WindowResult<K, R>) {
        self.give(result);
    }
}
