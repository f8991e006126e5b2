use std::fmt::Debug;

use super::Sink;
use crate::types::WindowResult;

/// Prints every result to stdout
pub struct StdOutSink;

impl<K, R> Sink<K, R> for StdOutSink
where
    K: Debug,
    R: Debug,
{
    fn sink(&mut self, result: WindowResult<K, R>) {
        println!(
            "{{ key: {:?}, window: {}, value: {:?} }}",
            result.key, result.window, result.value
        )
    }
}
