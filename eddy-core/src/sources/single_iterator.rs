use std::iter::Peekable;

use crate::types::Message;

use super::Source;

/// A source which yields messages from an iterator.
///
/// The iterator may produce [Message]s directly, mixing events and watermarks, or
/// plain [Event](crate::types::Event)s, in which case watermarks must be added, for example with
/// [with_watermarks](super::SourceExt::with_watermarks).
/// The source is finished once the iterator is exhausted.
///
/// # Example
/// ```rust
/// use eddy::sources::{SingleIteratorSource, Source};
/// use eddy::types::{Event, Message};
///
/// let mut source = SingleIteratorSource::new([
///     Message::Data(Event::new("car9", 3.0, 0)),
///     Message::Watermark(3000),
/// ]);
/// assert_eq!(source.poll(), Some(Message::Data(Event::new("car9", 3.0, 0))));
/// assert_eq!(source.poll(), Some(Message::Watermark(3000)));
/// assert!(source.is_finished());
/// ```
pub struct SingleIteratorSource<K, V>(Peekable<Box<dyn Iterator<Item = Message<K, V>> + Send>>);

impl<K, V> SingleIteratorSource<K, V> {
    /// Create a new source from an iterable value
    pub fn new<I>(iter: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Message<K, V>> + 'static,
        <I as IntoIterator>::IntoIter: Send + 'static,
        K: 'static,
        V: 'static,
    {
        let boxed: Box<dyn Iterator<Item = Message<K, V>> + Send> =
            Box::new(iter.into_iter().map(Into::into));
        Self(boxed.peekable())
    }
}

impl<K, V> Source<K, V> for SingleIteratorSource<K, V> {
    fn poll(&mut self) -> Option<Message<K, V>> {
        self.0.next()
    }

    fn is_finished(&mut self) -> bool {
        self.0.peek().is_none()
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;

    use super::*;
    use crate::types::Event;

    #[test]
    fn emits_values_in_order() {
        let events = (0..10u64).map(|i| Event::new("key", i as f64, i * 100));
        let mut source = SingleIteratorSource::new(events);
        let mut out = Vec::new();
        while !source.is_finished() {
            out.push(source.poll().unwrap());
        }
        let timestamps = out
            .into_iter()
            .map(|x| match x {
                Message::Data(e) => e.timestamp,
                Message::Watermark(_) => panic!("unexpected watermark"),
            })
            .collect_vec();
        assert_eq!(timestamps, (0..10).map(|i| i * 100).collect_vec());
    }

    #[test]
    fn empty_is_finished() {
        let mut source = SingleIteratorSource::<String, f64>::new(Vec::<Message<String, f64>>::new());
        assert!(source.is_finished());
        assert_eq!(source.poll(), None);
    }

    /// Sources built from owned events can be handed to another thread
    #[test]
    fn converts_owned_events_across_threads() {
        let events: Vec<Event<String, f64>> = (0..3u64)
            .map(|i| Event::new(format!("car{i}"), 1.0, i))
            .collect();
        let mut source = SingleIteratorSource::new(events);
        let keys = std::thread::spawn(move || {
            let mut keys = Vec::new();
            while let Some(Message::Data(event)) = source.poll() {
                keys.push(event.key);
            }
            keys
        })
        .join()
        .unwrap();
        assert_eq!(keys, vec!["car0", "car1", "car2"]);
    }
}
