//! Watermark generation for sources which only produce events.
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::types::{Event, Message, Timestamp};

use super::Source;

/// Decides when to issue a new watermark.
///
/// Generators get the last issued watermark alongside every event. Returning `None`
/// issues no watermark, returning a value lower or equal to the last watermark is ignored.
pub trait WatermarkGenerator<K, V> {
    /// Called for every event passing through the source
    fn on_event(&mut self, event: &Event<K, V>, last: &Option<Timestamp>) -> Option<Timestamp>;

    /// Called whenever the wrapped source has no message available
    #[allow(unused)]
    fn on_idle(&mut self, last: &Option<Timestamp>) -> Option<Timestamp> {
        None
    }
}

impl<K, V, F> WatermarkGenerator<K, V> for F
where
    F: FnMut(&Event<K, V>, &Option<Timestamp>) -> Option<Timestamp>,
{
    fn on_event(&mut self, event: &Event<K, V>, last: &Option<Timestamp>) -> Option<Timestamp> {
        self(event, last)
    }
}

/// Creates a watermark generator suitable for limiting event out-of-orderness.
///
/// For example when constructing with `limit_out_of_orderness(30_000)`
/// the watermark trails the largest timestamp seen so far by 30 seconds, so events at most
/// 30 seconds older than the newest event still count as on time.
pub fn limit_out_of_orderness<K, V>(
    bound: u64,
) -> impl FnMut(&Event<K, V>, &Option<Timestamp>) -> Option<Timestamp> + Send + 'static {
    move |event, last| {
        let new_watermark = event.timestamp.saturating_sub(bound);
        match last {
            // new event more than `bound` ahead of last watermark
            Some(lw) => (new_watermark > *lw).then_some(new_watermark),
            None => Some(new_watermark),
        }
    }
}

/// Current wall clock time in milliseconds since the unix epoch
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Timestamp)
        .unwrap_or_default()
}

/// Processing time watermarks: issues the current clock time at a fixed interval,
/// independent of the events passing through.
///
/// Use this together with events stamped by [now_millis] when windows should follow the
/// wall clock rather than the time carried in the data.
pub struct PeriodicWatermarks {
    interval: u64,
    clock: Box<dyn FnMut() -> Timestamp + Send>,
}

impl PeriodicWatermarks {
    /// Issue a watermark every `interval` using the system clock
    pub fn new(interval: Duration) -> Self {
        Self::with_clock(interval, now_millis)
    }

    /// Issue a watermark every `interval` using a custom clock returning milliseconds
    pub fn with_clock(interval: Duration, clock: impl FnMut() -> Timestamp + Send + 'static) -> Self {
        Self {
            interval: interval.as_millis() as u64,
            clock: Box::new(clock),
        }
    }

    fn tick(&mut self, last: &Option<Timestamp>) -> Option<Timestamp> {
        let now = (self.clock)();
        match last {
            Some(lw) if now < lw.saturating_add(self.interval) => None,
            _ => Some(now),
        }
    }
}

impl<K, V> WatermarkGenerator<K, V> for PeriodicWatermarks {
    fn on_event(&mut self, _event: &Event<K, V>, last: &Option<Timestamp>) -> Option<Timestamp> {
        self.tick(last)
    }

    fn on_idle(&mut self, last: &Option<Timestamp>) -> Option<Timestamp> {
        self.tick(last)
    }
}

/// A source wrapper adding generated watermarks to the messages of another source.
///
/// **NOTES:**
/// - A watermark generated for an event is always issued *after* that event.
/// - Watermarks are only issued if they are greater than the previous watermark, this
///   includes watermarks produced by the wrapped source itself.
pub struct WithWatermarks<S, G> {
    inner: S,
    generator: G,
    last: Option<Timestamp>,
    pending: Option<Timestamp>,
}

impl<S, G> WithWatermarks<S, G> {
    /// Wrap `inner`, generating watermarks with `generator`
    pub fn new(inner: S, generator: G) -> Self {
        Self {
            inner,
            generator,
            last: None,
            pending: None,
        }
    }

    /// Record a watermark if it advances time, returning it in that case
    fn issue(&mut self, watermark: Timestamp) -> Option<Timestamp> {
        if self.last.is_none_or(|last| last < watermark) {
            trace!("Issuing watermark {watermark}");
            self.last = Some(watermark);
            Some(watermark)
        } else {
            None
        }
    }
}

impl<K, V, S, G> Source<K, V> for WithWatermarks<S, G>
where
    S: Source<K, V>,
    G: WatermarkGenerator<K, V>,
{
    fn poll(&mut self) -> Option<Message<K, V>> {
        if let Some(wm) = self.pending.take() {
            return Some(Message::Watermark(wm));
        }
        match self.inner.poll() {
            Some(Message::Data(event)) => {
                if let Some(wm) = self.generator.on_event(&event, &self.last) {
                    self.pending = self.issue(wm);
                }
                Some(Message::Data(event))
            }
            Some(Message::Watermark(wm)) => self.issue(wm).map(Message::Watermark),
            None => {
                let wm = self.generator.on_idle(&self.last)?;
                self.issue(wm).map(Message::Watermark)
            }
        }
    }

    fn is_finished(&mut self) -> bool {
        self.pending.is_none() && self.inner.is_finished()
    }

    fn suspend(&mut self) {
        self.inner.suspend()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    };

    use super::*;
    use crate::sources::{SingleIteratorSource, SourceExt};

    fn drain<S: Source<&'static str, f64>>(source: &mut S) -> Vec<Message<&'static str, f64>> {
        let mut out = Vec::new();
        while !source.is_finished() {
            if let Some(msg) = source.poll() {
                out.push(msg);
            }
        }
        out
    }

    /// watermarks are issued after the event that caused them
    #[test]
    fn watermark_after_event() {
        let events = [Event::new("a", 1.0, 1000), Event::new("a", 2.0, 4000)];
        let mut source = SingleIteratorSource::new(events)
            .with_watermarks(|e: &Event<&str, f64>, _: &Option<Timestamp>| Some(e.timestamp));
        assert_eq!(
            drain(&mut source),
            vec![
                Message::Data(Event::new("a", 1.0, 1000)),
                Message::Watermark(1000),
                Message::Data(Event::new("a", 2.0, 4000)),
                Message::Watermark(4000),
            ]
        );
    }

    #[test]
    fn out_of_orderness_bound() {
        let events = [
            Event::new("a", 1.0, 5000),
            Event::new("a", 2.0, 4000),
            Event::new("a", 3.0, 7000),
        ];
        let mut source =
            SingleIteratorSource::new(events).with_watermarks(limit_out_of_orderness(1000));
        assert_eq!(
            drain(&mut source),
            vec![
                Message::Data(Event::new("a", 1.0, 5000)),
                Message::Watermark(4000),
                // does not move the watermark backwards
                Message::Data(Event::new("a", 2.0, 4000)),
                Message::Data(Event::new("a", 3.0, 7000)),
                Message::Watermark(6000),
            ]
        );
    }

    /// upstream watermarks which do not advance time are swallowed
    #[test]
    fn filters_upstream_regressions() {
        let messages = [
            Message::Watermark(3000),
            Message::Watermark(1000),
            Message::Watermark(6000),
        ];
        let mut source = SingleIteratorSource::<&str, f64>::new(messages)
            .with_watermarks(|_: &Event<&str, f64>, _: &Option<Timestamp>| None);
        assert_eq!(
            drain(&mut source),
            vec![Message::Watermark(3000), Message::Watermark(6000)]
        );
    }

    #[test]
    fn periodic_respects_interval() {
        let time = Arc::new(AtomicU64::new(10_000));
        let clock_time = Arc::clone(&time);
        let mut periodic = PeriodicWatermarks::with_clock(Duration::from_secs(1), move || {
            clock_time.load(Ordering::SeqCst)
        });
        let event = Event::new("a", 1.0, 0);

        assert_eq!(periodic.on_event(&event, &None), Some(10_000));
        time.store(10_500, Ordering::SeqCst);
        assert_eq!(periodic.on_event(&event, &Some(10_000)), None);
        time.store(11_000, Ordering::SeqCst);
        assert_eq!(
            WatermarkGenerator::<&str, f64>::on_idle(&mut periodic, &Some(10_000)),
            Some(11_000)
        );
    }

    #[test]
    fn idle_source_gets_periodic_watermarks() {
        let time = Arc::new(AtomicU64::new(0));
        let clock_time = Arc::clone(&time);
        let mut source = SingleIteratorSource::<&str, f64>::new(Vec::<Message<&str, f64>>::new())
            .with_watermarks(PeriodicWatermarks::with_clock(
                Duration::from_millis(100),
                move || clock_time.load(Ordering::SeqCst),
            ));
        assert_eq!(source.poll(), Some(Message::Watermark(0)));
        assert_eq!(source.poll(), None);
        time.store(250, Ordering::SeqCst);
        assert_eq!(source.poll(), Some(Message::Watermark(250)));
    }
}
