use std::{hash::Hash, marker::PhantomData};

use bon::bon;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    aggregate::Aggregator,
    config::{LatePolicy, WindowConfig},
    errorhandling::EddyFatal,
    sinks::Sink,
    sources::Source,
    types::{Event, Message, Timestamp, Window, WindowResult},
    window::{AggregationTable, TumblingWindows, WindowTrigger},
};

use super::CancellationToken;

/// What happened to an event handed to [Pipeline::on_event]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// The event was folded into a window which has not fired yet
    OnTime,
    /// The event belongs to a window which already fired.
    /// It was folded anyway and the window will fire again on the next advance.
    Late,
    /// The event belongs to a window which already fired and was discarded
    Dropped,
}

/// Lifecycle of a [Pipeline]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Accepting events and watermarks
    Running,
    /// All windows were emitted, further input is rejected
    Closed,
}

/// Counters describing what a pipeline has processed so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events folded into an accumulator, including late ones
    pub events: u64,
    /// Events which arrived for an already fired window and were folded
    pub late_events: u64,
    /// Events which arrived for an already fired window and were discarded
    pub dropped_events: u64,
    /// Results handed to the sink
    pub results: u64,
    /// Highest watermark observed
    pub watermark: Option<Timestamp>,
}

impl PipelineStats {
    /// Combine the stats of two pipelines running side by side
    pub fn merge(self, other: PipelineStats) -> PipelineStats {
        PipelineStats {
            events: self.events + other.events,
            late_events: self.late_events + other.late_events,
            dropped_events: self.dropped_events + other.dropped_events,
            results: self.results + other.results,
            watermark: self.watermark.max(other.watermark),
        }
    }
}

/// Input rejected by a [Pipeline]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The pipeline was closed before
    #[error("Pipeline is closed and does not accept further input")]
    Closed,
    /// The window of this timestamp would end after `u64::MAX`
    #[error("Event timestamp {0} has no complete window")]
    TimestampOutOfRange(Timestamp),
}

/// Keyed tumbling-window aggregation running on the calling thread.
///
/// Events are assigned to their window and folded into the accumulator for their key.
/// Advancing the watermark emits a [WindowResult] for every key of every complete
/// window. Closing the pipeline emits whatever is still open.
///
/// ```
/// use std::time::Duration;
/// use eddy::aggregate::Average;
/// use eddy::config::WindowConfig;
/// use eddy::runtime::Pipeline;
/// use eddy::sinks::VecSink;
/// use eddy::types::Event;
///
/// let config = WindowConfig::builder()
///     .window_duration(Duration::from_secs(3))
///     .build()
///     .unwrap();
/// let sink = VecSink::new();
/// let mut pipeline = Pipeline::builder()
///     .config(config)
///     .aggregator(Average)
///     .sink(sink.clone())
///     .build();
///
/// pipeline.on_event(Event::new("car9", 3.0, 51_000)).unwrap();
/// pipeline.on_event(Event::new("car9", 4.0, 52_000)).unwrap();
/// pipeline.advance(54_000).unwrap();
///
/// let results = sink.drain_vec(..);
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0].value, 3.5);
/// ```
pub struct Pipeline<K, V, A, S>
where
    A: Aggregator<V>,
{
    windows: TumblingWindows,
    late_policy: LatePolicy,
    table: AggregationTable<K, A::Accumulator>,
    trigger: WindowTrigger,
    aggregator: A,
    sink: S,
    state: PipelineState,
    stats: PipelineStats,
    _value: PhantomData<fn(V)>,
}

#[bon]
impl<K, V, A, S> Pipeline<K, V, A, S>
where
    K: Hash + Eq + Ord,
    A: Aggregator<V>,
    S: Sink<K, A::Output>,
{
    /// Create a running pipeline, see [Pipeline::builder]
    #[builder]
    pub fn new(config: WindowConfig, aggregator: A, sink: S) -> Self {
        Self {
            windows: TumblingWindows::new(config.window_size()),
            late_policy: config.late_policy(),
            table: AggregationTable::new(),
            trigger: WindowTrigger::new(config.allowed_lateness()),
            aggregator,
            sink,
            state: PipelineState::Running,
            stats: PipelineStats::default(),
            _value: PhantomData,
        }
    }
}

impl<K, V, A, S> Pipeline<K, V, A, S>
where
    K: Hash + Eq + Ord,
    A: Aggregator<V>,
    S: Sink<K, A::Output>,
{
    /// Assign an event to its window and fold it into the accumulator of its key.
    ///
    /// Nothing is emitted here, results only leave the pipeline on
    /// [advance](Pipeline::advance) or [close](Pipeline::close).
    pub fn on_event(&mut self, event: Event<K, V>) -> Result<FoldOutcome, PipelineError> {
        self.ensure_running()?;
        let window = self
            .windows
            .try_assign(event.timestamp)
            .ok_or(PipelineError::TimestampOutOfRange(event.timestamp))?;

        let outcome = if self.trigger.is_complete(&window) {
            match self.late_policy {
                LatePolicy::Drop => {
                    warn!(
                        "Dropping late event at {} for already fired window {window}",
                        event.timestamp
                    );
                    self.stats.dropped_events += 1;
                    return Ok(FoldOutcome::Dropped);
                }
                LatePolicy::Refire => {
                    debug!(
                        "Late event at {} reopens window {window}",
                        event.timestamp
                    );
                    self.stats.late_events += 1;
                    FoldOutcome::Late
                }
            }
        } else {
            FoldOutcome::OnTime
        };

        self.table
            .fold(&self.aggregator, event.key, window, event.value);
        self.stats.events += 1;
        Ok(outcome)
    }

    /// Advance the watermark and emit every window which became complete.
    /// Returns the number of results handed to the sink.
    pub fn advance(&mut self, watermark: Timestamp) -> Result<usize, PipelineError> {
        self.ensure_running()?;
        let complete = self.trigger.advance(watermark, &mut self.table);
        self.stats.watermark = self.trigger.watermark();
        Ok(self.emit(complete))
    }

    /// Process a single message from a source
    pub fn process(&mut self, message: Message<K, V>) -> Result<(), PipelineError> {
        match message {
            Message::Data(event) => self.on_event(event).map(|_| ()),
            Message::Watermark(watermark) => self.advance(watermark).map(|_| ()),
        }
    }

    /// Emit all windows still open regardless of the watermark, then suspend the sink.
    ///
    /// Afterwards the pipeline rejects all input. Closing twice emits nothing the
    /// second time.
    pub fn close(&mut self) -> usize {
        if self.state == PipelineState::Closed {
            return 0;
        }
        let remaining = self.table.drain_all();
        let emitted = self.emit(remaining);
        self.sink.suspend();
        self.state = PipelineState::Closed;
        info!("Pipeline closed after emitting {} results", self.stats.results);
        emitted
    }

    /// Pull messages from `source` until it is finished or `stop` is cancelled, then
    /// close the pipeline. Events without a window are logged and skipped.
    pub fn run<Src>(
        &mut self,
        mut source: Src,
        stop: &CancellationToken,
    ) -> Result<PipelineStats, PipelineError>
    where
        Src: Source<K, V>,
    {
        self.ensure_running()?;
        loop {
            if stop.is_cancelled() {
                info!("Stop requested, draining open windows");
                break;
            }
            if source.is_finished() {
                debug!("Source finished");
                break;
            }
            if let Some(message) = source.poll() {
                match self.process(message) {
                    Err(PipelineError::TimestampOutOfRange(timestamp)) => {
                        warn!("Skipping event at {timestamp}, it has no complete window");
                    }
                    other => other?,
                }
            }
        }
        source.suspend();
        self.close();
        Ok(self.stats)
    }

    /// Counters of everything processed so far
    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Whether the pipeline still accepts input
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The highest watermark observed so far
    pub fn watermark(&self) -> Option<Timestamp> {
        self.trigger.watermark()
    }

    /// Windows with at least one unemitted accumulator, in ascending order
    pub fn open_windows(&self) -> impl Iterator<Item = &Window> {
        self.table.open_windows()
    }

    /// The sink results are emitted to
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the sink, e.g. to take buffered results
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn ensure_running(&self) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Running => Ok(()),
            PipelineState::Closed => Err(PipelineError::Closed),
        }
    }

    fn emit(&mut self, entries: Vec<(K, Window, A::Accumulator)>) -> usize {
        let count = entries.len();
        for (key, window, accumulator) in entries {
            // accumulators are only ever created from a value
            let value = self.aggregator.finalize(accumulator).eddy_fatal();
            self.sink.sink(WindowResult::new(key, window, value));
        }
        if count > 0 {
            debug!("Emitted {count} results");
        }
        self.stats.results += count as u64;
        count
    }
}
