//! Run a windowed aggregation on multiple threads within one process.
use std::{hash::Hash, thread::JoinHandle};

use bon::bon;
use flume::{Receiver, Sender};
use indexmap::IndexSet;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};

use crate::{
    aggregate::Aggregator,
    config::WindowConfig,
    keyed::partitioners::{rendezvous_select, Partitioner},
    sinks::Sink,
    sources::Source,
    types::{Event, Message, Timestamp, WindowResult, WorkerId},
};

use super::{CancellationToken, Pipeline, PipelineStats};

/// Failures of a [MultiThreadRuntime]
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime was built with a parallelism of `0`
    #[error("Parallelism must be at least 1")]
    NoWorkers,
    /// The OS refused to start a worker thread
    #[error("Failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),
    /// The partitioner returned a worker outside the worker set
    #[error("Partitioner selected worker {0} which does not exist")]
    UnknownWorker(WorkerId),
    /// A worker exited while the runtime was still routing input to it
    #[error("Worker {0} stopped receiving input")]
    Disconnected(WorkerId),
    /// A worker thread panicked
    #[error("Worker {0} panicked")]
    WorkerPanicked(WorkerId),
}

/// Runs a keyed window aggregation on `parallelism` worker threads.
///
/// Every worker owns a private [Pipeline]. The calling thread reads the source, routes
/// each event to the worker selected by the partitioner for its key and broadcasts
/// watermarks to all workers. Results are handed to the sink on the calling thread.
///
/// Results for one key always come from the same worker and keep their window order.
/// There is no ordering between results of different workers.
///
/// # Example
/// ```rust
/// use std::time::Duration;
/// use eddy::aggregate::Sum;
/// use eddy::config::WindowConfig;
/// use eddy::runtime::{CancellationToken, MultiThreadRuntime};
/// use eddy::sinks::VecSink;
/// use eddy::sources::{limit_out_of_orderness, SingleIteratorSource, SourceExt};
/// use eddy::types::Event;
///
/// let config = WindowConfig::builder()
///     .window_duration(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// let runtime = MultiThreadRuntime::<u64, Sum>::builder()
///     .config(config)
///     .aggregator(Sum)
///     .parallelism(4)
///     .build()
///     .unwrap();
///
/// let source = SingleIteratorSource::new((0..100u64).map(|i| Event::new(i % 10, 1.0, i * 100)))
///     .with_watermarks(limit_out_of_orderness(0));
/// let sink = VecSink::new();
/// let stats = runtime
///     .execute(source, sink.clone(), &CancellationToken::new())
///     .unwrap();
///
/// assert_eq!(stats.events, 100);
/// assert_eq!(sink.len(), 100);
/// ```
pub struct MultiThreadRuntime<K, A> {
    config: WindowConfig,
    aggregator: A,
    workers: IndexSet<WorkerId>,
    partitioner: Partitioner<K>,
    channel_capacity: usize,
}

#[bon]
impl<K, A> MultiThreadRuntime<K, A>
where
    K: Hash,
{
    /// Build a runtime with `parallelism` workers.
    ///
    /// `partitioner` defaults to [rendezvous_select], `channel_capacity` is the capacity
    /// of the input channel of each worker.
    #[builder]
    pub fn new(
        config: WindowConfig,
        aggregator: A,
        parallelism: u64,
        partitioner: Option<Partitioner<K>>,
        #[builder(default = 1024)] channel_capacity: usize,
    ) -> Result<Self, RuntimeError> {
        if parallelism == 0 {
            return Err(RuntimeError::NoWorkers);
        }
        Ok(Self {
            config,
            aggregator,
            workers: (0..parallelism).collect(),
            partitioner: partitioner.unwrap_or(rendezvous_select::<K, WorkerId>),
            channel_capacity,
        })
    }
}

enum WorkerCommand<K, V> {
    Event(Event<K, V>),
    Advance(Timestamp),
    Close,
}

enum WorkerReport<K, R> {
    Results(Vec<WindowResult<K, R>>),
    Finished(WorkerId, PipelineStats),
}

/// Buffers the results of one advance so they can be shipped as a single batch
struct BatchSink<K, R>(Vec<WindowResult<K, R>>);

impl<K, R> Sink<K, R> for BatchSink<K, R> {
    fn sink(&mut self, result: WindowResult<K, R>) {
        self.0.push(result);
    }
}

impl<K, A> MultiThreadRuntime<K, A>
where
    K: Hash + Eq + Ord + Send + 'static,
{
    /// Read `source` until it is finished or `stop` is cancelled, then close all workers
    /// and wait for their remaining results.
    pub fn execute<V, Src, Snk>(
        self,
        mut source: Src,
        mut sink: Snk,
        stop: &CancellationToken,
    ) -> Result<PipelineStats, RuntimeError>
    where
        V: Send + 'static,
        A: Aggregator<V> + Clone + Send,
        A::Output: Send + 'static,
        Src: Source<K, V>,
        Snk: Sink<K, A::Output>,
    {
        let Self {
            config,
            aggregator,
            workers,
            partitioner,
            channel_capacity,
        } = self;

        let (report_tx, report_rx) = flume::unbounded();
        let mut senders = Vec::with_capacity(workers.len());
        let mut handles: Vec<(WorkerId, JoinHandle<()>)> = Vec::with_capacity(workers.len());
        for worker_id in workers.iter().copied() {
            let (command_tx, command_rx) = flume::bounded(channel_capacity);
            let config = config.clone();
            let aggregator = aggregator.clone();
            let reports = report_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("eddy-worker-{worker_id}"))
                .spawn(move || run_worker(worker_id, config, aggregator, command_rx, reports))
                .map_err(RuntimeError::Spawn)?;
            senders.push(command_tx);
            handles.push((worker_id, handle));
        }
        // workers hold the remaining senders, the report channel closes once all exited
        drop(report_tx);
        info!("Started {} workers", workers.len());

        let mut stats = PipelineStats::default();
        let mut failure = None;
        loop {
            if stop.is_cancelled() {
                info!("Stop requested, draining open windows");
                break;
            }
            if source.is_finished() {
                debug!("Source finished");
                break;
            }
            for report in report_rx.try_iter() {
                forward(report, &mut sink, &mut stats);
            }
            let Some(message) = source.poll() else {
                continue;
            };
            let routed = match message {
                Message::Data(event) => {
                    let worker = partitioner(&event.key, &workers);
                    send_to(&senders, worker, WorkerCommand::Event(event))
                }
                Message::Watermark(watermark) => workers
                    .iter()
                    .try_for_each(|w| send_to(&senders, *w, WorkerCommand::Advance(watermark))),
            };
            if let Err(e) = routed {
                error!("Shutting down runtime: {e}");
                failure = Some(e);
                break;
            }
        }
        source.suspend();

        for command_tx in senders.iter() {
            // a worker which already exited is reported when joining
            let _ = command_tx.send(WorkerCommand::Close);
        }
        drop(senders);
        for report in report_rx.iter() {
            forward(report, &mut sink, &mut stats);
        }
        sink.suspend();

        let mut panicked = None;
        for (worker_id, handle) in handles {
            if handle.join().is_err() {
                error!("Worker {worker_id} panicked");
                panicked.get_or_insert(worker_id);
            }
        }
        if let Some(worker_id) = panicked {
            return Err(RuntimeError::WorkerPanicked(worker_id));
        }
        if let Some(e) = failure {
            return Err(e);
        }
        info!(
            "All workers finished, {} events in {} results",
            stats.events, stats.results
        );
        Ok(stats)
    }
}

fn send_to<K, V>(
    senders: &[Sender<WorkerCommand<K, V>>],
    worker: WorkerId,
    command: WorkerCommand<K, V>,
) -> Result<(), RuntimeError> {
    let sender = usize::try_from(worker)
        .ok()
        .and_then(|i| senders.get(i))
        .ok_or(RuntimeError::UnknownWorker(worker))?;
    sender
        .send(command)
        .map_err(|_| RuntimeError::Disconnected(worker))
}

fn forward<K, R, S: Sink<K, R>>(
    report: WorkerReport<K, R>,
    sink: &mut S,
    stats: &mut PipelineStats,
) {
    match report {
        WorkerReport::Results(batch) => {
            for result in batch {
                sink.sink(result);
            }
        }
        WorkerReport::Finished(worker_id, worker_stats) => {
            debug!("Worker {worker_id} finished with {worker_stats:?}");
            *stats = stats.merge(worker_stats);
        }
    }
}

fn run_worker<K, V, A>(
    worker_id: WorkerId,
    config: WindowConfig,
    aggregator: A,
    commands: Receiver<WorkerCommand<K, V>>,
    reports: Sender<WorkerReport<K, A::Output>>,
) where
    K: Hash + Eq + Ord,
    A: Aggregator<V>,
{
    let span = info_span!("worker", worker_id);
    let _guard = span.enter();

    let mut pipeline = Pipeline::builder()
        .config(config)
        .aggregator(aggregator)
        .sink(BatchSink(Vec::new()))
        .build();

    for command in commands.iter() {
        let handled = match command {
            WorkerCommand::Event(event) => pipeline.on_event(event).map(|_| ()),
            WorkerCommand::Advance(watermark) => pipeline.advance(watermark).map(|_| ()),
            WorkerCommand::Close => break,
        };
        if let Err(e) = handled {
            warn!("Worker {worker_id} rejected input: {e}");
        }
        ship_batch(&mut pipeline, &reports);
    }
    pipeline.close();
    ship_batch(&mut pipeline, &reports);
    if reports
        .send(WorkerReport::Finished(worker_id, pipeline.stats()))
        .is_err()
    {
        warn!("Runtime stopped listening before worker {worker_id} finished");
    }
}

fn ship_batch<K, V, A>(
    pipeline: &mut Pipeline<K, V, A, BatchSink<K, A::Output>>,
    reports: &Sender<WorkerReport<K, A::Output>>,
) where
    K: Hash + Eq + Ord,
    A: Aggregator<V>,
{
    let batch = std::mem::take(&mut pipeline.sink_mut().0);
    if !batch.is_empty() && reports.send(WorkerReport::Results(batch)).is_err() {
        warn!("Runtime stopped listening, discarding results");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use itertools::Itertools;

    use super::*;
    use crate::{
        aggregate::{AggregateError, Average, Sum},
        config::LatePolicy,
        keyed::partitioners::index_select,
        runtime::Pipeline,
        sinks::VecSink,
        sources::{limit_out_of_orderness, SingleIteratorSource, SourceExt},
        testing::init_logging,
    };

    fn config() -> WindowConfig {
        WindowConfig::builder()
            .window_duration(Duration::from_secs(3))
            .late_policy(LatePolicy::Refire)
            .build()
            .unwrap()
    }

    fn car_events() -> Vec<Event<String, f64>> {
        (0..200u64)
            .map(|i| Event::new(format!("car{}", i % 7), (i % 5) as f64, i * 150))
            .collect()
    }

    fn sorted(results: Vec<WindowResult<String, f64>>) -> Vec<(u64, String, f64)> {
        results
            .into_iter()
            .map(|r| (r.window.start, r.key, r.value))
            .sorted_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
            .collect()
    }

    /// Running on many threads must produce the same results as a single pipeline
    #[test]
    fn matches_single_threaded_results() {
        init_logging();
        let expected_sink = VecSink::new();
        let mut single = Pipeline::builder()
            .config(config())
            .aggregator(Average)
            .sink(expected_sink.clone())
            .build();
        let source = SingleIteratorSource::new(car_events())
            .with_watermarks(limit_out_of_orderness(0));
        single.run(source, &CancellationToken::new()).unwrap();

        let sink = VecSink::new();
        let runtime = MultiThreadRuntime::<String, Average>::builder()
            .config(config())
            .aggregator(Average)
            .parallelism(4)
            .build()
            .unwrap();
        let source = SingleIteratorSource::new(car_events())
            .with_watermarks(limit_out_of_orderness(0));
        let stats = runtime
            .execute(source, sink.clone(), &CancellationToken::new())
            .unwrap();

        assert_eq!(stats.events, 200);
        assert_eq!(stats.results as usize, expected_sink.len());
        assert_eq!(
            sorted(sink.drain_vec(..)),
            sorted(expected_sink.drain_vec(..))
        );
    }

    /// Results of a single key are emitted in window order
    #[test]
    fn per_key_window_order() {
        let sink = VecSink::new();
        let runtime = MultiThreadRuntime::<String, Sum>::builder()
            .config(config())
            .aggregator(Sum)
            .parallelism(3)
            .build()
            .unwrap();
        let source = SingleIteratorSource::new(car_events())
            .with_watermarks(limit_out_of_orderness(0));
        runtime
            .execute(source, sink.clone(), &CancellationToken::new())
            .unwrap();

        let results: Vec<WindowResult<String, f64>> = sink.drain_vec(..);
        let by_key = results.iter().into_group_map_by(|r| r.key.clone());
        for windows in by_key.values() {
            let starts = windows.iter().map(|r| r.window.start).collect_vec();
            assert!(starts.windows(2).all(|w| w[0] < w[1]), "{starts:?}");
        }
    }

    #[test]
    fn custom_partitioner() {
        let sink = VecSink::new();
        let runtime = MultiThreadRuntime::<u64, Sum>::builder()
            .config(config())
            .aggregator(Sum)
            .parallelism(2)
            .partitioner(index_select)
            .build()
            .unwrap();
        let source = SingleIteratorSource::new((0..10u64).map(|i| Event::new(i, 1.0, 0)));
        let stats = runtime
            .execute(source, sink.clone(), &CancellationToken::new())
            .unwrap();

        assert_eq!(stats.results, 10);
        assert_eq!(sink.len(), 10);
    }

    #[test]
    fn zero_parallelism_is_rejected() {
        let runtime = MultiThreadRuntime::<u64, Sum>::builder()
            .config(config())
            .aggregator(Sum)
            .parallelism(0)
            .build();
        assert!(matches!(runtime, Err(RuntimeError::NoWorkers)));
    }

    #[test]
    fn stop_before_start_emits_nothing() {
        let stop = CancellationToken::new();
        stop.cancel();
        let sink = VecSink::new();
        let runtime = MultiThreadRuntime::<u64, Sum>::builder()
            .config(config())
            .aggregator(Sum)
            .parallelism(2)
            .build()
            .unwrap();
        let source = SingleIteratorSource::new((0..10u64).map(|i| Event::new(i, 1.0, 0)));
        let stats = runtime.execute(source, sink.clone(), &stop).unwrap();
        assert_eq!(stats.events, 0);
        assert!(sink.is_empty());
    }

    #[derive(Clone)]
    struct Unlucky;

    impl Aggregator<u64> for Unlucky {
        type Accumulator = u64;
        type Output = u64;

        fn create(&self, value: u64) -> u64 {
            assert_ne!(value, 13, "unlucky value");
            value
        }

        fn combine(&self, accumulator: &mut u64, value: u64) {
            *accumulator += value;
        }

        fn finalize(&self, accumulator: u64) -> Result<u64, AggregateError> {
            Ok(accumulator)
        }
    }

    #[test]
    fn worker_panic_is_reported() {
        init_logging();
        let runtime = MultiThreadRuntime::<u64, Unlucky>::builder()
            .config(config())
            .aggregator(Unlucky)
            .parallelism(2)
            .build()
            .unwrap();
        let source = SingleIteratorSource::new((0..20u64).map(|i| Event::new(i, i, 0)));
        let result = runtime.execute(source, VecSink::new(), &CancellationToken::new());
        assert!(matches!(result, Err(RuntimeError::WorkerPanicked(_))));
    }
}
