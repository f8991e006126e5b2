//! Wiring of the `speed-avg` application: source, watermarks, runtime and printer.
use eddy::{
    aggregate::Average,
    config::ConfigError,
    runtime::{CancellationToken, MultiThreadRuntime, Pipeline, PipelineError, PipelineStats, RuntimeError},
    sinks::Sink,
    sources::{limit_out_of_orderness, now_millis, PeriodicWatermarks, Source, SourceExt},
    types::Timestamp,
};
use thiserror::Error;
use tracing::info;

use crate::{config::AppConfig, parser::TimeCharacteristic};

/// Boxed telemetry source as consumed by [run]
pub type TelemetrySource = Box<dyn Source<String, f64> + Send>;

/// Failures of [run]
#[derive(Debug, Error)]
pub enum AppError {
    /// The window settings were rejected
    #[error("Invalid window configuration")]
    Config(#[from] ConfigError),
    /// The single threaded pipeline failed
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    /// The multi threaded runtime failed
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Attach watermarks matching the configured time characteristic.
/// Processing time watermarks are read from `clock`.
pub fn with_watermarks(
    config: &AppConfig,
    source: TelemetrySource,
    clock: fn() -> Timestamp,
) -> TelemetrySource {
    match config.time {
        TimeCharacteristic::EventTime => {
            Box::new(source.with_watermarks(limit_out_of_orderness(config.out_of_orderness_ms)))
        }
        TimeCharacteristic::ProcessingTime => {
            Box::new(source.with_watermarks(PeriodicWatermarks::with_clock(
                config.watermark_interval(),
                clock,
            )))
        }
    }
}

/// Average the configured channel per car and window until `source` is finished or
/// `stop` is cancelled. Open windows are flushed before returning.
pub fn run<S>(
    config: &AppConfig,
    source: TelemetrySource,
    sink: S,
    stop: &CancellationToken,
) -> Result<PipelineStats, AppError>
where
    S: Sink<String, f64>,
{
    run_with_clock(config, source, sink, stop, now_millis)
}

/// [run] with processing time watermarks taken from `clock`
pub fn run_with_clock<S>(
    config: &AppConfig,
    source: TelemetrySource,
    sink: S,
    stop: &CancellationToken,
    clock: fn() -> Timestamp,
) -> Result<PipelineStats, AppError>
where
    S: Sink<String, f64>,
{
    let window = config.window_config()?;
    let source = with_watermarks(config, source, clock);
    info!(
        "Averaging {} per car in windows of {} ms on {} worker(s)",
        config.channel,
        window.window_size(),
        config.parallelism
    );

    let stats = if config.parallelism > 1 {
        MultiThreadRuntime::<String, Average>::builder()
            .config(window)
            .aggregator(Average)
            .parallelism(config.parallelism)
            .build()?
            .execute(source, sink, stop)?
    } else {
        Pipeline::builder()
            .config(window)
            .aggregator(Average)
            .sink(sink)
            .build()
            .run(source, stop)?
    };
    info!(
        "Processed {} events ({} late, {} dropped) into {} averages",
        stats.events, stats.late_events, stats.dropped_events, stats.results
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicU64, Ordering},
    };

    use eddy::{
        sinks::VecSink,
        sources::SingleIteratorSource,
        types::{Event, Window, WindowResult},
    };
    use envconfig::Envconfig;

    use super::*;
    use crate::{format::AveragePrinter, parser::Channel, TelemetryParser};

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::init_from_hashmap(&vars).unwrap()
    }

    fn lines_source(lines: &[&str]) -> TelemetrySource {
        let parser = TelemetryParser::default();
        let events: Vec<Event<String, f64>> =
            lines.iter().filter_map(|l| parser.parse(l).ok()).collect();
        Box::new(SingleIteratorSource::new(events))
    }

    const SESSION: [&str; 5] = [
        r#"{"Car": 9, "time": "51.000", "telemetry": {"Gear": "3.000000"}}"#,
        r#"{"Car": 9, "time": "52.000", "telemetry": {"Gear": "4.000000"}}"#,
        r#"{"Car": 1, "time": "52.500", "telemetry": {"Gear": "2.000000"}}"#,
        r#"{"Car": 9, "time": "53.000", "telemetry": {"Gear": "4.000000"}}"#,
        r#"{"Car": 9, "time": "54.100", "telemetry": {"Gear": "6.000000"}}"#,
    ];

    #[test]
    fn prints_demo_output() {
        let mut out = Vec::new();
        {
            let printer = AveragePrinter::new(Channel::Gear, &mut out);
            let stats = run(
                &config(&[]),
                lines_source(&SESSION),
                printer,
                &CancellationToken::new(),
            )
            .unwrap();
            assert_eq!(stats.events, 5);
            assert_eq!(stats.results, 3);
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Avg Gear for car1 : 2.00 changed\n\
             Avg Gear for car9 : 3.67 changed\n\
             Avg Gear for car9 : 6.00 changed\n"
        );
    }

    #[test]
    fn multi_threaded_same_averages() {
        let sink = VecSink::new();
        run(
            &config(&[("EDDY_PARALLELISM", "3")]),
            lines_source(&SESSION),
            sink.clone(),
            &CancellationToken::new(),
        )
        .unwrap();

        let mut results: Vec<WindowResult<String, f64>> = sink.drain_vec(..);
        results.sort_by(|a, b| a.window.cmp(&b.window).then_with(|| a.key.cmp(&b.key)));
        let summary: Vec<_> = results
            .iter()
            .map(|r| (r.key.as_str(), r.window, format!("{:.2}", r.value)))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("car1", Window::new(51_000, 54_000), "2.00".to_owned()),
                ("car9", Window::new(51_000, 54_000), "3.67".to_owned()),
                ("car9", Window::new(54_000, 57_000), "6.00".to_owned()),
            ]
        );
    }

    #[test]
    fn invalid_window_is_reported() {
        let result = run(
            &config(&[("EDDY_WINDOW_SECS", "0")]),
            lines_source(&SESSION),
            VecSink::new(),
            &CancellationToken::new(),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    static WALL_CLOCK: AtomicU64 = AtomicU64::new(51_000);

    /// Every reading moves the wall clock forward by one window
    fn ticking_clock() -> Timestamp {
        WALL_CLOCK.fetch_add(3_000, Ordering::SeqCst)
    }

    /// With processing time, windows fire on the wall clock instead of event timestamps
    #[test]
    fn processing_time_follows_clock() {
        let events = vec![
            Event::new("car9".to_owned(), 3.0, 51_100),
            Event::new("car9".to_owned(), 5.0, 51_200),
            Event::new("car9".to_owned(), 6.0, 54_500),
        ];
        let sink = VecSink::new();
        let stats = run_with_clock(
            &config(&[("EDDY_TIME", "processing"), ("EDDY_WATERMARK_INTERVAL_MS", "1000")]),
            Box::new(SingleIteratorSource::new(events)),
            sink.clone(),
            &CancellationToken::new(),
            ticking_clock,
        )
        .unwrap();

        // watermarks 51_000, 54_000, 57_000 fire both windows before the source ends
        assert_eq!(stats.watermark, Some(57_000));
        assert_eq!(stats.results, 2);
        let values: Vec<_> = sink
            .drain_vec(..)
            .into_iter()
            .map(|r: WindowResult<String, f64>| (r.window.start, r.value))
            .collect();
        assert_eq!(values, vec![(51_000, 4.0), (54_000, 6.0)]);
    }
}
