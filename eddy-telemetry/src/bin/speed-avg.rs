//! Print rolling per-car averages of telemetry read from stdin or Kafka.
//!
//! ```sh
//! EDDY_CHANNEL=gear RUST_LOG=info speed-avg < session.jsonl
//! ```
use std::io::BufReader;

use eddy::runtime::CancellationToken;
use eddy_telemetry::{
    config::{AppConfig, Input},
    AveragePrinter, LineSource, TelemetrySource,
};
use envconfig::Envconfig;
use eyre::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // stdout carries the averages, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::init_from_env().wrap_err("Invalid EDDY_* environment")?;
    let stop = CancellationToken::new();

    let on_signal = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, flushing open windows");
            on_signal.cancel();
        }
    });

    let stats = tokio::task::spawn_blocking(move || -> eyre::Result<_> {
        let source = open_input(&config)?;
        let printer = AveragePrinter::stdout(config.channel);
        Ok(eddy_telemetry::run(&config, source, printer, &stop)?)
    })
    .await??;
    info!("Done, {} averages printed", stats.results);
    Ok(())
}

fn open_input(config: &AppConfig) -> eyre::Result<TelemetrySource> {
    match config.input {
        Input::Stdin => Ok(Box::new(LineSource::spawn(
            BufReader::new(std::io::stdin()),
            config.parser(),
        ))),
        #[cfg(feature = "kafka")]
        Input::Kafka => Ok(eddy_telemetry::kafka::kafka_source(
            &config.kafka,
            config.parser(),
        )?),
        #[cfg(not(feature = "kafka"))]
        Input::Kafka => Err(eyre::eyre!(
            "Kafka input requires building with the `kafka` feature"
        )),
    }
}
