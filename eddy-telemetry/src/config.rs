//! Settings of the `speed-avg` application, read from `EDDY_*` environment variables.
use std::{str::FromStr, time::Duration};

use eddy::config::{ConfigError, LatePolicy, WindowConfig};
use envconfig::Envconfig;
use thiserror::Error;

use crate::parser::{Channel, TelemetryParser, TimeCharacteristic};

/// Settings of `speed-avg`
#[derive(Envconfig, Debug, Clone)]
pub struct AppConfig {
    /// Length of the tumbling windows in seconds
    #[envconfig(from = "EDDY_WINDOW_SECS", default = "3")]
    pub window_secs: u64,

    /// How long a window stays open after the watermark passed its end
    #[envconfig(from = "EDDY_ALLOWED_LATENESS_MS", default = "0")]
    pub allowed_lateness_ms: u64,

    /// `refire` or `drop`
    #[envconfig(from = "EDDY_LATE_POLICY", default = "refire")]
    pub late_policy: LatePolicy,

    /// How far event time may go backwards before events count as late
    #[envconfig(from = "EDDY_OUT_OF_ORDERNESS_MS", default = "0")]
    pub out_of_orderness_ms: u64,

    /// Interval of processing time watermarks
    #[envconfig(from = "EDDY_WATERMARK_INTERVAL_MS", default = "200")]
    pub watermark_interval_ms: u64,

    /// Number of worker threads, 1 runs everything on the main thread
    #[envconfig(from = "EDDY_PARALLELISM", default = "1")]
    pub parallelism: u64,

    /// `event` or `processing`
    #[envconfig(from = "EDDY_TIME", default = "event")]
    pub time: TimeCharacteristic,

    /// `gear`, `speed` or `speed-kmh`
    #[envconfig(from = "EDDY_CHANNEL", default = "gear")]
    pub channel: Channel,

    /// `stdin` or `kafka`
    #[envconfig(from = "EDDY_INPUT", default = "stdin")]
    pub input: Input,

    /// Used with `EDDY_INPUT=kafka`
    #[envconfig(nested)]
    pub kafka: KafkaConfig,
}

/// Consumer settings for Kafka input
#[derive(Envconfig, Debug, Clone)]
pub struct KafkaConfig {
    /// Comma separated list of brokers
    #[envconfig(from = "EDDY_KAFKA_BROKERS", default = "localhost:9092")]
    pub brokers: String,
    /// Topic to subscribe to
    #[envconfig(from = "EDDY_KAFKA_TOPIC", default = "flink-demo")]
    pub topic: String,
    /// Consumer group
    #[envconfig(from = "EDDY_KAFKA_GROUP_ID", default = "flink_consumer")]
    pub group_id: String,
    /// Where to start without a committed offset, `earliest` or `latest`
    #[envconfig(from = "EDDY_KAFKA_OFFSET_RESET", default = "earliest")]
    pub auto_offset_reset: String,
}

impl KafkaConfig {
    /// Brokers with surrounding whitespace and empty entries removed
    pub fn broker_list(&self) -> impl Iterator<Item = &str> {
        self.brokers
            .split(',')
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }
}

/// Where telemetry lines are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Input {
    /// Newline-delimited JSON on standard input
    #[default]
    Stdin,
    /// Records of a Kafka topic
    Kafka,
}

impl FromStr for Input {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdin" | "-" => Ok(Input::Stdin),
            "kafka" => Ok(Input::Kafka),
            _ => Err(InputError(s.to_owned())),
        }
    }
}

/// `EDDY_INPUT` not recognized
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown input `{0}`, expected stdin or kafka")]
pub struct InputError(String);

impl AppConfig {
    /// Validated window settings
    pub fn window_config(&self) -> Result<WindowConfig, ConfigError> {
        WindowConfig::builder()
            .window_duration(Duration::from_secs(self.window_secs))
            .allowed_lateness(Duration::from_millis(self.allowed_lateness_ms))
            .late_policy(self.late_policy)
            .build()
    }

    /// Parser for the configured channel and time characteristic
    pub fn parser(&self) -> TelemetryParser {
        TelemetryParser::new(self.channel, self.time)
    }

    /// Interval of processing time watermarks
    pub fn watermark_interval(&self) -> Duration {
        Duration::from_millis(self.watermark_interval_ms)
    }
}
