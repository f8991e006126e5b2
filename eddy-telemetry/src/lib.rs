//! Rolling per-car averages over racing telemetry.
//!
//! Telemetry samples arrive as JSON documents, one per line or Kafka record. Every sample
//! is keyed by its car, the configured [Channel] is averaged over tumbling windows and
//! each average is printed as `Avg Gear for car9 : 3.00 changed`.
pub mod app;
pub mod config;
pub mod format;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod lines;
pub mod parser;
pub mod record;

pub use app::{run, run_with_clock, AppError, TelemetrySource};
pub use config::AppConfig;
pub use format::{format_average, AveragePrinter};
pub use lines::LineSource;
pub use parser::{Channel, TelemetryError, TelemetryParser, TimeCharacteristic};
pub use record::TelemetryRecord;
