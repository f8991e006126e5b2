//! Decoding of telemetry samples into keyed events.
use std::{fmt::Display, str::FromStr};

use eddy::{
    sources::now_millis,
    types::{Event, Timestamp},
};
use thiserror::Error;

use crate::record::TelemetryRecord;

/// Telemetry channel which is averaged per car
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Channel {
    /// Selected gear
    #[default]
    Gear,
    /// Speed as sent by the car, in meters per second
    Speed,
    /// Speed converted to kilometers per hour
    SpeedKmh,
}

impl Channel {
    /// Name of the field in the `telemetry` object
    pub fn field(&self) -> &'static str {
        match self {
            Channel::Gear => "Gear",
            Channel::Speed | Channel::SpeedKmh => "Speed",
        }
    }

    fn convert(&self, raw: f64) -> f64 {
        match self {
            Channel::SpeedKmh => raw * 18.0 / 5.0,
            Channel::Gear | Channel::Speed => raw,
        }
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.field())
    }
}

impl FromStr for Channel {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gear" => Ok(Channel::Gear),
            "speed" => Ok(Channel::Speed),
            "speed-kmh" | "speed_kmh" => Ok(Channel::SpeedKmh),
            _ => Err(TelemetryError::UnknownChannel(s.to_owned())),
        }
    }
}

/// Where event timestamps come from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeCharacteristic {
    /// The `time` field of the record, in seconds
    #[default]
    EventTime,
    /// The wall clock at the moment the record is parsed
    ProcessingTime,
}

impl FromStr for TimeCharacteristic {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "event" | "event-time" | "event_time" => Ok(TimeCharacteristic::EventTime),
            "processing" | "processing-time" | "processing_time" => {
                Ok(TimeCharacteristic::ProcessingTime)
            }
            _ => Err(TelemetryError::UnknownTimeCharacteristic(s.to_owned())),
        }
    }
}

/// Errors of parsing telemetry and its settings
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TelemetryError {
    /// The input is not a usable telemetry sample
    #[error("Malformed telemetry event: {0}")]
    MalformedEvent(String),
    /// Channel setting not recognized
    #[error("Unknown telemetry channel `{0}`, expected one of gear, speed, speed-kmh")]
    UnknownChannel(String),
    /// Time characteristic setting not recognized
    #[error("Unknown time characteristic `{0}`, expected event or processing")]
    UnknownTimeCharacteristic(String),
}

/// Turns JSON telemetry lines into keyed events.
///
/// The key is `car<Car>`, the value is the configured [Channel] and the timestamp is
/// taken according to the [TimeCharacteristic].
///
/// ```
/// use eddy_telemetry::TelemetryParser;
///
/// let parser = TelemetryParser::default();
/// let event = parser
///     .parse(r#"{"Car": 9, "time": "52.196000", "telemetry": {"Gear": "3.000000"}}"#)
///     .unwrap();
/// assert_eq!(event.key, "car9");
/// assert_eq!(event.value, 3.0);
/// assert_eq!(event.timestamp, 52_196);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TelemetryParser {
    channel: Channel,
    time: TimeCharacteristic,
    clock: fn() -> Timestamp,
}

impl Default for TelemetryParser {
    fn default() -> Self {
        Self::new(Channel::default(), TimeCharacteristic::default())
    }
}

impl TelemetryParser {
    /// Parse `channel` with timestamps according to `time`
    pub fn new(channel: Channel, time: TimeCharacteristic) -> Self {
        Self {
            channel,
            time,
            clock: now_millis,
        }
    }

    /// Use a custom clock for processing time
    pub fn with_clock(mut self, clock: fn() -> Timestamp) -> Self {
        self.clock = clock;
        self
    }

    /// Channel being extracted
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Where timestamps are taken from
    pub fn time_characteristic(&self) -> TimeCharacteristic {
        self.time
    }

    /// Parse a single JSON document into an event
    pub fn parse(&self, json: &str) -> Result<Event<String, f64>, TelemetryError> {
        let record = TelemetryRecord::from_json(json)
            .map_err(|e| TelemetryError::MalformedEvent(e.to_string()))?;
        self.extract(&record)
    }

    /// Extract the configured channel and timestamp from a decoded record
    pub fn extract(&self, record: &TelemetryRecord) -> Result<Event<String, f64>, TelemetryError> {
        let field = self.channel.field();
        let raw = record
            .telemetry
            .get(field)
            .ok_or_else(|| TelemetryError::MalformedEvent(format!("missing channel `{field}`")))?
            .as_f64()
            .ok_or_else(|| TelemetryError::MalformedEvent(format!("`{field}` is not a number")))?;

        let timestamp = match self.time {
            TimeCharacteristic::EventTime => {
                let seconds = record
                    .time
                    .as_ref()
                    .and_then(|t| t.as_f64())
                    .ok_or_else(|| {
                        TelemetryError::MalformedEvent("missing or invalid `time`".to_owned())
                    })?;
                seconds_to_millis(seconds)?
            }
            TimeCharacteristic::ProcessingTime => (self.clock)(),
        };
        Ok(Event::new(record.key(), self.channel.convert(raw), timestamp))
    }
}

fn seconds_to_millis(seconds: f64) -> Result<Timestamp, TelemetryError> {
    let millis = (seconds * 1000.0).round();
    if millis < 0.0 || millis >= Timestamp::MAX as f64 {
        return Err(TelemetryError::MalformedEvent(format!(
            "`time` {seconds} is out of range"
        )));
    }
    Ok(millis as Timestamp)
}
