//! Wire format of a single telemetry sample.
//!
//! ```json
//! {"Car": 9, "time": "52.196000", "telemetry": {"Gear": "3.000000", "Speed": "34.137680"}}
//! ```
//!
//! The sender writes most numbers as strings, so every numeric field accepts both.
use std::{collections::HashMap, fmt::Display};

use serde::{Deserialize, Serialize};

/// One telemetry sample of one car
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Car number
    #[serde(rename = "Car")]
    pub car: CarId,
    /// Seconds since the start of the session
    #[serde(default)]
    pub time: Option<Reading>,
    /// Channel name to reading, e.g. `Gear`, `Speed` or `RPM`
    #[serde(default)]
    pub telemetry: HashMap<String, Reading>,
}

impl TelemetryRecord {
    /// Parse a record from a single JSON document
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Stream key of this record, e.g. `car9`
    pub fn key(&self) -> String {
        format!("car{}", self.car)
    }
}

/// Car number, sent either as a JSON number or as a string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CarId {
    /// `"Car": 9`
    Number(u64),
    /// `"Car": "9"`
    Text(String),
}

impl Display for CarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CarId::Number(n) => write!(f, "{n}"),
            CarId::Text(t) => f.write_str(t.trim()),
        }
    }
}

/// A numeric reading, sent either as a JSON number or as a numeric string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    /// `"Gear": 3.0`
    Number(f64),
    /// `"Gear": "3.000000"`
    Text(String),
}

impl Reading {
    /// The reading as a finite number, `None` if it is not one
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Reading::Number(n) => *n,
            Reading::Text(t) => t.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }
}
