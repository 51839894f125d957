//! Records produced by the engine: one arbitration record per tick and
//! value-change telemetry samples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One motivation intensity as published, value formatted as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intensity {
    pub key: String,
    pub value: String,
}

/// What the engine publishes every tick, whether or not the dominant changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationRecord {
    pub tick: u64,
    pub dominant: String,
    pub intensities: Vec<Intensity>,
}

impl ArbitrationRecord {
    pub fn intensity(&self, name: &str) -> Option<f64> {
        self.intensities
            .iter()
            .find(|i| i.key == name)
            .and_then(|i| i.value.parse().ok())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryKind {
    HomeostaticVariable,
    State,
    Motivation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub kind: TelemetryKind,
    pub name: String,
    pub value: f64,
}

impl TelemetrySample {
    pub fn now(kind: TelemetryKind, name: &str, value: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            name: name.to_string(),
            value,
        }
    }
}
