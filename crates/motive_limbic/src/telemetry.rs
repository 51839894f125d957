//! Value-change telemetry
//!
//! Homeostatic variables, dual states and motivations report a sample
//! only when their observed value differs from the last one they
//! reported. Without a sink, observing is a no-op.

use motive_core::{TelemetryKind, TelemetrySample, TelemetrySink};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Per-entity change detector in front of an optional sink.
pub(crate) struct TelemetryProbe {
    kind: TelemetryKind,
    name: String,
    sink: Option<Arc<dyn TelemetrySink>>,
    last: Mutex<Option<f64>>,
}

impl TelemetryProbe {
    pub(crate) fn new(
        kind: TelemetryKind,
        name: &str,
        sink: Option<Arc<dyn TelemetrySink>>,
    ) -> Self {
        Self {
            kind,
            name: name.to_string(),
            sink,
            last: Mutex::new(None),
        }
    }

    pub(crate) fn observe(&self, value: f64) {
        let Some(sink) = &self.sink else {
            return;
        };
        {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if *last == Some(value) {
                return;
            }
            *last = Some(value);
        }
        sink.record(TelemetrySample::now(self.kind, &self.name, value));
    }
}

/// Emits every sample as a `debug!` event on the `motive::telemetry` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn record(&self, sample: TelemetrySample) {
        tracing::debug!(
            target: "motive::telemetry",
            kind = ?sample.kind,
            name = %sample.name,
            value = sample.value,
            "{};{}",
            sample.timestamp.to_rfc3339(),
            sample.value
        );
    }
}

/// Forwards samples to an unbounded channel. A dropped receiver just
/// discards them.
#[derive(Debug, Clone)]
pub struct ChannelTelemetry {
    tx: mpsc::UnboundedSender<TelemetrySample>,
}

impl ChannelTelemetry {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TelemetrySample>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl TelemetrySink for ChannelTelemetry {
    fn record(&self, sample: TelemetrySample) {
        let _ = self.tx.send(sample);
    }
}
