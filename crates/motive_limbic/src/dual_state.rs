//! Dual States
//!
//! A binary signal with a rising phase and a falling phase. While the
//! state is "on" its activation evolution climbs toward 100; while "off"
//! its deactivation evolution falls toward 0. Each transition hands the
//! current value across so the signal never resets.

use crate::evolution::{EvolvingQuantity, QuantitySpec};
use crate::heartbeat::HeartbeatConfig;
use crate::telemetry::TelemetryProbe;
use motive_core::{
    AgentId, Bounds, EvolutionParams, StateId, StimulusId, TelemetryKind, TelemetrySink,
};
use std::sync::Arc;
use std::time::Duration;

/// Who a dual state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateOwner {
    Agent(AgentId),
    Stimulus(StimulusId),
}

pub struct DualState {
    id: StateId,
    name: String,
    owner: StateOwner,
    activation: EvolvingQuantity,
    deactivation: EvolvingQuantity,
    telemetry: TelemetryProbe,
}

impl DualState {
    /// Create the state with both phases paused at 0.
    pub fn new(
        id: StateId,
        name: &str,
        owner: StateOwner,
        activation: EvolutionParams,
        deactivation: EvolutionParams,
        heartbeat: &HeartbeatConfig,
        sink: Option<Arc<dyn TelemetrySink>>,
    ) -> Self {
        let phase = |suffix: &str, params: EvolutionParams| {
            EvolvingQuantity::spawn(
                QuantitySpec {
                    id,
                    name: format!("{}_{}", name, suffix),
                    initial_value: 0.0,
                    ideal_value: 100.0,
                    bounds: Bounds::PERCENT,
                    satisfaction_time: Duration::ZERO,
                    params,
                },
                false,
                heartbeat,
            )
        };

        Self {
            id,
            name: name.to_string(),
            owner,
            activation: phase("activation", activation),
            deactivation: phase("deactivation", deactivation),
            telemetry: TelemetryProbe::new(TelemetryKind::State, name, sink),
        }
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> StateOwner {
        self.owner
    }

    pub fn activate(&self) {
        self.activation.set_value(self.deactivation.get_value());
        self.activation.set_evolving(true);
        self.deactivation.set_evolving(false);
    }

    pub fn deactivate(&self) {
        self.deactivation.set_value(self.activation.get_value());
        self.activation.set_evolving(false);
        self.deactivation.set_evolving(true);
    }

    /// `Some(true)` while rising, `Some(false)` while falling, `None` before
    /// the state was ever switched.
    pub fn is_active(&self) -> Option<bool> {
        match (self.activation.is_evolving(), self.deactivation.is_evolving()) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }

    /// Current signal, always within [0, 100].
    pub fn get_value(&self) -> f64 {
        let value = if self.activation.is_evolving() {
            self.activation.get_value()
        } else {
            self.deactivation.get_value()
        };
        let value = Bounds::PERCENT.clamp(value);
        self.telemetry.observe(value);
        value
    }

    pub async fn stop(&self) {
        self.activation.stop().await;
        self.deactivation.stop().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.activation.is_stopped() && self.deactivation.is_stopped()
    }
}

impl std::fmt::Debug for DualState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualState")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
