//! Homeostatic Variables
//!
//! A homeostatic variable is an internal drive with an ideal point. Its
//! baseline evolution drifts on its own; while actions are running, one
//! overlay evolution per attached effect takes over and the baseline is
//! paused. Concurrent overlays are summed (not averaged) and saturate the
//! variable as a whole.

use crate::entity::Effect;
use crate::evolution::{EvolvingQuantity, QuantitySpec};
use crate::heartbeat::HeartbeatConfig;
use crate::telemetry::TelemetryProbe;
use motive_core::{
    Bounds, ConfigError, EffectId, EvolutionParams, HomeostaticVariableConfig, HvId,
    TelemetryKind, TelemetrySink,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Effect overlays, keyed by effect id. The set changes shape on
/// attach/detach, so it lives behind its own lock.
#[derive(Default)]
struct Overlays {
    by_effect: BTreeMap<EffectId, EvolvingQuantity>,
    last_attached: Option<EffectId>,
    stopped: bool,
}

impl Overlays {
    fn any_evolving(&self) -> bool {
        self.by_effect.values().any(EvolvingQuantity::is_evolving)
    }
}

pub struct HomeostaticVariable {
    id: HvId,
    name: String,
    ideal_value: f64,
    bounds: Bounds,
    satisfaction_time: Duration,
    heartbeat: HeartbeatConfig,
    baseline: EvolvingQuantity,
    overlays: RwLock<Overlays>,
    telemetry: TelemetryProbe,
}

impl HomeostaticVariable {
    /// Create the variable and start its baseline evolution.
    pub fn new(
        config: &HomeostaticVariableConfig,
        params: EvolutionParams,
        heartbeat: &HeartbeatConfig,
        sink: Option<Arc<dyn TelemetrySink>>,
    ) -> Result<Self, ConfigError> {
        let bounds = Bounds::new(&config.name, config.lower_limit, config.upper_limit)?;
        let satisfaction_time = config.satisfaction_time();
        let baseline = EvolvingQuantity::spawn(
            QuantitySpec {
                id: config.id,
                name: config.name.clone(),
                initial_value: config.initial_value,
                ideal_value: config.ideal_value,
                bounds,
                satisfaction_time,
                params,
            },
            true,
            heartbeat,
        );

        Ok(Self {
            id: config.id,
            name: config.name.clone(),
            ideal_value: config.ideal_value,
            bounds,
            satisfaction_time,
            heartbeat: *heartbeat,
            baseline,
            overlays: RwLock::new(Overlays::default()),
            telemetry: TelemetryProbe::new(TelemetryKind::HomeostaticVariable, &config.name, sink),
        })
    }

    pub fn id(&self) -> HvId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ideal_value(&self) -> f64 {
        self.ideal_value
    }

    pub fn baseline(&self) -> &EvolvingQuantity {
        &self.baseline
    }

    /// Attach an effect. An overlay that already exists for this effect is
    /// reactivated instead of duplicated; either way it starts from the
    /// baseline's current value.
    ///
    /// The baseline is paused before the overlay is armed. A punctual
    /// overlay may finish its jump on another worker thread before this
    /// returns; `get_deficit` then hands its value back to the baseline.
    pub async fn add_effect(&self, effect: &Effect) {
        let mut overlays = self.overlays.write().await;
        if overlays.stopped {
            tracing::debug!("{}: stopped, effect {} not attached", self.name, effect.id);
            return;
        }
        self.baseline.set_evolving(false);
        let seed = self.baseline.get_value();

        match overlays.by_effect.get(&effect.id) {
            Some(overlay) => {
                overlay.set_value(seed);
                overlay.set_evolving(true);
                tracing::debug!("{}: effect {} reactivated at {:.2}", self.name, effect.id, seed);
            }
            None => {
                let overlay = EvolvingQuantity::spawn(
                    QuantitySpec {
                        id: effect.id,
                        name: format!("{}_effect{}", self.name, effect.id),
                        initial_value: seed,
                        ideal_value: self.ideal_value,
                        bounds: self.bounds,
                        satisfaction_time: self.satisfaction_time,
                        params: effect.params,
                    },
                    true,
                    &self.heartbeat,
                );
                overlays.by_effect.insert(effect.id, overlay);
                tracing::debug!("{}: effect {} attached at {:.2}", self.name, effect.id, seed);
            }
        }
        overlays.last_attached = Some(effect.id);
    }

    /// Detach an effect. When no overlay is left evolving, the baseline
    /// resumes from the detached overlay's value. Returns false for an
    /// effect that was never attached.
    pub async fn remove_effect(&self, effect_id: EffectId) -> bool {
        let overlays = self.overlays.write().await;
        let Some(overlay) = overlays.by_effect.get(&effect_id) else {
            tracing::warn!("{}: effect {} is not attached, ignoring", self.name, effect_id);
            return false;
        };
        overlay.set_evolving(false);

        if !overlays.stopped && !overlays.any_evolving() && !self.baseline.is_evolving() {
            let value = overlay.get_value();
            self.baseline.set_value(value);
            self.baseline.set_evolving(true);
            tracing::debug!("{}: baseline resumed at {:.2}", self.name, value);
        }
        true
    }

    /// Ideal value minus the current aggregate value.
    pub async fn get_deficit(&self) -> f64 {
        let overlays = self.overlays.read().await;
        let active: Vec<&EvolvingQuantity> = overlays
            .by_effect
            .values()
            .filter(|overlay| overlay.is_evolving())
            .collect();

        let deficit = if active.is_empty() {
            let paused = !self.baseline.is_evolving() && !self.baseline.is_stopped();
            if paused && !overlays.stopped {
                self.settle(&overlays);
            }
            self.ideal_value - self.baseline.get_value()
        } else {
            let total = self
                .bounds
                .clamp(active.iter().map(|overlay| overlay.get_value()).sum());
            // Simultaneous effects converge on one shared aggregate
            for overlay in &active {
                overlay.set_value(total);
            }
            self.ideal_value - total
        };

        self.telemetry.observe(deficit);
        deficit
    }

    /// Every attached overlay has stopped on its own (a punctual effect made
    /// its jump) while the baseline is still paused: hand the latest
    /// overlay's value back to the baseline.
    fn settle(&self, overlays: &Overlays) {
        let Some(overlay) = overlays
            .last_attached
            .and_then(|id| overlays.by_effect.get(&id))
        else {
            return;
        };
        let value = overlay.get_value();
        self.baseline.set_value(value);
        self.baseline.set_evolving(true);
        tracing::debug!("{}: punctual effects settled at {:.2}", self.name, value);
    }

    pub async fn active_effects(&self) -> Vec<EffectId> {
        let overlays = self.overlays.read().await;
        overlays
            .by_effect
            .iter()
            .filter(|(_, overlay)| overlay.is_evolving())
            .map(|(id, _)| *id)
            .collect()
    }

    pub async fn overlay_count(&self) -> usize {
        self.overlays.read().await.by_effect.len()
    }

    /// Stop the baseline and every overlay, waiting for each worker. No
    /// effect can be attached afterwards.
    pub async fn stop(&self) {
        let mut overlays = self.overlays.write().await;
        overlays.stopped = true;
        self.baseline.stop().await;
        for overlay in overlays.by_effect.values() {
            overlay.stop().await;
        }
    }
}

impl std::fmt::Debug for HomeostaticVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HomeostaticVariable")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("ideal_value", &self.ideal_value)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}
