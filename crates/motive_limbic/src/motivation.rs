//! Motivations
//!
//! A motivation aggregates the deficits of its homeostatic variables,
//! modulated by the signals of related agents and stimuli:
//!
//! `value = hv_mean + ALPHA * hv_mean * external_mean`
//!
//! External signals only modulate the homeostatic term; with no deficit
//! there is no motivation, whatever the environment looks like.

use crate::model::DriveModel;
use crate::telemetry::TelemetryProbe;
use motive_core::{AgentId, HvId, MotivationId, StimulusId, TelemetryKind, TelemetrySink};
use std::sync::Arc;

/// Coupling between external signals and the homeostatic term.
pub const ALPHA: f64 = 0.01;

pub struct Motivation {
    id: MotivationId,
    name: String,
    threshold: f64,
    related_hv: Vec<HvId>,
    related_stimuli: Vec<StimulusId>,
    related_agents: Vec<AgentId>,
    telemetry: TelemetryProbe,
}

impl Motivation {
    pub fn new(
        id: MotivationId,
        name: &str,
        threshold: f64,
        related_hv: Vec<HvId>,
        related_stimuli: Vec<StimulusId>,
        related_agents: Vec<AgentId>,
        sink: Option<Arc<dyn TelemetrySink>>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            threshold,
            related_hv,
            related_stimuli,
            related_agents,
            telemetry: TelemetryProbe::new(TelemetryKind::Motivation, name, sink),
        }
    }

    pub fn id(&self) -> MotivationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn related_hv(&self) -> &[HvId] {
        &self.related_hv
    }

    pub fn related_stimuli(&self) -> &[StimulusId] {
        &self.related_stimuli
    }

    pub fn related_agents(&self) -> &[AgentId] {
        &self.related_agents
    }

    /// Current intensity, read from the live model.
    pub async fn get_value(&self, model: &DriveModel) -> f64 {
        let mut deficits = Vec::with_capacity(self.related_hv.len());
        for id in &self.related_hv {
            if let Some(hv) = model.homeostatic_variable(*id) {
                deficits.push(hv.get_deficit().await);
            }
        }

        let agent_signals: Vec<f64> = self
            .related_agents
            .iter()
            .filter_map(|id| model.agent(*id))
            .map(|agent| model.signal(&agent.states))
            .collect();
        let stimulus_signals: Vec<f64> = self
            .related_stimuli
            .iter()
            .filter_map(|id| model.stimulus(*id))
            .map(|stimulus| model.signal(&stimulus.states))
            .collect();

        let value = intensity(&deficits, &agent_signals, &stimulus_signals);
        self.telemetry.observe(value);
        value
    }
}

impl std::fmt::Debug for Motivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Motivation")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

/// Combine deficits and external signals into one intensity.
///
/// `agent_signals` holds one entry per related agent (the sum of that
/// agent's dual-state values), likewise `stimulus_signals`.
pub fn intensity(deficits: &[f64], agent_signals: &[f64], stimulus_signals: &[f64]) -> f64 {
    let hv_mean = mean(deficits);
    let external_mean = mean(agent_signals) + mean(stimulus_signals);
    hv_mean + ALPHA * hv_mean * external_mean
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
