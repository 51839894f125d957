//! # Motive Core
//!
//! Runtime-free vocabulary shared by the motivational engine and its
//! edges: the configuration model, evolution parameters, lifecycle
//! events, published records, and the two outbound seams
//! ([`Publisher`], [`TelemetrySink`]).

pub mod config;
pub mod error;
pub mod event;
pub mod evolution;
pub mod record;

pub use config::{
    ActionConfig, ActionKind, Constancy, EffectConfig, EntityConfig, HomeostaticVariableConfig,
    MotivationConfig, MotiveConfig, RelationList, RuntimeConfig, StateConfig,
};
pub use error::ConfigError;
pub use event::{ActionEvent, ActionStatus, LifecycleEvent, PerceptionEvent};
pub use evolution::{Bounds, EvolutionKind, EvolutionParams, EvolutionRow};
pub use record::{ArbitrationRecord, Intensity, TelemetryKind, TelemetrySample};

use async_trait::async_trait;

pub type HvId = u32;
pub type StateId = u32;
pub type EffectId = u32;
pub type ActionId = u32;
pub type AgentId = u32;
pub type StimulusId = u32;
pub type MotivationId = u32;

/// Name of the motivation that wins when nothing clears its threshold.
pub const FALLBACK_MOTIVATION: &str = "none";

/// Receives one record per arbitration tick.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, record: &ArbitrationRecord) -> anyhow::Result<()>;
}

/// Receives value-change samples. Must not block the caller.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, sample: TelemetrySample);
}
