//! # Motive Limbic System
//!
//! The concurrent drive engine. Internal needs drift on their own,
//! actions and perceptions perturb them, and once per tick exactly one
//! motivation is selected as dominant.
//!
//! ## Architecture
//!
//! Every evolving quantity is a background task owning one bounded value:
//! 1. Homeostatic variables compose a baseline with per-effect overlays
//! 2. Dual states pair a rising and a falling quantity per agent/stimulus state
//! 3. Motivations aggregate deficits, modulated by state signals
//! 4. The arbitrator picks the dominant motivation, favouring the incumbent
//!
//! ## Time Scales
//!
//! - Evolution tick (default 1s): one step of every evolving quantity
//! - Idle poll (default 100ms): reactivation bound for a paused quantity
//! - Arbitration tick (default 1s): one dominant-motivation selection

pub mod arbitrator;
mod dual_state;
mod entity;
pub mod evolution;
mod heartbeat;
mod homeostatic;
mod lifecycle;
mod model;
mod motivation;
mod system;
mod telemetry;

pub use arbitrator::{Arbitrator, Decision, DominanceHistory, Reading};
pub use dual_state::{DualState, StateOwner};
pub use entity::{Action, Agent, Effect, StateSet, Stimulus};
pub use evolution::{advance, EvolvingQuantity, QuantitySpec, StepOutcome, Trajectory};
pub use heartbeat::HeartbeatConfig;
pub use homeostatic::HomeostaticVariable;
pub use lifecycle::{LifecycleAdapter, LifecycleOutcome};
pub use model::DriveModel;
pub use motivation::{intensity, Motivation, ALPHA};
pub use system::{DominanceNames, DriveSystem};
pub use telemetry::{ChannelTelemetry, TracingTelemetry};
