//! Heartbeat configuration for the drive engine
//!
//! Two clocks run side by side: the arbitration tick, and the step period
//! of every evolving quantity. A quantity that is switched off re-checks
//! its state on the (shorter) idle poll.

use motive_core::RuntimeConfig;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeartbeatConfig {
    /// How often the arbitrator selects a dominant motivation (default: 1s)
    pub interval: Duration,
    /// Step period of an evolving quantity (default: 1s)
    pub evolution_tick: Duration,
    /// Upper bound on reactivation latency of a paused quantity (default: 100ms)
    pub idle_poll: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            evolution_tick: Duration::from_secs(1),
            idle_poll: Duration::from_millis(100),
        }
    }
}

impl HeartbeatConfig {
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            interval: runtime.tick_interval(),
            evolution_tick: runtime.evolution_tick(),
            idle_poll: runtime.idle_poll(),
        }
    }

    /// Very fast heartbeat for testing
    pub fn testing() -> Self {
        Self {
            interval: Duration::from_millis(10),
            evolution_tick: Duration::from_millis(10),
            idle_poll: Duration::from_millis(1),
        }
    }
}
