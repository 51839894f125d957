//! Evolving Quantities - the atomic unit of concurrency
//!
//! Each quantity owns one bounded value and advances it on its own
//! background task, following one of five drift functions. Readers on
//! other tasks only ever go through the accessors, each of which takes the
//! quantity's private lock for a single field access and never holds it
//! across a sleep.
//!
//! Shutdown is cooperative and uses two flags: `stop()` clears `evolving`,
//! then raises `stopping`. The worker keeps looping while
//! `evolving || !stopping` and performs the terminal exit itself.

use crate::heartbeat::HeartbeatConfig;
use motive_core::{Bounds, EvolutionKind, EvolutionParams};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::Instant;

/// Static description of a quantity.
#[derive(Debug, Clone)]
pub struct QuantitySpec {
    pub id: u32,
    pub name: String,
    pub initial_value: f64,
    pub ideal_value: f64,
    pub bounds: Bounds,
    /// How long a saturated quantity holds at its upper bound.
    pub satisfaction_time: Duration,
    pub params: EvolutionParams,
}

/// The part of a quantity's state its drift function reads and writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trajectory {
    pub value: f64,
    /// Tick counter driving the exponential and logarithmic kinds,
    /// seeded from the initial value.
    pub elapsed: f64,
    /// Set when a step clamps at the upper bound; cleared once the value
    /// is below the bound again.
    pub saturated: bool,
}

impl Trajectory {
    pub fn new(initial_value: f64) -> Self {
        Self {
            value: initial_value,
            elapsed: initial_value,
            saturated: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Value moved (or was re-clamped); keep ticking.
    Advanced,
    /// First clamp at the upper bound: hold for the satisfaction time.
    Saturated,
    /// A step jump was applied; the quantity switches itself off.
    Punctual,
}

/// Advance a trajectory by one tick and clamp the result into `bounds`.
pub fn advance(trajectory: &mut Trajectory, params: &EvolutionParams, bounds: Bounds) -> StepOutcome {
    if trajectory.value < bounds.upper {
        trajectory.saturated = false;
    }

    let raw = match params.kind {
        EvolutionKind::Constant => trajectory.value,
        EvolutionKind::Linear => trajectory.value + params.slope,
        EvolutionKind::Exponential => {
            trajectory.elapsed += 1.0;
            (trajectory.elapsed / params.tau).exp()
        }
        EvolutionKind::Logarithmic => {
            trajectory.elapsed += 1.0;
            trajectory.elapsed.ln()
        }
        EvolutionKind::Step => trajectory.value + params.step,
    };
    trajectory.value = bounds.clamp(raw);

    match params.kind {
        EvolutionKind::Step => StepOutcome::Punctual,
        kind if kind.holds_at_saturation() && raw > bounds.upper && !trajectory.saturated => {
            trajectory.saturated = true;
            StepOutcome::Saturated
        }
        _ => StepOutcome::Advanced,
    }
}

#[derive(Debug)]
struct Shared {
    trajectory: Trajectory,
    evolving: bool,
    stopping: bool,
    /// Worker is sleeping out a satisfaction hold.
    holding: bool,
    /// When the next step is due. `None` steps on the next wake-up.
    due: Option<Instant>,
}

struct Inner {
    state: Mutex<Shared>,
    wake: Notify,
    params: EvolutionParams,
    bounds: Bounds,
    satisfaction_time: Duration,
    heartbeat: HeartbeatConfig,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(&self) {
        loop {
            let pause = {
                let mut shared = self.lock();
                if !shared.evolving && shared.stopping {
                    break;
                }
                if !shared.evolving {
                    self.heartbeat.idle_poll
                } else {
                    let now = Instant::now();
                    match shared.due {
                        // Woken early: finish the current period
                        Some(due) if due > now => due - now,
                        _ => {
                            shared.holding = false;
                            let outcome =
                                advance(&mut shared.trajectory, &self.params, self.bounds);
                            let pause = match outcome {
                                StepOutcome::Advanced => self.heartbeat.evolution_tick,
                                StepOutcome::Saturated => {
                                    shared.holding = true;
                                    self.satisfaction_time.max(self.heartbeat.evolution_tick)
                                }
                                StepOutcome::Punctual => {
                                    shared.evolving = false;
                                    self.heartbeat.evolution_tick
                                }
                            };
                            shared.due = Some(now + pause);
                            pause
                        }
                    }
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.wake.notified() => {}
            }
        }
    }
}

/// A bounded value advanced by its own background task.
pub struct EvolvingQuantity {
    id: u32,
    name: String,
    ideal_value: f64,
    inner: Arc<Inner>,
    exited: watch::Receiver<bool>,
}

impl EvolvingQuantity {
    /// Create the quantity and start its worker. Must be called from
    /// within a tokio runtime.
    pub fn spawn(spec: QuantitySpec, evolving: bool, heartbeat: &HeartbeatConfig) -> Self {
        let inner = Arc::new(Inner {
            state: Mutex::new(Shared {
                trajectory: Trajectory::new(spec.initial_value),
                evolving,
                stopping: false,
                holding: false,
                due: None,
            }),
            wake: Notify::new(),
            params: spec.params,
            bounds: spec.bounds,
            satisfaction_time: spec.satisfaction_time,
            heartbeat: *heartbeat,
        });

        let (exited_tx, exited) = watch::channel(false);
        let worker = Arc::clone(&inner);
        let name = spec.name.clone();
        tokio::spawn(async move {
            worker.run().await;
            tracing::trace!("Evolution {} stopped", name);
            let _ = exited_tx.send(true);
        });

        Self {
            id: spec.id,
            name: spec.name,
            ideal_value: spec.ideal_value,
            inner,
            exited,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> EvolutionKind {
        self.inner.params.kind
    }

    pub fn bounds(&self) -> Bounds {
        self.inner.bounds
    }

    /// Step quantities make one jump per activation.
    pub fn is_punctual(&self) -> bool {
        self.inner.params.kind.is_punctual()
    }

    /// Start or pause stepping. A quantity that is shutting down stays
    /// paused.
    pub fn set_evolving(&self, evolving: bool) {
        let changed = {
            let mut shared = self.inner.lock();
            if evolving && shared.stopping {
                return;
            }
            let changed = shared.evolving != evolving;
            shared.evolving = evolving;
            if changed && evolving {
                shared.due = None;
            }
            changed
        };
        if changed {
            self.inner.wake.notify_one();
        }
    }

    pub fn is_evolving(&self) -> bool {
        self.inner.lock().evolving
    }

    /// Overwrite the current value. Pulling a saturated quantity below its
    /// upper bound ends its satisfaction hold.
    pub fn set_value(&self, value: f64) {
        let interrupt = {
            let mut shared = self.inner.lock();
            shared.trajectory.value = value;
            let interrupt = shared.holding && value < self.inner.bounds.upper;
            if interrupt {
                shared.holding = false;
                shared.due = None;
            }
            interrupt
        };
        if interrupt {
            self.inner.wake.notify_one();
        }
    }

    pub fn get_value(&self) -> f64 {
        self.inner.lock().trajectory.value
    }

    pub fn deficit(&self) -> f64 {
        self.ideal_value - self.get_value()
    }

    pub fn is_saturated(&self) -> bool {
        self.inner.lock().trajectory.saturated
    }

    /// True once the worker has performed its terminal exit.
    pub fn is_stopped(&self) -> bool {
        *self.exited.borrow()
    }

    /// Request cooperative shutdown and wait for the worker to exit.
    /// Safe to call any number of times, concurrently or not.
    pub async fn stop(&self) {
        {
            let mut shared = self.inner.lock();
            shared.evolving = false;
            shared.stopping = true;
        }
        self.inner.wake.notify_one();

        let mut exited = self.exited.clone();
        if exited.wait_for(|done| *done).await.is_err() {
            tracing::warn!("Evolution {} worker ended abnormally", self.name);
        }
    }
}

impl Drop for EvolvingQuantity {
    fn drop(&mut self) {
        {
            let mut shared = self.inner.lock();
            shared.evolving = false;
            shared.stopping = true;
        }
        self.inner.wake.notify_one();
    }
}

impl std::fmt::Debug for EvolvingQuantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvolvingQuantity")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.inner.params.kind)
            .finish_non_exhaustive()
    }
}
