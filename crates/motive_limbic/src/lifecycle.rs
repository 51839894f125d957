//! Lifecycle Adapter
//!
//! Turns action and perception events into effect attach/detach calls on
//! homeostatic variables and state switches on agents and stimuli.
//! Anything that does not resolve against the model is logged and
//! ignored.

use crate::entity::Action;
use crate::model::DriveModel;
use motive_core::{ActionId, ActionStatus, LifecycleEvent, PerceptionEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    Applied,
    Ignored,
}

pub struct LifecycleAdapter {
    model: Arc<DriveModel>,
    /// Ids of actions whose effects are currently attached. Held across
    /// attach/detach so concurrent events for one action serialize.
    active_actions: Mutex<BTreeSet<ActionId>>,
}

impl LifecycleAdapter {
    pub fn new(model: Arc<DriveModel>) -> Self {
        Self {
            model,
            active_actions: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn model(&self) -> &Arc<DriveModel> {
        &self.model
    }

    pub async fn handle(&self, event: &LifecycleEvent) -> LifecycleOutcome {
        match event {
            LifecycleEvent::Action(action) => self.on_action(&action.action, action.status).await,
            LifecycleEvent::Perception(perception) => self.on_perception(perception),
        }
    }

    pub async fn on_action(&self, name: &str, status: ActionStatus) -> LifecycleOutcome {
        let Some(action) = self.model.action_by_name(name) else {
            tracing::warn!("Unknown action {:?}, ignoring {:?}", name, status);
            return LifecycleOutcome::Ignored;
        };

        let mut active = self.active_actions.lock().await;
        if status.is_terminal() {
            if !active.remove(&action.id) {
                tracing::debug!("Action {} is not running, ignoring {:?}", name, status);
                return LifecycleOutcome::Ignored;
            }
            self.detach(action).await;
            tracing::info!("Action {} {:?}", name, status);
        } else {
            if !active.insert(action.id) {
                tracing::debug!("Action {} already running", name);
                return LifecycleOutcome::Ignored;
            }
            self.attach(action).await;
            tracing::info!("Action {} started", name);
        }
        LifecycleOutcome::Applied
    }

    async fn attach(&self, action: &Action) {
        for effect in action.effects.iter().filter_map(|id| self.model.effect(*id)) {
            for hv_id in &effect.related_hv {
                if let Some(hv) = self.model.homeostatic_variable(*hv_id) {
                    hv.add_effect(effect).await;
                }
            }
        }
    }

    async fn detach(&self, action: &Action) {
        for effect in action.effects.iter().filter_map(|id| self.model.effect(*id)) {
            for hv_id in &effect.related_hv {
                if let Some(hv) = self.model.homeostatic_variable(*hv_id) {
                    hv.remove_effect(effect.id).await;
                }
            }
        }
    }

    /// Switch the agent (or, failing that, the stimulus) named by the
    /// event's frame into the reported state.
    pub fn on_perception(&self, event: &PerceptionEvent) -> LifecycleOutcome {
        let Some(state) = event.reported_state() else {
            tracing::trace!("Perception of {} carries no state", event.frame);
            return LifecycleOutcome::Ignored;
        };

        let switched = if let Some(agent) = self.model.agent_by_name(&event.frame) {
            self.model.set_agent_state(agent.id, state)
        } else if let Some(stimulus) = self.model.stimulus_by_name(&event.frame) {
            self.model.set_stimulus_state(stimulus.id, state)
        } else {
            tracing::warn!("Perception for unknown frame {:?}, ignoring", event.frame);
            return LifecycleOutcome::Ignored;
        };

        if switched {
            tracing::debug!("{} is now {}", event.frame, state);
            LifecycleOutcome::Applied
        } else {
            tracing::warn!("{} has no state named {:?}, ignoring", event.frame, state);
            LifecycleOutcome::Ignored
        }
    }

    pub async fn active_actions(&self) -> Vec<ActionId> {
        self.active_actions.lock().await.iter().copied().collect()
    }
}

impl std::fmt::Debug for LifecycleAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleAdapter").finish_non_exhaustive()
    }
}
