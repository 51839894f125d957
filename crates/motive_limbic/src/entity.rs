//! Structural entities resolved from configuration: effects, actions,
//! agents and stimuli. Their identity never changes after startup; the
//! only mutable part is which dual state an agent or stimulus is in.

use crate::dual_state::DualState;
use motive_core::{
    ActionId, ActionKind, AgentId, Constancy, EffectId, EvolutionParams, HvId, StateId,
    StimulusId,
};
use std::sync::{Mutex, PoisonError};

/// An action's influence on one or more homeostatic variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub id: EffectId,
    pub constancy: Constancy,
    pub params: EvolutionParams,
    pub related_hv: Vec<HvId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub id: ActionId,
    pub name: String,
    pub kind: ActionKind,
    pub agent: AgentId,
    pub effects: Vec<EffectId>,
}

/// The dual states owned by one agent or stimulus, and which one is current.
#[derive(Debug)]
pub struct StateSet {
    ids: Vec<StateId>,
    current: Mutex<Option<StateId>>,
}

impl StateSet {
    pub(crate) fn new(ids: Vec<StateId>) -> Self {
        Self {
            ids,
            current: Mutex::new(None),
        }
    }

    pub fn ids(&self) -> &[StateId] {
        &self.ids
    }

    pub fn current(&self) -> Option<StateId> {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Activate the state named `state_name` and deactivate every sibling.
    /// Returns false (and touches nothing) when no owned state has that name.
    pub(crate) fn select<'a>(
        &self,
        state_name: &str,
        states: impl Iterator<Item = &'a DualState> + Clone,
    ) -> bool {
        let Some(target) = states.clone().find(|s| s.name() == state_name) else {
            return false;
        };
        let target_id = target.id();

        for state in states {
            if state.id() == target_id {
                state.activate();
            } else {
                state.deactivate();
            }
        }
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(target_id);
        true
    }
}

#[derive(Debug)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub states: StateSet,
    pub actions: Vec<ActionId>,
}

#[derive(Debug)]
pub struct Stimulus {
    pub id: StimulusId,
    pub name: String,
    pub states: StateSet,
}
