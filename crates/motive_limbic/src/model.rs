//! The resolved motivational model
//!
//! [`DriveModel::build`] turns a [`MotiveConfig`] into live entities. It
//! checks every reference first and only then spawns workers, so a model
//! that fails validation never leaves tasks behind. Entities live in
//! arenas and point at each other by id.

use crate::arbitrator::Reading;
use crate::dual_state::{DualState, StateOwner};
use crate::entity::{Action, Agent, Effect, StateSet, Stimulus};
use crate::heartbeat::HeartbeatConfig;
use crate::homeostatic::HomeostaticVariable;
use crate::motivation::Motivation;
use motive_core::{
    ActionId, AgentId, Bounds, ConfigError, EffectId, EntityConfig, EvolutionParams, HvId,
    MotiveConfig, StateId, StimulusId, TelemetrySink, FALLBACK_MOTIVATION,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Dense storage plus an id index. Iteration follows configuration order.
#[derive(Debug)]
struct Arena<T> {
    items: Vec<T>,
    index: HashMap<u32, usize>,
}

impl<T> Arena<T> {
    fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn push(&mut self, id: u32, item: T) {
        self.index.insert(id, self.items.len());
        self.items.push(item);
    }

    fn get(&self, id: u32) -> Option<&T> {
        self.index.get(&id).map(|&i| &self.items[i])
    }
}

fn ensure_unique(entity: &'static str, ids: impl IntoIterator<Item = u32>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ConfigError::DuplicateId { entity, id });
        }
    }
    Ok(())
}

fn ensure_known(
    owner: &str,
    target: &'static str,
    ids: &[u32],
    known: &HashSet<u32>,
) -> Result<(), ConfigError> {
    match ids.iter().find(|id| !known.contains(*id)) {
        Some(&id) => Err(ConfigError::UnknownReference {
            owner: owner.to_string(),
            target,
            id,
        }),
        None => Ok(()),
    }
}

/// Everything `build` resolved before spawning anything.
struct Resolved {
    hv_params: Vec<EvolutionParams>,
    state_params: Vec<(StateOwner, EvolutionParams, EvolutionParams)>,
    effects: Vec<Effect>,
    actions: Vec<Action>,
    motivation_relations: Vec<(Vec<HvId>, Vec<StimulusId>, Vec<AgentId>)>,
}

fn resolve(config: &MotiveConfig) -> Result<Resolved, ConfigError> {
    ensure_unique("evolution", config.evolutions.iter().map(|e| e.id))?;
    ensure_unique("homeostatic variable", config.homeostatic_variables.iter().map(|h| h.id))?;
    ensure_unique("state", config.states.iter().map(|s| s.id))?;
    ensure_unique("effect", config.effects.iter().map(|e| e.id))?;
    ensure_unique("action", config.actions.iter().map(|a| a.id))?;
    ensure_unique("agent", config.agents.iter().map(|a| a.id))?;
    ensure_unique("stimulus", config.stimuli.iter().map(|s| s.id))?;
    ensure_unique("motivation", config.motivations.iter().map(|m| m.id))?;

    let hv_ids: HashSet<u32> = config.homeostatic_variables.iter().map(|h| h.id).collect();
    let agent_ids: HashSet<u32> = config.agents.iter().map(|a| a.id).collect();
    let stimulus_ids: HashSet<u32> = config.stimuli.iter().map(|s| s.id).collect();
    let effect_ids: HashSet<u32> = config.effects.iter().map(|e| e.id).collect();

    let mut hv_params = Vec::with_capacity(config.homeostatic_variables.len());
    for hv in &config.homeostatic_variables {
        Bounds::new(&hv.name, hv.lower_limit, hv.upper_limit)?;
        hv_params.push(config.evolution(&hv.name, hv.evolution)?);
    }

    let mut state_params = Vec::with_capacity(config.states.len());
    for state in &config.states {
        let owner = match (state.agent, state.stimulus) {
            (Some(agent), None) => {
                ensure_known(&state.name, "agent", &[agent], &agent_ids)?;
                StateOwner::Agent(agent)
            }
            (None, Some(stimulus)) => {
                ensure_known(&state.name, "stimulus", &[stimulus], &stimulus_ids)?;
                StateOwner::Stimulus(stimulus)
            }
            _ => {
                return Err(ConfigError::InvalidOwner {
                    name: state.name.clone(),
                })
            }
        };
        state_params.push((
            owner,
            config.evolution(&state.name, state.activation)?,
            config.evolution(&state.name, state.deactivation)?,
        ));
    }

    let mut effects = Vec::with_capacity(config.effects.len());
    for effect in &config.effects {
        let owner = format!("effect {}", effect.id);
        let related_hv = effect.related_hv.resolve("effects.related_hv")?;
        ensure_known(&owner, "homeostatic variable", &related_hv, &hv_ids)?;
        effects.push(Effect {
            id: effect.id,
            constancy: effect.constancy,
            params: config.evolution(&owner, effect.evolution)?,
            related_hv,
        });
    }

    let mut actions = Vec::with_capacity(config.actions.len());
    for action in &config.actions {
        ensure_known(&action.name, "agent", &[action.agent], &agent_ids)?;
        let effects = action.effects.resolve("actions.effects")?;
        ensure_known(&action.name, "effect", &effects, &effect_ids)?;
        actions.push(Action {
            id: action.id,
            name: action.name.clone(),
            kind: action.kind,
            agent: action.agent,
            effects,
        });
    }

    let owned_by = |owner: StateOwner, id: StateId| {
        config
            .states
            .iter()
            .zip(&state_params)
            .any(|(s, (o, _, _))| s.id == id && *o == owner)
    };
    let check_current = |entity: &EntityConfig, owner: StateOwner| match entity.current_state {
        Some(id) if !owned_by(owner, id) => Err(ConfigError::UnknownReference {
            owner: entity.name.clone(),
            target: "state",
            id,
        }),
        _ => Ok(()),
    };
    for agent in &config.agents {
        check_current(agent, StateOwner::Agent(agent.id))?;
    }
    for stimulus in &config.stimuli {
        check_current(stimulus, StateOwner::Stimulus(stimulus.id))?;
    }

    let mut motivation_relations = Vec::with_capacity(config.motivations.len());
    for m in &config.motivations {
        let related_hv = m.related_hv.resolve("motivations.related_hv")?;
        let related_stimuli = m.related_stimuli.resolve("motivations.related_stimuli")?;
        let related_agents = m.related_agents.resolve("motivations.related_agents")?;
        ensure_known(&m.name, "homeostatic variable", &related_hv, &hv_ids)?;
        ensure_known(&m.name, "stimulus", &related_stimuli, &stimulus_ids)?;
        ensure_known(&m.name, "agent", &related_agents, &agent_ids)?;
        motivation_relations.push((related_hv, related_stimuli, related_agents));
    }
    if !config.motivations.iter().any(|m| m.name == FALLBACK_MOTIVATION) {
        return Err(ConfigError::MissingFallbackMotivation);
    }

    Ok(Resolved {
        hv_params,
        state_params,
        effects,
        actions,
        motivation_relations,
    })
}

pub struct DriveModel {
    homeostatic_variables: Arena<HomeostaticVariable>,
    states: Arena<DualState>,
    effects: Arena<Effect>,
    actions: Arena<Action>,
    agents: Arena<Agent>,
    stimuli: Arena<Stimulus>,
    motivations: Vec<Motivation>,
}

impl DriveModel {
    /// Validate `config` and spawn every worker. Must run inside a tokio
    /// runtime.
    pub fn build(
        config: &MotiveConfig,
        heartbeat: &HeartbeatConfig,
        sink: Option<Arc<dyn TelemetrySink>>,
    ) -> Result<Self, ConfigError> {
        let resolved = resolve(config)?;

        let mut homeostatic_variables = Arena::new();
        for (hv, params) in config.homeostatic_variables.iter().zip(resolved.hv_params) {
            homeostatic_variables.push(
                hv.id,
                HomeostaticVariable::new(hv, params, heartbeat, sink.clone())?,
            );
        }

        let mut states = Arena::new();
        for (state, (owner, activation, deactivation)) in
            config.states.iter().zip(resolved.state_params)
        {
            states.push(
                state.id,
                DualState::new(
                    state.id,
                    &state.name,
                    owner,
                    activation,
                    deactivation,
                    heartbeat,
                    sink.clone(),
                ),
            );
        }

        let owned_states = |owner: StateOwner| -> Vec<StateId> {
            states
                .items
                .iter()
                .filter(|s| s.owner() == owner)
                .map(DualState::id)
                .collect()
        };

        let mut agents = Arena::new();
        for agent in &config.agents {
            let actions = resolved
                .actions
                .iter()
                .filter(|a| a.agent == agent.id)
                .map(|a| a.id)
                .collect();
            agents.push(
                agent.id,
                Agent {
                    id: agent.id,
                    name: agent.name.clone(),
                    states: StateSet::new(owned_states(StateOwner::Agent(agent.id))),
                    actions,
                },
            );
        }

        let mut stimuli = Arena::new();
        for stimulus in &config.stimuli {
            stimuli.push(
                stimulus.id,
                Stimulus {
                    id: stimulus.id,
                    name: stimulus.name.clone(),
                    states: StateSet::new(owned_states(StateOwner::Stimulus(stimulus.id))),
                },
            );
        }

        let mut effects = Arena::new();
        for effect in resolved.effects {
            effects.push(effect.id, effect);
        }
        let mut actions = Arena::new();
        for action in resolved.actions {
            actions.push(action.id, action);
        }

        let motivations = config
            .motivations
            .iter()
            .zip(resolved.motivation_relations)
            .map(|(m, (hv, stimuli, agents))| {
                Motivation::new(m.id, &m.name, m.threshold, hv, stimuli, agents, sink.clone())
            })
            .collect();

        let model = Self {
            homeostatic_variables,
            states,
            effects,
            actions,
            agents,
            stimuli,
            motivations,
        };

        for entity in config.agents.iter().chain(&config.stimuli) {
            if let Some(state) = entity.current_state.and_then(|id| model.state(id)) {
                match state.owner() {
                    StateOwner::Agent(id) => model.set_agent_state(id, state.name()),
                    StateOwner::Stimulus(id) => model.set_stimulus_state(id, state.name()),
                };
            }
        }

        tracing::info!(
            "Drive model ready: {} homeostatic variables, {} states, {} motivations",
            model.homeostatic_variables.items.len(),
            model.states.items.len(),
            model.motivations.len()
        );
        Ok(model)
    }

    pub fn homeostatic_variable(&self, id: HvId) -> Option<&HomeostaticVariable> {
        self.homeostatic_variables.get(id)
    }

    pub fn homeostatic_variables(&self) -> &[HomeostaticVariable] {
        &self.homeostatic_variables.items
    }

    pub fn state(&self, id: StateId) -> Option<&DualState> {
        self.states.get(id)
    }

    pub fn effect(&self, id: EffectId) -> Option<&Effect> {
        self.effects.get(id)
    }

    pub fn action(&self, id: ActionId) -> Option<&Action> {
        self.actions.get(id)
    }

    pub fn action_by_name(&self, name: &str) -> Option<&Action> {
        self.actions.items.iter().find(|a| a.name == name)
    }

    pub fn agent(&self, id: AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn agent_by_name(&self, name: &str) -> Option<&Agent> {
        self.agents.items.iter().find(|a| a.name == name)
    }

    pub fn stimulus(&self, id: StimulusId) -> Option<&Stimulus> {
        self.stimuli.get(id)
    }

    pub fn stimulus_by_name(&self, name: &str) -> Option<&Stimulus> {
        self.stimuli.items.iter().find(|s| s.name == name)
    }

    /// Motivations in configuration order. Arbitration ties among
    /// challengers resolve by this order.
    pub fn motivations(&self) -> &[Motivation] {
        &self.motivations
    }

    /// Sum of the current values of every state in `set`.
    pub fn signal(&self, set: &StateSet) -> f64 {
        set.ids()
            .iter()
            .filter_map(|id| self.state(*id))
            .map(DualState::get_value)
            .sum()
    }

    fn states_of<'a>(&'a self, set: &'a StateSet) -> impl Iterator<Item = &'a DualState> + Clone {
        set.ids().iter().filter_map(|id| self.state(*id))
    }

    /// Switch an agent into the state named `state_name`. False when the
    /// agent or the state is unknown.
    pub fn set_agent_state(&self, agent: AgentId, state_name: &str) -> bool {
        self.agent(agent)
            .is_some_and(|a| a.states.select(state_name, self.states_of(&a.states)))
    }

    pub fn set_stimulus_state(&self, stimulus: StimulusId, state_name: &str) -> bool {
        self.stimulus(stimulus)
            .is_some_and(|s| s.states.select(state_name, self.states_of(&s.states)))
    }

    /// Read every motivation once. Non-finite values are reported as 0 so
    /// they can never win arbitration.
    pub async fn readings(&self) -> Vec<Reading<'_>> {
        let mut readings = Vec::with_capacity(self.motivations.len());
        for m in &self.motivations {
            let mut value = m.get_value(self).await;
            if !value.is_finite() {
                tracing::warn!("{}: non-finite intensity {}, reading as 0", m.name(), value);
                value = 0.0;
            }
            readings.push(Reading {
                id: m.id(),
                name: m.name(),
                threshold: m.threshold(),
                value,
            });
        }
        readings
    }

    /// Stop every evolution worker in the model, waiting for each to exit.
    pub async fn stop(&self) {
        for hv in &self.homeostatic_variables.items {
            hv.stop().await;
        }
        for state in &self.states.items {
            state.stop().await;
        }
        tracing::debug!("Drive model stopped");
    }
}

impl std::fmt::Debug for DriveModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriveModel")
            .field("homeostatic_variables", &self.homeostatic_variables.items)
            .field("states", &self.states.items)
            .field("agents", &self.agents.items)
            .field("stimuli", &self.stimuli.items)
            .field("motivations", &self.motivations)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    const MODEL: &str = r#"
[[evolutions]]
id = 1
kind = 1
slope = -1.0

[[evolutions]]
id = 2
kind = 1
slope = 10.0

[[evolutions]]
id = 3
kind = 1
slope = -10.0

[[evolutions]]
id = 4
kind = 1
slope = 3.0

[[homeostatic_variables]]
id = 1
name = "energy"
initial_value = 100
ideal_value = 100
upper_limit = 100
lower_limit = 0
evolution = 1

[[agents]]
id = 1
name = "user"
current_state = 2

[[stimuli]]
id = 1
name = "light"

[[states]]
id = 1
name = "present"
agent = 1
activation = 2
deactivation = 3

[[states]]
id = 2
name = "absent"
agent = 1
activation = 2
deactivation = 3

[[states]]
id = 3
name = "bright"
stimulus = 1
activation = 2
deactivation = 3

[[effects]]
id = 1
evolution = 4
related_hv = "1"

[[actions]]
id = 1
name = "rest"
agent = 1
effects = "1"

[[motivations]]
id = 1
name = "none"
threshold = 1e9

[[motivations]]
id = 2
name = "tired"
threshold = 3
related_hv = [1]
related_agents = "1"
"#;

    fn config() -> MotiveConfig {
        MotiveConfig::from_toml_str(MODEL).unwrap()
    }

    fn build(config: &MotiveConfig) -> Result<DriveModel, ConfigError> {
        DriveModel::build(config, &HeartbeatConfig::default(), None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_build_resolves_relations() {
        let model = build(&config()).unwrap();
        let user = model.agent_by_name("user").unwrap();
        assert_eq!(user.states.ids(), &[1, 2]);
        assert_eq!(user.actions, vec![1]);
        assert_eq!(model.stimulus_by_name("light").unwrap().states.ids(), &[3]);
        assert_eq!(model.action_by_name("rest").unwrap().effects, vec![1]);
        assert_eq!(model.effect(1).unwrap().related_hv, vec![1]);
        let names: Vec<&str> = model.motivations().iter().map(Motivation::name).collect();
        assert_eq!(names, ["none", "tired"]);
        model.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_current_state_is_active() {
        let model = build(&config()).unwrap();
        assert_eq!(model.agent(1).unwrap().states.current(), Some(2));
        assert_eq!(model.state(2).unwrap().is_active(), Some(true));
        assert_eq!(model.state(1).unwrap().is_active(), Some(false));
        // No configured state for the stimulus: untouched
        assert_eq!(model.stimulus(1).unwrap().states.current(), None);
        assert_eq!(model.state(3).unwrap().is_active(), None);
        model.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_state_by_name() {
        let model = build(&config()).unwrap();
        assert!(model.set_agent_state(1, "present"));
        assert_eq!(model.agent(1).unwrap().states.current(), Some(1));
        assert_eq!(model.state(2).unwrap().is_active(), Some(false));

        assert!(!model.set_agent_state(1, "bright"));
        assert!(!model.set_agent_state(9, "present"));
        assert_eq!(model.agent(1).unwrap().states.current(), Some(1));
        model.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_and_readings() {
        let model = build(&config()).unwrap();
        // "absent" rises by 10 at t = 0, 1, 2; energy falls by 1 at the same steps
        sleep(Duration::from_millis(2500)).await;
        let user = model.agent(1).unwrap();
        assert_eq!(model.signal(&user.states), 30.0);

        let readings = model.readings().await;
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].name, "none");
        assert_eq!(readings[0].value, 0.0);
        // 3 + 0.01 * 3 * 30
        assert!((readings[1].value - 3.9).abs() < 1e-9);
        model.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_fallback_is_rejected() {
        let mut cfg = config();
        cfg.motivations.retain(|m| m.name != "none");
        assert_eq!(build(&cfg).unwrap_err(), ConfigError::MissingFallbackMotivation);
    }

    #[tokio::test(start_paused = true)]
    async fn test_structural_errors() {
        let mut cfg = config();
        cfg.states[0].stimulus = Some(1);
        assert!(matches!(build(&cfg), Err(ConfigError::InvalidOwner { .. })));

        let mut cfg = config();
        cfg.states[0].agent = None;
        assert!(matches!(build(&cfg), Err(ConfigError::InvalidOwner { .. })));

        let mut cfg = config();
        cfg.states[1].agent = Some(7);
        assert!(matches!(
            build(&cfg),
            Err(ConfigError::UnknownReference { target: "agent", id: 7, .. })
        ));

        let mut cfg = config();
        cfg.actions[0].effects = vec![1, 5].into();
        assert!(matches!(
            build(&cfg),
            Err(ConfigError::UnknownReference { target: "effect", id: 5, .. })
        ));

        let mut cfg = config();
        cfg.motivations[1].related_hv = motive_core::RelationList::Text("1,a".into());
        assert!(matches!(build(&cfg), Err(ConfigError::MalformedRelation { .. })));

        let mut cfg = config();
        cfg.homeostatic_variables[0].evolution = 42;
        assert!(matches!(
            build(&cfg),
            Err(ConfigError::MissingEvolution { id: 42, .. })
        ));

        let mut cfg = config();
        cfg.evolutions[0].kind = 9;
        assert!(matches!(
            build(&cfg),
            Err(ConfigError::UnknownEvolutionKind { tag: 9, .. })
        ));

        let mut cfg = config();
        cfg.states[1].id = 1;
        assert_eq!(
            build(&cfg).unwrap_err(),
            ConfigError::DuplicateId { entity: "state", id: 1 }
        );

        // Current state owned by another entity
        let mut cfg = config();
        cfg.agents[0].current_state = Some(3);
        assert!(matches!(
            build(&cfg),
            Err(ConfigError::UnknownReference { target: "state", id: 3, .. })
        ));
    }
}
