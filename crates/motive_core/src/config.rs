use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::evolution::{EvolutionParams, EvolutionRow};
use crate::{ActionId, AgentId, EffectId, HvId, MotivationId, StateId, StimulusId};

// ============================================================================
// Top-level config
// ============================================================================

/// The full motivational model as handed to the engine at startup.
///
/// Entities reference each other by integer id; nothing here is resolved
/// yet. Resolution (and every structural check) happens when the engine
/// builds its arena.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MotiveConfig {
    pub runtime: RuntimeConfig,
    pub evolutions: Vec<EvolutionRow>,
    pub homeostatic_variables: Vec<HomeostaticVariableConfig>,
    pub states: Vec<StateConfig>,
    pub effects: Vec<EffectConfig>,
    pub actions: Vec<ActionConfig>,
    pub agents: Vec<EntityConfig>,
    pub stimuli: Vec<EntityConfig>,
    pub motivations: Vec<MotivationConfig>,
}

impl MotiveConfig {
    /// Load config from a TOML file, then apply env var overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        tracing::debug!(
            "Loaded {}: {} homeostatic variables, {} states, {} motivations",
            path.as_ref().display(),
            config.homeostatic_variables.len(),
            config.states.len(),
            config.motivations.len()
        );
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse TOML config")
    }

    /// Resolve an evolution table row into validated parameters.
    pub fn evolution(&self, owner: &str, id: u32) -> Result<EvolutionParams, ConfigError> {
        let row = self
            .evolutions
            .iter()
            .find(|row| row.id == id)
            .ok_or_else(|| ConfigError::MissingEvolution {
                owner: owner.to_string(),
                id,
            })?;
        EvolutionParams::try_from(row)
    }

    /// Apply environment variable overrides on top of file-based config.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("MOTIVE_TICK_MS") {
            if let Ok(n) = v.parse() {
                self.runtime.tick_interval_ms = n;
            }
        }
        if let Ok(v) = std::env::var("MOTIVE_EVOLUTION_TICK_MS") {
            if let Ok(n) = v.parse() {
                self.runtime.evolution_tick_ms = n;
            }
        }
        if let Ok(v) = std::env::var("MOTIVE_IDLE_POLL_MS") {
            if let Ok(n) = v.parse() {
                self.runtime.idle_poll_ms = n;
            }
        }
        if let Ok(v) = std::env::var("MOTIVE_TELEMETRY") {
            if let Ok(b) = v.parse() {
                self.runtime.telemetry = b;
            }
        }
    }
}

// ============================================================================
// Sub-configs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Arbitration period.
    pub tick_interval_ms: u64,
    /// Period between two steps of an evolving quantity.
    pub evolution_tick_ms: u64,
    /// Re-check period of a quantity that is not evolving.
    pub idle_poll_ms: u64,
    /// Emit value-change telemetry.
    pub telemetry: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            evolution_tick_ms: 1000,
            idle_poll_ms: 100,
            telemetry: false,
        }
    }
}

impl RuntimeConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn evolution_tick(&self) -> Duration {
        Duration::from_millis(self.evolution_tick_ms.max(1))
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms.max(1))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HomeostaticVariableConfig {
    pub id: HvId,
    pub name: String,
    pub initial_value: f64,
    pub ideal_value: f64,
    pub upper_limit: f64,
    pub lower_limit: f64,
    /// Seconds a saturated evolution holds at its upper limit.
    #[serde(default)]
    pub satisfaction_time: f64,
    pub evolution: u32,
}

impl HomeostaticVariableConfig {
    pub fn satisfaction_time(&self) -> Duration {
        Duration::try_from_secs_f64(self.satisfaction_time).unwrap_or_default()
    }
}

/// A dual state belongs to exactly one agent or one stimulus.
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    pub id: StateId,
    pub name: String,
    #[serde(default)]
    pub agent: Option<AgentId>,
    #[serde(default)]
    pub stimulus: Option<StimulusId>,
    pub activation: u32,
    pub deactivation: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constancy {
    /// Influences the variable for as long as the action runs.
    #[default]
    Continuous,
    /// A discrete, one-off influence.
    Punctual,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EffectConfig {
    pub id: EffectId,
    #[serde(default)]
    pub constancy: Constancy,
    pub evolution: u32,
    #[serde(default)]
    pub related_hv: RelationList,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Executed by the system itself.
    #[default]
    Endogenous,
    /// Executed by an external agent.
    Exogenous,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    pub id: ActionId,
    pub name: String,
    #[serde(default)]
    pub kind: ActionKind,
    pub agent: AgentId,
    #[serde(default)]
    pub effects: RelationList,
}

/// Agents and stimuli share one shape: a name and an optional initial state.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub current_state: Option<StateId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotivationConfig {
    pub id: MotivationId,
    pub name: String,
    pub threshold: f64,
    #[serde(default)]
    pub related_hv: RelationList,
    #[serde(default)]
    pub related_stimuli: RelationList,
    #[serde(default)]
    pub related_agents: RelationList,
}

// ============================================================================
// Relation lists
// ============================================================================

/// A list of related ids, either as a TOML array or as the relational
/// store's comma-separated text column (`"1,2,3"`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RelationList {
    Ids(Vec<u32>),
    Text(String),
}

impl Default for RelationList {
    fn default() -> Self {
        Self::Ids(Vec::new())
    }
}

impl From<Vec<u32>> for RelationList {
    fn from(ids: Vec<u32>) -> Self {
        Self::Ids(ids)
    }
}

impl RelationList {
    /// Parse into ids. Any entry that is not a plain unsigned integer is a
    /// configuration error, never silently dropped.
    pub fn resolve(&self, field: &str) -> Result<Vec<u32>, ConfigError> {
        match self {
            Self::Ids(ids) => Ok(ids.clone()),
            Self::Text(raw) => {
                let malformed = || ConfigError::MalformedRelation {
                    field: field.to_string(),
                    raw: raw.clone(),
                };
                if raw.trim().is_empty() {
                    return Ok(Vec::new());
                }
                raw.split(',')
                    .map(str::trim)
                    .map(|part| {
                        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                            return Err(malformed());
                        }
                        part.parse::<u32>().map_err(|_| malformed())
                    })
                    .collect()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[runtime]
tick_interval_ms = 250

[[evolutions]]
id = 1
kind = 1
slope = -1.0

[[homeostatic_variables]]
id = 1
name = "energy"
initial_value = 100
ideal_value = 100
upper_limit = 100
lower_limit = 0
satisfaction_time = 2.5
evolution = 1

[[states]]
id = 1
name = "present"
agent = 1
activation = 1
deactivation = 1

[[effects]]
id = 1
constancy = "punctual"
evolution = 1
related_hv = "1"

[[actions]]
id = 1
name = "rest"
kind = "exogenous"
agent = 1
effects = [1]

[[agents]]
id = 1
name = "user"
current_state = 1

[[motivations]]
id = 1
name = "none"
threshold = 0
"#;

    #[test]
    fn test_default_runtime() {
        let cfg = MotiveConfig::default();
        assert_eq!(cfg.runtime.tick_interval_ms, 1000);
        assert_eq!(cfg.runtime.evolution_tick(), Duration::from_secs(1));
        assert_eq!(cfg.runtime.idle_poll(), Duration::from_millis(100));
        assert!(!cfg.runtime.telemetry);
        assert!(cfg.motivations.is_empty());
    }

    #[test]
    fn test_parse_sample_model() {
        let cfg = MotiveConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(cfg.runtime.tick_interval_ms, 250);
        // Unspecified runtime fields keep their defaults
        assert_eq!(cfg.runtime.evolution_tick_ms, 1000);
        assert_eq!(cfg.homeostatic_variables[0].name, "energy");
        assert_eq!(
            cfg.homeostatic_variables[0].satisfaction_time(),
            Duration::from_millis(2500)
        );
        assert_eq!(cfg.effects[0].constancy, Constancy::Punctual);
        assert_eq!(cfg.effects[0].related_hv.resolve("effects").unwrap(), vec![1]);
        assert_eq!(cfg.actions[0].kind, ActionKind::Exogenous);
        assert_eq!(cfg.agents[0].current_state, Some(1));
        assert!(cfg.stimuli.is_empty());
    }

    #[test]
    fn test_evolution_lookup() {
        let cfg = MotiveConfig::from_toml_str(SAMPLE).unwrap();
        let params = cfg.evolution("energy", 1).unwrap();
        assert_eq!(params, EvolutionParams::linear(-1.0));
        assert_eq!(
            cfg.evolution("energy", 9),
            Err(ConfigError::MissingEvolution {
                owner: "energy".into(),
                id: 9
            })
        );
    }

    #[test]
    fn test_relation_text_forms() {
        let text = |s: &str| RelationList::Text(s.to_string());
        assert_eq!(text("1,2, 3").resolve("f").unwrap(), vec![1, 2, 3]);
        assert_eq!(text("7").resolve("f").unwrap(), vec![7]);
        assert!(text("").resolve("f").unwrap().is_empty());
        assert!(matches!(
            text("1,x").resolve("motivations.related_hv"),
            Err(ConfigError::MalformedRelation { .. })
        ));
        assert!(text("1,,2").resolve("f").is_err());
        assert!(text("-1").resolve("f").is_err());
    }

    #[test]
    fn test_load_from_file_and_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("motive.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let cfg = MotiveConfig::load(&path).unwrap();
        assert_eq!(cfg.motivations[0].name, "none");

        assert!(MotiveConfig::load(dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("MOTIVE_IDLE_POLL_MS", "5");
        std::env::set_var("MOTIVE_TELEMETRY", "true");

        let mut cfg = MotiveConfig::default();
        cfg.apply_env_overrides();

        std::env::remove_var("MOTIVE_IDLE_POLL_MS");
        std::env::remove_var("MOTIVE_TELEMETRY");

        assert_eq!(cfg.runtime.idle_poll_ms, 5);
        assert!(cfg.runtime.telemetry);
    }
}
