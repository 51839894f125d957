//! Lifecycle events delivered by the outside world: actions starting and
//! stopping, and perception reports about agents and stimuli.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Execution status reported for an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Started,
    Stopped,
    Cancelled,
    Paused,
    Completed,
}

impl ActionStatus {
    /// Every status other than `Started` ends the action's effects.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Started)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Action name, as configured.
    pub action: String,
    pub status: ActionStatus,
}

/// Perception report keyed by the name of the agent or stimulus it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptionEvent {
    pub frame: String,
    #[serde(default)]
    pub values: HashMap<String, String>,
}

impl PerceptionEvent {
    pub fn state(frame: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            frame: frame.into(),
            values: HashMap::from([("state".to_string(), state.into())]),
        }
    }

    /// The reported current state, if the report carries one.
    pub fn reported_state(&self) -> Option<&str> {
        self.values.get("state").map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Action(ActionEvent),
    Perception(PerceptionEvent),
}

impl LifecycleEvent {
    pub fn action(action: impl Into<String>, status: ActionStatus) -> Self {
        Self::Action(ActionEvent {
            action: action.into(),
            status,
        })
    }
}
