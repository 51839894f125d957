//! Configuration error taxonomy.
//!
//! Every variant is fatal at startup: a model that fails to resolve is
//! never partially constructed.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("evolution {id} has unknown kind tag {tag} (expected 0..=4)")]
    UnknownEvolutionKind { id: u32, tag: i64 },

    #[error("evolution {id} is exponential but tau is {tau}")]
    InvalidTau { id: u32, tau: f64 },

    #[error("{owner} references missing evolution {id}")]
    MissingEvolution { owner: String, id: u32 },

    #[error("no motivation named \"none\" is configured")]
    MissingFallbackMotivation,

    #[error("malformed relation list for {field}: {raw:?}")]
    MalformedRelation { field: String, raw: String },

    #[error("{owner} references unknown {target} {id}")]
    UnknownReference {
        owner: String,
        target: &'static str,
        id: u32,
    },

    #[error("duplicate {entity} id {id}")]
    DuplicateId { entity: &'static str, id: u32 },

    #[error("{name}: lower limit {lower} exceeds upper limit {upper}")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("state {name} must belong to exactly one agent or stimulus")]
    InvalidOwner { name: String },
}
