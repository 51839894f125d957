//! Evolution parameters: which drift function a quantity follows and
//! the bounds it is clamped to.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Drift function tag, stored as an integer in the evolution table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionKind {
    /// Re-clamped every tick, never drifts.
    Constant,
    /// `value += slope` every tick.
    Linear,
    /// `value = exp(t / tau)` over an internal tick counter.
    Exponential,
    /// `value = ln(t)` over an internal tick counter.
    Logarithmic,
    /// One `value += step` jump, then the quantity switches itself off.
    Step,
}

impl EvolutionKind {
    pub fn from_tag(id: u32, tag: i64) -> Result<Self, ConfigError> {
        match tag {
            0 => Ok(Self::Constant),
            1 => Ok(Self::Linear),
            2 => Ok(Self::Exponential),
            3 => Ok(Self::Logarithmic),
            4 => Ok(Self::Step),
            _ => Err(ConfigError::UnknownEvolutionKind { id, tag }),
        }
    }

    pub fn tag(self) -> i64 {
        match self {
            Self::Constant => 0,
            Self::Linear => 1,
            Self::Exponential => 2,
            Self::Logarithmic => 3,
            Self::Step => 4,
        }
    }

    /// Punctual kinds make a single discrete jump per activation.
    pub fn is_punctual(self) -> bool {
        matches!(self, Self::Step)
    }

    /// Kinds that enter a satisfaction hold when they saturate at the upper bound.
    pub fn holds_at_saturation(self) -> bool {
        matches!(self, Self::Linear | Self::Exponential | Self::Logarithmic)
    }
}

/// A row of the standard evolution table, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRow {
    pub id: u32,
    pub kind: i64,
    #[serde(default)]
    pub slope: f64,
    #[serde(default)]
    pub tau: f64,
    #[serde(default)]
    pub step: f64,
}

/// Resolved, validated evolution parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvolutionParams {
    pub kind: EvolutionKind,
    pub slope: f64,
    pub tau: f64,
    pub step: f64,
}

impl EvolutionParams {
    pub fn constant() -> Self {
        Self::of(EvolutionKind::Constant)
    }

    pub fn linear(slope: f64) -> Self {
        Self {
            slope,
            ..Self::of(EvolutionKind::Linear)
        }
    }

    pub fn exponential(tau: f64) -> Self {
        Self {
            tau,
            ..Self::of(EvolutionKind::Exponential)
        }
    }

    pub fn logarithmic() -> Self {
        Self::of(EvolutionKind::Logarithmic)
    }

    pub fn step(step: f64) -> Self {
        Self {
            step,
            ..Self::of(EvolutionKind::Step)
        }
    }

    fn of(kind: EvolutionKind) -> Self {
        Self {
            kind,
            slope: 0.0,
            tau: 1.0,
            step: 0.0,
        }
    }
}

impl TryFrom<&EvolutionRow> for EvolutionParams {
    type Error = ConfigError;

    fn try_from(row: &EvolutionRow) -> Result<Self, Self::Error> {
        let kind = EvolutionKind::from_tag(row.id, row.kind)?;
        if kind == EvolutionKind::Exponential && (row.tau == 0.0 || !row.tau.is_finite()) {
            return Err(ConfigError::InvalidTau {
                id: row.id,
                tau: row.tau,
            });
        }
        Ok(Self {
            kind,
            slope: row.slope,
            tau: row.tau,
            step: row.step,
        })
    }
}

/// Closed interval a quantity is clamped to after every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    /// Percent scale used by dual states.
    pub const PERCENT: Bounds = Bounds {
        lower: 0.0,
        upper: 100.0,
    };

    pub fn new(name: &str, lower: f64, upper: f64) -> Result<Self, ConfigError> {
        if !(lower <= upper) {
            return Err(ConfigError::InvalidBounds {
                name: name.to_string(),
                lower,
                upper,
            });
        }
        Ok(Self { lower, upper })
    }

    /// Clamp into `[lower, upper]`. NaN collapses to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.lower;
        }
        value.clamp(self.lower, self.upper)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_roundtrip_through_kind() {
        for tag in 0..=4 {
            let kind = EvolutionKind::from_tag(1, tag).unwrap();
            assert_eq!(kind.tag(), tag);
        }
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let err = EvolutionKind::from_tag(7, 5).unwrap_err();
        assert_eq!(err, ConfigError::UnknownEvolutionKind { id: 7, tag: 5 });
    }

    #[test]
    fn test_exponential_requires_tau() {
        let row = EvolutionRow {
            id: 3,
            kind: 2,
            slope: 0.0,
            tau: 0.0,
            step: 0.0,
        };
        assert!(matches!(
            EvolutionParams::try_from(&row),
            Err(ConfigError::InvalidTau { id: 3, .. })
        ));
    }

    #[test]
    fn test_clamp_handles_nan_and_infinities() {
        let b = Bounds::new("x", 0.0, 10.0).unwrap();
        assert_eq!(b.clamp(f64::NAN), 0.0);
        assert_eq!(b.clamp(f64::INFINITY), 10.0);
        assert_eq!(b.clamp(f64::NEG_INFINITY), 0.0);
        assert_eq!(b.clamp(4.5), 4.5);
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        assert!(Bounds::new("hunger", 5.0, 1.0).is_err());
        assert!(Bounds::new("hunger", f64::NAN, 1.0).is_err());
    }
}
