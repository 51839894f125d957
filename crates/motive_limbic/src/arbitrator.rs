//! Dominant-motivation arbitration
//!
//! Once per tick every motivation is read, and exactly one is selected as
//! dominant. A motivation competes only if it clears its own threshold;
//! among competitors the strongest wins, except that a tie with the
//! incumbent keeps the incumbent. When nobody competes, the motivation
//! named `"none"` takes over.

use motive_core::{ArbitrationRecord, Intensity, MotivationId, FALLBACK_MOTIVATION};

/// One motivation's state as seen by a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading<'a> {
    pub id: MotivationId,
    pub name: &'a str,
    pub threshold: f64,
    pub value: f64,
}

/// Dominant lineage. `previous` and `saved_previous` only shift when the
/// dominant actually changes, so they keep the last distinct dominant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DominanceHistory {
    pub current: Option<MotivationId>,
    pub previous: Option<MotivationId>,
    pub saved_previous: Option<MotivationId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub tick: u64,
    pub dominant: MotivationId,
    pub dominant_name: String,
    /// True when the dominant differs from the previous tick's.
    pub changed: bool,
    /// Every motivation's value, in arbitration order.
    pub intensities: Vec<(String, f64)>,
}

impl Decision {
    pub fn to_record(&self) -> ArbitrationRecord {
        ArbitrationRecord {
            tick: self.tick,
            dominant: self.dominant_name.clone(),
            intensities: self
                .intensities
                .iter()
                .map(|(name, value)| Intensity {
                    key: name.clone(),
                    value: format!("{:?}", value),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct Arbitrator {
    history: DominanceHistory,
    tick: u64,
}

impl Arbitrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> DominanceHistory {
        self.history
    }

    pub fn current(&self) -> Option<MotivationId> {
        self.history.current
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    /// Select the dominant motivation among `readings` (in their stable
    /// order). Returns `None` only when nothing clears its threshold and
    /// no fallback motivation is present; the history is left untouched.
    pub fn arbitrate(&mut self, readings: &[Reading<'_>]) -> Option<Decision> {
        let incumbent = self
            .history
            .current
            .and_then(|id| readings.iter().find(|r| r.id == id));

        let mut max_value = incumbent.map_or(0.0, |r| r.value);
        let mut candidate: Option<&Reading<'_>> = None;
        let mut fallback: Option<&Reading<'_>> = None;

        for reading in readings {
            if reading.value >= reading.threshold {
                let is_incumbent = incumbent.is_some_and(|i| i.name == reading.name);
                if reading.value > max_value || (is_incumbent && reading.value >= max_value) {
                    candidate = Some(reading);
                    max_value = reading.value;
                }
            }
            if reading.name == FALLBACK_MOTIVATION {
                fallback = Some(reading);
            }
        }

        let winner = candidate.or(fallback)?;
        let changed = self.history.current != Some(winner.id);

        match self.history.previous {
            None => {
                self.history.previous = Some(winner.id);
                self.history.saved_previous = Some(winner.id);
            }
            Some(previous) if previous != winner.id => {
                self.history.saved_previous = Some(previous);
                self.history.previous = Some(winner.id);
            }
            Some(_) => {}
        }
        self.history.current = Some(winner.id);
        self.tick += 1;

        Some(Decision {
            tick: self.tick,
            dominant: winner.id,
            dominant_name: winner.name.to_string(),
            changed,
            intensities: readings
                .iter()
                .map(|r| (r.name.to_string(), r.value))
                .collect(),
        })
    }
}
