use fathom_graph::Utg;
use fathom_model::{Event, State};
use fathom_ui::Foreground;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::history::History;
use crate::policy::{Decision, InputPolicy, SelectionKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomConfig {
    /// Weight of an event never tried from the current state. Tried events
    /// weigh `1 / (1 + times_tried)`.
    pub novelty_boost: f64,
}

impl Default for RandomConfig {
    fn default() -> Self {
        Self { novelty_boost: 4.0 }
    }
}

/// Weighted random exploration, biased toward untried events.
///
/// Candidates are rolled over in traversal order, so equal weights resolve
/// toward the lowest widget index for a given roll.
pub struct RandomPolicy {
    rng: ChaCha8Rng,
    config: RandomConfig,
}

impl RandomPolicy {
    pub fn new(rng: ChaCha8Rng, config: RandomConfig) -> Self {
        Self { rng, config }
    }

    /// Weighted pick among the candidate events of `state`. `None` when the
    /// state has no candidates.
    pub fn pick(&mut self, state: &State, utg: &Utg) -> Option<(Event, SelectionKind)> {
        let candidates = utg.action_space().candidates(state);
        if candidates.is_empty() {
            return None;
        }

        let tried: Vec<u64> = candidates
            .iter()
            .map(|e| utg.times_tried(&state.id, e))
            .collect();
        let weights: Vec<f64> = tried
            .iter()
            .map(|&n| {
                if n == 0 {
                    self.config.novelty_boost.max(0.0)
                } else {
                    1.0 / (1.0 + n as f64)
                }
            })
            .collect();

        let total: f64 = weights.iter().sum();
        let mut chosen = candidates.len() - 1;
        if total <= 0.0 {
            chosen = 0;
        } else {
            let mut roll: f64 = self.rng.gen::<f64>() * total;
            for (i, &weight) in weights.iter().enumerate() {
                roll -= weight;
                if roll <= 0.0 {
                    chosen = i;
                    break;
                }
            }
        }

        let kind = if tried[chosen] == 0 {
            SelectionKind::Novel
        } else {
            SelectionKind::Revisit
        };
        candidates.into_iter().nth(chosen).map(|event| (event, kind))
    }
}

impl InputPolicy for RandomPolicy {
    fn select(&mut self, state: &State, utg: &Utg, _history: &History) -> Decision {
        if utg.is_saturated() {
            return Decision::Saturated;
        }
        if state.foreground == Foreground::NotRunning {
            return Decision::event(Event::RestartApp, SelectionKind::Recovery);
        }
        match self.pick(state, utg) {
            Some((event, kind)) => {
                tracing::debug!(state = %state.id.short(), %event, ?kind, "random selection");
                Decision::event(event, kind)
            }
            None => Decision::Stuck,
        }
    }

    fn name(&self) -> &str {
        "random"
    }
}
