use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::utg::Utg;

/// Per-activity exploration coverage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityCoverage {
    pub states: usize,
    /// Candidate events across this activity's states.
    pub actions_total: usize,
    /// Candidate events already issued at least once.
    pub actions_explored: usize,
}

impl ActivityCoverage {
    pub fn ratio(&self) -> f64 {
        if self.actions_total == 0 {
            1.0
        } else {
            self.actions_explored as f64 / self.actions_total as f64
        }
    }
}

/// Read-only summary used for termination checks and reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtgStats {
    pub state_count: usize,
    pub transition_count: usize,
    pub coverage_per_activity: BTreeMap<String, ActivityCoverage>,
}

impl UtgStats {
    pub fn activities(&self) -> usize {
        self.coverage_per_activity.len()
    }

    pub fn actions_total(&self) -> usize {
        self.coverage_per_activity.values().map(|c| c.actions_total).sum()
    }

    pub fn actions_explored(&self) -> usize {
        self.coverage_per_activity
            .values()
            .map(|c| c.actions_explored)
            .sum()
    }
}

impl Utg {
    pub fn stats(&self) -> UtgStats {
        let mut coverage: BTreeMap<String, ActivityCoverage> = BTreeMap::new();
        for node in self.nodes() {
            let candidates = self.action_space().candidates(&node.state);
            let unexplored = self.unexplored_actions(&node.state.id).len();
            let entry = coverage.entry(node.state.activity.clone()).or_default();
            entry.states += 1;
            entry.actions_total += candidates.len();
            entry.actions_explored += candidates.len() - unexplored;
        }
        UtgStats {
            state_count: self.state_count(),
            transition_count: self.transition_count(),
            coverage_per_activity: coverage,
        }
    }
}
