//! Session analytics.
//!
//! Tracks the coverage curve, recovery counters and policy decisions of one
//! session for reporting.

use std::collections::BTreeMap;

use fathom_explore::SelectionKind;
use fathom_graph::UtgStats;
use serde::{Deserialize, Serialize};

/// Graph size and coverage after an iteration that grew the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoveragePoint {
    pub iteration: u64,
    pub states: usize,
    pub transitions: usize,
    pub actions_explored: usize,
    pub actions_total: usize,
    /// Explored share of all candidate actions (0.0-1.0).
    pub percent: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionAnalytics {
    pub policy: String,
    pub coverage_curve: Vec<CoveragePoint>,
    /// Dispatched events per selection kind.
    pub decisions: BTreeMap<SelectionKind, u64>,
    pub iterations: u64,
    pub device_failures: u64,
    pub unknown_states: u64,
    pub retries: u64,
    pub restarts: u64,
    pub rejected_events: u64,
    /// Times the policy had nothing to issue.
    pub stuck: u64,
    pub peak_coverage: f64,
    pub elapsed_ms: u64,
}

impl SessionAnalytics {
    pub fn new(policy: &str) -> Self {
        Self {
            policy: policy.to_string(),
            ..Default::default()
        }
    }

    pub fn record_coverage(&mut self, iteration: u64, stats: &UtgStats) {
        let actions_total = stats.actions_total();
        let actions_explored = stats.actions_explored();
        let percent = if actions_total > 0 {
            actions_explored as f64 / actions_total as f64
        } else {
            0.0
        };
        self.coverage_curve.push(CoveragePoint {
            iteration,
            states: stats.state_count,
            transitions: stats.transition_count,
            actions_explored,
            actions_total,
            percent,
        });
        if percent > self.peak_coverage {
            self.peak_coverage = percent;
        }
    }

    pub fn record_decision(&mut self, kind: SelectionKind) {
        *self.decisions.entry(kind).or_insert(0) += 1;
    }

    pub fn events_dispatched(&self) -> u64 {
        self.decisions.values().sum()
    }

    /// New states per 100 iterations.
    pub fn discovery_rate(&self) -> f64 {
        match self.coverage_curve.last() {
            Some(last) if self.iterations > 0 => {
                last.states as f64 / self.iterations as f64 * 100.0
            }
            _ => 0.0,
        }
    }

    pub fn summary(&self) -> AnalyticsSummary {
        let last = self.coverage_curve.last();
        AnalyticsSummary {
            policy: self.policy.clone(),
            iterations: self.iterations,
            states: last.map_or(0, |p| p.states),
            transitions: last.map_or(0, |p| p.transitions),
            peak_coverage: self.peak_coverage,
            events_dispatched: self.events_dispatched(),
            failures: self.device_failures + self.unknown_states,
            restarts: self.restarts,
            elapsed_ms: self.elapsed_ms,
        }
    }
}

/// Compact summary for logs and reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub policy: String,
    pub iterations: u64,
    pub states: usize,
    pub transitions: usize,
    pub peak_coverage: f64,
    pub events_dispatched: u64,
    pub failures: u64,
    pub restarts: u64,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fathom_graph::ActivityCoverage;

    fn stats(states: usize, explored: usize, total: usize) -> UtgStats {
        let mut coverage_per_activity = BTreeMap::new();
        coverage_per_activity.insert(
            "Main".to_string(),
            ActivityCoverage {
                states,
                actions_total: total,
                actions_explored: explored,
            },
        );
        UtgStats {
            state_count: states,
            transition_count: explored,
            coverage_per_activity,
        }
    }

    #[test]
    fn test_coverage_curve_tracks_peak() {
        let mut analytics = SessionAnalytics::new("random");
        analytics.record_coverage(1, &stats(1, 0, 4));
        analytics.record_coverage(2, &stats(2, 2, 4));
        analytics.record_coverage(3, &stats(3, 2, 8));
        assert_eq!(analytics.coverage_curve.len(), 3);
        assert!((analytics.peak_coverage - 0.5).abs() < f64::EPSILON);
        assert_eq!(analytics.coverage_curve[2].percent, 0.25);
    }

    #[test]
    fn test_empty_graph_has_zero_coverage() {
        let mut analytics = SessionAnalytics::new("random");
        analytics.record_coverage(1, &UtgStats::default());
        assert_eq!(analytics.peak_coverage, 0.0);
        assert_eq!(analytics.discovery_rate(), 0.0);
    }

    #[test]
    fn test_summary_counts_decisions() {
        let mut analytics = SessionAnalytics::new("navigate_then_explore");
        analytics.record_decision(SelectionKind::Novel);
        analytics.record_decision(SelectionKind::Novel);
        analytics.record_decision(SelectionKind::Navigation);
        analytics.device_failures = 2;
        analytics.unknown_states = 1;
        let summary = analytics.summary();
        assert_eq!(summary.events_dispatched, 3);
        assert_eq!(summary.failures, 3);
        assert_eq!(analytics.decisions[&SelectionKind::Novel], 2);
    }
}
