use fathom_model::{Event, StateId};
use serde::{Deserialize, Serialize};

use crate::policy::SelectionKind;

/// A single step of the exploration history, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryStep {
    /// Step number (monotonic within the session).
    pub step_number: u64,
    /// Scheduler iteration the step belongs to.
    pub iteration: u64,
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// A snapshot abstracted to a known state.
    Observed { state: StateId, new_state: bool },
    /// A snapshot that could not be abstracted.
    Unknown { reason: String },
    /// An event went out to the device.
    Dispatched {
        state: StateId,
        event: Event,
        selection: SelectionKind,
        executed: bool,
    },
    /// A device call failed.
    DeviceFailure {
        operation: String,
        message: String,
        consecutive: u32,
    },
    /// The app was restarted to recover.
    Restarted { reason: String },
}

/// Full history for one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct History {
    steps: Vec<HistoryStep>,
    next_step: u64,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, iteration: u64, kind: StepKind) {
        self.steps.push(HistoryStep {
            step_number: self.next_step,
            iteration,
            kind,
        });
        self.next_step += 1;
    }

    pub fn steps(&self) -> &[HistoryStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Most recent dispatched event with the state it was issued from.
    pub fn last_dispatched(&self) -> Option<(&StateId, &Event)> {
        self.steps.iter().rev().find_map(|s| match &s.kind {
            StepKind::Dispatched { state, event, .. } => Some((state, event)),
            _ => None,
        })
    }

    /// Most recently observed state.
    pub fn last_observed(&self) -> Option<&StateId> {
        self.steps.iter().rev().find_map(|s| match &s.kind {
            StepKind::Observed { state, .. } => Some(state),
            _ => None,
        })
    }

    pub fn dispatched(&self) -> impl Iterator<Item = &Event> {
        self.steps.iter().filter_map(|s| match &s.kind {
            StepKind::Dispatched { event, .. } => Some(event),
            _ => None,
        })
    }

    pub fn restarts(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.kind, StepKind::Restarted { .. }))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_are_numbered_in_order() {
        let mut history = History::new();
        let a = StateId::from_hex("aa");
        history.record(
            1,
            StepKind::Observed {
                state: a.clone(),
                new_state: true,
            },
        );
        history.record(
            1,
            StepKind::Dispatched {
                state: a.clone(),
                event: Event::tap(0),
                selection: SelectionKind::Novel,
                executed: true,
            },
        );
        history.record(
            2,
            StepKind::Unknown {
                reason: "missing root".into(),
            },
        );

        let numbers: Vec<u64> = history.steps().iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![0, 1, 2]);
        assert_eq!(history.last_dispatched(), Some((&a, &Event::tap(0))));
        assert_eq!(history.last_observed(), Some(&a));
        assert_eq!(history.dispatched().count(), 1);
    }
}
