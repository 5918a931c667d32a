use fathom_graph::Utg;
use fathom_model::{Event, State};
use serde::{Deserialize, Serialize};

use crate::history::History;

/// Why a policy picked the event it picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    /// Not yet tried from this state.
    Novel,
    /// Tried before; picked again.
    Revisit,
    /// A step along a path to another state.
    Navigation,
    /// Taken from a script.
    Scripted,
    /// Bringing the app back to the foreground.
    Recovery,
}

/// Outcome of one policy decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Event { event: Event, kind: SelectionKind },
    /// No state anywhere has work left; the session is done.
    Saturated,
    /// Nothing can be issued in the current state.
    Stuck,
}

impl Decision {
    pub fn event(event: Event, kind: SelectionKind) -> Self {
        Decision::Event { event, kind }
    }
}

/// An exploration strategy: picks the next event for the current state.
///
/// Implementations are synchronous and deterministic given their seed, the
/// graph and the history; the scheduler owns all device I/O.
pub trait InputPolicy: Send {
    fn select(&mut self, state: &State, utg: &Utg, history: &History) -> Decision;

    /// Name of this policy (for tracing and analytics).
    fn name(&self) -> &str;
}

impl<P: InputPolicy + ?Sized> InputPolicy for Box<P> {
    fn select(&mut self, state: &State, utg: &Utg, history: &History) -> Decision {
        (**self).select(state, utg, history)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
