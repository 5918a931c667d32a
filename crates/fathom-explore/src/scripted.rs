//! Scripted exploration: replay a fixed sequence of steps, handing control to
//! a fallback policy whenever the script cannot be followed.
//!
//! Besides the linear sequence, a script may carry [`StateTrigger`]s: step
//! lists that run whenever a matching state is observed, at any point of the
//! session (dismissing a permission dialog, filling a login form).
//!
//! Steps address widgets by [`WidgetSelector`] rather than by index, so a
//! script survives small layout changes between runs.

use std::path::Path;

use fathom_graph::Utg;
use fathom_model::{Event, State, StateId, SwipeDirection, SystemKey, WidgetDescriptor};
use serde::{Deserialize, Serialize};

use crate::history::History;
use crate::policy::{Decision, InputPolicy, SelectionKind};

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("Invalid script JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),

    #[error("No recorded transition for step {step} ({event}) from state {state}")]
    BrokenPath {
        step: usize,
        event: String,
        state: String,
    },

    #[error("Widget #{index} of state {state} cannot be addressed")]
    UnaddressableWidget { index: u32, state: String },
}

/// Picks a widget out of a state. Every given attribute must match; `nth`
/// chooses among several matches in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSelector {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub nth: usize,
}

impl WidgetSelector {
    pub fn by_id(resource_id: &str) -> Self {
        Self {
            resource_id: Some(resource_id.to_string()),
            ..Default::default()
        }
    }

    pub fn by_text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn matches(&self, widget: &WidgetDescriptor) -> bool {
        let id_ok = self
            .resource_id
            .as_ref()
            .map_or(true, |id| widget.resource_id.as_ref() == Some(id));
        let text_ok = self
            .text
            .as_ref()
            .map_or(true, |t| widget.text.as_ref() == Some(t));
        let class_ok = self.class.as_ref().map_or(true, |c| &widget.class == c);
        id_ok && text_ok && class_ok
    }

    pub fn resolve<'s>(&self, state: &'s State) -> Option<&'s WidgetDescriptor> {
        state.widgets.iter().filter(|w| self.matches(w)).nth(self.nth)
    }

    /// The most specific selector that picks `widget` out of `state`.
    fn for_widget(state: &State, widget: &WidgetDescriptor) -> Self {
        let mut selector = match (&widget.resource_id, &widget.text) {
            (Some(id), _) => Self::by_id(id),
            (None, Some(text)) => Self::by_text(text),
            (None, None) => Self {
                class: Some(widget.class.clone()),
                ..Default::default()
            },
        };
        selector.nth = state
            .widgets
            .iter()
            .take_while(|w| w.index != widget.index)
            .filter(|w| selector.matches(w))
            .count();
        selector
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptAction {
    Tap {
        selector: WidgetSelector,
    },
    LongPress {
        selector: WidgetSelector,
    },
    Swipe {
        direction: SwipeDirection,
        #[serde(default)]
        selector: Option<WidgetSelector>,
    },
    TextInput {
        selector: WidgetSelector,
        text: String,
    },
    Key {
        key: SystemKey,
    },
    Rotate,
    RestartApp,
    Wait {
        millis: u64,
    },
}

impl ScriptAction {
    /// Bind the action to a concrete event in `state`. `None` when a selector
    /// matches nothing or the event is not valid there.
    pub fn bind(&self, state: &State) -> Option<Event> {
        let pick = |s: &WidgetSelector| s.resolve(state).map(|w| w.index);
        let event = match self {
            ScriptAction::Tap { selector } => Event::Tap {
                widget: pick(selector)?,
            },
            ScriptAction::LongPress { selector } => Event::LongPress {
                widget: pick(selector)?,
            },
            ScriptAction::Swipe {
                direction,
                selector,
            } => Event::Swipe {
                direction: *direction,
                widget: match selector {
                    Some(s) => Some(pick(s)?),
                    None => None,
                },
            },
            ScriptAction::TextInput { selector, text } => Event::TextInput {
                widget: pick(selector)?,
                text: text.clone(),
            },
            ScriptAction::Key { key } => Event::Key { key: *key },
            ScriptAction::Rotate => Event::Rotate,
            ScriptAction::RestartApp => Event::RestartApp,
            ScriptAction::Wait { millis } => Event::Wait { millis: *millis },
        };
        event.is_valid_for(state).then_some(event)
    }

    fn from_event(state: &State, event: &Event) -> Option<Self> {
        let selector = |index: u32| {
            state
                .widget(index)
                .map(|w| WidgetSelector::for_widget(state, w))
        };
        Some(match event {
            Event::Tap { widget } => ScriptAction::Tap {
                selector: selector(*widget)?,
            },
            Event::LongPress { widget } => ScriptAction::LongPress {
                selector: selector(*widget)?,
            },
            Event::Swipe { direction, widget } => ScriptAction::Swipe {
                direction: *direction,
                selector: match widget {
                    Some(w) => Some(selector(*w)?),
                    None => None,
                },
            },
            Event::TextInput { widget, text } => ScriptAction::TextInput {
                selector: selector(*widget)?,
                text: text.clone(),
            },
            Event::Key { key } => ScriptAction::Key { key: *key },
            Event::Rotate => ScriptAction::Rotate,
            Event::RestartApp => ScriptAction::RestartApp,
            Event::Wait { millis } => ScriptAction::Wait { millis: *millis },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// The step only fires while this activity is in front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_activity: Option<String>,
    pub action: ScriptAction,
}

impl ScriptStep {
    pub fn bind(&self, state: &State) -> Option<Event> {
        if let Some(activity) = &self.expect_activity {
            if activity != &state.activity {
                return None;
            }
        }
        self.action.bind(state)
    }
}

/// Recognizes a state by its activity and the widgets it shows. An empty
/// matcher matches every state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMatcher {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
    /// Every selector must resolve in the state.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub widgets: Vec<WidgetSelector>,
}

impl StateMatcher {
    pub fn activity(activity: &str) -> Self {
        Self {
            activity: Some(activity.to_string()),
            widgets: Vec::new(),
        }
    }

    pub fn with_widget(mut self, selector: WidgetSelector) -> Self {
        self.widgets.push(selector);
        self
    }

    pub fn matches(&self, state: &State) -> bool {
        self.activity.as_ref().map_or(true, |a| a == &state.activity)
            && self.widgets.iter().all(|w| w.resolve(state).is_some())
    }
}

/// Steps to run whenever a matching state is observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTrigger {
    pub when: StateMatcher,
    pub steps: Vec<ScriptStep>,
    /// Stop firing after this many runs. Unlimited when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fires: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub triggers: Vec<StateTrigger>,
}

impl Script {
    pub fn from_json(json: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ScriptError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Turn a path of events through `utg`, starting at `from`, into a
    /// replayable script. Each event must have a successful recorded
    /// transition from the state it is issued in.
    pub fn from_path(utg: &Utg, from: &StateId, path: &[Event]) -> Result<Self, ScriptError> {
        let mut steps = Vec::with_capacity(path.len());
        let mut current = from.clone();
        for (step, event) in path.iter().enumerate() {
            let broken = || ScriptError::BrokenPath {
                step,
                event: event.to_string(),
                state: current.to_string(),
            };
            let state = utg.state(&current).ok_or_else(broken)?;
            let next = utg
                .outgoing(&current)
                .find(|t| t.success && &t.event == event)
                .map(|t| t.target.clone())
                .ok_or_else(broken)?;
            let action = ScriptAction::from_event(state, event).ok_or_else(|| {
                ScriptError::UnaddressableWidget {
                    index: event.target().unwrap_or_default(),
                    state: current.to_string(),
                }
            })?;
            steps.push(ScriptStep {
                expect_activity: Some(state.activity.clone()),
                action,
            });
            current = next;
        }
        Ok(Self {
            steps,
            triggers: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A trigger's step list in progress.
#[derive(Debug, Clone, Copy)]
struct Running {
    trigger: usize,
    next_step: usize,
}

/// Replays a [`Script`].
///
/// Each selection first continues a running trigger, then starts the first
/// trigger whose matcher accepts the observed state, then advances the linear
/// steps. A linear step that cannot be bound in the observed state is retried
/// on the following iterations, up to `max_tries`, while the fallback policy
/// acts; then it is skipped. A trigger step that cannot be bound abandons
/// the trigger's run. Once the linear steps are exhausted only triggers and
/// the fallback remain.
pub struct ScriptedPolicy {
    script: Script,
    cursor: usize,
    tries: u32,
    max_tries: u32,
    skipped: Vec<usize>,
    running: Option<Running>,
    fires: Vec<u32>,
    fallback: Box<dyn InputPolicy>,
}

impl ScriptedPolicy {
    pub fn new(script: Script, max_tries: u32, fallback: Box<dyn InputPolicy>) -> Self {
        let fires = vec![0; script.triggers.len()];
        Self {
            script,
            cursor: 0,
            tries: 0,
            max_tries,
            skipped: Vec::new(),
            running: None,
            fires,
            fallback,
        }
    }

    /// All linear steps have been replayed or skipped.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.script.steps.len()
    }

    /// Index of the next step to replay.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Steps given up on, in order.
    pub fn skipped(&self) -> &[usize] {
        &self.skipped
    }

    /// How many times each trigger has started, in script order.
    pub fn trigger_fires(&self) -> &[u32] {
        &self.fires
    }

    /// Whether a trigger's steps are being replayed.
    pub fn in_trigger(&self) -> bool {
        self.running.is_some()
    }

    fn continue_trigger(&mut self, state: &State) -> Option<Event> {
        let run = self.running.take()?;
        let steps = &self.script.triggers[run.trigger].steps;
        let Some(event) = steps.get(run.next_step).and_then(|s| s.bind(state)) else {
            tracing::debug!(trigger = run.trigger, step = run.next_step, "abandoning trigger run");
            return None;
        };
        if run.next_step + 1 < steps.len() {
            self.running = Some(Running {
                trigger: run.trigger,
                next_step: run.next_step + 1,
            });
        }
        Some(event)
    }

    fn start_trigger(&mut self, state: &State) -> Option<Event> {
        for (i, trigger) in self.script.triggers.iter().enumerate() {
            if trigger.max_fires.is_some_and(|max| self.fires[i] >= max)
                || !trigger.when.matches(state)
            {
                continue;
            }
            let Some(event) = trigger.steps.first().and_then(|s| s.bind(state)) else {
                continue;
            };
            self.fires[i] += 1;
            tracing::debug!(trigger = i, fires = self.fires[i], %event, "state trigger fired");
            if trigger.steps.len() > 1 {
                self.running = Some(Running {
                    trigger: i,
                    next_step: 1,
                });
            }
            return Some(event);
        }
        None
    }
}

impl InputPolicy for ScriptedPolicy {
    fn select(&mut self, state: &State, utg: &Utg, history: &History) -> Decision {
        if let Some(event) = self
            .continue_trigger(state)
            .or_else(|| self.start_trigger(state))
        {
            return Decision::event(event, SelectionKind::Scripted);
        }

        if let Some(step) = self.script.steps.get(self.cursor) {
            if let Some(event) = step.bind(state) {
                tracing::debug!(step = self.cursor, %event, "scripted step");
                self.cursor += 1;
                self.tries = 0;
                return Decision::event(event, SelectionKind::Scripted);
            }
            self.tries += 1;
            if self.tries >= self.max_tries {
                tracing::warn!(step = self.cursor, tries = self.tries, "skipping script step");
                self.skipped.push(self.cursor);
                self.cursor += 1;
                self.tries = 0;
            }
        }
        self.fallback.select(state, utg, history)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
