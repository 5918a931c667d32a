//! Graph-guided exploration: try every untried event in the current state,
//! then walk the shortest known path to the nearest state that still has
//! untried events. Signals saturation when no in-app state has any left.

use std::collections::BTreeSet;

use fathom_graph::Utg;
use fathom_model::{Event, State, StateId, SystemKey};
use fathom_ui::Foreground;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::history::History;
use crate::policy::{Decision, InputPolicy, SelectionKind};
use crate::random::{RandomConfig, RandomPolicy};

/// Where `Back` goes among the untried events of a state, when the action
/// space offers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOrder {
    /// `Back` last: dig into the current screen first.
    DepthFirst,
    /// `Back` first: leave the screen before digging deeper.
    BreadthFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigateConfig {
    pub order: SearchOrder,
    /// Lowercased widget labels tried ahead of everything else.
    pub preferred_labels: Vec<String>,
    /// Consecutive out-of-app states before pressing `Back`.
    pub max_steps_outside: u32,
    /// Consecutive out-of-app states before restarting the app.
    pub max_steps_outside_kill: u32,
    /// Consecutive restarts before giving up on navigation and switching to
    /// random exploration.
    pub max_restarts: u32,
    pub fallback: RandomConfig,
}

impl Default for NavigateConfig {
    fn default() -> Self {
        let preferred_labels = [
            "yes", "ok", "activate", "detail", "more", "access", "allow", "check", "agree",
            "try", "go", "next",
        ];
        Self {
            order: SearchOrder::DepthFirst,
            preferred_labels: preferred_labels.iter().map(|s| s.to_string()).collect(),
            max_steps_outside: 5,
            max_steps_outside_kill: 10,
            max_restarts: 5,
            fallback: RandomConfig::default(),
        }
    }
}

/// An in-progress walk toward a state with untried events.
#[derive(Debug, Clone)]
struct Navigation {
    target: StateId,
    /// Navigation events left before the target counts as missed.
    budget: usize,
}

pub struct NavigateThenExplore {
    config: NavigateConfig,
    fallback: RandomPolicy,
    navigation: Option<Navigation>,
    /// Targets whose paths broke; skipped until observed again.
    missed: BTreeSet<StateId>,
    steps_outside: u32,
    restarts: u32,
    random_mode: bool,
}

impl NavigateThenExplore {
    pub fn new(config: NavigateConfig, fallback_rng: ChaCha8Rng) -> Self {
        let fallback = RandomPolicy::new(fallback_rng, config.fallback.clone());
        Self {
            config,
            fallback,
            navigation: None,
            missed: BTreeSet::new(),
            steps_outside: 0,
            restarts: 0,
            random_mode: false,
        }
    }

    /// Whether the policy gave up on navigation.
    pub fn in_random_mode(&self) -> bool {
        self.random_mode
    }

    pub fn navigation_target(&self) -> Option<&StateId> {
        self.navigation.as_ref().map(|n| &n.target)
    }

    pub fn missed_targets(&self) -> &BTreeSet<StateId> {
        &self.missed
    }

    /// Untried events of `state`, best first.
    pub fn ranked_unexplored(&self, state: &State, utg: &Utg) -> Vec<Event> {
        let back = Event::back();
        let mut has_back = false;
        let mut events: Vec<Event> = utg
            .unexplored_actions(&state.id)
            .into_iter()
            .filter(|e| {
                if *e == back {
                    has_back = true;
                    false
                } else {
                    true
                }
            })
            .collect();

        events.sort_by_key(|e| (!self.is_preferred(state, e), e.rank()));

        if has_back {
            match self.config.order {
                SearchOrder::DepthFirst => events.push(back),
                SearchOrder::BreadthFirst => events.insert(0, back),
            }
        }
        events
    }

    fn is_preferred(&self, state: &State, event: &Event) -> bool {
        let Some(label) = event.target().and_then(|i| state.label_of(i)) else {
            return false;
        };
        self.config.preferred_labels.iter().any(|p| *p == label)
    }

    fn restart(&mut self, state: &State, utg: &Utg, history: &History, why: &str) -> Decision {
        self.navigation = None;
        self.restarts += 1;
        if self.restarts > self.config.max_restarts {
            tracing::info!(
                restarts = self.restarts,
                "navigation keeps failing; switching to random exploration"
            );
            self.random_mode = true;
            return self.fallback.select(state, utg, history);
        }
        tracing::debug!(state = %state.id.short(), restarts = self.restarts, why, "restarting app");
        Decision::event(Event::RestartApp, SelectionKind::Recovery)
    }

    /// Follow the current navigation one step. `None` once it is finished,
    /// abandoned or missed.
    fn continue_navigation(&mut self, state: &State, utg: &Utg) -> Option<Event> {
        let nav = self.navigation.as_mut()?;
        if nav.target == state.id || !utg.has_unexplored(&nav.target) {
            self.navigation = None;
            return None;
        }
        let step = if nav.budget == 0 {
            None
        } else {
            utg.shortest_path(&state.id, &nav.target)
                .and_then(|path| path.into_iter().next())
        };
        match step {
            Some(event) => {
                nav.budget -= 1;
                Some(event)
            }
            None => {
                tracing::debug!(goal = %nav.target.short(), "navigation target missed");
                self.missed.insert(nav.target.clone());
                self.navigation = None;
                None
            }
        }
    }

    fn any_in_app_work(&self, utg: &Utg) -> bool {
        utg.nodes()
            .iter()
            .any(|n| n.state.is_in_app() && utg.has_unexplored(&n.state.id))
    }
}

impl InputPolicy for NavigateThenExplore {
    fn select(&mut self, state: &State, utg: &Utg, history: &History) -> Decision {
        self.missed.remove(&state.id);

        // ── Foreground checks ───────────────────────────────────────
        match state.foreground {
            Foreground::NotRunning => {
                self.steps_outside = 0;
                return self.restart(state, utg, history, "app not running");
            }
            Foreground::Backgrounded { .. } => {
                self.steps_outside += 1;
                if self.steps_outside > self.config.max_steps_outside_kill {
                    self.steps_outside = 0;
                    return self.restart(state, utg, history, "too long outside the app");
                }
                if self.steps_outside > self.config.max_steps_outside {
                    return Decision::event(
                        Event::Key {
                            key: SystemKey::Back,
                        },
                        SelectionKind::Recovery,
                    );
                }
            }
            Foreground::InApp => self.steps_outside = 0,
        }

        if self.random_mode {
            return self.fallback.select(state, utg, history);
        }

        // ── Navigation in progress ──────────────────────────────────
        if let Some(event) = self.continue_navigation(state, utg) {
            tracing::debug!(state = %state.id.short(), %event, "navigating");
            return Decision::event(event, SelectionKind::Navigation);
        }

        // ── Explore the current state ───────────────────────────────
        if let Some(event) = self.ranked_unexplored(state, utg).into_iter().next() {
            if state.is_in_app() {
                self.restarts = 0;
            }
            tracing::debug!(state = %state.id.short(), %event, "exploring");
            return Decision::event(event, SelectionKind::Novel);
        }

        // ── Pick the next target ────────────────────────────────────
        let missed = &self.missed;
        let nearest = utg.nearest_unexplored(&state.id, |node| {
            node.state.is_in_app() && !missed.contains(&node.state.id)
        });
        if let Some((target, path)) = nearest {
            if let Some(first) = path.first().cloned() {
                tracing::debug!(
                    state = %state.id.short(),
                    goal = %target.short(),
                    hops = path.len(),
                    "new navigation target"
                );
                self.navigation = Some(Navigation {
                    target,
                    budget: path.len() * 2 - 1,
                });
                return Decision::event(first, SelectionKind::Navigation);
            }
        }

        if !self.any_in_app_work(utg) {
            return Decision::Saturated;
        }
        self.restart(state, utg, history, "no reachable state with untried events")
    }

    fn name(&self) -> &str {
        "navigate_then_explore"
    }
}
