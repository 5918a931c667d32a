//! The UI transition graph.
//!
//! States live in an arena (`Vec<StateNode>`) indexed by position, with a
//! side map from `StateId` to arena slot. Transitions are an append-only edge
//! list plus per-node outgoing lists in insertion order, which is what makes
//! shortest-path tie-breaks deterministic.

use std::collections::{HashMap, HashSet, VecDeque};

use fathom_model::{ActionSpace, Event, State, StateId};
use serde::{Deserialize, Serialize};

/// A discovered state plus its mutable bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    pub state: State,
    /// How many times the session has observed this state.
    pub visits: u64,
    /// Logical time of the first observation.
    pub discovered_at: u64,
}

/// An observed `(source, event, target, success)` edge. Immutable once
/// recorded apart from `observations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub source: StateId,
    pub event: Event,
    pub target: StateId,
    /// Whether the device executed the event.
    pub success: bool,
    pub observations: u64,
    /// Logical time of the first observation.
    pub first_seen: u64,
}

type EdgeKey = (StateId, Event, StateId, bool);

/// What a `record` call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordOutcome {
    pub new_source: bool,
    pub new_target: bool,
    pub new_transition: bool,
}

#[derive(Debug, Clone)]
pub struct Utg {
    action_space: ActionSpace,
    nodes: Vec<StateNode>,
    index: HashMap<StateId, usize>,
    transitions: Vec<Transition>,
    edge_index: HashMap<EdgeKey, usize>,
    /// Outgoing transition ids per arena slot, insertion order.
    outgoing: Vec<Vec<usize>>,
    clock: u64,
}

impl Utg {
    pub fn new(action_space: ActionSpace) -> Self {
        Self {
            action_space,
            nodes: Vec::new(),
            index: HashMap::new(),
            transitions: Vec::new(),
            edge_index: HashMap::new(),
            outgoing: Vec::new(),
            clock: 0,
        }
    }

    pub fn action_space(&self) -> &ActionSpace {
        &self.action_space
    }

    /// Logical clock: number of `visit`/`record` calls so far.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    // ── Mutation ─────────────────────────────────────────────────────

    /// Record an observation of `state` with no incoming edge (session start,
    /// or after a recovery that broke the event chain).
    pub fn visit(&mut self, state: &State) -> bool {
        self.clock += 1;
        let (slot, inserted) = self.upsert_state(state);
        self.nodes[slot].visits += 1;
        inserted
    }

    /// Record that `event`, issued in `from`, led to `to`.
    ///
    /// Both endpoints are upserted before the edge, so the graph never holds
    /// a dangling transition. Repeating a call only bumps the edge's
    /// observation counter; an executed and a failed attempt of the same
    /// triple are separate edges.
    pub fn record(&mut self, from: &State, event: &Event, to: &State, success: bool) -> RecordOutcome {
        self.clock += 1;
        let now = self.clock;

        let (_, new_source) = self.upsert_state(from);
        let (target_slot, new_target) = self.upsert_state(to);
        self.nodes[target_slot].visits += 1;

        let key = (from.id.clone(), event.clone(), to.id.clone(), success);
        let new_transition = match self.edge_index.get(&key) {
            Some(&edge) => {
                self.transitions[edge].observations += 1;
                false
            }
            None => {
                let edge = self.transitions.len();
                self.transitions.push(Transition {
                    source: from.id.clone(),
                    event: event.clone(),
                    target: to.id.clone(),
                    success,
                    observations: 1,
                    first_seen: now,
                });
                let source_slot = self.index[&from.id];
                self.outgoing[source_slot].push(edge);
                self.edge_index.insert(key, edge);
                true
            }
        };

        RecordOutcome {
            new_source,
            new_target,
            new_transition,
        }
    }

    fn upsert_state(&mut self, state: &State) -> (usize, bool) {
        if let Some(&slot) = self.index.get(&state.id) {
            return (slot, false);
        }
        let slot = self.nodes.len();
        self.nodes.push(StateNode {
            state: state.clone(),
            visits: 0,
            discovered_at: self.clock,
        });
        self.outgoing.push(Vec::new());
        self.index.insert(state.id.clone(), slot);
        (slot, true)
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn contains(&self, id: &StateId) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &StateId) -> Option<&StateNode> {
        self.index.get(id).map(|&slot| &self.nodes[slot])
    }

    pub fn state(&self, id: &StateId) -> Option<&State> {
        self.node(id).map(|n| &n.state)
    }

    /// States in discovery order.
    pub fn nodes(&self) -> &[StateNode] {
        &self.nodes
    }

    /// Transitions in discovery order.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn state_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    pub fn outgoing(&self, id: &StateId) -> impl Iterator<Item = &Transition> {
        self.index
            .get(id)
            .map(|&slot| self.outgoing[slot].as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&edge| &self.transitions[edge])
    }

    /// Whether `event` has been issued from `state` at least once.
    pub fn is_explored(&self, state: &StateId, event: &Event) -> bool {
        self.outgoing(state).any(|t| &t.event == event)
    }

    /// Total observations of `event` from `state`, across all targets.
    pub fn times_tried(&self, state: &StateId, event: &Event) -> u64 {
        self.outgoing(state)
            .filter(|t| &t.event == event)
            .map(|t| t.observations)
            .sum()
    }

    /// Candidate events of `state` with no outgoing transition yet, in the
    /// action space's order. Unknown states have none.
    pub fn unexplored_actions(&self, state: &StateId) -> Vec<Event> {
        let Some(node) = self.node(state) else {
            return Vec::new();
        };
        let tried: HashSet<&Event> = self.outgoing(state).map(|t| &t.event).collect();
        self.action_space
            .candidates(&node.state)
            .into_iter()
            .filter(|e| !tried.contains(e))
            .collect()
    }

    pub fn has_unexplored(&self, state: &StateId) -> bool {
        !self.unexplored_actions(state).is_empty()
    }

    /// No state anywhere has an unexplored action.
    pub fn is_saturated(&self) -> bool {
        self.nodes.iter().all(|n| !self.has_unexplored(&n.state.id))
    }

    /// Fewest-events path from `from` to `to` over successful, non-loop
    /// edges. Among equal-length paths the earliest-discovered edges win.
    /// `Some(vec![])` when `from == to`.
    pub fn shortest_path(&self, from: &StateId, to: &StateId) -> Option<Vec<Event>> {
        let target = *self.index.get(to)?;
        self.bfs(from, |slot| slot == target).map(|(_, path)| path)
    }

    /// Closest state (by event count) that still has unexplored actions and
    /// passes `accept`, with the path to it. `from` itself qualifies with an
    /// empty path.
    pub fn nearest_unexplored<F>(&self, from: &StateId, accept: F) -> Option<(StateId, Vec<Event>)>
    where
        F: Fn(&StateNode) -> bool,
    {
        self.bfs(from, |slot| {
            let node = &self.nodes[slot];
            accept(node) && self.has_unexplored(&node.state.id)
        })
        .map(|(slot, path)| (self.nodes[slot].state.id.clone(), path))
    }

    /// States reachable from `from` (itself included), in BFS order.
    pub fn reachable_from(&self, from: &StateId) -> Vec<StateId> {
        let Some(&start) = self.index.get(from) else {
            return Vec::new();
        };
        let mut seen = vec![false; self.nodes.len()];
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);
        seen[start] = true;
        while let Some(slot) = queue.pop_front() {
            order.push(self.nodes[slot].state.id.clone());
            for next in self.successors(slot) {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }
        order
    }

    fn successors(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
        self.outgoing[slot].iter().filter_map(move |&edge| {
            let t = &self.transitions[edge];
            if !t.success || t.source == t.target {
                return None;
            }
            self.index.get(&t.target).copied()
        })
    }

    /// BFS from `from` until `goal(slot)` holds; returns the goal slot and the
    /// event path to it.
    fn bfs<G>(&self, from: &StateId, goal: G) -> Option<(usize, Vec<Event>)>
    where
        G: Fn(usize) -> bool,
    {
        let start = *self.index.get(from)?;
        if goal(start) {
            return Some((start, Vec::new()));
        }

        // parent[slot] = (previous slot, edge taken)
        let mut parent: Vec<Option<(usize, usize)>> = vec![None; self.nodes.len()];
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([start]);
        seen[start] = true;

        while let Some(slot) = queue.pop_front() {
            for &edge in &self.outgoing[slot] {
                let t = &self.transitions[edge];
                if !t.success || t.source == t.target {
                    continue;
                }
                let Some(&next) = self.index.get(&t.target) else {
                    continue;
                };
                if seen[next] {
                    continue;
                }
                seen[next] = true;
                parent[next] = Some((slot, edge));
                if goal(next) {
                    return Some((next, self.unwind(&parent, next)));
                }
                queue.push_back(next);
            }
        }
        None
    }

    fn unwind(&self, parent: &[Option<(usize, usize)>], mut slot: usize) -> Vec<Event> {
        let mut path = Vec::new();
        while let Some((prev, edge)) = parent[slot] {
            path.push(self.transitions[edge].event.clone());
            slot = prev;
        }
        path.reverse();
        path
    }

    /// Every transition's endpoints are present.
    pub fn is_sound(&self) -> bool {
        self.transitions
            .iter()
            .all(|t| self.contains(&t.source) && self.contains(&t.target))
    }

    // ── Reconstruction (artifact loading) ────────────────────────────

    pub(crate) fn from_parts(
        action_space: ActionSpace,
        nodes: Vec<StateNode>,
        transitions: Vec<Transition>,
        clock: u64,
    ) -> Self {
        let mut utg = Utg::new(action_space);
        utg.clock = clock;
        for node in nodes {
            let slot = utg.nodes.len();
            utg.index.insert(node.state.id.clone(), slot);
            utg.nodes.push(node);
            utg.outgoing.push(Vec::new());
        }
        for t in transitions {
            let edge = utg.transitions.len();
            if let Some(&slot) = utg.index.get(&t.source) {
                utg.outgoing[slot].push(edge);
            }
            utg.edge_index.insert(
                (t.source.clone(), t.event.clone(), t.target.clone(), t.success),
                edge,
            );
            utg.transitions.push(t);
        }
        utg
    }
}

impl Default for Utg {
    fn default() -> Self {
        Self::new(ActionSpace::default())
    }
}
