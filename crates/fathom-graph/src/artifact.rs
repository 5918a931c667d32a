//! Persisted session artifact: the final graph as a node list and an edge
//! list. Loading validates the edges against the nodes, so a loaded graph is
//! as sound as a live one.

use std::collections::HashSet;
use std::path::Path;

use fathom_model::{ActionSpace, Event, State, StateId, WidgetDescriptor};
use fathom_ui::Foreground;
use serde::{Deserialize, Serialize};

use crate::utg::{StateNode, Transition, Utg};

pub const ARTIFACT_FORMAT_VERSION: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported artifact format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Duplicate state {id}")]
    DuplicateState { id: StateId },

    #[error("Edge {source_id} -> {target_id} references a missing state")]
    DanglingEdge {
        source_id: StateId,
        target_id: StateId,
    },

    #[error("Duplicate edge {source_id} --{event}--> {target_id} (success: {success})")]
    DuplicateEdge {
        source_id: StateId,
        event: Event,
        target_id: StateId,
        success: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: StateId,
    pub activity: String,
    pub foreground: Foreground,
    pub visits: u64,
    pub discovered_at: u64,
    /// Canonical widget summary; enough to rebuild candidate events.
    pub widgets: Vec<WidgetDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: StateId,
    pub event: Event,
    pub target: StateId,
    pub observations: u64,
    pub success: bool,
    pub first_seen: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtgArtifact {
    pub format_version: u32,
    pub action_space: ActionSpace,
    pub clock: u64,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl UtgArtifact {
    pub fn to_json(&self) -> Result<String, ArtifactError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Utg {
    pub fn to_artifact(&self) -> UtgArtifact {
        UtgArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            action_space: self.action_space().clone(),
            clock: self.clock(),
            nodes: self
                .nodes()
                .iter()
                .map(|n| NodeRecord {
                    id: n.state.id.clone(),
                    activity: n.state.activity.clone(),
                    foreground: n.state.foreground,
                    visits: n.visits,
                    discovered_at: n.discovered_at,
                    widgets: n.state.widgets.clone(),
                })
                .collect(),
            edges: self
                .transitions()
                .iter()
                .map(|t| EdgeRecord {
                    source: t.source.clone(),
                    event: t.event.clone(),
                    target: t.target.clone(),
                    observations: t.observations,
                    success: t.success,
                    first_seen: t.first_seen,
                })
                .collect(),
        }
    }

    pub fn from_artifact(artifact: UtgArtifact) -> Result<Self, ArtifactError> {
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: artifact.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }

        let mut ids = HashSet::new();
        let mut nodes = Vec::with_capacity(artifact.nodes.len());
        for record in artifact.nodes {
            if !ids.insert(record.id.clone()) {
                return Err(ArtifactError::DuplicateState { id: record.id });
            }
            nodes.push(StateNode {
                state: State {
                    id: record.id,
                    activity: record.activity,
                    foreground: record.foreground,
                    widgets: record.widgets,
                },
                visits: record.visits,
                discovered_at: record.discovered_at,
            });
        }

        let mut keys = HashSet::new();
        let mut transitions = Vec::with_capacity(artifact.edges.len());
        for edge in artifact.edges {
            if !ids.contains(&edge.source) || !ids.contains(&edge.target) {
                return Err(ArtifactError::DanglingEdge {
                    source_id: edge.source,
                    target_id: edge.target,
                });
            }
            let key = (
                edge.source.clone(),
                edge.event.clone(),
                edge.target.clone(),
                edge.success,
            );
            if !keys.insert(key) {
                return Err(ArtifactError::DuplicateEdge {
                    source_id: edge.source,
                    event: edge.event,
                    target_id: edge.target,
                    success: edge.success,
                });
            }
            transitions.push(Transition {
                source: edge.source,
                event: edge.event,
                target: edge.target,
                success: edge.success,
                observations: edge.observations,
                first_seen: edge.first_seen,
            });
        }

        Ok(Utg::from_parts(
            artifact.action_space,
            nodes,
            transitions,
            artifact.clock,
        ))
    }

    pub fn to_json(&self) -> Result<String, ArtifactError> {
        self.to_artifact().to_json()
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        Utg::from_artifact(UtgArtifact::from_json(json)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let json = std::fs::read_to_string(path)?;
        Utg::from_json(&json)
    }
}
