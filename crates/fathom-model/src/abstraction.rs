//! State abstraction: raw UI hierarchy -> canonical [`State`].
//!
//! The rule for what is semantic and what is volatile:
//! - hashed: foreground activity, foreground position, and per visible widget
//!   its hierarchy path, class, resource id, normalized text and the
//!   action-bearing flags (enabled, clickable, long-clickable, scrollable,
//!   editable, checkable);
//! - ignored: pixel bounds, capture time, focus, selection, checked state,
//!   invisible subtrees, and the text of editable widgets.
//!
//! A content description only stands in for the label when the text is empty.
//!
//! Traversal is bounded in depth, fan-out and total widgets, so the cost of
//! one abstraction is linear in the snapshot size and capped for pathological
//! trees.

use fathom_ui::{parse_snapshot, AppDescriptor, Bounds, RawNode, RawUiTree};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::event::WidgetIndex;
use crate::state::{State, StateId, WidgetDescriptor};

/// How widget text is normalized before hashing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRule {
    /// Keep text as-is (whitespace collapsed).
    Exact,
    /// Replace every digit run with `#`, so clocks and counters don't split states.
    MaskDigits,
    /// Ignore text entirely.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbstractionConfig {
    /// Nodes deeper than this are not visited.
    pub max_depth: usize,
    /// Only the first `max_children` children of a node are visited.
    pub max_children: usize,
    /// Traversal stops after this many widgets.
    pub max_widgets: usize,
    pub text_rule: TextRule,
    /// Normalized text is truncated to this many characters.
    pub max_text_len: usize,
    pub include_resource_id: bool,
}

impl Default for AbstractionConfig {
    fn default() -> Self {
        Self {
            max_depth: 24,
            max_children: 64,
            max_widgets: 512,
            text_rule: TextRule::MaskDigits,
            max_text_len: 64,
            include_resource_id: true,
        }
    }
}

/// Pixel bounds per widget index. Kept beside a state so events can be
/// dispatched, but never part of its identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    bounds: Vec<Option<Bounds>>,
}

impl Layout {
    pub fn bounds(&self, index: WidgetIndex) -> Option<Bounds> {
        self.bounds.get(index as usize).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }
}

/// A successfully abstracted snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub state: State,
    pub layout: Layout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnknownReason {
    Unparseable { message: String },
    MissingRoot,
    MissingActivity,
    EmptyRootClass,
}

impl std::fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnknownReason::Unparseable { message } => write!(f, "unparseable snapshot: {message}"),
            UnknownReason::MissingRoot => f.write_str("snapshot has no root node"),
            UnknownReason::MissingActivity => f.write_str("snapshot has no foreground activity"),
            UnknownReason::EmptyRootClass => f.write_str("root node has no class"),
        }
    }
}

/// Result of abstracting one snapshot. `Unknown` is the sentinel for
/// malformed input; callers treat it as a transient failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Abstraction {
    Known(Observation),
    Unknown(UnknownReason),
}

impl Abstraction {
    pub fn state(&self) -> Option<&State> {
        match self {
            Abstraction::Known(obs) => Some(&obs.state),
            Abstraction::Unknown(_) => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Abstraction::Unknown(_))
    }
}

/// Pure, deterministic snapshot abstractor.
#[derive(Debug, Clone, Default)]
pub struct StateAbstractor {
    config: AbstractionConfig,
}

impl StateAbstractor {
    pub fn new(config: AbstractionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AbstractionConfig {
        &self.config
    }

    /// Parse then abstract a JSON hierarchy dump.
    pub fn abstract_json(&self, json: &str, app: &AppDescriptor) -> Abstraction {
        match parse_snapshot(json) {
            Ok(tree) => self.abstract_tree(&tree, app),
            Err(e) => Abstraction::Unknown(UnknownReason::Unparseable {
                message: e.to_string(),
            }),
        }
    }

    pub fn abstract_tree(&self, tree: &RawUiTree, app: &AppDescriptor) -> Abstraction {
        let Some(root) = &tree.root else {
            return Abstraction::Unknown(UnknownReason::MissingRoot);
        };
        let activity = match tree.foreground_activity.as_deref().map(str::trim) {
            Some(a) if !a.is_empty() => a.to_string(),
            _ => return Abstraction::Unknown(UnknownReason::MissingActivity),
        };
        if root.class.trim().is_empty() {
            return Abstraction::Unknown(UnknownReason::EmptyRootClass);
        }

        let foreground = app.classify(tree);
        let (widgets, bounds) = self.collect_widgets(root);

        let mut hasher = Sha256::new();
        feed(&mut hasher, &activity);
        feed(&mut hasher, &serde_json::to_string(&foreground).unwrap_or_default());
        for widget in &widgets {
            feed_widget(&mut hasher, widget);
        }
        let digest = hasher.finalize();
        let id = StateId::from_hex(hex::encode(&digest[..16]));

        Abstraction::Known(Observation {
            state: State {
                id,
                activity,
                foreground,
                widgets,
            },
            layout: Layout { bounds },
        })
    }

    /// Pre-order walk with an explicit stack; invisible subtrees are pruned.
    fn collect_widgets(&self, root: &RawNode) -> (Vec<WidgetDescriptor>, Vec<Option<Bounds>>) {
        let mut widgets = Vec::new();
        let mut bounds = Vec::new();
        let mut stack: Vec<(&RawNode, Vec<u16>)> = vec![(root, Vec::new())];

        while let Some((node, path)) = stack.pop() {
            if widgets.len() >= self.config.max_widgets {
                break;
            }
            if !node.visible {
                continue;
            }

            widgets.push(self.describe(node, widgets.len() as WidgetIndex, path.clone()));
            bounds.push(node.bounds);

            if path.len() >= self.config.max_depth {
                continue;
            }
            let fan_out = node.children.len().min(self.config.max_children);
            // Reverse push keeps document order on pop.
            for (i, child) in node.children[..fan_out].iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i as u16);
                stack.push((child, child_path));
            }
        }

        (widgets, bounds)
    }

    fn describe(&self, node: &RawNode, index: WidgetIndex, path: Vec<u16>) -> WidgetDescriptor {
        let label = if node.editable {
            None
        } else {
            node.text
                .as_deref()
                .filter(|t| !t.trim().is_empty())
                .or(node.content_desc.as_deref())
        };
        WidgetDescriptor {
            index,
            path,
            class: node.class.trim().to_string(),
            resource_id: if self.config.include_resource_id {
                node.resource_id.clone().filter(|r| !r.is_empty())
            } else {
                None
            },
            text: label.and_then(|t| {
                normalize_text(t, self.config.text_rule, self.config.max_text_len)
            }),
            enabled: node.enabled,
            clickable: node.clickable,
            long_clickable: node.long_clickable,
            scrollable: node.scrollable,
            editable: node.editable,
            checkable: node.checkable,
        }
    }
}

/// Collapse whitespace, apply the text rule, truncate. Empty results are `None`.
pub fn normalize_text(raw: &str, rule: TextRule, max_len: usize) -> Option<String> {
    if rule == TextRule::Drop {
        return None;
    }
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let normalized = match rule {
        TextRule::MaskDigits => {
            let mut out = String::with_capacity(collapsed.len());
            let mut in_digits = false;
            for c in collapsed.chars() {
                if c.is_ascii_digit() {
                    if !in_digits {
                        out.push('#');
                    }
                    in_digits = true;
                } else {
                    out.push(c);
                    in_digits = false;
                }
            }
            out
        }
        _ => collapsed,
    };
    let truncated: String = normalized.chars().take(max_len).collect();
    if truncated.is_empty() {
        None
    } else {
        Some(truncated)
    }
}

/// Length-prefixed field so adjacent fields can't alias.
fn feed(hasher: &mut Sha256, field: &str) {
    hasher.update((field.len() as u64).to_le_bytes());
    hasher.update(field.as_bytes());
}

fn feed_widget(hasher: &mut Sha256, w: &WidgetDescriptor) {
    let path = w
        .path
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join("/");
    feed(hasher, &path);
    feed(hasher, &w.class);
    feed(hasher, w.resource_id.as_deref().unwrap_or(""));
    feed(hasher, w.text.as_deref().unwrap_or(""));
    let flags = [
        w.enabled,
        w.clickable,
        w.long_clickable,
        w.scrollable,
        w.editable,
        w.checkable,
    ]
    .iter()
    .fold(0u8, |acc, &f| (acc << 1) | f as u8);
    hasher.update([flags]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_digits_collapses_runs() {
        assert_eq!(
            normalize_text("  12:45   PM ", TextRule::MaskDigits, 64).as_deref(),
            Some("#:# PM")
        );
        assert_eq!(
            normalize_text("3 unread", TextRule::MaskDigits, 64),
            normalize_text("117 unread", TextRule::MaskDigits, 64)
        );
    }

    #[test]
    fn test_exact_keeps_digits() {
        assert_eq!(
            normalize_text("v1.2", TextRule::Exact, 64).as_deref(),
            Some("v1.2")
        );
    }

    #[test]
    fn test_drop_and_empty() {
        assert_eq!(normalize_text("hello", TextRule::Drop, 64), None);
        assert_eq!(normalize_text("   ", TextRule::Exact, 64), None);
    }

    #[test]
    fn test_truncation_counts_chars() {
        assert_eq!(
            normalize_text("héllo wörld", TextRule::Exact, 4).as_deref(),
            Some("héll")
        );
    }
}
