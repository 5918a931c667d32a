use std::fmt;

use fathom_ui::Foreground;
use serde::{Deserialize, Serialize};

use crate::event::WidgetIndex;

/// Stable identifier of an abstract state: a hex digest over the canonical
/// widget list, foreground activity and foreground position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        StateId(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for logs. Ids loaded from artifacts are not
    /// guaranteed to be hex, so the cut lands on a char boundary.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalized view of one widget. Only semantic attributes live here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WidgetDescriptor {
    pub index: WidgetIndex,
    /// Child-index chain from the root, bounded by the traversal depth.
    pub path: Vec<u16>,
    pub class: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub enabled: bool,
    pub clickable: bool,
    pub long_clickable: bool,
    pub scrollable: bool,
    pub editable: bool,
    pub checkable: bool,
}

impl WidgetDescriptor {
    /// Whether any gesture can be aimed at this widget.
    pub fn is_actionable(&self) -> bool {
        self.enabled
            && (self.clickable
                || self.long_clickable
                || self.scrollable
                || self.editable
                || self.checkable)
    }

    /// Short class name (`android.widget.Button` -> `Button`).
    pub fn short_class(&self) -> &str {
        self.class.rsplit('.').next().unwrap_or(&self.class)
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }
}

/// Canonical, comparable abstraction of one UI snapshot.
///
/// Created once per distinct id and never mutated afterwards; visit counters
/// live in the graph, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    pub activity: String,
    pub foreground: Foreground,
    pub widgets: Vec<WidgetDescriptor>,
}

impl State {
    pub fn widget(&self, index: WidgetIndex) -> Option<&WidgetDescriptor> {
        self.widgets.get(index as usize)
    }

    pub fn is_in_app(&self) -> bool {
        self.foreground == Foreground::InApp
    }

    pub fn actionable_widgets(&self) -> impl Iterator<Item = &WidgetDescriptor> {
        self.widgets.iter().filter(|w| w.is_actionable())
    }

    /// Lowercased visible label of a widget, used for preferred-label ranking.
    pub fn label_of(&self, index: WidgetIndex) -> Option<String> {
        self.widget(index)
            .and_then(|w| w.text.as_deref())
            .map(|t| t.trim().to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_respects_char_boundaries() {
        assert_eq!(StateId::from_hex("0123456789abcdef").short(), "01234567");
        assert_eq!(StateId::from_hex("abc").short(), "abc");
        assert_eq!(StateId::from_hex("aéééééééééé").short(), "aééééééé");
        assert_eq!(StateId::from_hex("状态状态状态状态状态").short(), "状态状态状态状态");
    }
}
