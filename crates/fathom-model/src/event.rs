use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::State;

/// Position of a widget in a state's traversal order.
pub type WidgetIndex = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemKey {
    Back,
    Home,
    Menu,
}

/// A synthesizable input action.
///
/// Widget-targeted variants address a widget by its index in the owning
/// state's widget list, so an event only means something relative to a state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Tap {
        widget: WidgetIndex,
    },
    LongPress {
        widget: WidgetIndex,
    },
    /// Swipe over a widget, or over the whole screen when `widget` is `None`.
    Swipe {
        direction: SwipeDirection,
        widget: Option<WidgetIndex>,
    },
    TextInput {
        widget: WidgetIndex,
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

impl Event {
    pub fn tap(widget: WidgetIndex) -> Self {
        Event::Tap { widget }
    }

    pub fn back() -> Self {
        Event::Key {
            key: SystemKey::Back,
        }
    }

    /// The widget this event addresses, if any.
    pub fn target(&self) -> Option<WidgetIndex> {
        match self {
            Event::Tap { widget }
            | Event::LongPress { widget }
            | Event::TextInput { widget, .. } => Some(*widget),
            Event::Swipe { widget, .. } => *widget,
            Event::Key { .. } | Event::Rotate | Event::RestartApp | Event::Wait { .. } => None,
        }
    }

    /// Whether the event can be issued in `state`: a target must exist, be
    /// enabled and support the gesture. Target-less events are always valid.
    pub fn is_valid_for(&self, state: &State) -> bool {
        let Some(index) = self.target() else {
            return true;
        };
        let Some(widget) = state.widget(index) else {
            return false;
        };
        if !widget.enabled {
            return false;
        }
        match self {
            Event::Tap { .. } => widget.clickable || widget.checkable,
            Event::LongPress { .. } => widget.long_clickable,
            Event::Swipe { .. } => widget.scrollable,
            Event::TextInput { .. } => widget.editable,
            _ => true,
        }
    }

    /// Ordering key for tie-breaks: lowest widget index first, target-less
    /// events after every widget event.
    pub fn rank(&self) -> (WidgetIndex, u8) {
        let variant = match self {
            Event::Tap { .. } => 0,
            Event::LongPress { .. } => 1,
            Event::Swipe { .. } => 2,
            Event::TextInput { .. } => 3,
            Event::Key { .. } => 4,
            Event::Rotate => 5,
            Event::Wait { .. } => 6,
            Event::RestartApp => 7,
        };
        (self.target().unwrap_or(WidgetIndex::MAX), variant)
    }
}

impl fmt::Display for SwipeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwipeDirection::Up => "up",
            SwipeDirection::Down => "down",
            SwipeDirection::Left => "left",
            SwipeDirection::Right => "right",
        };
        f.write_str(s)
    }
}

impl fmt::Display for SystemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SystemKey::Back => "back",
            SystemKey::Home => "home",
            SystemKey::Menu => "menu",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Tap { widget } => write!(f, "tap(#{widget})"),
            Event::LongPress { widget } => write!(f, "long-press(#{widget})"),
            Event::Swipe {
                direction,
                widget: Some(widget),
            } => write!(f, "swipe({direction},#{widget})"),
            Event::Swipe {
                direction,
                widget: None,
            } => write!(f, "swipe({direction},screen)"),
            Event::TextInput { widget, text } => write!(f, "text-input(#{widget},{text:?})"),
            Event::Key { key } => write!(f, "key({key})"),
            Event::Rotate => f.write_str("rotate"),
            Event::RestartApp => f.write_str("restart-app"),
            Event::Wait { millis } => write!(f, "wait({millis}ms)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_descriptors() {
        assert_eq!(Event::tap(3).to_string(), "tap(#3)");
        assert_eq!(Event::back().to_string(), "key(back)");
        assert_eq!(
            Event::Swipe {
                direction: SwipeDirection::Up,
                widget: None
            }
            .to_string(),
            "swipe(up,screen)"
        );
        assert_eq!(
            Event::TextInput {
                widget: 2,
                text: "hi".into()
            }
            .to_string(),
            "text-input(#2,\"hi\")"
        );
    }

    #[test]
    fn test_rank_orders_by_widget_then_variant() {
        let mut events = vec![
            Event::back(),
            Event::LongPress { widget: 1 },
            Event::tap(4),
            Event::tap(1),
        ];
        events.sort_by_key(Event::rank);
        assert_eq!(
            events,
            vec![
                Event::tap(1),
                Event::LongPress { widget: 1 },
                Event::tap(4),
                Event::back()
            ]
        );
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_string(&Event::tap(7)).unwrap();
        assert_eq!(json, r#"{"kind":"tap","widget":7}"#);
        let back: Event = serde_json::from_str(r#"{"kind":"key","key":"back"}"#).unwrap();
        assert_eq!(back, Event::back());
    }
}
