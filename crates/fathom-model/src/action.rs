use serde::{Deserialize, Serialize};

use crate::event::{Event, SwipeDirection, SystemKey};
use crate::state::State;

/// Which events are derived from a state's widgets.
///
/// The candidate list is what "unexplored actions" is computed against, so
/// changing the action space changes when exploration saturates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionSpace {
    pub tap: bool,
    pub long_press: bool,
    pub swipe_directions: Vec<SwipeDirection>,
    /// Text typed into editable widgets. `None` disables text input.
    pub text_input: Option<String>,
    /// Whole-screen swipes offered in every state after the widget events.
    pub screen_swipes: Vec<SwipeDirection>,
    /// Target-less keys offered in every state after the screen swipes.
    pub system_keys: Vec<SystemKey>,
    pub rotate: bool,
    /// Offer a pause of this many milliseconds as an action.
    pub wait_ms: Option<u64>,
}

impl Default for ActionSpace {
    fn default() -> Self {
        Self {
            tap: true,
            long_press: true,
            swipe_directions: vec![SwipeDirection::Up, SwipeDirection::Down],
            text_input: Some("fathom".to_string()),
            screen_swipes: Vec::new(),
            system_keys: Vec::new(),
            rotate: false,
            wait_ms: None,
        }
    }
}

impl ActionSpace {
    /// Candidate events for `state`: widget events in traversal order, then
    /// screen swipes, system keys, rotate and wait. Only enabled widgets
    /// contribute.
    pub fn candidates(&self, state: &State) -> Vec<Event> {
        let mut events = Vec::new();
        for widget in state.widgets.iter().filter(|w| w.enabled) {
            let index = widget.index;
            if self.tap && (widget.clickable || widget.checkable) {
                events.push(Event::Tap { widget: index });
            }
            if self.long_press && widget.long_clickable {
                events.push(Event::LongPress { widget: index });
            }
            if widget.scrollable {
                for &direction in &self.swipe_directions {
                    events.push(Event::Swipe {
                        direction,
                        widget: Some(index),
                    });
                }
            }
            if widget.editable {
                if let Some(text) = &self.text_input {
                    events.push(Event::TextInput {
                        widget: index,
                        text: text.clone(),
                    });
                }
            }
        }
        for &direction in &self.screen_swipes {
            events.push(Event::Swipe {
                direction,
                widget: None,
            });
        }
        for &key in &self.system_keys {
            events.push(Event::Key { key });
        }
        if self.rotate {
            events.push(Event::Rotate);
        }
        if let Some(millis) = self.wait_ms {
            events.push(Event::Wait { millis });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{StateId, WidgetDescriptor};
    use fathom_ui::Foreground;

    fn widget(index: u32) -> WidgetDescriptor {
        WidgetDescriptor {
            index,
            path: vec![index as u16],
            class: "android.widget.View".into(),
            resource_id: None,
            text: None,
            enabled: true,
            clickable: false,
            long_clickable: false,
            scrollable: false,
            editable: false,
            checkable: false,
        }
    }

    fn state(widgets: Vec<WidgetDescriptor>) -> State {
        State {
            id: StateId::from_hex("00"),
            activity: "A".into(),
            foreground: Foreground::InApp,
            widgets,
        }
    }

    #[test]
    fn test_candidates_follow_widget_order() {
        let mut a = widget(0);
        a.clickable = true;
        a.long_clickable = true;
        let mut b = widget(1);
        b.scrollable = true;
        let mut c = widget(2);
        c.editable = true;
        let s = state(vec![a, b, c]);

        let events = ActionSpace::default().candidates(&s);
        assert_eq!(
            events,
            vec![
                Event::Tap { widget: 0 },
                Event::LongPress { widget: 0 },
                Event::Swipe {
                    direction: SwipeDirection::Up,
                    widget: Some(1)
                },
                Event::Swipe {
                    direction: SwipeDirection::Down,
                    widget: Some(1)
                },
                Event::TextInput {
                    widget: 2,
                    text: "fathom".into()
                },
            ]
        );
        assert!(events.iter().all(|e| e.is_valid_for(&s)));
    }

    #[test]
    fn test_disabled_widgets_contribute_nothing() {
        let mut a = widget(0);
        a.clickable = true;
        a.enabled = false;
        let s = state(vec![a]);
        assert!(ActionSpace::default().candidates(&s).is_empty());
    }

    #[test]
    fn test_system_keys_come_last() {
        let mut a = widget(0);
        a.clickable = true;
        let space = ActionSpace {
            system_keys: vec![SystemKey::Back],
            ..Default::default()
        };
        let events = space.candidates(&state(vec![a]));
        assert_eq!(events.last(), Some(&Event::back()));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_screen_level_events_follow_widgets() {
        let mut a = widget(0);
        a.clickable = true;
        let s = state(vec![a]);
        let space = ActionSpace {
            screen_swipes: vec![SwipeDirection::Left],
            system_keys: vec![SystemKey::Back],
            rotate: true,
            wait_ms: Some(2_000),
            ..Default::default()
        };
        let events = space.candidates(&s);
        assert_eq!(
            events,
            vec![
                Event::Tap { widget: 0 },
                Event::Swipe {
                    direction: SwipeDirection::Left,
                    widget: None
                },
                Event::back(),
                Event::Rotate,
                Event::Wait { millis: 2_000 },
            ]
        );
        assert!(events.iter().all(|e| e.is_valid_for(&s)));

        // Screen-level events make even an empty screen explorable.
        assert_eq!(space.candidates(&state(Vec::new())).len(), 4);
        assert!(ActionSpace::default().candidates(&state(Vec::new())).is_empty());
    }
}
