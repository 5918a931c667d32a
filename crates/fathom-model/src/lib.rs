pub mod abstraction;
pub mod action;
pub mod event;
pub mod state;

pub use abstraction::{
    Abstraction, AbstractionConfig, Layout, Observation, StateAbstractor, TextRule, UnknownReason,
};
pub use action::ActionSpace;
pub use event::{Event, SwipeDirection, SystemKey, WidgetIndex};
pub use state::{State, StateId, WidgetDescriptor};
