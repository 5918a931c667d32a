pub mod failure;
pub mod history;
pub mod navigate;
pub mod policy;
pub mod random;
pub mod rng;
pub mod scripted;

pub use failure::{FailureResponse, FailureTracker};
pub use history::{History, HistoryStep, StepKind};
pub use navigate::{NavigateConfig, NavigateThenExplore, SearchOrder};
pub use policy::{Decision, InputPolicy, SelectionKind};
pub use random::{RandomConfig, RandomPolicy};
pub use rng::policy_rng;
pub use scripted::{
    Script, ScriptAction, ScriptError, ScriptStep, ScriptedPolicy, StateMatcher, StateTrigger,
    WidgetSelector,
};
