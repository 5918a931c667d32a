pub mod app;
pub mod parse;
pub mod snapshot;

pub use app::{AppDescriptor, ComponentId, Foreground, Permission};
pub use parse::{load_descriptor, parse_snapshot, ParseError};
pub use snapshot::{Bounds, RawNode, RawUiTree};
