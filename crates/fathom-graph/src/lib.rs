pub mod artifact;
pub mod stats;
pub mod utg;

pub use artifact::{ArtifactError, EdgeRecord, NodeRecord, UtgArtifact, ARTIFACT_FORMAT_VERSION};
pub use stats::{ActivityCoverage, UtgStats};
pub use utg::{RecordOutcome, StateNode, Transition, Utg};
