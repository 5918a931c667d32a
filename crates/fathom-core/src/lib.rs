pub mod analytics;
pub mod config;
pub mod limits;
pub mod manager;
pub mod session;

pub use analytics::{AnalyticsSummary, CoveragePoint, SessionAnalytics};
pub use config::{ConfigError, PolicyConfig, SessionConfig};
pub use limits::{
    validate_engine_limits, EngineLimits, ExplorationLimits, FatalCause, LimitChecker,
    LimitViolation, TerminationReason,
};
pub use manager::{ManagerError, SessionManager};
pub use session::{Session, SessionArtifact, SessionHandle, SessionOutcome, SessionPhase};
