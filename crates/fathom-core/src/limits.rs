//! Resource limits and termination reasons.
//!
//! Provides configurable caps on iterations and wall-clock time for one
//! session, plus the failure bounds of the recovery policy. Hitting a cap is
//! a normal termination, reported separately from saturation and from fatal
//! failures.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Limits for a single exploration session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationLimits {
    /// Maximum loop iterations, failed ones included.
    pub max_iterations: u64,
    /// Maximum wall-clock milliseconds before forced stop.
    pub max_wall_clock_ms: u64,
    /// Retries of a failed iteration before the app is restarted.
    pub max_retries: u32,
    /// Backoff before retry `n` is `retry_backoff_ms * 2^n`.
    pub retry_backoff_ms: u64,
    /// Consecutive failed iterations that abort the session.
    pub max_consecutive_failures: u32,
}

impl Default for ExplorationLimits {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            max_wall_clock_ms: 30 * 60 * 1_000, // 30 minutes
            max_retries: 3,
            retry_backoff_ms: 500,
            max_consecutive_failures: 10,
        }
    }
}

/// Global engine limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Maximum sessions running at once (one per device).
    pub max_concurrent_sessions: u32,
    /// Finished sessions kept for `join` before the oldest are dropped.
    pub max_retained_finished: u32,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: 8,
            max_retained_finished: 32,
        }
    }
}

/// Why a fatal termination happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalCause {
    ConsecutiveFailures { count: u32, last_error: String },
    DeviceUnavailable { message: String },
}

/// Reason a session stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// No state has an unexplored event left.
    Saturated,
    IterationLimit,
    WallClockLimit,
    /// Operator-requested stop.
    Cancelled,
    Fatal(FatalCause),
}

impl TerminationReason {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TerminationReason::Fatal(_))
    }

    /// Stopped by an iteration or time cap.
    pub fn is_resource_bound(&self) -> bool {
        matches!(
            self,
            TerminationReason::IterationLimit | TerminationReason::WallClockLimit
        )
    }
}

/// Checks a running session against its limits. Runs on tokio's clock so
/// that paused-time tests see virtual time.
pub struct LimitChecker {
    limits: ExplorationLimits,
    start_time: Instant,
}

impl LimitChecker {
    pub fn new(limits: ExplorationLimits) -> Self {
        Self {
            limits,
            start_time: Instant::now(),
        }
    }

    /// `None` if the session may run another iteration.
    pub fn check(&self, iterations: u64) -> Option<TerminationReason> {
        if self.wall_clock_exceeded() {
            return Some(TerminationReason::WallClockLimit);
        }
        if iterations >= self.limits.max_iterations {
            return Some(TerminationReason::IterationLimit);
        }
        None
    }

    pub fn wall_clock_exceeded(&self) -> bool {
        self.start_time.elapsed() >= Duration::from_millis(self.limits.max_wall_clock_ms)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn limits(&self) -> &ExplorationLimits {
        &self.limits
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitViolation {
    #[error("Too many concurrent sessions ({current}/{max})")]
    TooManySessions { current: u32, max: u32 },
}

/// Validate engine-level limits before accepting a new session.
pub fn validate_engine_limits(
    engine_limits: &EngineLimits,
    running_sessions: usize,
) -> Result<(), LimitViolation> {
    if running_sessions as u32 >= engine_limits.max_concurrent_sessions {
        return Err(LimitViolation::TooManySessions {
            current: running_sessions as u32,
            max: engine_limits.max_concurrent_sessions,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = ExplorationLimits::default();
        assert_eq!(limits.max_iterations, 1_000);
        assert_eq!(limits.max_retries, 3);
        assert_eq!(limits.max_consecutive_failures, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_iteration_limit() {
        let checker = LimitChecker::new(ExplorationLimits {
            max_iterations: 100,
            ..Default::default()
        });
        assert!(checker.check(99).is_none());
        assert_eq!(checker.check(100), Some(TerminationReason::IterationLimit));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wall_clock_wins_over_iterations() {
        let checker = LimitChecker::new(ExplorationLimits {
            max_iterations: 10,
            max_wall_clock_ms: 1_000,
            ..Default::default()
        });
        tokio::time::advance(Duration::from_millis(1_000)).await;
        assert_eq!(checker.check(10), Some(TerminationReason::WallClockLimit));
        assert!(checker.elapsed_ms() >= 1_000);
    }

    #[test]
    fn test_engine_limits_validation() {
        let engine = EngineLimits {
            max_concurrent_sessions: 2,
            ..Default::default()
        };
        assert!(validate_engine_limits(&engine, 1).is_ok());
        let err = validate_engine_limits(&engine, 2).unwrap_err();
        assert_eq!(err, LimitViolation::TooManySessions { current: 2, max: 2 });
        assert!(err.to_string().contains("2/2"));
    }

    #[test]
    fn test_reason_classification() {
        assert!(TerminationReason::IterationLimit.is_resource_bound());
        assert!(!TerminationReason::Saturated.is_resource_bound());
        let fatal = TerminationReason::Fatal(FatalCause::DeviceUnavailable {
            message: "gone".into(),
        });
        assert!(fatal.is_fatal());
        let json = serde_json::to_string(&fatal).unwrap();
        assert!(json.contains("device_unavailable"));
    }
}
