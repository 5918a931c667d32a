//! Consecutive-failure accounting for the exploration loop.
//!
//! A failed iteration is retried with exponential backoff up to the retry
//! bound; once the bound is spent the app is restarted and the retry count
//! starts over. Reaching the consecutive-failure ceiling is fatal. Any
//! successful iteration resets both counters.

/// What the loop should do after a failed iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureResponse {
    Retry { attempt: u32, backoff_ms: u64 },
    RestartApp,
    Fatal { consecutive: u32 },
}

#[derive(Debug, Clone)]
pub struct FailureTracker {
    retry_bound: u32,
    ceiling: u32,
    backoff_ms: u64,
    consecutive: u32,
    attempt: u32,
    total: u64,
}

/// Backoff never grows past this many doublings.
const MAX_BACKOFF_SHIFT: u32 = 10;

impl FailureTracker {
    pub fn new(retry_bound: u32, ceiling: u32, backoff_ms: u64) -> Self {
        Self {
            retry_bound,
            ceiling,
            backoff_ms,
            consecutive: 0,
            attempt: 0,
            total: 0,
        }
    }

    pub fn on_failure(&mut self) -> FailureResponse {
        self.consecutive += 1;
        self.total += 1;

        if self.consecutive >= self.ceiling {
            return FailureResponse::Fatal {
                consecutive: self.consecutive,
            };
        }
        if self.attempt < self.retry_bound {
            let attempt = self.attempt;
            self.attempt += 1;
            let shift = attempt.min(MAX_BACKOFF_SHIFT);
            return FailureResponse::Retry {
                attempt: self.attempt,
                backoff_ms: self.backoff_ms.saturating_mul(1u64 << shift),
            };
        }
        self.attempt = 0;
        FailureResponse::RestartApp
    }

    pub fn on_success(&mut self) {
        self.consecutive = 0;
        self.attempt = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
