//! Device channel configuration: per-call timeouts and UI settle time.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Budget for one hierarchy capture.
    pub snapshot_timeout_ms: u64,
    /// Budget for one event injection.
    pub dispatch_timeout_ms: u64,
    /// Budget for launch/stop/restart of the app.
    pub lifecycle_timeout_ms: u64,
    /// Pause after a dispatched event so the UI can settle before the next capture.
    pub settle_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            snapshot_timeout_ms: 10_000,
            dispatch_timeout_ms: 5_000,
            lifecycle_timeout_ms: 30_000,
            settle_ms: 500,
        }
    }
}
