pub mod channel;
pub mod config;
pub mod simulated;
pub mod timed;

pub use channel::{
    DeviceChannel, DeviceError, DispatchOutcome, DispatchRequest, Screenshot, TargetWidget,
};
pub use config::DeviceConfig;
pub use simulated::{Screen, SimulatedApp, SimulatedDevice, Trigger};
pub use timed::TimedChannel;
