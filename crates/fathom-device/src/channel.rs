//! The device channel: everything the engine needs from a physical or
//! virtual device, behind one async trait.
//!
//! Every method is a suspension point. The core never blocks on a device;
//! callers wrap the channel in [`crate::TimedChannel`] to bound each call.

use async_trait::async_trait;
use fathom_model::{Event, Observation, WidgetIndex};
use fathom_ui::{AppDescriptor, Bounds, RawUiTree};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout {
        operation: &'static str,
        after_ms: u64,
    },

    #[error("Device disconnected: {0}")]
    Disconnected(String),

    #[error("App crashed: {0}")]
    AppCrashed(String),

    /// The device is gone for good; retrying is pointless.
    #[error("Device unavailable: {0}")]
    Unavailable(String),

    #[error("Operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    #[error("Device adapter error: {0}")]
    Adapter(#[from] anyhow::Error),
}

impl DeviceError {
    /// Whether retrying the call can possibly help.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            DeviceError::Unavailable(_) | DeviceError::Unsupported { .. }
        )
    }
}

/// What the device needs to know about a widget to aim at it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetWidget {
    pub index: WidgetIndex,
    pub class: String,
    pub resource_id: Option<String>,
    pub text: Option<String>,
    pub bounds: Option<Bounds>,
}

/// An event resolved against the observation it was chosen in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub event: Event,
    pub target: Option<TargetWidget>,
}

impl DispatchRequest {
    /// Resolve `event` against `observation`. `None` if the event is not
    /// valid in the observed state.
    pub fn resolve(event: &Event, observation: &Observation) -> Option<Self> {
        if !event.is_valid_for(&observation.state) {
            return None;
        }
        let target = match event.target() {
            Some(index) => {
                let widget = observation.state.widget(index)?;
                Some(TargetWidget {
                    index,
                    class: widget.class.clone(),
                    resource_id: widget.resource_id.clone(),
                    text: widget.text.clone(),
                    bounds: observation.layout.bounds(index),
                })
            }
            None => None,
        };
        Some(Self {
            event: event.clone(),
            target,
        })
    }

    /// A target-less request (system keys, rotate, wait, restart).
    pub fn untargeted(event: Event) -> Self {
        Self {
            event,
            target: None,
        }
    }
}

/// Device-side verdict on an injected event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Executed,
    /// The device accepted the call but could not perform the event
    /// (widget vanished, input refused).
    Rejected { reason: String },
}

impl DispatchOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, DispatchOutcome::Executed)
    }
}

/// Encoded screen image. Reporting only; the engine never decides on pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub format: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait DeviceChannel: Send {
    /// Capture the current UI hierarchy.
    async fn snapshot(&mut self) -> Result<RawUiTree, DeviceError>;

    /// Inject one event.
    async fn dispatch(&mut self, request: &DispatchRequest) -> Result<DispatchOutcome, DeviceError>;

    async fn capture(&mut self) -> Result<Screenshot, DeviceError> {
        Err(DeviceError::Unsupported {
            operation: "capture",
        })
    }

    async fn launch_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError>;

    async fn stop_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError>;

    async fn restart_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError> {
        self.stop_app(app).await?;
        self.launch_app(app).await
    }
}

#[async_trait]
impl<D: DeviceChannel + ?Sized> DeviceChannel for Box<D> {
    async fn snapshot(&mut self) -> Result<RawUiTree, DeviceError> {
        (**self).snapshot().await
    }

    async fn dispatch(&mut self, request: &DispatchRequest) -> Result<DispatchOutcome, DeviceError> {
        (**self).dispatch(request).await
    }

    async fn capture(&mut self) -> Result<Screenshot, DeviceError> {
        (**self).capture().await
    }

    async fn launch_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError> {
        (**self).launch_app(app).await
    }

    async fn stop_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError> {
        (**self).stop_app(app).await
    }

    async fn restart_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError> {
        (**self).restart_app(app).await
    }
}
