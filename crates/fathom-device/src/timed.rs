use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fathom_ui::{AppDescriptor, RawUiTree};

use crate::channel::{DeviceChannel, DeviceError, DispatchOutcome, DispatchRequest, Screenshot};
use crate::config::DeviceConfig;

/// Wraps a channel so every call carries a timeout; an elapsed timeout comes
/// back as [`DeviceError::Timeout`], never as a hang.
pub struct TimedChannel<D> {
    inner: D,
    config: DeviceConfig,
}

impl<D: DeviceChannel> TimedChannel<D> {
    pub fn new(inner: D, config: DeviceConfig) -> Self {
        Self { inner, config }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut D {
        &mut self.inner
    }

    pub fn into_inner(self) -> D {
        self.inner
    }
}

async fn bounded<T, F>(operation: &'static str, after_ms: u64, fut: F) -> Result<T, DeviceError>
where
    F: Future<Output = Result<T, DeviceError>>,
{
    match tokio::time::timeout(Duration::from_millis(after_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(DeviceError::Timeout {
            operation,
            after_ms,
        }),
    }
}

#[async_trait]
impl<D: DeviceChannel> DeviceChannel for TimedChannel<D> {
    async fn snapshot(&mut self) -> Result<RawUiTree, DeviceError> {
        let after = self.config.snapshot_timeout_ms;
        bounded("snapshot", after, self.inner.snapshot()).await
    }

    async fn dispatch(&mut self, request: &DispatchRequest) -> Result<DispatchOutcome, DeviceError> {
        let after = self.config.dispatch_timeout_ms;
        let outcome = bounded("dispatch", after, self.inner.dispatch(request)).await?;
        if self.config.settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        }
        Ok(outcome)
    }

    async fn capture(&mut self) -> Result<Screenshot, DeviceError> {
        let after = self.config.snapshot_timeout_ms;
        bounded("capture", after, self.inner.capture()).await
    }

    async fn launch_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError> {
        let after = self.config.lifecycle_timeout_ms;
        bounded("launch_app", after, self.inner.launch_app(app)).await
    }

    async fn stop_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError> {
        let after = self.config.lifecycle_timeout_ms;
        bounded("stop_app", after, self.inner.stop_app(app)).await
    }

    async fn restart_app(&mut self, app: &AppDescriptor) -> Result<(), DeviceError> {
        let after = self.config.lifecycle_timeout_ms;
        bounded("restart_app", after, self.inner.restart_app(app)).await
    }
}
