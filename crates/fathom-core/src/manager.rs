use std::collections::HashMap;
use std::sync::Arc;

use fathom_device::DeviceChannel;
use fathom_graph::Utg;
use fathom_ui::AppDescriptor;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{ConfigError, SessionConfig};
use crate::limits::{validate_engine_limits, EngineLimits, LimitViolation};
use crate::session::{Session, SessionHandle, SessionOutcome};

#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("Invalid session config: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Limit(#[from] LimitViolation),

    #[error("Unknown session: {0}")]
    UnknownSession(String),

    #[error("Session {id} task failed: {message}")]
    Join { id: String, message: String },
}

struct ManagedSession {
    handle: SessionHandle,
    task: JoinHandle<SessionOutcome>,
}

/// Runs independent sessions, one per device, on the tokio runtime.
pub struct SessionManager {
    limits: EngineLimits,
    sessions: Mutex<HashMap<String, ManagedSession>>,
    next_id: Mutex<u64>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_limits(EngineLimits::default())
    }

    pub fn with_limits(limits: EngineLimits) -> Self {
        Self {
            limits,
            sessions: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    /// Validate the config, then spawn a session on `device`. Returns the
    /// session id. Finished sessions beyond `max_retained_finished` are
    /// dropped oldest first, outcome included.
    pub fn start<D>(
        &self,
        config: SessionConfig,
        app: AppDescriptor,
        device: D,
    ) -> Result<String, ManagerError>
    where
        D: DeviceChannel + 'static,
    {
        let mut sessions = self.sessions.lock();
        self.prune_finished(&mut sessions);
        let running = sessions.values().filter(|s| !s.task.is_finished()).count();
        validate_engine_limits(&self.limits, running)?;

        let id = {
            let mut next = self.next_id.lock();
            let id = format!("session-{:04}", *next);
            *next += 1;
            id
        };

        let (session, handle) = Session::new(id.clone(), config, app, device)?;
        let task = tokio::spawn(session.run());
        info!(session = %id, running = running + 1, "session spawned");
        sessions.insert(id.clone(), ManagedSession { handle, task });
        Ok(id)
    }

    fn prune_finished(&self, sessions: &mut HashMap<String, ManagedSession>) {
        let mut finished: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| s.task.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        let keep = self.limits.max_retained_finished as usize;
        if finished.len() <= keep {
            return;
        }
        // Sequential ids: shorter first, then lexical, is start order.
        finished.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        for id in &finished[..finished.len() - keep] {
            sessions.remove(id);
            warn!(session = %id, "dropping finished session that was never joined");
        }
    }

    pub fn handle(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.lock().get(id).map(|s| s.handle.clone())
    }

    pub fn cancel(&self, id: &str) -> Result<(), ManagerError> {
        let sessions = self.sessions.lock();
        let session = sessions
            .get(id)
            .ok_or_else(|| ManagerError::UnknownSession(id.to_string()))?;
        session.handle.cancel();
        Ok(())
    }

    pub fn cancel_all(&self) {
        for session in self.sessions.lock().values() {
            session.handle.cancel();
        }
    }

    /// Latest published graph of a session.
    pub fn inspect(&self, id: &str) -> Result<Arc<Utg>, ManagerError> {
        self.sessions
            .lock()
            .get(id)
            .map(|s| s.handle.inspect())
            .ok_or_else(|| ManagerError::UnknownSession(id.to_string()))
    }

    pub fn running_count(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|s| !s.task.is_finished())
            .count()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Wait for a session to terminate and take its outcome. The session is
    /// forgotten afterwards.
    pub async fn join(&self, id: &str) -> Result<SessionOutcome, ManagerError> {
        let managed = self
            .sessions
            .lock()
            .remove(id)
            .ok_or_else(|| ManagerError::UnknownSession(id.to_string()))?;
        managed.task.await.map_err(|e| ManagerError::Join {
            id: id.to_string(),
            message: e.to_string(),
        })
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}
