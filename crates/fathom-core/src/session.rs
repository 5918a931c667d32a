//! The exploration loop.
//!
//! One [`Session`] owns one device, one UTG and one policy, and runs a
//! strictly sequential loop: capture, abstract, record, select, dispatch.
//! Device calls are the only suspension points. Control requests (cancel,
//! pause) are honored at iteration boundaries only, and the UTG is published
//! to [`SessionHandle`]s as a whole snapshot at the same boundaries.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fathom_device::{
    DeviceChannel, DeviceError, DispatchOutcome, DispatchRequest, TimedChannel,
};
use fathom_explore::{
    Decision, FailureResponse, FailureTracker, History, InputPolicy, SelectionKind, StepKind,
};
use fathom_graph::{ArtifactError, Utg, UtgArtifact};
use fathom_model::{Abstraction, Event, Observation, State, StateAbstractor, UnknownReason};
use fathom_ui::AppDescriptor;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::analytics::SessionAnalytics;
use crate::config::{ConfigError, SessionConfig};
use crate::limits::{FatalCause, LimitChecker, TerminationReason};

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    Running,
    Paused,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Run,
    Pause,
    Cancel,
}

/// Remote control for a session. Cheap to clone; every clone controls the
/// same session.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    control: Arc<watch::Sender<Control>>,
    phase: watch::Receiver<SessionPhase>,
    snapshot: watch::Receiver<Arc<Utg>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Stop at the next iteration boundary.
    pub fn cancel(&self) {
        self.control.send_replace(Control::Cancel);
    }

    pub fn pause(&self) {
        self.control.send_if_modified(|c| {
            if *c == Control::Run {
                *c = Control::Pause;
                true
            } else {
                false
            }
        });
    }

    pub fn resume(&self) {
        self.control.send_if_modified(|c| {
            if *c == Control::Pause {
                *c = Control::Run;
                true
            } else {
                false
            }
        });
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    /// Wait until the session reaches `phase`. Returns immediately if the
    /// session is already there or has terminated.
    pub async fn wait_for_phase(&self, phase: SessionPhase) -> SessionPhase {
        let mut rx = self.phase.clone();
        loop {
            let current = *rx.borrow_and_update();
            if current == phase || current == SessionPhase::Terminated {
                return current;
            }
            if rx.changed().await.is_err() {
                return *rx.borrow();
            }
        }
    }

    /// The UTG as of the last iteration that added a state or transition.
    /// Observation counters may lag until the session terminates.
    pub fn inspect(&self) -> Arc<Utg> {
        Arc::clone(&self.snapshot.borrow())
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Everything a session leaves behind. Returned for every termination
/// reason, fatal ones included.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub id: String,
    pub utg: Utg,
    pub reason: TerminationReason,
    /// False when the session aborted; the graph is then partial.
    pub complete: bool,
    pub iterations: u64,
    pub analytics: SessionAnalytics,
    pub trace: History,
}

/// The persisted form of a [`SessionOutcome`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionArtifact {
    pub session: String,
    pub reason: TerminationReason,
    pub complete: bool,
    pub iterations: u64,
    pub utg: UtgArtifact,
}

impl SessionArtifact {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn into_utg(self) -> Result<Utg, ArtifactError> {
        Utg::from_artifact(self.utg)
    }
}

impl SessionOutcome {
    pub fn to_artifact(&self) -> SessionArtifact {
        SessionArtifact {
            session: self.id.clone(),
            reason: self.reason.clone(),
            complete: self.complete,
            iterations: self.iterations,
            utg: self.utg.to_artifact(),
        }
    }

    pub fn persist(&self, path: impl AsRef<Path>) -> Result<(), ArtifactError> {
        let json = serde_json::to_string_pretty(&self.to_artifact())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// An event sent to the device whose effect has not been observed yet.
struct Pending {
    from: State,
    event: Event,
    executed: bool,
}

/// A failed iteration.
enum Failure {
    Device {
        operation: &'static str,
        error: DeviceError,
    },
    Unknown(UnknownReason),
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Device { operation, error } => write!(f, "{operation}: {error}"),
            Failure::Unknown(reason) => write!(f, "unknown state: {reason}"),
        }
    }
}

pub struct Session<D> {
    id: String,
    config: SessionConfig,
    app: AppDescriptor,
    device: TimedChannel<D>,
    abstractor: StateAbstractor,
    policy: Box<dyn InputPolicy>,
    utg: Utg,
    history: History,
    failures: FailureTracker,
    analytics: SessionAnalytics,
    iteration: u64,
    /// The graph grew since the last snapshot was published.
    grown: bool,
    control: watch::Receiver<Control>,
    phase: watch::Sender<SessionPhase>,
    snapshot: watch::Sender<Arc<Utg>>,
}

impl<D: DeviceChannel> Session<D> {
    /// Create a session and its first handle, building the policy from the
    /// config.
    pub fn new(
        id: impl Into<String>,
        config: SessionConfig,
        app: AppDescriptor,
        device: D,
    ) -> Result<(Self, SessionHandle), ConfigError> {
        config.validate()?;
        let policy = config.policy.build(config.seed)?;
        Ok(Self::with_policy(id, config, app, device, policy))
    }

    /// Create a session around a caller-supplied policy.
    pub fn with_policy(
        id: impl Into<String>,
        config: SessionConfig,
        app: AppDescriptor,
        device: D,
        policy: Box<dyn InputPolicy>,
    ) -> (Self, SessionHandle) {
        let id = id.into();
        let utg = Utg::new(config.action_space.clone());
        let (control_tx, control_rx) = watch::channel(Control::Run);
        let (phase_tx, phase_rx) = watch::channel(SessionPhase::Idle);
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(utg.clone()));
        let limits = &config.limits;
        let failures = FailureTracker::new(
            limits.max_retries,
            limits.max_consecutive_failures,
            limits.retry_backoff_ms,
        );

        let handle = SessionHandle {
            id: id.clone(),
            control: Arc::new(control_tx),
            phase: phase_rx,
            snapshot: snapshot_rx,
        };
        let session = Self {
            id,
            device: TimedChannel::new(device, config.device.clone()),
            abstractor: StateAbstractor::new(config.abstraction.clone()),
            analytics: SessionAnalytics::new(policy.name()),
            policy,
            utg,
            history: History::new(),
            failures,
            iteration: 0,
            grown: false,
            control: control_rx,
            phase: phase_tx,
            snapshot: snapshot_tx,
            app,
            config,
        };
        (session, handle)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run to termination. Never fails: every exit path yields an outcome
    /// carrying the graph built so far.
    pub async fn run(mut self) -> SessionOutcome {
        let checker = LimitChecker::new(self.config.limits.clone());
        self.phase.send_replace(SessionPhase::Running);
        info!(
            session = %self.id,
            policy = self.policy.name(),
            seed = self.config.seed,
            package = %self.app.package,
            "session started"
        );

        let reason = self.explore(&checker).await;
        self.finish(reason, &checker)
    }

    async fn explore(&mut self, checker: &LimitChecker) -> TerminationReason {
        if let Some(reason) = self.launch().await {
            return reason;
        }

        let mut pending: Option<Pending> = None;
        loop {
            if let Some(reason) = self.at_boundary().await {
                return reason;
            }
            if let Some(reason) = checker.check(self.iteration) {
                return reason;
            }
            self.iteration += 1;

            let done = self.step(&mut pending).await;
            self.publish();
            if let Some(reason) = done {
                return reason;
            }
        }
    }

    /// Launch the app under the same recovery policy as an iteration. Once
    /// retries run out the policy's restart stands in for the launch and the
    /// loop takes over. Launch attempts do not count against the iteration
    /// cap.
    async fn launch(&mut self) -> Option<TerminationReason> {
        for _ in 0..=self.config.limits.max_retries {
            if let Some(reason) = self.at_boundary().await {
                return Some(reason);
            }
            match self.device.launch_app(&self.app).await {
                Ok(()) => {
                    self.failures.on_success();
                    return None;
                }
                Err(error) => {
                    let failure = Failure::Device {
                        operation: "launch_app",
                        error,
                    };
                    if let Some(reason) = self.recover(failure, &mut None).await {
                        return Some(reason);
                    }
                }
            }
        }
        None
    }

    /// Honor control requests. Blocks while paused.
    async fn at_boundary(&mut self) -> Option<TerminationReason> {
        loop {
            let control = *self.control.borrow_and_update();
            match control {
                Control::Run => {
                    if *self.phase.borrow() == SessionPhase::Paused {
                        info!(session = %self.id, iteration = self.iteration, "session resumed");
                        self.phase.send_replace(SessionPhase::Running);
                    }
                    return None;
                }
                Control::Cancel => return Some(TerminationReason::Cancelled),
                Control::Pause => {
                    if *self.phase.borrow() != SessionPhase::Paused {
                        info!(session = %self.id, iteration = self.iteration, "session paused");
                        self.phase.send_replace(SessionPhase::Paused);
                    }
                    // Every handle is gone: nobody can resume us.
                    if self.control.changed().await.is_err() {
                        return Some(TerminationReason::Cancelled);
                    }
                }
            }
        }
    }

    /// One iteration. `Some` when the session must stop.
    async fn step(&mut self, pending: &mut Option<Pending>) -> Option<TerminationReason> {
        // ── Capture ─────────────────────────────────────────────────
        let observation = match self.capture().await {
            Ok(observation) => observation,
            Err(failure) => return self.recover(failure, pending).await,
        };

        // ── Record ──────────────────────────────────────────────────
        let state = &observation.state;
        let (new_state, grown) = match pending.take() {
            Some(p) => {
                let outcome = self.utg.record(&p.from, &p.event, state, p.executed);
                (
                    outcome.new_target,
                    outcome.new_source || outcome.new_target || outcome.new_transition,
                )
            }
            None => {
                let new_state = self.utg.visit(state);
                (new_state, new_state)
            }
        };
        self.history.record(
            self.iteration,
            StepKind::Observed {
                state: state.id.clone(),
                new_state,
            },
        );
        // Coverage only moves when a state or transition appears.
        if grown {
            self.analytics.record_coverage(self.iteration, &self.utg.stats());
            self.grown = true;
        }
        debug!(
            session = %self.id,
            iteration = self.iteration,
            state = %state.id.short(),
            activity = %state.activity,
            new_state,
            "observed"
        );

        // ── Select ──────────────────────────────────────────────────
        let (event, kind) = match self.policy.select(state, &self.utg, &self.history) {
            Decision::Event { event, kind } => (event, kind),
            Decision::Saturated => return Some(TerminationReason::Saturated),
            Decision::Stuck => {
                warn!(session = %self.id, state = %state.id.short(), "dead end, restarting app");
                self.analytics.stuck += 1;
                (Event::RestartApp, SelectionKind::Recovery)
            }
        };
        self.analytics.record_decision(kind);

        // ── Dispatch ────────────────────────────────────────────────
        match self.dispatch(&observation, &event).await {
            Ok(executed) => {
                self.history.record(
                    self.iteration,
                    StepKind::Dispatched {
                        state: observation.state.id.clone(),
                        event: event.clone(),
                        selection: kind,
                        executed,
                    },
                );
                *pending = Some(Pending {
                    from: observation.state,
                    event,
                    executed,
                });
                self.failures.on_success();
                None
            }
            Err(failure) => self.recover(failure, pending).await,
        }
    }

    async fn capture(&mut self) -> Result<Observation, Failure> {
        let tree = self
            .device
            .snapshot()
            .await
            .map_err(|error| Failure::Device {
                operation: "snapshot",
                error,
            })?;
        match self.abstractor.abstract_tree(&tree, &self.app) {
            Abstraction::Known(observation) => Ok(observation),
            Abstraction::Unknown(reason) => Err(Failure::Unknown(reason)),
        }
    }

    /// Send `event`; `Ok(false)` when the device refused it.
    async fn dispatch(&mut self, observation: &Observation, event: &Event) -> Result<bool, Failure> {
        if *event == Event::RestartApp {
            self.device
                .restart_app(&self.app)
                .await
                .map_err(|error| Failure::Device {
                    operation: "restart_app",
                    error,
                })?;
            self.analytics.restarts += 1;
            return Ok(true);
        }

        let Some(request) = DispatchRequest::resolve(event, observation) else {
            warn!(session = %self.id, %event, "selected event is not valid in the observed state");
            self.analytics.rejected_events += 1;
            return Ok(false);
        };
        let outcome = self
            .device
            .dispatch(&request)
            .await
            .map_err(|error| Failure::Device {
                operation: "dispatch",
                error,
            })?;
        match outcome {
            DispatchOutcome::Executed => Ok(true),
            DispatchOutcome::Rejected { reason } => {
                debug!(session = %self.id, %event, %reason, "event rejected by device");
                self.analytics.rejected_events += 1;
                Ok(false)
            }
        }
    }

    /// Apply the recovery policy to a failed iteration. `Some` when the
    /// session must abort.
    async fn recover(
        &mut self,
        failure: Failure,
        pending: &mut Option<Pending>,
    ) -> Option<TerminationReason> {
        let message = failure.to_string();
        match &failure {
            Failure::Device { error, .. } if error.is_permanent() => {
                error!(session = %self.id, iteration = self.iteration, %message, "device unavailable");
                return Some(TerminationReason::Fatal(FatalCause::DeviceUnavailable {
                    message,
                }));
            }
            Failure::Device { operation, .. } => {
                self.analytics.device_failures += 1;
                self.history.record(
                    self.iteration,
                    StepKind::DeviceFailure {
                        operation: operation.to_string(),
                        message: message.clone(),
                        consecutive: self.failures.consecutive() + 1,
                    },
                );
            }
            Failure::Unknown(reason) => {
                self.analytics.unknown_states += 1;
                self.history.record(
                    self.iteration,
                    StepKind::Unknown {
                        reason: reason.to_string(),
                    },
                );
            }
        }

        match self.failures.on_failure() {
            FailureResponse::Fatal { consecutive } => {
                error!(
                    session = %self.id,
                    iteration = self.iteration,
                    consecutive,
                    %message,
                    "consecutive-failure ceiling reached"
                );
                Some(TerminationReason::Fatal(FatalCause::ConsecutiveFailures {
                    count: consecutive,
                    last_error: message,
                }))
            }
            FailureResponse::Retry {
                attempt,
                backoff_ms,
            } => {
                warn!(session = %self.id, iteration = self.iteration, attempt, backoff_ms, %message, "retrying");
                self.analytics.retries += 1;
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                None
            }
            FailureResponse::RestartApp => {
                warn!(session = %self.id, iteration = self.iteration, %message, "retries exhausted, restarting app");
                // The pending event's effect is lost with the restart.
                *pending = None;
                match self.device.restart_app(&self.app).await {
                    Ok(()) => {
                        self.analytics.restarts += 1;
                        self.history.record(
                            self.iteration,
                            StepKind::Restarted {
                                reason: message,
                            },
                        );
                        None
                    }
                    Err(error) if error.is_permanent() => {
                        Some(TerminationReason::Fatal(FatalCause::DeviceUnavailable {
                            message: error.to_string(),
                        }))
                    }
                    Err(error) => {
                        warn!(session = %self.id, %error, "restart failed");
                        None
                    }
                }
            }
        }
    }

    /// Refresh the inspectable snapshot if the graph grew.
    fn publish(&mut self) {
        if std::mem::take(&mut self.grown) {
            self.snapshot.send_replace(Arc::new(self.utg.clone()));
        }
    }

    fn finish(mut self, reason: TerminationReason, checker: &LimitChecker) -> SessionOutcome {
        self.analytics.iterations = self.iteration;
        self.analytics.elapsed_ms = checker.elapsed_ms();
        self.snapshot.send_replace(Arc::new(self.utg.clone()));
        self.phase.send_replace(SessionPhase::Terminated);

        let complete = !reason.is_fatal();
        if complete {
            info!(
                session = %self.id,
                ?reason,
                iterations = self.iteration,
                states = self.utg.state_count(),
                transitions = self.utg.transition_count(),
                "session finished"
            );
        } else {
            error!(
                session = %self.id,
                ?reason,
                iterations = self.iteration,
                states = self.utg.state_count(),
                "session aborted; graph is partial"
            );
        }

        SessionOutcome {
            id: self.id,
            utg: self.utg,
            reason,
            complete,
            iterations: self.iteration,
            analytics: self.analytics,
            trace: self.history,
        }
    }
}
