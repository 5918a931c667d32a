//! A scripted device: a small in-memory app model that answers snapshots
//! and reacts to dispatched events, with failure injection.
//!
//! Used to drive sessions without hardware and to make runs reproducible.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use fathom_model::{Event, SwipeDirection, SystemKey};
use fathom_ui::{AppDescriptor, RawNode, RawUiTree};

use crate::channel::{DeviceChannel, DeviceError, DispatchOutcome, DispatchRequest};

const LAUNCHER_ACTIVITY: &str = "com.android.launcher3.Launcher";
const LAUNCHER_PACKAGE: &str = "com.android.launcher3";

/// One screen of the simulated app.
#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub activity: String,
    /// Package owning the window; `None` means the app under test.
    pub package: Option<String>,
    pub root: RawNode,
}

impl Screen {
    pub fn new(activity: &str, root: RawNode) -> Self {
        Self {
            activity: activity.to_string(),
            package: None,
            root,
        }
    }

    /// A screen owned by another app (browser, settings, ...).
    pub fn foreign(package: &str, activity: &str, root: RawNode) -> Self {
        Self {
            activity: activity.to_string(),
            package: Some(package.to_string()),
            root,
        }
    }

    fn has_widget(&self, resource_id: &str) -> bool {
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.resource_id.as_deref() == Some(resource_id) {
                return true;
            }
            stack.extend(node.children.iter());
        }
        false
    }
}

/// What moves the simulated app from one screen to another.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Trigger {
    Tap(String),
    LongPress(String),
    Swipe(String, SwipeDirection),
    SwipeScreen(SwipeDirection),
    Text(String),
    Key(SystemKey),
    Rotate,
}

/// Screens plus the transition table between them.
#[derive(Debug, Clone)]
pub struct SimulatedApp {
    pub descriptor: AppDescriptor,
    home: String,
    screens: BTreeMap<String, Screen>,
    links: HashMap<(String, Trigger), String>,
}

impl SimulatedApp {
    pub fn new(descriptor: AppDescriptor, home: &str, screen: Screen) -> Self {
        let mut screens = BTreeMap::new();
        screens.insert(home.to_string(), screen);
        Self {
            descriptor,
            home: home.to_string(),
            screens,
            links: HashMap::new(),
        }
    }

    pub fn screen(mut self, name: &str, screen: Screen) -> Self {
        self.screens.insert(name.to_string(), screen);
        self
    }

    pub fn link(mut self, from: &str, trigger: Trigger, to: &str) -> Self {
        self.links
            .insert((from.to_string(), trigger), to.to_string());
        self
    }

    fn get(&self, name: &str) -> Option<&Screen> {
        self.screens.get(name)
    }
}

#[derive(Debug, Clone, Default)]
struct Faults {
    /// Calls allowed before every call fails.
    fail_all_after: Option<u64>,
    failing_snapshots: u32,
    malformed_snapshots: u32,
    hanging_snapshots: u32,
    failing_dispatches: u32,
    failing_launches: u32,
    unavailable: bool,
}

/// Device channel backed by a [`SimulatedApp`].
#[derive(Debug, Clone)]
pub struct SimulatedDevice {
    app: SimulatedApp,
    /// Screen names, bottom first. Empty when the app is not running.
    stack: Vec<String>,
    /// Home key pressed: the launcher sits on top of a live app.
    backgrounded: bool,
    calls: u64,
    faults: Faults,
    dispatched: Vec<Event>,
    launches: u32,
}

impl SimulatedDevice {
    pub fn new(app: SimulatedApp) -> Self {
        Self {
            app,
            stack: Vec::new(),
            backgrounded: false,
            calls: 0,
            faults: Faults::default(),
            dispatched: Vec::new(),
            launches: 0,
        }
    }

    // ── Failure injection ────────────────────────────────────────────

    /// Let `calls` calls succeed, then fail every call with a disconnect.
    pub fn fail_all_after(mut self, calls: u64) -> Self {
        self.faults.fail_all_after = Some(calls);
        self
    }

    pub fn fail_next_snapshots(&mut self, n: u32) {
        self.faults.failing_snapshots = n;
    }

    /// Next `n` snapshots come back without a root.
    pub fn malformed_next_snapshots(&mut self, n: u32) {
        self.faults.malformed_snapshots = n;
    }

    /// Next `n` snapshots never answer (until a timeout cancels them).
    pub fn hang_next_snapshots(&mut self, n: u32) {
        self.faults.hanging_snapshots = n;
    }

    pub fn fail_next_dispatches(&mut self, n: u32) {
        self.faults.failing_dispatches = n;
    }

    pub fn fail_next_launches(&mut self, n: u32) {
        self.faults.failing_launches = n;
    }

    pub fn make_unavailable(&mut self) {
        self.faults.unavailable = true;
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn dispatched(&self) -> &[Event] {
        &self.dispatched
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub fn launches(&self) -> u32 {
        self.launches
    }

    pub fn current_screen(&self) -> Option<&str> {
        if self.backgrounded {
            return None;
        }
        self.stack.last().map(String::as_str)
    }

    fn begin_call(&mut self) -> Result<(), DeviceError> {
        self.calls += 1;
        if self.faults.unavailable {
            return Err(DeviceError::Unavailable("simulated device removed".into()));
        }
        if let Some(limit) = self.faults.fail_all_after {
            if self.calls > limit {
                return Err(DeviceError::Disconnected(format!(
                    "simulated disconnect on call {}",
                    self.calls
                )));
            }
        }
        Ok(())
    }

    fn activity_of(&self, name: &str) -> String {
        self.app
            .get(name)
            .map(|s| s.activity.clone())
            .unwrap_or_else(|| name.to_string())
    }

    fn build_tree(&self) -> RawUiTree {
        let mut activity_stack: Vec<String> =
            self.stack.iter().rev().map(|n| self.activity_of(n)).collect();

        let top = if self.backgrounded {
            None
        } else {
            self.stack.last().and_then(|n| self.app.get(n))
        };

        match top {
            Some(screen) => RawUiTree {
                foreground_activity: Some(screen.activity.clone()),
                foreground_package: Some(
                    screen
                        .package
                        .clone()
                        .unwrap_or_else(|| self.app.descriptor.package.clone()),
                ),
                activity_stack,
                captured_at_ms: Some(self.calls * 1_000),
                root: Some(screen.root.clone()),
            },
            None => {
                activity_stack.insert(0, LAUNCHER_ACTIVITY.to_string());
                RawUiTree {
                    foreground_activity: Some(LAUNCHER_ACTIVITY.to_string()),
                    foreground_package: Some(LAUNCHER_PACKAGE.to_string()),
                    activity_stack,
                    captured_at_ms: Some(self.calls * 1_000),
                    root: Some(RawNode::new("android.widget.FrameLayout")),
                }
            }
        }
    }

    fn follow(&mut self, trigger: Trigger) -> bool {
        let Some(current) = self.stack.last().cloned() else {
            return false;
        };
        match self.app.links.get(&(current, trigger)).cloned() {
            Some(next) => {
                self.stack.push(next);
                true
            }
            None => false,
        }
    }

    fn apply(&mut self, request: &DispatchRequest) -> DispatchOutcome {
        let running = !self.stack.is_empty() && !self.backgrounded;
        let widget_id = || {
            request
                .target
                .as_ref()
                .and_then(|t| t.resource_id.clone())
        };

        let trigger = match &request.event {
            Event::RestartApp => {
                self.restart();
                return DispatchOutcome::Executed;
            }
            Event::Wait { .. } => return DispatchOutcome::Executed,
            Event::Key {
                key: SystemKey::Home,
            } => {
                if !self.stack.is_empty() {
                    self.backgrounded = true;
                }
                return DispatchOutcome::Executed;
            }
            Event::Key {
                key: SystemKey::Back,
            } => {
                if running && !self.follow(Trigger::Key(SystemKey::Back)) {
                    self.stack.pop();
                }
                return DispatchOutcome::Executed;
            }
            Event::Key { key } => Trigger::Key(*key),
            Event::Rotate => Trigger::Rotate,
            Event::Swipe {
                direction,
                widget: None,
            } => Trigger::SwipeScreen(*direction),
            Event::Tap { .. }
            | Event::LongPress { .. }
            | Event::TextInput { .. }
            | Event::Swipe { .. } => {
                let Some(id) = widget_id() else {
                    return DispatchOutcome::Rejected {
                        reason: "target has no resource id".into(),
                    };
                };
                let on_screen = self
                    .current_screen()
                    .and_then(|name| self.app.get(name))
                    .is_some_and(|screen| screen.has_widget(&id));
                if !on_screen {
                    return DispatchOutcome::Rejected {
                        reason: format!("widget {id} is not on screen"),
                    };
                }
                match widget_trigger(&request.event, id) {
                    Some(trigger) => trigger,
                    None => {
                        return DispatchOutcome::Rejected {
                            reason: "event does not target a widget".into(),
                        }
                    }
                }
            }
        };

        if running {
            self.follow(trigger);
        }
        DispatchOutcome::Executed
    }

    fn launch(&mut self) {
        self.launches += 1;
        self.backgrounded = false;
        if self.stack.is_empty() {
            self.stack.push(self.app.home.clone());
        }
    }

    fn restart(&mut self) {
        self.stack.clear();
        self.launch();
    }
}

fn widget_trigger(event: &Event, id: String) -> Option<Trigger> {
    match event {
        Event::Tap { .. } => Some(Trigger::Tap(id)),
        Event::LongPress { .. } => Some(Trigger::LongPress(id)),
        Event::TextInput { .. } => Some(Trigger::Text(id)),
        Event::Swipe { direction, .. } => Some(Trigger::Swipe(id, *direction)),
        _ => None,
    }
}

#[async_trait]
impl DeviceChannel for SimulatedDevice {
    async fn snapshot(&mut self) -> Result<RawUiTree, DeviceError> {
        self.begin_call()?;
        if self.faults.hanging_snapshots > 0 {
            self.faults.hanging_snapshots -= 1;
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        if self.faults.failing_snapshots > 0 {
            self.faults.failing_snapshots -= 1;
            return Err(DeviceError::Disconnected("simulated snapshot failure".into()));
        }
        let mut tree = self.build_tree();
        if self.faults.malformed_snapshots > 0 {
            self.faults.malformed_snapshots -= 1;
            tree.root = None;
        }
        Ok(tree)
    }

    async fn dispatch(&mut self, request: &DispatchRequest) -> Result<DispatchOutcome, DeviceError> {
        self.begin_call()?;
        if self.faults.failing_dispatches > 0 {
            self.faults.failing_dispatches -= 1;
            return Err(DeviceError::Disconnected("simulated dispatch failure".into()));
        }
        self.dispatched.push(request.event.clone());
        let outcome = self.apply(request);
        tracing::trace!(event = %request.event, ?outcome, screen = ?self.current_screen(), "simulated dispatch");
        Ok(outcome)
    }

    async fn launch_app(&mut self, _app: &AppDescriptor) -> Result<(), DeviceError> {
        self.begin_call()?;
        if self.faults.failing_launches > 0 {
            self.faults.failing_launches -= 1;
            return Err(DeviceError::Disconnected("simulated launch failure".into()));
        }
        self.launch();
        Ok(())
    }

    async fn stop_app(&mut self, _app: &AppDescriptor) -> Result<(), DeviceError> {
        self.begin_call()?;
        self.stack.clear();
        self.backgrounded = false;
        Ok(())
    }

    async fn restart_app(&mut self, _app: &AppDescriptor) -> Result<(), DeviceError> {
        self.begin_call()?;
        self.restart();
        Ok(())
    }
}
