use std::time::Duration;

use fathom_core::{
    EngineLimits, ExplorationLimits, LimitViolation, ManagerError, SessionConfig, SessionManager,
    TerminationReason,
};
use fathom_device::{Screen, SimulatedApp, SimulatedDevice, Trigger};
use fathom_ui::{AppDescriptor, RawNode};

fn app() -> AppDescriptor {
    AppDescriptor::new("com.example.clock", "com.example.clock.AlarmActivity")
        .with_component("com.example.clock.TimerActivity")
}

fn clock_app() -> SimulatedApp {
    let alarm = Screen::new(
        "com.example.clock.AlarmActivity",
        RawNode::new("android.widget.FrameLayout").with_child(
            RawNode::new("android.widget.Button")
                .with_id("com.example.clock:id/timer")
                .with_text("Timer")
                .clickable(),
        ),
    );
    let timer = Screen::new(
        "com.example.clock.TimerActivity",
        RawNode::new("android.widget.FrameLayout"),
    );
    SimulatedApp::new(app(), "alarm", alarm)
        .screen("timer", timer)
        .link("alarm", Trigger::Tap("com.example.clock:id/timer".into()), "timer")
}

/// An app that never saturates: every button stays on the same screen.
fn endless_app() -> SimulatedApp {
    let root = (0..50).fold(RawNode::new("android.widget.FrameLayout"), |root, i| {
        root.with_child(
            RawNode::new("android.widget.Button")
                .with_id(&format!("com.example.clock:id/b{i}"))
                .clickable(),
        )
    });
    SimulatedApp::new(
        app(),
        "alarm",
        Screen::new("com.example.clock.AlarmActivity", root),
    )
}

fn long_config() -> SessionConfig {
    SessionConfig {
        limits: ExplorationLimits {
            max_iterations: 1_000_000,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_sessions_get_sequential_ids() {
    let manager = SessionManager::new();
    let a = manager
        .start(SessionConfig::default(), app(), SimulatedDevice::new(clock_app()))
        .unwrap();
    let b = manager
        .start(SessionConfig::default(), app(), SimulatedDevice::new(clock_app()))
        .unwrap();
    assert_eq!(a, "session-0001");
    assert_eq!(b, "session-0002");
    assert_eq!(manager.ids(), vec![a.clone(), b.clone()]);

    for id in [a, b] {
        let outcome = manager.join(&id).await.unwrap();
        assert_eq!(outcome.id, id);
        assert_eq!(outcome.reason, TerminationReason::Saturated);
        assert_eq!(outcome.utg.state_count(), 2);
    }
    assert!(manager.ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_limit_is_enforced() {
    let manager = SessionManager::with_limits(EngineLimits {
        max_concurrent_sessions: 1,
        ..Default::default()
    });
    let first = manager
        .start(long_config(), app(), SimulatedDevice::new(endless_app()))
        .unwrap();
    assert_eq!(manager.running_count(), 1);

    let err = manager
        .start(long_config(), app(), SimulatedDevice::new(endless_app()))
        .unwrap_err();
    assert!(matches!(
        err,
        ManagerError::Limit(LimitViolation::TooManySessions { current: 1, max: 1 })
    ));

    manager.cancel(&first).unwrap();
    let outcome = manager.join(&first).await.unwrap();
    assert_eq!(outcome.reason, TerminationReason::Cancelled);

    // The slot is free again.
    let second = manager
        .start(SessionConfig::default(), app(), SimulatedDevice::new(clock_app()))
        .unwrap();
    assert_eq!(second, "session-0002");
    manager.join(&second).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_inspect_running_session() {
    let manager = SessionManager::new();
    let id = manager
        .start(long_config(), app(), SimulatedDevice::new(endless_app()))
        .unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    let snapshot = manager.inspect(&id).unwrap();
    assert_eq!(snapshot.state_count(), 1);
    assert!(snapshot.transition_count() > 0);

    manager.cancel_all();
    let outcome = manager.join(&id).await.unwrap();
    assert_eq!(outcome.reason, TerminationReason::Cancelled);
    assert!(outcome.utg.transition_count() >= snapshot.transition_count());
}

#[tokio::test]
async fn test_unknown_session_is_an_error() {
    let manager = SessionManager::default();
    assert!(matches!(
        manager.cancel("session-9999"),
        Err(ManagerError::UnknownSession(_))
    ));
    assert!(matches!(
        manager.inspect("nope"),
        Err(ManagerError::UnknownSession(_))
    ));
    assert!(matches!(
        manager.join("nope").await,
        Err(ManagerError::UnknownSession(_))
    ));
    assert!(manager.handle("nope").is_none());
}

#[tokio::test]
async fn test_invalid_config_is_not_started() {
    let manager = SessionManager::new();
    let config = SessionConfig {
        limits: ExplorationLimits {
            max_consecutive_failures: 0,
            ..Default::default()
        },
        ..Default::default()
    };
    let err = manager
        .start(config, app(), SimulatedDevice::new(clock_app()))
        .unwrap_err();
    assert!(matches!(err, ManagerError::Config(_)));
    assert!(manager.ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_finished_sessions_are_pruned_on_start() {
    let manager = SessionManager::with_limits(EngineLimits {
        max_retained_finished: 1,
        ..Default::default()
    });
    let first = manager
        .start(SessionConfig::default(), app(), SimulatedDevice::new(clock_app()))
        .unwrap();
    let second = manager
        .start(SessionConfig::default(), app(), SimulatedDevice::new(clock_app()))
        .unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(manager.running_count(), 0);
    assert_eq!(manager.ids(), vec![first.clone(), second.clone()]);

    // Starting again drops the oldest finished session that was never joined.
    let third = manager
        .start(long_config(), app(), SimulatedDevice::new(endless_app()))
        .unwrap();
    assert_eq!(manager.ids(), vec![second.clone(), third.clone()]);
    assert!(matches!(
        manager.join(&first).await,
        Err(ManagerError::UnknownSession(_))
    ));

    let outcome = manager.join(&second).await.unwrap();
    assert_eq!(outcome.reason, TerminationReason::Saturated);
    manager.cancel(&third).unwrap();
    manager.join(&third).await.unwrap();
}
