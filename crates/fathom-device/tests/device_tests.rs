use fathom_device::{
    DeviceChannel, DeviceConfig, DeviceError, DispatchOutcome, DispatchRequest, Screen,
    SimulatedApp, SimulatedDevice, TimedChannel, Trigger,
};
use fathom_model::{Abstraction, Event, StateAbstractor};
use fathom_ui::{AppDescriptor, Foreground, RawNode};

const PKG: &str = "com.example.notes";

fn app() -> AppDescriptor {
    AppDescriptor::new(PKG, "com.example.notes.ListActivity")
        .with_component("com.example.notes.EditActivity")
}

fn notes_app() -> SimulatedApp {
    let list = Screen::new(
        "com.example.notes.ListActivity",
        RawNode::new("android.widget.FrameLayout").with_child(
            RawNode::new("android.widget.Button")
                .with_id("com.example.notes:id/new")
                .with_text("New")
                .clickable(),
        ),
    );
    let edit = Screen::new(
        "com.example.notes.EditActivity",
        RawNode::new("android.widget.FrameLayout").with_child(
            RawNode::new("android.widget.EditText")
                .with_id("com.example.notes:id/body")
                .editable(),
        ),
    );
    SimulatedApp::new(app(), "list", list)
        .screen("edit", edit)
        .link("list", Trigger::Tap("com.example.notes:id/new".into()), "edit")
}

fn observe(tree: &fathom_ui::RawUiTree) -> fathom_model::Observation {
    match StateAbstractor::default().abstract_tree(tree, &app()) {
        Abstraction::Known(obs) => obs,
        Abstraction::Unknown(reason) => panic!("unexpected unknown state: {reason:?}"),
    }
}

#[tokio::test]
async fn test_launch_shows_home_screen() {
    let mut device = SimulatedDevice::new(notes_app());
    let before = device.snapshot().await.unwrap();
    assert_eq!(app().classify(&before), Foreground::NotRunning);

    device.launch_app(&app()).await.unwrap();
    let tree = device.snapshot().await.unwrap();
    assert_eq!(
        tree.foreground_activity.as_deref(),
        Some("com.example.notes.ListActivity")
    );
    assert_eq!(app().classify(&tree), Foreground::InApp);
    assert_eq!(device.launches(), 1);
}

#[tokio::test]
async fn test_tap_follows_link_and_back_pops() {
    let mut device = SimulatedDevice::new(notes_app());
    device.launch_app(&app()).await.unwrap();
    let obs = observe(&device.snapshot().await.unwrap());

    let tap = obs
        .state
        .widgets
        .iter()
        .find(|w| w.clickable)
        .map(|w| Event::tap(w.index))
        .unwrap();
    let request = DispatchRequest::resolve(&tap, &obs).unwrap();
    assert_eq!(device.dispatch(&request).await.unwrap(), DispatchOutcome::Executed);
    assert_eq!(device.current_screen(), Some("edit"));

    let back = DispatchRequest::untargeted(Event::back());
    device.dispatch(&back).await.unwrap();
    assert_eq!(device.current_screen(), Some("list"));

    // Backing out of the root screen leaves the app.
    device.dispatch(&back).await.unwrap();
    assert_eq!(device.current_screen(), None);
    let tree = device.snapshot().await.unwrap();
    assert_eq!(app().classify(&tree), Foreground::NotRunning);
    assert_eq!(device.dispatched().len(), 3);
}

#[tokio::test]
async fn test_home_key_backgrounds_the_app() {
    let mut device = SimulatedDevice::new(notes_app());
    device.launch_app(&app()).await.unwrap();
    device
        .dispatch(&DispatchRequest::untargeted(Event::Key {
            key: fathom_model::SystemKey::Home,
        }))
        .await
        .unwrap();
    let tree = device.snapshot().await.unwrap();
    assert_eq!(app().classify(&tree), Foreground::Backgrounded { depth: 1 });

    device.restart_app(&app()).await.unwrap();
    let tree = device.snapshot().await.unwrap();
    assert_eq!(app().classify(&tree), Foreground::InApp);
}

#[tokio::test]
async fn test_stale_target_is_rejected() {
    let mut device = SimulatedDevice::new(notes_app());
    device.launch_app(&app()).await.unwrap();
    let list = observe(&device.snapshot().await.unwrap());
    let tap = Event::tap(list.state.widgets.iter().find(|w| w.clickable).unwrap().index);
    let request = DispatchRequest::resolve(&tap, &list).unwrap();

    device.dispatch(&request).await.unwrap();
    // The button is gone on the edit screen.
    let outcome = device.dispatch(&request).await.unwrap();
    assert!(matches!(outcome, DispatchOutcome::Rejected { .. }));
    assert_eq!(device.current_screen(), Some("edit"));
}

#[tokio::test]
async fn test_injected_failures() {
    let mut device = SimulatedDevice::new(notes_app());
    device.launch_app(&app()).await.unwrap();

    device.fail_next_snapshots(1);
    assert!(matches!(
        device.snapshot().await,
        Err(DeviceError::Disconnected(_))
    ));
    assert!(device.snapshot().await.is_ok());

    device.malformed_next_snapshots(1);
    let tree = device.snapshot().await.unwrap();
    assert!(tree.root.is_none());
    assert!(StateAbstractor::default().abstract_tree(&tree, &app()).is_unknown());

    device.make_unavailable();
    let err = device.snapshot().await.unwrap_err();
    assert!(err.is_permanent());
}

#[tokio::test]
async fn test_fail_all_after_counts_calls() {
    let mut device = SimulatedDevice::new(notes_app()).fail_all_after(2);
    device.launch_app(&app()).await.unwrap();
    device.snapshot().await.unwrap();
    let err = device.snapshot().await.unwrap_err();
    assert!(!err.is_permanent());
    assert_eq!(device.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_timed_channel_turns_hang_into_timeout() {
    let mut inner = SimulatedDevice::new(notes_app());
    inner.hang_next_snapshots(1);
    let config = DeviceConfig {
        snapshot_timeout_ms: 250,
        ..DeviceConfig::default()
    };
    let mut device = TimedChannel::new(inner, config);
    device.launch_app(&app()).await.unwrap();

    let err = device.snapshot().await.unwrap_err();
    assert!(matches!(
        err,
        DeviceError::Timeout {
            operation: "snapshot",
            after_ms: 250
        }
    ));
    // The hang was one-shot.
    assert!(device.snapshot().await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_timed_channel_settles_after_dispatch() {
    let config = DeviceConfig {
        settle_ms: 700,
        ..DeviceConfig::default()
    };
    let mut device = TimedChannel::new(SimulatedDevice::new(notes_app()), config);
    device.launch_app(&app()).await.unwrap();

    let start = tokio::time::Instant::now();
    device
        .dispatch(&DispatchRequest::untargeted(Event::Wait { millis: 0 }))
        .await
        .unwrap();
    assert!(start.elapsed() >= std::time::Duration::from_millis(700));
    assert_eq!(device.inner().dispatched().len(), 1);
}

#[tokio::test]
async fn test_capture_is_unsupported_by_default() {
    let mut device = SimulatedDevice::new(notes_app());
    assert!(matches!(
        device.capture().await,
        Err(DeviceError::Unsupported { operation: "capture" })
    ));
}
