use fathom_graph::{ArtifactError, Utg, UtgArtifact};
use fathom_model::{Event, State, StateId, SwipeDirection, WidgetDescriptor};
use fathom_ui::Foreground;

fn widget(index: u32, scrollable: bool) -> WidgetDescriptor {
    WidgetDescriptor {
        index,
        path: vec![0, index as u16],
        class: "android.widget.Button".into(),
        resource_id: None,
        text: Some(format!("item #{index}")),
        enabled: true,
        clickable: !scrollable,
        long_clickable: false,
        scrollable,
        editable: false,
        checkable: false,
    }
}

fn sample_utg() -> Utg {
    let home = State {
        id: StateId::from_hex("aa"),
        activity: "Main".into(),
        foreground: Foreground::InApp,
        widgets: vec![widget(0, false), widget(1, true)],
    };
    let list = State {
        id: StateId::from_hex("bb"),
        activity: "List".into(),
        foreground: Foreground::Backgrounded { depth: 1 },
        widgets: vec![widget(0, false)],
    };
    let mut utg = Utg::default();
    utg.visit(&home);
    utg.record(&home, &Event::tap(0), &list, true);
    utg.record(
        &list,
        &Event::Swipe {
            direction: SwipeDirection::Up,
            widget: None,
        },
        &list,
        false,
    );
    utg.record(&list, &Event::back(), &home, true);
    utg.record(&home, &Event::tap(0), &list, true);
    utg
}

#[test]
fn test_round_trip_preserves_stats() {
    let utg = sample_utg();
    let json = utg.to_json().unwrap();
    let loaded = Utg::from_json(&json).unwrap();

    assert_eq!(loaded.stats(), utg.stats());
    assert_eq!(loaded.to_json().unwrap(), json);
    assert_eq!(loaded.clock(), utg.clock());
    assert!(loaded.is_sound());
}

#[test]
fn test_round_trip_preserves_queries() {
    let utg = sample_utg();
    let loaded = Utg::from_json(&utg.to_json().unwrap()).unwrap();
    let home = StateId::from_hex("aa");
    let list = StateId::from_hex("bb");
    assert_eq!(
        loaded.shortest_path(&list, &home),
        utg.shortest_path(&list, &home)
    );
    assert_eq!(loaded.unexplored_actions(&home), utg.unexplored_actions(&home));
    assert_eq!(loaded.times_tried(&home, &Event::tap(0)), 2);
}

#[test]
fn test_save_and_load_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("utg.json");
    let utg = sample_utg();
    utg.save(&path).unwrap();
    let loaded = Utg::load(&path).unwrap();
    assert_eq!(loaded.stats(), utg.stats());
}

#[test]
fn test_dangling_edge_rejected() {
    let mut artifact = sample_utg().to_artifact();
    artifact.edges[0].target = StateId::from_hex("ghost");
    assert!(matches!(
        Utg::from_artifact(artifact),
        Err(ArtifactError::DanglingEdge { .. })
    ));
}

#[test]
fn test_duplicate_state_rejected() {
    let mut artifact = sample_utg().to_artifact();
    let copy = artifact.nodes[0].clone();
    artifact.nodes.push(copy);
    assert!(matches!(
        Utg::from_artifact(artifact),
        Err(ArtifactError::DuplicateState { .. })
    ));
}

#[test]
fn test_version_mismatch_rejected() {
    let mut artifact = sample_utg().to_artifact();
    artifact.format_version = 99;
    assert!(matches!(
        Utg::from_artifact(artifact),
        Err(ArtifactError::UnsupportedVersion { found: 99, .. })
    ));
}

#[test]
fn test_artifact_json_shape() {
    let json = sample_utg().to_json().unwrap();
    let artifact = UtgArtifact::from_json(&json).unwrap();
    assert_eq!(artifact.nodes.len(), 2);
    assert_eq!(artifact.edges.len(), 3);
    assert_eq!(artifact.edges[0].observations, 2);
    assert!(json.contains("\"kind\": \"tap\""));
}

#[test]
fn test_duplicate_edge_rejected() {
    let mut artifact = sample_utg().to_artifact();
    let copy = artifact.edges[0].clone();
    artifact.edges.push(copy.clone());
    assert!(matches!(
        Utg::from_artifact(artifact.clone()),
        Err(ArtifactError::DuplicateEdge { success: true, .. })
    ));

    // The same triple with the other outcome is a distinct edge.
    artifact.edges.pop();
    artifact.edges.push(fathom_graph::EdgeRecord {
        success: false,
        ..copy
    });
    let loaded = Utg::from_artifact(artifact).unwrap();
    assert_eq!(loaded.transition_count(), 4);
}
