//! Integration tests for a full tracking session.
//!
//! These tests drive a `Session` end to end against the simulated
//! collaborators:
//! - explicit target tracking: start → native state change → tracked set
//! - capacity admission at the configured maximum
//! - teardown: parent restoration, anchor destruction, empty collections
//! - coverage discovery: GPS bootstrap, ranking, selection, holder cleanup
//! - stop while a coverage bootstrap is still in flight
//!
//! Run with: `cargo test --test session_integration`

use std::sync::Arc;

use waymark::{
    AnchorPayload, CoverageArea, GeoPoint, Location, LocationSpec, MemorySceneGraph,
    NativeAnchorApi, SceneGraph, ServiceStatus, Session, SessionConfig, SimulatedAnchorEngine,
    SimulatedLocationService, StaticCoverageClient, TrackingError, TrackingState, Transform,
};

// ============================================================================
// Helper Functions
// ============================================================================

struct Fixture {
    session: Session,
    scene: Arc<MemorySceneGraph>,
    engine: Arc<SimulatedAnchorEngine>,
    service: Arc<SimulatedLocationService>,
    coverage: Arc<StaticCoverageClient>,
}

/// Build a session over fresh simulated collaborators.
fn make_fixture(config: SessionConfig, areas: Vec<CoverageArea>) -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let scene = Arc::new(MemorySceneGraph::new());
    let engine = Arc::new(SimulatedAnchorEngine::new());
    let service = Arc::new(SimulatedLocationService::new());
    let coverage = Arc::new(StaticCoverageClient::new(areas));
    let session = Session::start(
        config,
        Arc::clone(&scene) as Arc<dyn SceneGraph>,
        Arc::clone(&engine) as Arc<dyn NativeAnchorApi>,
        Arc::clone(&service) as _,
        Arc::clone(&coverage) as _,
    );
    Fixture {
        session,
        scene,
        engine,
        service,
        coverage,
    }
}

/// An authored location with an inactive content node.
fn authored_location(scene: &MemorySceneGraph, name: &str) -> Location {
    let node = scene.create_node(name);
    scene.set_active(node, false);
    Location::new(name, Some(AnchorPayload::from(format!("{name}-pay"))), None, node)
}

fn payload_of(name: &str) -> AnchorPayload {
    AnchorPayload::from(format!("{name}-pay"))
}

/// Ferry Building, San Francisco. The query point for coverage tests.
fn query_point() -> GeoPoint {
    GeoPoint::new(37.7955, -122.3937).unwrap()
}

/// An area roughly `meters` north of the query point.
fn area_north(meters: f64, name: &str) -> CoverageArea {
    let centroid = GeoPoint::new(
        query_point().latitude + meters / 111_320.0,
        query_point().longitude,
    )
    .unwrap();
    CoverageArea::new(name, centroid, format!("{name}-pay"))
}

// ============================================================================
// Explicit target tracking
// ============================================================================

/// The complete single-location scenario: start tracking, the engine
/// reports Tracking, the location activates; the engine degrades, the
/// location deactivates. Events fire for both transitions.
#[test]
fn test_single_location_track_and_untrack() {
    let mut f = make_fixture(SessionConfig::default(), Vec::new());
    let a = authored_location(&f.scene, "gallery");
    let mut events = f.session.events();

    f.session.locations().set_target_locations(vec![a.clone()]);
    f.session.locations().start_tracking().expect("Start should succeed");
    assert!(f.session.locations().tracked_locations().is_empty());

    f.engine.set_state_by_payload(&payload_of("gallery"), TrackingState::Tracking);
    f.session.update();

    let tracked = f.session.locations().tracked_locations();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].id, a.id);
    assert!(f.scene.is_active(a.node));
    let event = events.try_recv().expect("Tracking event expected");
    assert_eq!(event.location.id, a.id);
    assert!(event.tracking);

    f.engine.set_state_by_payload(&payload_of("gallery"), TrackingState::Limited);
    f.session.update();

    assert!(f.session.locations().tracked_locations().is_empty());
    assert!(!f.scene.is_active(a.node));
    let event = events.try_recv().expect("Untracking event expected");
    assert!(!event.tracking);
}

/// With the default capacity of one, a second concurrent Tracking report
/// is ignored: no admission, no event, content stays inactive.
#[test]
fn test_capacity_bounds_concurrent_tracking() {
    let mut f = make_fixture(SessionConfig::default(), Vec::new());
    let a = authored_location(&f.scene, "first");
    let b = authored_location(&f.scene, "second");
    let mut events = f.session.events();

    f.session
        .locations()
        .set_target_locations(vec![a.clone(), b.clone()]);
    f.session.locations().start_tracking().unwrap();

    f.engine.set_state_by_payload(&payload_of("first"), TrackingState::Tracking);
    f.engine.set_state_by_payload(&payload_of("second"), TrackingState::Tracking);
    f.session.update();

    let tracked = f.session.locations().tracked_locations();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].id, a.id);
    assert!(!f.scene.is_active(b.node));

    assert!(events.try_recv().is_ok(), "One event for the admitted location");
    assert!(events.try_recv().is_err(), "No event for the ignored one");

    // Once the slot frees, the other location can be admitted.
    f.engine.set_state_by_payload(&payload_of("first"), TrackingState::Stopped);
    f.engine.set_state_by_payload(&payload_of("second"), TrackingState::Tracking);
    f.session.update();

    let tracked = f.session.locations().tracked_locations();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].id, b.id);
}

/// Six targets are a caller error; the native engine must never hear
/// about them.
#[test]
fn test_oversized_target_list_is_rejected() {
    let mut f = make_fixture(SessionConfig::default(), Vec::new());
    let targets: Vec<Location> = (0..6)
        .map(|i| authored_location(&f.scene, &format!("t{i}")))
        .collect();

    f.session.locations().set_target_locations(targets);
    let result = f.session.locations().start_tracking();

    assert!(matches!(result, Err(TrackingError::TooManyRequested { .. })));
    assert_eq!(f.engine.created_count(), 0);
}

/// Stopping restores every location's authored parentage and transform,
/// destroys the anchors, and leaves the coordinator empty.
#[test]
fn test_stop_restores_scene_and_releases_anchors() {
    let mut f = make_fixture(SessionConfig::default().with_max_tracking_count(5), Vec::new());
    let home = f.scene.create_node("authored-root");
    let a = authored_location(&f.scene, "statue");
    let offset = Transform {
        translation: glam::Vec3::new(-2.0, 0.0, 7.5),
        rotation: glam::Quat::IDENTITY,
    };
    f.scene.set_parent(a.node, Some(home), offset);
    let b = authored_location(&f.scene, "arch");

    f.session
        .locations()
        .set_target_locations(vec![a.clone(), b.clone()]);
    f.session.locations().start_tracking().unwrap();
    f.engine.set_state_by_payload(&payload_of("statue"), TrackingState::Tracking);
    f.engine.set_state_by_payload(&payload_of("arch"), TrackingState::Tracking);
    f.session.update();
    assert_eq!(f.session.locations().tracked_locations().len(), 2);

    f.session.locations().stop_tracking().expect("Stop should succeed");

    assert_eq!(f.scene.parent_of(a.node), Some(home));
    assert_eq!(f.scene.local_transform(a.node), offset);
    assert_eq!(f.scene.parent_of(b.node), None);
    assert!(f.session.locations().tracked_locations().is_empty());
    assert_eq!(f.engine.live_count(), 0);
    assert_eq!(f.engine.destroyed_count(), 2);

    // Nothing left to stop.
    assert!(matches!(
        f.session.locations().stop_tracking(),
        Err(TrackingError::NothingToStop)
    ));
    assert_eq!(f.engine.destroyed_count(), 2, "No further destruction");
}

/// Authored JSON specs flow through the same pipeline as hand-built
/// locations.
#[test]
fn test_authored_specs_drive_a_session() {
    let mut f = make_fixture(SessionConfig::default(), Vec::new());
    let json = r#"[{"name": "kiosk", "payload": "kiosk-blob", "latitude": 37.79, "longitude": -122.39}]"#;

    let specs = LocationSpec::from_json(json).unwrap();
    let locations = LocationSpec::realize_all(&specs, f.scene.as_ref()).unwrap();
    f.session.locations().set_target_locations(locations.clone());
    f.session.locations().start_tracking().unwrap();

    f.engine
        .set_state_by_payload(&AnchorPayload::from("kiosk-blob"), TrackingState::Tracking);
    f.session.update();

    let tracked = f.session.locations().tracked_locations();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].name, "kiosk");
    assert!(f.scene.is_active(locations[0].node));
}

// ============================================================================
// Coverage discovery
// ============================================================================

/// With no targets, the session bootstraps from GPS: permission, service
/// start, fix, coverage query. Candidates are taken nearest-first, the
/// payload-less one is skipped, and at most five are tracked.
#[test]
fn test_coverage_discovery_selects_nearest_candidates() {
    let areas = vec![
        area_north(300.0, "d300"),
        area_north(50.0, "d50"),
        area_north(999.0, "d999"),
        area_north(10.0, "d10"),
        CoverageArea::without_payload("no-pay", query_point()),
        area_north(400.0, "d400"),
        area_north(450.0, "d450"),
        area_north(475.0, "d475"),
    ];
    let mut f = make_fixture(SessionConfig::default(), areas);
    f.service.set_service_status(ServiceStatus::Stopped);

    f.session.locations().start_tracking().expect("Discovery start");

    // Tick until the bootstrap completes: permission poll, service start,
    // initialization, fix wait, query, realization.
    f.session.update();
    f.session.update();
    f.service.set_service_status(ServiceStatus::Running);
    f.session.update();
    f.session.update(); // awaiting fix, none yet
    f.service.set_fix(Some(query_point()));
    f.session.update(); // fix -> query issued
    f.session.update(); // result -> candidates realized

    assert_eq!(f.service.start_requests().len(), 1);
    assert_eq!(f.coverage.query_count(), 1);
    assert_eq!(
        f.engine.created_count(),
        5,
        "Five nearest trackable candidates tracked"
    );
    // Candidates beyond the fifth missed the cut; the payload-less one
    // was never eligible.
    assert!(f
        .session
        .anchors()
        .anchor_for_payload(&AnchorPayload::from("d999-pay"))
        .is_none());
    assert!(f
        .session
        .anchors()
        .anchor_for_payload(&AnchorPayload::from("d475-pay"))
        .is_none());

    // Nearest candidate activates once the engine confirms tracking.
    f.engine.set_state_by_payload(&AnchorPayload::from("d10-pay"), TrackingState::Tracking);
    f.session.update();
    let tracked = f.session.locations().tracked_locations();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].name, "d10");
}

/// Stop during a still-pending bootstrap cancels the discovery and leaves
/// no residue; a later start re-enters discovery from scratch.
#[test]
fn test_stop_during_coverage_bootstrap() {
    let mut f = make_fixture(SessionConfig::default(), Vec::new());
    f.coverage.set_mode(waymark::coverage::ResponseMode::Hold);
    f.service.set_fix(Some(query_point()));

    f.session.locations().start_tracking().unwrap();
    for _ in 0..4 {
        f.session.update();
    }
    assert_eq!(f.coverage.query_count(), 1, "Query went out");

    f.session
        .locations()
        .stop_tracking()
        .expect("Stop during bootstrap should succeed");

    assert_eq!(f.engine.created_count(), 0);
    assert!(f.session.locations().tracked_locations().is_empty());

    // The session can bootstrap again.
    f.session.locations().start_tracking().expect("Re-entry after stop");
    assert!(f.session.locations().discovery_state().is_some());
}

/// Coverage holder nodes are ephemeral: created inactive with the
/// discovery, destroyed as a set when tracking stops.
#[test]
fn test_coverage_holders_destroyed_on_stop() {
    let areas = vec![area_north(25.0, "close"), area_north(75.0, "near")];
    let mut f = make_fixture(SessionConfig::default(), areas);
    f.service.set_fix(Some(query_point()));
    let baseline = f.scene.node_count();

    f.session.locations().start_tracking().unwrap();
    for _ in 0..5 {
        f.session.update();
    }
    assert_eq!(f.engine.created_count(), 2);
    // Two holder nodes plus two anchor nodes.
    assert_eq!(f.scene.node_count(), baseline + 4);

    f.session.locations().stop_tracking().unwrap();

    assert_eq!(f.scene.node_count(), baseline, "All session nodes destroyed");
    assert_eq!(f.engine.live_count(), 0);
}

/// A denied permission fails the attempt with no query and no retry.
#[test]
fn test_denied_permission_aborts_discovery() {
    let mut f = make_fixture(SessionConfig::default(), Vec::new());
    f.service.set_permission(waymark::PermissionStatus::Pending);

    f.session.locations().start_tracking().unwrap();
    f.session.update();
    assert_eq!(f.service.permission_request_count(), 1);

    f.service.set_permission(waymark::PermissionStatus::Denied);
    f.session.update();
    f.session.update();

    assert_eq!(f.session.locations().discovery_state(), None);
    assert_eq!(f.coverage.query_count(), 0);
    assert!(!f.session.locations().is_active());

    // The caller may retry by starting again.
    f.service.set_permission(waymark::PermissionStatus::Granted);
    f.session.locations().start_tracking().expect("Retry allowed");
}

// ============================================================================
// Session lifecycle
// ============================================================================

/// Shutdown stops tracking and is idempotent.
#[test]
fn test_shutdown_releases_everything() {
    let mut f = make_fixture(SessionConfig::default(), Vec::new());
    let a = authored_location(&f.scene, "plaza");
    f.session.locations().set_target_locations(vec![a.clone()]);
    f.session.locations().start_tracking().unwrap();
    f.engine.set_state_by_payload(&payload_of("plaza"), TrackingState::Tracking);
    f.session.update();
    assert_eq!(f.session.locations().tracked_locations().len(), 1);

    f.session.shutdown();

    assert_eq!(f.engine.live_count(), 0);
    assert!(!f.scene.is_active(a.node));
    assert!(f.session.locations().tracked_locations().is_empty());

    f.session.shutdown();
    assert_eq!(f.engine.destroyed_count(), 1);
}
