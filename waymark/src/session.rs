//! Tracking session orchestration.
//!
//! A [`Session`] wires the collaborators together: it builds the bounded
//! state-change channel, puts the persistent anchor manager on its sending
//! end and the location manager on its receiving end, and owns the master
//! cancellation token everything else derives from.
//!
//! # Update cycle
//!
//! The host calls [`Session::update`] once per frame. Each update pumps
//! pending native state changes into the channel and then lets the
//! location manager tick its discovery and drain the channel. All mutation
//! happens on the calling thread.
//!
//! # Example
//!
//! ```ignore
//! use waymark::{Session, SessionConfig};
//!
//! let mut session = Session::start(config, scene, engine, gps, coverage);
//! let mut events = session.events();
//!
//! session.locations().set_target_locations(targets);
//! session.locations().start_tracking()?;
//! loop {
//!     session.update();
//!     // render, poll events...
//! }
//! session.shutdown();
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::anchor::{AnchorTracker, NativeAnchorApi, PersistentAnchorManager};
use crate::config::SessionConfig;
use crate::coverage::CoverageClient;
use crate::discovery::LocationService;
use crate::location::{LocationManager, LocationTrackingEvent};
use crate::scene::SceneGraph;

/// A running tracking session.
pub struct Session {
    anchors: Arc<PersistentAnchorManager>,
    locations: LocationManager,
    cancellation: CancellationToken,
}

impl Session {
    /// Wire up and start a session.
    ///
    /// Nothing is tracked until the caller asks the location manager to
    /// start; `start` only builds the plumbing.
    pub fn start(
        config: SessionConfig,
        scene: Arc<dyn SceneGraph>,
        native: Arc<dyn NativeAnchorApi>,
        location_service: Arc<dyn LocationService>,
        coverage_client: Arc<dyn CoverageClient>,
    ) -> Self {
        let cancellation = CancellationToken::new();
        let (state_tx, state_rx) = mpsc::channel(config.state_channel_capacity.max(1));

        let anchors = Arc::new(PersistentAnchorManager::new(
            native,
            Arc::clone(&scene),
            state_tx,
        ));
        let locations = LocationManager::new(
            config,
            scene,
            Arc::clone(&anchors) as Arc<dyn AnchorTracker>,
            location_service,
            coverage_client,
            state_rx,
            cancellation.child_token(),
        );

        info!("tracking session started");
        Self {
            anchors,
            locations,
            cancellation,
        }
    }

    /// The location manager: target selection, start/stop, tracked set.
    pub fn locations(&mut self) -> &mut LocationManager {
        &mut self.locations
    }

    /// The persistent anchor manager, for read-only inspection.
    pub fn anchors(&self) -> &PersistentAnchorManager {
        &self.anchors
    }

    /// Subscribe to location tracking transitions.
    pub fn events(&self) -> broadcast::Receiver<LocationTrackingEvent> {
        self.locations.subscribe()
    }

    /// Advance the session by one frame.
    pub fn update(&mut self) {
        self.anchors.pump_native_changes();
        self.locations.update();
    }

    /// Tear the session down.
    ///
    /// Stops any active tracking (restoring scene state and destroying
    /// anchors), cancels outstanding discovery work, and cancels the
    /// master token. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.locations.is_active() {
            // Teardown failures are logged inside stop_tracking.
            let _ = self.locations.stop_tracking();
        }
        self.cancellation.cancel();
        debug!("tracking session shut down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::{AnchorPayload, SimulatedAnchorEngine, TrackingState};
    use crate::coverage::StaticCoverageClient;
    use crate::discovery::SimulatedLocationService;
    use crate::location::Location;
    use crate::scene::MemorySceneGraph;

    fn make_session() -> (
        Session,
        Arc<MemorySceneGraph>,
        Arc<SimulatedAnchorEngine>,
    ) {
        let scene = Arc::new(MemorySceneGraph::new());
        let engine = Arc::new(SimulatedAnchorEngine::new());
        let session = Session::start(
            SessionConfig::default(),
            Arc::clone(&scene) as Arc<dyn SceneGraph>,
            Arc::clone(&engine) as Arc<dyn NativeAnchorApi>,
            Arc::new(SimulatedLocationService::new()),
            Arc::new(StaticCoverageClient::empty()),
        );
        (session, scene, engine)
    }

    #[test]
    fn test_update_pumps_native_changes_through() {
        let (mut session, scene, engine) = make_session();
        let node = scene.create_node("spot");
        scene.set_active(node, false);
        let payload = AnchorPayload::from("spot-payload");
        let location = Location::new("spot", Some(payload.clone()), None, node);

        session.locations().set_target_locations(vec![location]);
        session.locations().start_tracking().unwrap();

        engine.set_state_by_payload(&payload, TrackingState::Tracking);
        session.update();

        assert_eq!(session.locations().tracked_locations().len(), 1);
    }

    #[test]
    fn test_shutdown_tears_tracking_down() {
        let (mut session, scene, engine) = make_session();
        let node = scene.create_node("spot");
        let location = Location::new("spot", Some(AnchorPayload::from("p")), None, node);
        session.locations().set_target_locations(vec![location]);
        session.locations().start_tracking().unwrap();
        assert_eq!(engine.live_count(), 1);

        session.shutdown();

        assert_eq!(engine.live_count(), 0);
        assert!(!session.locations.is_active());
    }

    #[test]
    fn test_shutdown_is_safe_when_idle_and_repeatable() {
        let (mut session, _scene, engine) = make_session();
        session.shutdown();
        session.shutdown();
        assert_eq!(engine.destroyed_count(), 0);
    }
}
