//! The location tracking coordinator.
//!
//! `LocationManager` owns the target list, the bounded tracked set, and
//! all anchor-to-location bookkeeping. It is driven from a single update
//! thread: the session calls [`LocationManager::update`] once per frame,
//! which first ticks any in-flight coverage discovery and then drains the
//! bounded state-change channel, applying changes one at a time in
//! delivery order.
//!
//! Binding a location to an anchor captures the location node's original
//! parentage as a [`ParentRecord`] and reparents the node under the
//! anchor's scene node. Stopping restores the record verbatim, so the
//! scene is left exactly as the host authored it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::anchor::{Anchor, AnchorId, AnchorStateChange, AnchorTracker};
use crate::config::SessionConfig;
use crate::coverage::{rank_by_distance, select_trackable, CoverageClient, CoverageResult};
use crate::discovery::{CoverageDiscovery, DiscoveryState, LocationService};
use crate::scene::{NodeId, ParentRecord, SceneGraph, Transform};

use super::{
    Location, LocationId, LocationTrackingEvent, TrackingError, MAX_TRACKING_REQUESTS,
};

/// One anchor-to-location association.
///
/// The original parent record lives and dies with the binding; removing a
/// binding without restoring the record would strand the location node
/// under a destroyed anchor.
struct Binding {
    anchor: Anchor,
    location: Location,
    original_parent: ParentRecord,
}

/// Coordinates location tracking over the anchor layer.
///
/// All state is owned by the update thread; no other thread may call
/// mutating methods. See the [module docs](self) for the update cycle.
pub struct LocationManager {
    config: SessionConfig,
    scene: Arc<dyn SceneGraph>,
    tracker: Arc<dyn AnchorTracker>,
    location_service: Arc<dyn LocationService>,
    coverage_client: Arc<dyn CoverageClient>,
    state_rx: mpsc::Receiver<AnchorStateChange>,
    event_tx: broadcast::Sender<LocationTrackingEvent>,
    cancellation: CancellationToken,

    targets: Vec<Location>,
    bindings: HashMap<AnchorId, Binding>,
    /// Tracked locations in admission order; len never exceeds the
    /// configured maximum.
    tracked: Vec<LocationId>,
    /// Scene nodes created for coverage-derived locations, destroyed as a
    /// set on stop.
    holders: Vec<NodeId>,
    discovery: Option<CoverageDiscovery>,
}

impl LocationManager {
    /// Create a manager wired to its collaborators.
    ///
    /// `state_rx` is the receiving end of the bounded channel the
    /// persistent anchor manager forwards native state changes into.
    pub fn new(
        config: SessionConfig,
        scene: Arc<dyn SceneGraph>,
        tracker: Arc<dyn AnchorTracker>,
        location_service: Arc<dyn LocationService>,
        coverage_client: Arc<dyn CoverageClient>,
        state_rx: mpsc::Receiver<AnchorStateChange>,
        cancellation: CancellationToken,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            config,
            scene,
            tracker,
            location_service,
            coverage_client,
            state_rx,
            event_tx,
            cancellation,
            targets: Vec::new(),
            bindings: HashMap::new(),
            tracked: Vec::new(),
            holders: Vec::new(),
            discovery: None,
        }
    }

    /// Subscribe to tracking transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<LocationTrackingEvent> {
        self.event_tx.subscribe()
    }

    /// Replace the target list wholesale.
    ///
    /// Takes effect at the next [`start_tracking`](Self::start_tracking);
    /// an active session is unaffected.
    pub fn set_target_locations(&mut self, locations: Vec<Location>) {
        debug!(count = locations.len(), "target locations replaced");
        self.targets = locations;
    }

    /// Locations currently in the tracked set, in admission order.
    pub fn tracked_locations(&self) -> Vec<Location> {
        self.tracked
            .iter()
            .filter_map(|id| {
                self.bindings
                    .values()
                    .find(|b| b.location.id == *id)
                    .map(|b| b.location.clone())
            })
            .collect()
    }

    /// Whether anything is live: anchors bound, coverage holders held, or
    /// a discovery in flight.
    pub fn is_active(&self) -> bool {
        !self.bindings.is_empty() || !self.holders.is_empty() || self.discovery.is_some()
    }

    /// State of the in-flight coverage discovery, if any.
    pub fn discovery_state(&self) -> Option<DiscoveryState> {
        self.discovery.as_ref().map(|d| d.state())
    }

    /// Begin tracking.
    ///
    /// With a non-empty target list, issues a track request per target (at
    /// most [`MAX_TRACKING_REQUESTS`]; more is a caller error). With an
    /// empty list, begins a GPS-bootstrapped coverage discovery whose
    /// results feed the same tracking routine.
    ///
    /// Per-location provider failures are logged and skipped; partial
    /// success is a valid outcome.
    pub fn start_tracking(&mut self) -> Result<(), TrackingError> {
        if !self.bindings.is_empty() {
            error!(
                anchors = self.bindings.len(),
                "start_tracking while already tracking"
            );
            return Err(TrackingError::AlreadyTracking(self.bindings.len()));
        }
        if self.discovery.is_some() || !self.holders.is_empty() {
            error!("start_tracking while a coverage discovery is in progress or held");
            return Err(TrackingError::DiscoveryInProgress);
        }

        if self.targets.is_empty() {
            info!(
                radius_m = self.config.coverage_radius_meters,
                "no target locations, starting coverage discovery"
            );
            self.discovery = Some(CoverageDiscovery::new(
                Arc::clone(&self.location_service),
                Arc::clone(&self.coverage_client),
                self.config.coverage_radius_meters,
                self.config.gps,
                self.cancellation.child_token(),
            ));
            return Ok(());
        }

        if self.targets.len() > MAX_TRACKING_REQUESTS {
            error!(
                requested = self.targets.len(),
                max = MAX_TRACKING_REQUESTS,
                "too many locations requested"
            );
            return Err(TrackingError::TooManyRequested {
                requested: self.targets.len(),
                max: MAX_TRACKING_REQUESTS,
            });
        }

        let targets = self.targets.clone();
        self.track_locations(&targets);
        Ok(())
    }

    /// Stop tracking and tear the session state down.
    ///
    /// For every binding: deactivate the location's content, restore its
    /// original parent and transform, destroy the anchor. Per-anchor
    /// native failures are logged and the loop continues. Coverage holder
    /// nodes are destroyed as a set and any in-flight discovery is
    /// cancelled. Calling with nothing to stop is a logged no-op error.
    pub fn stop_tracking(&mut self) -> Result<(), TrackingError> {
        if !self.is_active() {
            error!("stop_tracking with nothing to stop");
            return Err(TrackingError::NothingToStop);
        }

        if let Some(discovery) = self.discovery.take() {
            discovery.cancel();
            debug!("in-flight coverage discovery cancelled");
        }

        for (_, binding) in self.bindings.drain() {
            self.scene.set_active(binding.location.node, false);
            binding
                .original_parent
                .restore(self.scene.as_ref(), binding.location.node);
            if let Err(e) = self.tracker.destroy_anchor(&binding.anchor) {
                warn!(
                    anchor = %binding.anchor.id,
                    location = %binding.location.name,
                    error = %e,
                    "anchor destruction failed during stop"
                );
            }
        }
        self.tracked.clear();

        for node in self.holders.drain(..) {
            self.scene.destroy_node(node);
        }

        info!("tracking stopped");
        Ok(())
    }

    /// Re-issue a track request for every tracked location.
    ///
    /// An idempotent refresh used to nudge stale localization. Failures
    /// are logged per location and do not stop the loop.
    pub fn try_update_tracking(&mut self) -> Result<(), TrackingError> {
        if self.bindings.is_empty() {
            error!("try_update_tracking with nothing tracked");
            return Err(TrackingError::NothingTracked);
        }

        for location in self.tracked_locations() {
            let Some(payload) = location.payload.as_ref() else {
                continue;
            };
            match self.tracker.try_track_anchor(payload) {
                Ok(anchor) => {
                    debug!(location = %location.name, anchor = %anchor.id, "tracking refreshed");
                }
                Err(e) => {
                    error!(location = %location.name, error = %e, "tracking refresh failed");
                }
            }
        }
        Ok(())
    }

    /// Advance the coordinator by one frame.
    ///
    /// Ticks the coverage discovery if one is in flight, then drains the
    /// state-change channel, applying each change synchronously in
    /// delivery order.
    pub fn update(&mut self) {
        self.tick_discovery();
        while let Ok(change) = self.state_rx.try_recv() {
            self.handle_state_change(change);
        }
    }

    fn tick_discovery(&mut self) {
        let Some(discovery) = self.discovery.as_mut() else {
            return;
        };
        match discovery.tick() {
            DiscoveryState::Done => {
                let result = discovery.take_result();
                self.discovery = None;
                match result {
                    Some(result) => self.realize_coverage(result),
                    None => error!("discovery finished without a result"),
                }
            }
            DiscoveryState::Failed => {
                let reason = discovery.error();
                error!(?reason, "coverage discovery failed");
                self.discovery = None;
            }
            _ => {}
        }
    }

    /// Turn a coverage result into tracked locations.
    ///
    /// Candidates are ranked by ascending centroid distance from the query
    /// point; candidates without a default anchor payload are skipped; at
    /// most [`MAX_TRACKING_REQUESTS`] are selected. Each selected area is
    /// wrapped in a fresh, inactive holder node and handed to the same
    /// tracking routine used for explicit targets.
    fn realize_coverage(&mut self, result: CoverageResult) {
        let ranked = rank_by_distance(result.query.point, result.areas);
        let selected = select_trackable(ranked, MAX_TRACKING_REQUESTS);
        if selected.is_empty() {
            warn!("coverage result contained no trackable candidates");
            return;
        }

        let mut locations = Vec::with_capacity(selected.len());
        for area in selected {
            let node = self.scene.create_node(&area.name);
            self.scene.set_active(node, false);
            self.holders.push(node);
            locations.push(Location::new(
                area.name,
                area.default_payload,
                Some(area.centroid),
                node,
            ));
        }
        info!(count = locations.len(), "coverage candidates selected");
        self.track_locations(&locations);
    }

    fn track_locations(&mut self, locations: &[Location]) {
        for location in locations {
            let Some(payload) = location.payload.as_ref().filter(|p| !p.is_empty()) else {
                error!(location = %location.name, "location has no usable payload, skipping");
                continue;
            };
            match self.tracker.try_track_anchor(payload) {
                Ok(anchor) => {
                    if self.bindings.contains_key(&anchor.id) {
                        error!(
                            location = %location.name,
                            anchor = %anchor.id,
                            "payload already bound to another location, skipping"
                        );
                        continue;
                    }
                    let original_parent = ParentRecord::capture(self.scene.as_ref(), location.node);
                    self.scene
                        .set_parent(location.node, Some(anchor.node), Transform::IDENTITY);
                    debug!(
                        location = %location.name,
                        anchor = %anchor.id,
                        "location bound to anchor"
                    );
                    self.bindings.insert(
                        anchor.id,
                        Binding {
                            anchor,
                            location: location.clone(),
                            original_parent,
                        },
                    );
                }
                Err(e) => {
                    error!(location = %location.name, error = %e, "track request failed");
                }
            }
        }
    }

    /// Apply one tracking-state change.
    ///
    /// Changes for unmapped anchors are strict no-ops. A Tracking state
    /// admits the location only below the configured capacity; at capacity
    /// the change is ignored and no event is raised. A non-Tracking state
    /// is meaningful only for locations already in the tracked set.
    fn handle_state_change(&mut self, change: AnchorStateChange) {
        let Some(binding) = self.bindings.get(&change.anchor) else {
            trace!(anchor = %change.anchor, "state change for unmapped anchor ignored");
            return;
        };
        let location = binding.location.clone();

        if change.state.is_tracking() {
            if self.tracked.contains(&location.id) {
                return;
            }
            if self.tracked.len() >= self.config.max_location_tracking_count {
                debug!(
                    location = %location.name,
                    capacity = self.config.max_location_tracking_count,
                    "tracked set at capacity, admission ignored"
                );
                return;
            }
            self.tracked.push(location.id);
            self.scene.set_active(location.node, true);
            info!(location = %location.name, "location tracking");
            let _ = self.event_tx.send(LocationTrackingEvent {
                location,
                tracking: true,
            });
        } else if let Some(pos) = self.tracked.iter().position(|id| *id == location.id) {
            self.tracked.remove(pos);
            self.scene.set_active(location.node, false);
            info!(location = %location.name, state = %change.state, "location lost tracking");
            let _ = self.event_tx.send(LocationTrackingEvent {
                location,
                tracking: false,
            });
        }
    }
}
