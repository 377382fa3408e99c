//! Locations and the tracking coordinator.
//!
//! A location is the application-level digital twin of a physical place,
//! identified to the native localization engine by an opaque anchor
//! payload. The [`LocationManager`] is the heart of the crate: it decides
//! which locations to attempt tracking for, bounds how many may be active
//! at once, and reconciles asynchronous tracking-state notifications into
//! activation and deactivation of scene content.
//!
//! # Architecture
//!
//! - Callers either hand the manager an explicit target list
//!   ([`LocationManager::set_target_locations`]) or leave it empty, in
//!   which case [`LocationManager::start_tracking`] bootstraps a coverage
//!   discovery from device GPS.
//! - Tracking-state changes arrive over a bounded channel fed by the
//!   persistent anchor manager and are applied one at a time, in delivery
//!   order, from [`LocationManager::update`].
//! - Consumers observe activation flips through a broadcast of
//!   [`LocationTrackingEvent`]s.

mod authoring;
mod manager;

pub use authoring::{AuthoringError, LocationSpec};
pub use manager::LocationManager;

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use crate::anchor::AnchorPayload;
use crate::coord::GeoPoint;
use crate::scene::NodeId;

/// Hard cap on locations per tracking request.
///
/// A request for more is a caller error and is rejected outright, never
/// truncated. Coverage selection stops at the same bound.
pub const MAX_TRACKING_REQUESTS: usize = 5;

static NEXT_LOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier for a location, unique within the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(pub u64);

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "location#{}", self.0)
    }
}

/// A named, georeferenced digital twin of a physical place.
///
/// Created by the host (directly or through [`LocationSpec`] authoring) or
/// synthesized from a coverage result. The location's content lives under
/// its scene node; the coordinator activates that node only while the
/// location is tracked.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    /// Identifier, minted at construction.
    pub id: LocationId,
    /// Human-readable name, used in logs and events.
    pub name: String,
    /// Payload identifying this place to the localization engine.
    ///
    /// A location without a usable payload cannot be tracked; track
    /// requests for it fail at track time.
    pub payload: Option<AnchorPayload>,
    /// Geographic position, when known.
    pub geo: Option<GeoPoint>,
    /// Scene node holding the location's content.
    pub node: NodeId,
}

impl Location {
    /// Create a location over an existing scene node.
    pub fn new(
        name: impl Into<String>,
        payload: Option<AnchorPayload>,
        geo: Option<GeoPoint>,
        node: NodeId,
    ) -> Self {
        Self {
            id: LocationId(NEXT_LOCATION_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.into(),
            payload,
            geo,
            node,
        }
    }

    /// Whether the location carries a payload the engine can localize.
    pub fn is_trackable(&self) -> bool {
        self.payload.as_ref().is_some_and(|p| !p.is_empty())
    }
}

/// A tracking transition for one location.
///
/// Raised when a location enters the tracked set (`tracking == true`) or
/// leaves it (`tracking == false`). Wholesale teardown via
/// [`LocationManager::stop_tracking`] clears state without raising events.
#[derive(Debug, Clone)]
pub struct LocationTrackingEvent {
    /// The location whose tracking changed.
    pub location: Location,
    /// Whether the location is now tracked.
    pub tracking: bool,
}

/// Caller-misuse errors from the tracking coordinator.
///
/// Every variant is a logged no-op: state is unchanged and no provider
/// call has been made. Provider and discovery failures are not errors at
/// this surface; they degrade to "this location did not start tracking"
/// and are reported through logs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackingError {
    /// `start_tracking` while one or more anchors are already live.
    #[error("already tracking {0} location(s), stop tracking first")]
    AlreadyTracking(usize),

    /// More locations requested than the per-request cap allows.
    #[error("{requested} locations requested, at most {max} per request")]
    TooManyRequested {
        /// Locations in the target list.
        requested: usize,
        /// The hard cap ([`MAX_TRACKING_REQUESTS`]).
        max: usize,
    },

    /// `stop_tracking` with no anchors, holders, or discovery to stop.
    #[error("nothing is being tracked or discovered")]
    NothingToStop,

    /// `try_update_tracking` with no live anchors.
    #[error("no locations are currently tracked")]
    NothingTracked,

    /// `start_tracking` while a coverage discovery is in flight or its
    /// results are still held.
    #[error("a coverage discovery is in progress or its results are still held")]
    DiscoveryInProgress,
}
