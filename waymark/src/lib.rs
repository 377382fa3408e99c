//! Waymark - persistent-anchor location tracking coordinator
//!
//! This library binds application-level geo-referenced locations to
//! native-backed localization anchors: it bounds how many locations may be
//! active at once, reconciles asynchronous tracking-state notifications
//! into scene activation, and can bootstrap location discovery from device
//! GPS plus a coverage service.
//!
//! # Layers
//!
//! - [`coord`] - WGS84 points and great-circle distance.
//! - [`scene`] - the scene-graph collaborator seam and parent restoration.
//! - [`anchor`] - anchor handles, the native engine seam, and the
//!   persistent anchor manager.
//! - [`coverage`] - coverage queries, ranking, and selection.
//! - [`discovery`] - the GPS-bootstrap state machine.
//! - [`location`] - locations, authoring, and the tracking coordinator.
//! - [`session`] - wiring it all together behind one update loop.
//!
//! The native localization engine, the device geolocation stack, the
//! coverage service, and the host scene graph are all reached through
//! traits; simulated implementations of each ship with the crate for
//! tests and engine-less hosts.

pub mod anchor;
pub mod config;
pub mod coord;
pub mod coverage;
pub mod discovery;
pub mod location;
pub mod scene;
pub mod session;

pub use anchor::{
    Anchor, AnchorId, AnchorPayload, AnchorTracker, NativeAnchorApi, PersistentAnchorManager,
    SimulatedAnchorEngine, TrackingState,
};
pub use config::{GpsStartParams, SessionConfig};
pub use coord::GeoPoint;
pub use coverage::{CoverageArea, CoverageClient, CoverageQuery, CoverageResult, StaticCoverageClient};
pub use discovery::{
    DiscoveryState, LocationService, PermissionStatus, ServiceStatus, SimulatedLocationService,
};
pub use location::{
    Location, LocationManager, LocationSpec, LocationTrackingEvent, TrackingError,
    MAX_TRACKING_REQUESTS,
};
pub use scene::{MemorySceneGraph, NodeId, ParentRecord, SceneGraph, Transform};
pub use session::Session;
