//! Session configuration.
//!
//! All tunables for a tracking session live in `SessionConfig`, an explicit
//! value passed into the managers at construction time. There is no
//! process-wide settings object; two sessions with different configurations
//! can coexist in one process.

use serde::{Deserialize, Serialize};

/// Default maximum number of locations in the tracked set.
///
/// Only this many locations may render simultaneously. A Tracking state
/// update arriving while the set is full is ignored.
pub const DEFAULT_MAX_TRACKED_LOCATIONS: usize = 1;

/// Default radius for coverage discovery queries, in meters.
pub const DEFAULT_COVERAGE_RADIUS_METERS: f64 = 500.0;

/// Default desired GPS accuracy when starting the device location service.
pub const DEFAULT_GPS_ACCURACY_METERS: f64 = 10.0;

/// Default distance the device must move before a new GPS fix is reported.
pub const DEFAULT_GPS_UPDATE_DISTANCE_METERS: f64 = 10.0;

/// Default capacity of the bounded anchor state-change channel.
pub const DEFAULT_STATE_CHANNEL_CAPACITY: usize = 32;

/// Default capacity of the location tracking event broadcast channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 16;

/// Parameters handed to the device location service when starting it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsStartParams {
    /// Desired horizontal accuracy in meters.
    pub accuracy_meters: f64,
    /// Minimum movement before a new fix is delivered, in meters.
    pub update_distance_meters: f64,
}

impl Default for GpsStartParams {
    fn default() -> Self {
        Self {
            accuracy_meters: DEFAULT_GPS_ACCURACY_METERS,
            update_distance_meters: DEFAULT_GPS_UPDATE_DISTANCE_METERS,
        }
    }
}

/// Configuration for a tracking session.
///
/// Passed by value into [`Session::start`](crate::session::Session::start)
/// and from there into the location manager and coverage discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of locations allowed in the tracked set.
    ///
    /// Admission semantics are exact for any value: a Tracking update that
    /// would exceed this count is ignored and raises no event.
    pub max_location_tracking_count: usize,

    /// Radius used for coverage discovery queries, in meters.
    pub coverage_radius_meters: f64,

    /// GPS parameters used when discovery must start the location service.
    pub gps: GpsStartParams,

    /// Capacity of the bounded native state-change channel.
    pub state_channel_capacity: usize,

    /// Capacity of the tracking event broadcast channel.
    pub event_channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_location_tracking_count: DEFAULT_MAX_TRACKED_LOCATIONS,
            coverage_radius_meters: DEFAULT_COVERAGE_RADIUS_METERS,
            gps: GpsStartParams::default(),
            state_channel_capacity: DEFAULT_STATE_CHANNEL_CAPACITY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Set the maximum number of simultaneously tracked locations.
    pub fn with_max_tracking_count(mut self, count: usize) -> Self {
        self.max_location_tracking_count = count;
        self
    }

    /// Set the coverage query radius.
    pub fn with_coverage_radius_meters(mut self, radius: f64) -> Self {
        self.coverage_radius_meters = radius;
        self
    }

    /// Set the GPS start parameters.
    pub fn with_gps(mut self, gps: GpsStartParams) -> Self {
        self.gps = gps;
        self
    }
}
