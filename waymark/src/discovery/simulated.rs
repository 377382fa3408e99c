//! Scriptable device location service.
//!
//! Stands in for the host platform's geolocation stack in tests and
//! engine-less hosts. Permission, service status, and the last fix are all
//! set directly; the discovery state machine observes them through the
//! [`LocationService`] polls like it would on a device.

use parking_lot::Mutex;

use crate::config::GpsStartParams;
use crate::coord::GeoPoint;

use super::{LocationService, PermissionStatus, ServiceStatus};

struct ServiceInner {
    permission: PermissionStatus,
    service: ServiceStatus,
    fix: Option<GeoPoint>,
    permission_requests: usize,
    start_requests: Vec<GpsStartParams>,
}

impl Default for ServiceInner {
    fn default() -> Self {
        // Permission granted and service running, so the happy path needs
        // no scripting beyond a fix.
        Self {
            permission: PermissionStatus::Granted,
            service: ServiceStatus::Running,
            fix: None,
            permission_requests: 0,
            start_requests: Vec::new(),
        }
    }
}

/// A simulated [`LocationService`].
#[derive(Default)]
pub struct SimulatedLocationService {
    inner: Mutex<ServiceInner>,
}

impl SimulatedLocationService {
    /// Create a service with permission granted, the service running, and
    /// no fix yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the permission status the next poll will observe.
    pub fn set_permission(&self, status: PermissionStatus) {
        self.inner.lock().permission = status;
    }

    /// Set the service status the next poll will observe.
    pub fn set_service_status(&self, status: ServiceStatus) {
        self.inner.lock().service = status;
    }

    /// Set (or clear) the last known fix.
    pub fn set_fix(&self, fix: Option<GeoPoint>) {
        self.inner.lock().fix = fix;
    }

    /// How many times permission has been requested.
    pub fn permission_request_count(&self) -> usize {
        self.inner.lock().permission_requests
    }

    /// Every start request received so far, in order.
    pub fn start_requests(&self) -> Vec<GpsStartParams> {
        self.inner.lock().start_requests.clone()
    }
}

impl LocationService for SimulatedLocationService {
    fn permission_status(&self) -> PermissionStatus {
        self.inner.lock().permission
    }

    fn request_permission(&self) {
        self.inner.lock().permission_requests += 1;
    }

    fn service_status(&self) -> ServiceStatus {
        self.inner.lock().service
    }

    fn start(&self, params: GpsStartParams) {
        let mut inner = self.inner.lock();
        inner.start_requests.push(params);
        if inner.service == ServiceStatus::Stopped {
            inner.service = ServiceStatus::Initializing;
        }
    }

    fn last_fix(&self) -> Option<GeoPoint> {
        self.inner.lock().fix
    }
}
