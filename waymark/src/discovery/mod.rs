//! GPS-bootstrapped coverage discovery.
//!
//! When a tracking session starts with no explicit target locations, the
//! session must first find out where the device is and what is trackable
//! nearby. That bootstrap is a polled state machine ticked once per frame:
//!
//! ```text
//! AwaitingPermission --[granted]--> AwaitingServiceStart
//! AwaitingPermission --[denied]--> Failed
//! AwaitingServiceStart --[service running]--> AwaitingFix
//! AwaitingServiceStart --[service failed]--> Failed
//! AwaitingFix --[fix available, query issued]--> QueryIssued
//! QueryIssued --[result delivered]--> Done
//! QueryIssued --[client dropped the query]--> Failed
//! any --[cancellation]--> Failed
//! ```
//!
//! Permission is requested at most once; denial is terminal for this
//! attempt with no automatic retry. The same holds for a failed device
//! location service: the caller re-enters discovery by calling
//! `start_tracking` again.

mod simulated;

pub use simulated::SimulatedLocationService;

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::GpsStartParams;
use crate::coord::GeoPoint;
use crate::coverage::{CoverageClient, CoverageQuery, CoverageResult};

/// Status of the device location permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    /// Not yet granted or denied; a request may be in flight.
    Pending,
    /// The user granted location access.
    Granted,
    /// The user denied location access.
    Denied,
}

/// Status of the device location service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Not running; a start request is needed.
    Stopped,
    /// Start requested, not yet delivering fixes.
    Initializing,
    /// Running and able to deliver fixes.
    Running,
    /// The service failed and will not recover on its own.
    Failed,
}

/// Device location seam.
///
/// Wraps whatever the host platform provides for geolocation: permission
/// handling, service lifecycle, and the last known fix. All methods are
/// non-blocking polls; the discovery state machine calls them once per
/// tick.
pub trait LocationService: Send + Sync {
    /// Current permission status.
    fn permission_status(&self) -> PermissionStatus;

    /// Ask the platform to prompt for location permission.
    ///
    /// Asynchronous; the outcome surfaces through `permission_status`.
    fn request_permission(&self);

    /// Current service status.
    fn service_status(&self) -> ServiceStatus;

    /// Ask the service to start delivering fixes.
    fn start(&self, params: GpsStartParams);

    /// Last known fix, if the service has produced one.
    fn last_fix(&self) -> Option<GeoPoint>;
}

/// States of the discovery bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    /// Waiting for location permission.
    AwaitingPermission,
    /// Waiting for the device location service to run.
    AwaitingServiceStart,
    /// Waiting for a GPS fix.
    AwaitingFix,
    /// Coverage query sent, waiting for the result.
    QueryIssued,
    /// A coverage result is available.
    Done,
    /// The attempt ended without a result.
    Failed,
}

impl DiscoveryState {
    /// Whether the machine will make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DiscoveryState::Done | DiscoveryState::Failed)
    }
}

/// Why a discovery attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    /// The user denied location permission.
    #[error("location permission denied")]
    PermissionDenied,

    /// The device location service failed.
    #[error("device location service failed")]
    ServiceFailed,

    /// The coverage client dropped the query without answering.
    #[error("coverage query was dropped without a result")]
    CoverageUnavailable,

    /// The attempt was cancelled from outside.
    #[error("discovery cancelled")]
    Cancelled,
}

/// One GPS-bootstrap attempt, ticked once per frame.
pub struct CoverageDiscovery {
    service: Arc<dyn LocationService>,
    client: Arc<dyn CoverageClient>,
    radius_meters: f64,
    gps: GpsStartParams,
    cancellation: CancellationToken,
    state: DiscoveryState,
    permission_requested: bool,
    start_requested: bool,
    pending: Option<oneshot::Receiver<CoverageResult>>,
    result: Option<CoverageResult>,
    error: Option<DiscoveryError>,
}

impl CoverageDiscovery {
    /// Begin a discovery attempt.
    ///
    /// Nothing happens until the first [`tick`](CoverageDiscovery::tick).
    pub fn new(
        service: Arc<dyn LocationService>,
        client: Arc<dyn CoverageClient>,
        radius_meters: f64,
        gps: GpsStartParams,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            service,
            client,
            radius_meters,
            gps,
            cancellation,
            state: DiscoveryState::AwaitingPermission,
            permission_requested: false,
            start_requested: false,
            pending: None,
            result: None,
            error: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// The failure reason, once in [`DiscoveryState::Failed`].
    pub fn error(&self) -> Option<DiscoveryError> {
        self.error
    }

    /// Cancel the attempt; the next tick terminates it.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Take the coverage result, once in [`DiscoveryState::Done`].
    pub fn take_result(&mut self) -> Option<CoverageResult> {
        self.result.take()
    }

    /// Advance the state machine by one poll.
    ///
    /// Each tick performs at most one state transition, matching a
    /// once-per-frame polling cadence. Terminal states stay put.
    pub fn tick(&mut self) -> DiscoveryState {
        if self.state.is_terminal() {
            return self.state;
        }
        if self.cancellation.is_cancelled() {
            debug!("coverage discovery cancelled");
            self.fail(DiscoveryError::Cancelled);
            return self.state;
        }

        match self.state {
            DiscoveryState::AwaitingPermission => self.tick_permission(),
            DiscoveryState::AwaitingServiceStart => self.tick_service_start(),
            DiscoveryState::AwaitingFix => self.tick_fix(),
            DiscoveryState::QueryIssued => self.tick_query(),
            DiscoveryState::Done | DiscoveryState::Failed => {}
        }
        self.state
    }

    fn tick_permission(&mut self) {
        match self.service.permission_status() {
            PermissionStatus::Granted => {
                debug!("location permission granted");
                self.state = DiscoveryState::AwaitingServiceStart;
            }
            PermissionStatus::Denied => {
                error!("location permission denied, discovery aborted");
                self.fail(DiscoveryError::PermissionDenied);
            }
            PermissionStatus::Pending => {
                if !self.permission_requested {
                    info!("requesting location permission");
                    self.service.request_permission();
                    self.permission_requested = true;
                }
            }
        }
    }

    fn tick_service_start(&mut self) {
        match self.service.service_status() {
            ServiceStatus::Running => {
                debug!("location service running");
                self.state = DiscoveryState::AwaitingFix;
            }
            ServiceStatus::Failed => {
                error!("location service failed, discovery aborted");
                self.fail(DiscoveryError::ServiceFailed);
            }
            ServiceStatus::Stopped => {
                if !self.start_requested {
                    info!(
                        accuracy_m = self.gps.accuracy_meters,
                        update_distance_m = self.gps.update_distance_meters,
                        "starting location service"
                    );
                    self.service.start(self.gps);
                    self.start_requested = true;
                }
            }
            ServiceStatus::Initializing => {}
        }
    }

    fn tick_fix(&mut self) {
        if self.service.service_status() == ServiceStatus::Failed {
            error!("location service failed while awaiting fix");
            self.fail(DiscoveryError::ServiceFailed);
            return;
        }
        if let Some(point) = self.service.last_fix() {
            info!(%point, radius_m = self.radius_meters, "fix acquired, requesting coverage");
            let query = CoverageQuery {
                point,
                radius_meters: self.radius_meters,
            };
            self.pending = Some(self.client.request_coverage(query));
            self.state = DiscoveryState::QueryIssued;
        }
    }

    fn tick_query(&mut self) {
        let Some(rx) = self.pending.as_mut() else {
            // QueryIssued without a receiver cannot happen through tick();
            // treat it as a dropped query if it ever does.
            self.fail(DiscoveryError::CoverageUnavailable);
            return;
        };
        match rx.try_recv() {
            Ok(result) => {
                info!(candidates = result.areas.len(), "coverage result received");
                self.pending = None;
                self.result = Some(result);
                self.state = DiscoveryState::Done;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                error!("coverage client dropped the query");
                self.pending = None;
                self.fail(DiscoveryError::CoverageUnavailable);
            }
        }
    }

    fn fail(&mut self, error: DiscoveryError) {
        self.state = DiscoveryState::Failed;
        self.error = Some(error);
    }
}
