//! Persistent anchor layer.
//!
//! An anchor is a native-backed handle representing an active attempt to
//! localize a location. The native localization engine is opaque to this
//! crate; it is reached only through the [`NativeAnchorApi`] seam, which
//! exposes create/refresh/destroy plus a poll for asynchronous tracking
//! state changes.
//!
//! # Architecture
//!
//! - [`PersistentAnchorManager`] owns the live anchor registry. It enforces
//!   one live anchor per payload and forwards native state changes into a
//!   bounded channel, in delivery order.
//! - [`AnchorTracker`] is the narrow seam consumed by the location manager.
//!   It is the trait to mock when testing coordination logic in isolation.
//! - [`SimulatedAnchorEngine`] is a scriptable in-process implementation of
//!   [`NativeAnchorApi`] for tests and engine-less hosts.

mod manager;
mod simulated;

pub use manager::PersistentAnchorManager;
pub use simulated::SimulatedAnchorEngine;

use bytes::Bytes;
use thiserror::Error;

use crate::scene::NodeId;

/// Opaque serialized identifier understood by the native localization
/// engine.
///
/// Payloads are treated as raw bytes end to end; this crate never inspects
/// their content, only their emptiness.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnchorPayload(Bytes);

impl AnchorPayload {
    /// Wrap raw payload bytes.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Whether the payload carries no bytes.
    ///
    /// An empty payload cannot be tracked and is rejected at track time.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The raw payload bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for AnchorPayload {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for AnchorPayload {
    fn from(s: String) -> Self {
        Self(Bytes::from(s.into_bytes()))
    }
}

impl From<Vec<u8>> for AnchorPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl std::fmt::Display for AnchorPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Content is opaque; only the size is meaningful in logs.
        write!(f, "payload[{}B]", self.0.len())
    }
}

/// Tracking state reported by the native engine for an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    /// The anchor is localized with full confidence.
    Tracking,
    /// Localization is running but not yet confident.
    Limited,
    /// Tracking has been stopped.
    Stopped,
    /// Localization failed.
    Failed,
}

impl TrackingState {
    /// Whether this state admits a location into the tracked set.
    pub fn is_tracking(&self) -> bool {
        matches!(self, TrackingState::Tracking)
    }
}

impl std::fmt::Display for TrackingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrackingState::Tracking => "tracking",
            TrackingState::Limited => "limited",
            TrackingState::Stopped => "stopped",
            TrackingState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Identifier for a managed anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorId(pub u64);

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "anchor#{}", self.0)
    }
}

/// Opaque handle to a native anchor resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "native#{}", self.0)
    }
}

/// A live anchor: the managed handle for one localization attempt.
///
/// The anchor owns exactly one native resource and one scene node. Cloning
/// an `Anchor` clones the handle, not the resource; destruction goes through
/// [`AnchorTracker::destroy_anchor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    /// Managed identifier.
    pub id: AnchorId,
    /// The payload this anchor is localizing.
    pub payload: AnchorPayload,
    /// The native resource behind this anchor.
    pub handle: NativeHandle,
    /// Scene node locations are parented under while tracked.
    pub node: NodeId,
}

/// A tracking state change for one anchor, in native delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorStateChange {
    /// The anchor the change refers to.
    pub anchor: AnchorId,
    /// The new tracking state.
    pub state: TrackingState,
}

/// Errors from the anchor layer.
#[derive(Debug, Error)]
pub enum AnchorError {
    /// The payload carries no bytes and cannot identify a location.
    #[error("anchor payload is empty")]
    EmptyPayload,

    /// The anchor is not (or no longer) in the registry.
    #[error("unknown anchor {0}")]
    UnknownAnchor(AnchorId),

    /// The native handle is not known to the engine.
    #[error("unknown native handle {0}")]
    UnknownHandle(NativeHandle),

    /// The native engine rejected the operation.
    #[error("native anchor engine error: {0}")]
    Native(String),
}

/// The opaque native localization engine.
///
/// Everything behind this trait runs outside this crate. Implementations may
/// do background work on their own threads; state changes surface only
/// through [`poll_state_changes`](NativeAnchorApi::poll_state_changes),
/// which the anchor manager drains once per update.
pub trait NativeAnchorApi: Send + Sync {
    /// Begin localizing `payload`. Returns the owning native handle.
    fn create_anchor(&self, payload: &AnchorPayload) -> Result<NativeHandle, AnchorError>;

    /// Nudge localization for an existing anchor (idempotent re-track).
    fn refresh_anchor(&self, handle: NativeHandle) -> Result<(), AnchorError>;

    /// Release the native resource behind `handle`.
    fn destroy_anchor(&self, handle: NativeHandle) -> Result<(), AnchorError>;

    /// Drain pending tracking state changes, in the order the engine
    /// produced them.
    fn poll_state_changes(&self) -> Vec<(NativeHandle, TrackingState)>;
}

/// The seam between the location manager and the anchor layer.
///
/// The location manager never talks to [`NativeAnchorApi`] directly; mock
/// this trait to test coordination logic without an engine.
pub trait AnchorTracker: Send + Sync {
    /// Start (or refresh) tracking for `payload`.
    ///
    /// At most one live anchor exists per payload: a request for a payload
    /// that is already live refreshes it natively and returns the existing
    /// anchor.
    fn try_track_anchor(&self, payload: &AnchorPayload) -> Result<Anchor, AnchorError>;

    /// Stop tracking and release `anchor`.
    fn destroy_anchor(&self, anchor: &Anchor) -> Result<(), AnchorError>;
}
