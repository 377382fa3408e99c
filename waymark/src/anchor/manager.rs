//! Persistent anchor manager.
//!
//! Owns the registry of live anchors and bridges the native engine to the
//! rest of the session: track requests go down through [`NativeAnchorApi`],
//! state changes come back up through a bounded channel drained by the
//! location manager.
//!
//! The payload index enforces the one-live-anchor-per-payload invariant: a
//! track request for a payload that is already live refreshes the existing
//! anchor natively instead of minting a second one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::scene::SceneGraph;

use super::{
    Anchor, AnchorError, AnchorId, AnchorPayload, AnchorStateChange, AnchorTracker,
    NativeAnchorApi, NativeHandle, TrackingState,
};

#[derive(Debug, Clone)]
struct AnchorRecord {
    anchor: Anchor,
    state: TrackingState,
}

#[derive(Default)]
struct Registry {
    anchors: HashMap<AnchorId, AnchorRecord>,
    by_payload: HashMap<AnchorPayload, AnchorId>,
    by_handle: HashMap<NativeHandle, AnchorId>,
}

/// Manages live anchors over the native localization engine.
///
/// All mutation happens on the session update thread; the registry mutex
/// exists so the manager can be shared behind an `Arc` with the location
/// manager's `AnchorTracker` view.
pub struct PersistentAnchorManager {
    native: Arc<dyn NativeAnchorApi>,
    scene: Arc<dyn SceneGraph>,
    registry: Mutex<Registry>,
    state_tx: mpsc::Sender<AnchorStateChange>,
    next_id: AtomicU64,
}

impl PersistentAnchorManager {
    /// Create a manager over the given native engine and scene graph.
    ///
    /// `state_tx` is the bounded channel state changes are forwarded into;
    /// the session hands its receiving end to the location manager.
    pub fn new(
        native: Arc<dyn NativeAnchorApi>,
        scene: Arc<dyn SceneGraph>,
        state_tx: mpsc::Sender<AnchorStateChange>,
    ) -> Self {
        Self {
            native,
            scene,
            registry: Mutex::new(Registry::default()),
            state_tx,
            next_id: AtomicU64::new(1),
        }
    }

    /// Drain the native engine's pending state changes into the bounded
    /// channel, preserving delivery order.
    ///
    /// Called once per session update. Changes for handles that are no
    /// longer registered are dropped; a full channel drops the change with a
    /// warning rather than blocking the update thread.
    pub fn pump_native_changes(&self) {
        for (handle, state) in self.native.poll_state_changes() {
            let id = {
                let mut registry = self.registry.lock();
                let Some(&id) = registry.by_handle.get(&handle) else {
                    trace!(%handle, "state change for unregistered handle dropped");
                    continue;
                };
                if let Some(record) = registry.anchors.get_mut(&id) {
                    record.state = state;
                }
                id
            };

            match self.state_tx.try_send(AnchorStateChange { anchor: id, state }) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(change)) => {
                    warn!(
                        anchor = %change.anchor,
                        state = %change.state,
                        "state channel full, dropping change"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("state channel closed, consumer gone");
                    return;
                }
            }
        }
    }

    /// Last known tracking state for an anchor.
    pub fn tracking_state(&self, id: AnchorId) -> Option<TrackingState> {
        self.registry.lock().anchors.get(&id).map(|r| r.state)
    }

    /// Number of live anchors.
    pub fn live_anchor_count(&self) -> usize {
        self.registry.lock().anchors.len()
    }

    /// The live anchor for `payload`, if one exists.
    pub fn anchor_for_payload(&self, payload: &AnchorPayload) -> Option<Anchor> {
        let registry = self.registry.lock();
        let id = registry.by_payload.get(payload)?;
        registry.anchors.get(id).map(|r| r.anchor.clone())
    }
}

impl AnchorTracker for PersistentAnchorManager {
    fn try_track_anchor(&self, payload: &AnchorPayload) -> Result<Anchor, AnchorError> {
        if payload.is_empty() {
            return Err(AnchorError::EmptyPayload);
        }

        // Re-track of a live payload refreshes the existing anchor.
        let existing = {
            let registry = self.registry.lock();
            registry
                .by_payload
                .get(payload)
                .and_then(|id| registry.anchors.get(id))
                .map(|record| record.anchor.clone())
        };
        if let Some(anchor) = existing {
            self.native.refresh_anchor(anchor.handle)?;
            debug!(anchor = %anchor.id, "refreshed live anchor for payload");
            return Ok(anchor);
        }

        let handle = self.native.create_anchor(payload)?;
        let id = AnchorId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let node = self.scene.create_node(&format!("anchor-{}", id.0));
        let anchor = Anchor {
            id,
            payload: payload.clone(),
            handle,
            node,
        };

        let mut registry = self.registry.lock();
        registry.anchors.insert(
            id,
            AnchorRecord {
                anchor: anchor.clone(),
                // Limited until the engine reports otherwise.
                state: TrackingState::Limited,
            },
        );
        registry.by_payload.insert(payload.clone(), id);
        registry.by_handle.insert(handle, id);

        info!(anchor = %id, %handle, %node, "anchor created");
        Ok(anchor)
    }

    fn destroy_anchor(&self, anchor: &Anchor) -> Result<(), AnchorError> {
        let record = {
            let mut registry = self.registry.lock();
            let Some(record) = registry.anchors.remove(&anchor.id) else {
                return Err(AnchorError::UnknownAnchor(anchor.id));
            };
            registry.by_payload.remove(&record.anchor.payload);
            registry.by_handle.remove(&record.anchor.handle);
            record
        };

        // The scene node goes regardless of how the native release fares;
        // the registry entry is already gone.
        let native_result = self.native.destroy_anchor(record.anchor.handle);
        self.scene.destroy_node(record.anchor.node);

        match native_result {
            Ok(()) => {
                info!(anchor = %anchor.id, "anchor destroyed");
                Ok(())
            }
            Err(e) => {
                warn!(anchor = %anchor.id, error = %e, "native release failed during destroy");
                Err(e)
            }
        }
    }
}
