//! Scriptable in-process native anchor engine.
//!
//! Stands in for the real localization engine in tests and engine-less
//! hosts. Tests script tracking outcomes by payload and the engine delivers
//! them through `poll_state_changes` like the real engine would.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::debug;

use super::{AnchorError, AnchorPayload, NativeAnchorApi, NativeHandle, TrackingState};

#[derive(Default)]
struct EngineInner {
    next_handle: u64,
    live: HashMap<NativeHandle, AnchorPayload>,
    pending: Vec<(NativeHandle, TrackingState)>,
    failing_payloads: HashSet<AnchorPayload>,
    fail_next_create: bool,
    created: usize,
    refreshed: usize,
    destroyed: usize,
}

/// A simulated [`NativeAnchorApi`].
///
/// Anchors never change state on their own; tests push state changes with
/// [`set_state_by_payload`](SimulatedAnchorEngine::set_state_by_payload) and
/// drive delivery through the session's update pump.
#[derive(Default)]
pub struct SimulatedAnchorEngine {
    inner: Mutex<EngineInner>,
}

impl SimulatedAnchorEngine {
    /// Create an idle engine with no live anchors.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation on `payload` fail with a native error.
    pub fn fail_payload(&self, payload: &AnchorPayload) {
        self.inner.lock().failing_payloads.insert(payload.clone());
    }

    /// Make only the next `create_anchor` call fail.
    pub fn fail_next_create(&self) {
        self.inner.lock().fail_next_create = true;
    }

    /// Queue a state change for the anchor localizing `payload`.
    ///
    /// Returns `false` if no live anchor holds that payload.
    pub fn set_state_by_payload(&self, payload: &AnchorPayload, state: TrackingState) -> bool {
        let mut inner = self.inner.lock();
        let handle = inner
            .live
            .iter()
            .find(|(_, p)| *p == payload)
            .map(|(h, _)| *h);
        match handle {
            Some(handle) => {
                inner.pending.push((handle, state));
                true
            }
            None => false,
        }
    }

    /// Queue a state change for a raw handle, live or not.
    ///
    /// Lets tests exercise delivery of stale changes.
    pub fn push_state(&self, handle: NativeHandle, state: TrackingState) {
        self.inner.lock().pending.push((handle, state));
    }

    /// Number of anchors the engine currently holds.
    pub fn live_count(&self) -> usize {
        self.inner.lock().live.len()
    }

    /// Total successful `create_anchor` calls.
    pub fn created_count(&self) -> usize {
        self.inner.lock().created
    }

    /// Total successful `refresh_anchor` calls.
    pub fn refreshed_count(&self) -> usize {
        self.inner.lock().refreshed
    }

    /// Total successful `destroy_anchor` calls.
    pub fn destroyed_count(&self) -> usize {
        self.inner.lock().destroyed
    }
}

impl NativeAnchorApi for SimulatedAnchorEngine {
    fn create_anchor(&self, payload: &AnchorPayload) -> Result<NativeHandle, AnchorError> {
        let mut inner = self.inner.lock();
        if inner.fail_next_create {
            inner.fail_next_create = false;
            return Err(AnchorError::Native("scripted create failure".to_string()));
        }
        if inner.failing_payloads.contains(payload) {
            return Err(AnchorError::Native(format!(
                "scripted failure for {}",
                payload
            )));
        }
        inner.next_handle += 1;
        let handle = NativeHandle(inner.next_handle);
        inner.live.insert(handle, payload.clone());
        inner.created += 1;
        debug!(%handle, "simulated anchor created");
        Ok(handle)
    }

    fn refresh_anchor(&self, handle: NativeHandle) -> Result<(), AnchorError> {
        let mut inner = self.inner.lock();
        let Some(payload) = inner.live.get(&handle).cloned() else {
            return Err(AnchorError::UnknownHandle(handle));
        };
        if inner.failing_payloads.contains(&payload) {
            return Err(AnchorError::Native(format!(
                "scripted refresh failure for {}",
                payload
            )));
        }
        inner.refreshed += 1;
        Ok(())
    }

    fn destroy_anchor(&self, handle: NativeHandle) -> Result<(), AnchorError> {
        let mut inner = self.inner.lock();
        if inner.live.remove(&handle).is_none() {
            return Err(AnchorError::UnknownHandle(handle));
        }
        inner.destroyed += 1;
        debug!(%handle, "simulated anchor destroyed");
        Ok(())
    }

    fn poll_state_changes(&self) -> Vec<(NativeHandle, TrackingState)> {
        std::mem::take(&mut self.inner.lock().pending)
    }
}
