//! In-memory scene graph.
//!
//! The default [`SceneGraph`] implementation for tests and engine-less
//! hosts. Keeps parentage, local transforms, and activation flags in a map
//! behind a mutex; node identifiers are never reused.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::{NodeId, SceneGraph, Transform};

#[derive(Debug, Clone)]
struct NodeRecord {
    name: String,
    parent: Option<NodeId>,
    transform: Transform,
    active: bool,
}

/// An in-memory [`SceneGraph`].
#[derive(Debug, Default)]
pub struct MemorySceneGraph {
    nodes: Mutex<HashMap<NodeId, NodeRecord>>,
    next_id: AtomicU64,
}

impl MemorySceneGraph {
    /// Create an empty scene graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.lock().len()
    }

    /// Name the node was created with, if it exists.
    pub fn node_name(&self, node: NodeId) -> Option<String> {
        self.nodes.lock().get(&node).map(|n| n.name.clone())
    }
}

impl SceneGraph for MemorySceneGraph {
    fn create_node(&self, name: &str) -> NodeId {
        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.nodes.lock().insert(
            id,
            NodeRecord {
                name: name.to_string(),
                parent: None,
                transform: Transform::IDENTITY,
                active: true,
            },
        );
        id
    }

    fn destroy_node(&self, node: NodeId) {
        let mut nodes = self.nodes.lock();
        if nodes.remove(&node).is_none() {
            tracing::debug!(%node, "destroy_node on unknown node ignored");
            return;
        }
        // Children of a destroyed node become roots.
        for record in nodes.values_mut() {
            if record.parent == Some(node) {
                record.parent = None;
            }
        }
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.lock().get(&node).and_then(|n| n.parent)
    }

    fn local_transform(&self, node: NodeId) -> Transform {
        self.nodes
            .lock()
            .get(&node)
            .map(|n| n.transform)
            .unwrap_or(Transform::IDENTITY)
    }

    fn set_parent(&self, node: NodeId, parent: Option<NodeId>, transform: Transform) {
        let mut nodes = self.nodes.lock();
        if let Some(p) = parent {
            if !nodes.contains_key(&p) {
                tracing::warn!(%node, parent = %p, "set_parent to unknown parent ignored");
                return;
            }
        }
        if let Some(record) = nodes.get_mut(&node) {
            record.parent = parent;
            record.transform = transform;
        }
    }

    fn set_active(&self, node: NodeId, active: bool) {
        if let Some(record) = self.nodes.lock().get_mut(&node) {
            record.active = active;
        }
    }

    fn is_active(&self, node: NodeId) -> bool {
        self.nodes
            .lock()
            .get(&node)
            .map(|n| n.active)
            .unwrap_or(false)
    }

    fn exists(&self, node: NodeId) -> bool {
        self.nodes.lock().contains_key(&node)
    }
}
