//! Scene-graph collaborator seam.
//!
//! The tracking coordinator never owns rendering. It talks to the host
//! engine's scene graph through the [`SceneGraph`] trait: node creation and
//! destruction, explicit reparenting with a local transform, and content
//! activation. Original parentage is captured as an explicit value record
//! ([`ParentRecord`]) so teardown can restore it without relying on any
//! engine-side state.

mod memory;

pub use memory::MemorySceneGraph;

use glam::{Quat, Vec3};

/// Opaque identifier for a scene-graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// A local transform relative to a node's parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Translation relative to the parent.
    pub translation: Vec3,
    /// Rotation relative to the parent.
    pub rotation: Quat,
}

impl Transform {
    /// The identity transform.
    pub const IDENTITY: Transform = Transform {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// The scene-graph parentage a node held before tracking reparented it.
///
/// Captured when a location is bound to an anchor, restored verbatim when
/// tracking stops. Stored alongside the anchor mapping and removed
/// atomically with it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentRecord {
    /// Parent before reparenting; `None` for a scene root.
    pub parent: Option<NodeId>,
    /// Local transform relative to that parent.
    pub transform: Transform,
}

impl ParentRecord {
    /// Capture the current parentage of `node`.
    pub fn capture(scene: &dyn SceneGraph, node: NodeId) -> Self {
        Self {
            parent: scene.parent_of(node),
            transform: scene.local_transform(node),
        }
    }

    /// Restore the captured parentage onto `node`.
    pub fn restore(&self, scene: &dyn SceneGraph, node: NodeId) {
        scene.set_parent(node, self.parent, self.transform);
    }
}

/// Host-engine scene graph operations the coordinator depends on.
///
/// Implementations must be cheap to call from the update thread. The
/// coordinator issues all mutations from a single thread; implementations
/// only need interior mutability, not ordering guarantees.
pub trait SceneGraph: Send + Sync {
    /// Create a new root-level node, initially active.
    fn create_node(&self, name: &str) -> NodeId;

    /// Destroy a node. Destroying an unknown node is a no-op.
    fn destroy_node(&self, node: NodeId);

    /// Current parent of `node`, `None` for roots or unknown nodes.
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;

    /// Local transform of `node` relative to its parent.
    fn local_transform(&self, node: NodeId) -> Transform;

    /// Reparent `node` with the given local transform.
    fn set_parent(&self, node: NodeId, parent: Option<NodeId>, transform: Transform);

    /// Activate or deactivate the node's content.
    fn set_active(&self, node: NodeId, active: bool);

    /// Whether the node's content is active.
    fn is_active(&self, node: NodeId) -> bool;

    /// Whether the node exists.
    fn exists(&self, node: NodeId) -> bool;
}
