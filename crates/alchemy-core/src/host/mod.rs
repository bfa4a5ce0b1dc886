// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The object-hierarchy host contract.
//!
//! Alchemy does not own a scene graph. Whatever hosts it (a game engine, an
//! editor, a test harness) exposes its node hierarchy through [`ObjectHost`]:
//! nodes grouped into scenes, arranged in parent/child trees, each carrying
//! attached components. [`SceneGraph`] is a self-contained in-memory host.

mod scene_graph;

pub use scene_graph::SceneGraph;

use crate::types::Instance;
use std::fmt;

/// Identifies a node in the host hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Identifies a loaded scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u32);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// Narrow view of a host's node hierarchy.
///
/// All methods take `&self`; implementations provide their own interior
/// synchronization. Queries on unknown or destroyed nodes return empty
/// results rather than failing.
pub trait ObjectHost: Send + Sync {
    /// Creates a node. A node with a parent lives in its parent's scene; a
    /// root node lives in `scene`, or in the active scene when `None`.
    fn create_node(&self, name: &str, parent: Option<NodeId>, scene: Option<SceneId>) -> NodeId;

    /// Destroys a node and its whole subtree.
    fn destroy_node(&self, node: NodeId);

    /// Returns `true` if the node was destroyed or never existed.
    fn is_destroyed(&self, node: NodeId) -> bool;

    /// The node's name.
    fn name(&self, node: NodeId) -> Option<String>;

    /// Renames a node.
    fn set_name(&self, node: NodeId, name: &str);

    /// The node's parent, if it is not a root.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Re-parents a node. `None` turns it into a root of its current scene.
    fn set_parent(&self, node: NodeId, parent: Option<NodeId>);

    /// The direct children of a node.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// The scene a node belongs to. Persistent nodes belong to no scene.
    fn scene_of(&self, node: NodeId) -> Option<SceneId>;

    /// The root nodes of a scene.
    fn scene_roots(&self, scene: SceneId) -> Vec<NodeId>;

    /// Returns `true` if the scene is currently loaded.
    fn is_scene_loaded(&self, scene: SceneId) -> bool;

    /// Components attached to a node, in attachment order.
    fn components(&self, node: NodeId) -> Vec<Instance>;

    /// Attaches a component. Returns `false` if the node does not exist.
    fn attach_component(&self, node: NodeId, component: Instance) -> bool;

    /// The node's placement layer.
    fn layer(&self, node: NodeId) -> u32;

    /// Sets the node's placement layer.
    fn set_layer(&self, node: NodeId, layer: u32);

    /// Detaches a root node from its scene so that unloading the scene does
    /// not destroy it.
    fn make_persistent(&self, node: NodeId);

    /// The node followed by all its descendants, depth first.
    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if self.is_destroyed(current) {
                continue;
            }
            nodes.push(current);
            let mut children = self.children(current);
            children.reverse();
            pending.extend(children);
        }
        nodes
    }
}
