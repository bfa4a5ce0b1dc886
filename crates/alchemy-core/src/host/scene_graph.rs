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

use super::{NodeId, ObjectHost, SceneId};
use crate::types::Instance;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Node {
    name: String,
    parent: Option<NodeId>,
    scene: Option<SceneId>,
    children: Vec<NodeId>,
    components: Vec<Instance>,
    layer: u32,
}

#[derive(Debug)]
struct Scene {
    name: String,
    roots: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<NodeId, Node>,
    scenes: HashMap<SceneId, Scene>,
    active_scene: Option<SceneId>,
    next_node: u64,
    next_scene: u32,
}

impl Inner {
    fn detach(&mut self, node: NodeId) {
        let Some(entry) = self.nodes.get(&node) else {
            return;
        };
        match (entry.parent, entry.scene) {
            (Some(parent), _) => {
                if let Some(parent) = self.nodes.get_mut(&parent) {
                    parent.children.retain(|child| *child != node);
                }
            }
            (None, Some(scene)) => {
                if let Some(scene) = self.scenes.get_mut(&scene) {
                    scene.roots.retain(|root| *root != node);
                }
            }
            (None, None) => {}
        }
    }

    fn set_scene_recursive(&mut self, node: NodeId, scene: Option<SceneId>) {
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if let Some(entry) = self.nodes.get_mut(&current) {
                entry.scene = scene;
                pending.extend(entry.children.iter().copied());
            }
        }
    }

    fn remove_subtree(&mut self, node: NodeId) {
        self.detach(node);
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if let Some(entry) = self.nodes.remove(&current) {
                pending.extend(entry.children);
            }
        }
    }
}

/// An in-memory [`ObjectHost`].
///
/// Scenes must be loaded explicitly with [`load_scene`](SceneGraph::load_scene);
/// the first loaded scene becomes the active one.
#[derive(Debug, Default)]
pub struct SceneGraph {
    inner: Mutex<Inner>,
}

impl SceneGraph {
    /// Creates an empty host with no loaded scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads a new, empty scene.
    pub fn load_scene(&self, name: &str) -> SceneId {
        let mut inner = self.lock();
        inner.next_scene += 1;
        let id = SceneId(inner.next_scene);
        inner.scenes.insert(
            id,
            Scene {
                name: name.to_string(),
                roots: Vec::new(),
            },
        );
        if inner.active_scene.is_none() {
            inner.active_scene = Some(id);
        }
        log::debug!("Loaded scene '{name}' as {id}.");
        id
    }

    /// Unloads a scene, destroying every node it contains.
    ///
    /// Returns `false` if the scene was not loaded.
    pub fn unload_scene(&self, scene: SceneId) -> bool {
        let mut inner = self.lock();
        let Some(data) = inner.scenes.remove(&scene) else {
            return false;
        };
        for root in data.roots {
            inner.remove_subtree(root);
        }
        if inner.active_scene == Some(scene) {
            inner.active_scene = inner.scenes.keys().min().copied();
        }
        log::debug!("Unloaded scene '{}' ({scene}).", data.name);
        true
    }

    /// The scene that receives new root nodes by default.
    pub fn active_scene(&self) -> Option<SceneId> {
        self.lock().active_scene
    }

    /// Changes the active scene. Returns `false` if it is not loaded.
    pub fn set_active_scene(&self, scene: SceneId) -> bool {
        let mut inner = self.lock();
        if !inner.scenes.contains_key(&scene) {
            return false;
        }
        inner.active_scene = Some(scene);
        true
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.lock().nodes.len()
    }
}

impl ObjectHost for SceneGraph {
    fn create_node(&self, name: &str, parent: Option<NodeId>, scene: Option<SceneId>) -> NodeId {
        let mut inner = self.lock();
        inner.next_node += 1;
        let id = NodeId(inner.next_node);

        let parent = parent.filter(|p| inner.nodes.contains_key(p));
        let scene = match parent {
            Some(p) => inner.nodes.get(&p).and_then(|node| node.scene),
            None => scene
                .filter(|s| inner.scenes.contains_key(s))
                .or(inner.active_scene),
        };

        inner.nodes.insert(
            id,
            Node {
                name: name.to_string(),
                parent,
                scene,
                children: Vec::new(),
                components: Vec::new(),
                layer: 0,
            },
        );
        match parent {
            Some(p) => {
                if let Some(node) = inner.nodes.get_mut(&p) {
                    node.children.push(id);
                }
            }
            None => {
                if let Some(s) = scene.and_then(|s| inner.scenes.get_mut(&s)) {
                    s.roots.push(id);
                }
            }
        }
        id
    }

    fn destroy_node(&self, node: NodeId) {
        self.lock().remove_subtree(node);
    }

    fn is_destroyed(&self, node: NodeId) -> bool {
        !self.lock().nodes.contains_key(&node)
    }

    fn name(&self, node: NodeId) -> Option<String> {
        self.lock().nodes.get(&node).map(|n| n.name.clone())
    }

    fn set_name(&self, node: NodeId, name: &str) {
        if let Some(entry) = self.lock().nodes.get_mut(&node) {
            entry.name = name.to_string();
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.lock().nodes.get(&node).and_then(|n| n.parent)
    }

    fn set_parent(&self, node: NodeId, parent: Option<NodeId>) {
        let mut inner = self.lock();
        if !inner.nodes.contains_key(&node) {
            return;
        }
        if let Some(p) = parent {
            // Refuse to parent a node under itself or one of its descendants.
            let mut cursor = Some(p);
            while let Some(current) = cursor {
                if current == node {
                    return;
                }
                cursor = inner.nodes.get(&current).and_then(|n| n.parent);
            }
            if !inner.nodes.contains_key(&p) {
                return;
            }
        }

        let current_scene = inner.nodes.get(&node).and_then(|n| n.scene);
        inner.detach(node);
        let scene = match parent {
            Some(p) => inner.nodes.get(&p).and_then(|n| n.scene),
            None => current_scene,
        };
        if let Some(entry) = inner.nodes.get_mut(&node) {
            entry.parent = parent;
        }
        match parent {
            Some(p) => {
                if let Some(entry) = inner.nodes.get_mut(&p) {
                    entry.children.push(node);
                }
            }
            None => {
                if let Some(s) = scene.and_then(|s| inner.scenes.get_mut(&s)) {
                    s.roots.push(node);
                }
            }
        }
        inner.set_scene_recursive(node, scene);
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.lock()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn scene_of(&self, node: NodeId) -> Option<SceneId> {
        self.lock().nodes.get(&node).and_then(|n| n.scene)
    }

    fn scene_roots(&self, scene: SceneId) -> Vec<NodeId> {
        self.lock()
            .scenes
            .get(&scene)
            .map(|s| s.roots.clone())
            .unwrap_or_default()
    }

    fn is_scene_loaded(&self, scene: SceneId) -> bool {
        self.lock().scenes.contains_key(&scene)
    }

    fn components(&self, node: NodeId) -> Vec<Instance> {
        self.lock()
            .nodes
            .get(&node)
            .map(|n| n.components.clone())
            .unwrap_or_default()
    }

    fn attach_component(&self, node: NodeId, component: Instance) -> bool {
        match self.lock().nodes.get_mut(&node) {
            Some(entry) => {
                entry.components.push(component);
                true
            }
            None => false,
        }
    }

    fn layer(&self, node: NodeId) -> u32 {
        self.lock().nodes.get(&node).map(|n| n.layer).unwrap_or(0)
    }

    fn set_layer(&self, node: NodeId, layer: u32) {
        if let Some(entry) = self.lock().nodes.get_mut(&node) {
            entry.layer = layer;
        }
    }

    fn make_persistent(&self, node: NodeId) {
        let mut inner = self.lock();
        let is_root = inner
            .nodes
            .get(&node)
            .is_some_and(|n| n.parent.is_none());
        if !is_root {
            log::warn!("Only root nodes can be made persistent ({node}).");
            return;
        }
        inner.detach(node);
        inner.set_scene_recursive(node, None);
    }
}
