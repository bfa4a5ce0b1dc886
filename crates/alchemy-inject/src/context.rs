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

//! Scoped override contexts.
//!
//! Contexts hold manually registered instances that take precedence over
//! every other provider. They form a tree: node-local contexts chain up to
//! their ancestors' contexts, then to the context of their scene, then to the
//! single global context.

use crate::scope::Scope;
use alchemy_core::{Instance, NodeId, ObjectHost, SceneId, TypeCatalog, TypeKey, TypeKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// What a context is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextOwner {
    /// The process-wide root context.
    Global,
    /// The context of a loaded scene.
    Scene(SceneId),
    /// A context local to a node subtree.
    Node(NodeId),
}

/// An override registered in a context.
#[derive(Debug, Clone)]
pub enum ContextEntry {
    /// A concrete instance.
    Object(Instance),
    /// A node whose attached components act as overrides.
    Node(NodeId),
}

impl ContextEntry {
    fn same(&self, other: &ContextEntry) -> bool {
        match (self, other) {
            (ContextEntry::Object(a), ContextEntry::Object(b)) => {
                a.key() == b.key() && a.same_object(b)
            }
            (ContextEntry::Node(a), ContextEntry::Node(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Instance> for ContextEntry {
    fn from(instance: Instance) -> Self {
        ContextEntry::Object(instance)
    }
}

impl From<NodeId> for ContextEntry {
    fn from(node: NodeId) -> Self {
        ContextEntry::Node(node)
    }
}

/// A set of override entries for one scope.
#[derive(Debug)]
pub struct InjectionContext {
    owner: ContextOwner,
    entries: RwLock<Vec<ContextEntry>>,
}

impl InjectionContext {
    fn new(owner: ContextOwner) -> Self {
        Self {
            owner,
            entries: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<ContextEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// What this context is attached to.
    pub fn owner(&self) -> ContextOwner {
        self.owner
    }

    /// Adds an entry. Returns `false` if it was already present.
    pub fn register(&self, entry: impl Into<ContextEntry>) -> bool {
        let entry = entry.into();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.iter().any(|existing| existing.same(&entry)) {
            return false;
        }
        entries.push(entry);
        true
    }

    /// Registers a shared value as an override for `T`.
    pub fn register_value<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) -> bool {
        self.register(Instance::new(value))
    }

    /// Removes an entry. Removing an absent entry is a no-op.
    pub fn unregister(&self, entry: &ContextEntry) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|existing| !existing.same(entry));
        entries.len() != before
    }

    /// Returns `true` if the entry is present.
    pub fn is_registered(&self, entry: &ContextEntry) -> bool {
        self.read().iter().any(|existing| existing.same(entry))
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// A snapshot of the entries, in registration order.
    pub fn entries(&self) -> Vec<ContextEntry> {
        self.read().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if the context has no entries.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Looks up `key` in this context only.
    ///
    /// Exact instances win, then (with `match_subtypes`) instances that
    /// upcast to `key`, then components attached to registered nodes.
    pub fn find_local(
        &self,
        key: TypeKey,
        match_subtypes: bool,
        catalog: &TypeCatalog,
        host: &dyn ObjectHost,
    ) -> Option<Instance> {
        let guard = self.read();
        let entries: &[ContextEntry] = &guard;
        let objects = move || {
            entries.iter().filter_map(|entry| match entry {
                ContextEntry::Object(instance) => Some(instance),
                ContextEntry::Node(_) => None,
            })
        };

        if let Some(exact) = objects().find(|instance| instance.key() == key) {
            return Some(exact.clone());
        }
        if match_subtypes {
            if let Some(cast) = objects().find_map(|instance| catalog.cast(instance, key)) {
                return Some(cast);
            }
        }

        if !matches!(
            catalog.kind_of(key),
            Some(TypeKind::Component | TypeKind::Abstract)
        ) {
            return None;
        }
        entries.iter().find_map(|entry| match entry {
            ContextEntry::Node(node) => host
                .components(*node)
                .iter()
                .find_map(|component| catalog.cast(component, key)),
            ContextEntry::Object(_) => None,
        })
    }

    /// Every registered instance of `key` in this context.
    pub fn get_all(&self, key: TypeKey, match_subtypes: bool, catalog: &TypeCatalog) -> Vec<Instance> {
        self.read()
            .iter()
            .filter_map(|entry| match entry {
                ContextEntry::Object(instance) if instance.key() == key => Some(instance.clone()),
                ContextEntry::Object(instance) if match_subtypes => catalog.cast(instance, key),
                _ => None,
            })
            .collect()
    }
}

/// The tree of contexts for one host.
pub struct ContextTree {
    catalog: TypeCatalog,
    host: Arc<dyn ObjectHost>,
    contexts: RwLock<HashMap<ContextOwner, Arc<InjectionContext>>>,
    global: Arc<InjectionContext>,
}

impl ContextTree {
    /// Creates a tree holding only the global context.
    pub fn new(catalog: TypeCatalog, host: Arc<dyn ObjectHost>) -> Self {
        Self {
            catalog,
            host,
            contexts: RwLock::new(HashMap::new()),
            global: Arc::new(InjectionContext::new(ContextOwner::Global)),
        }
    }

    fn get(&self, owner: ContextOwner) -> Option<Arc<InjectionContext>> {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&owner)
            .cloned()
    }

    fn remove(&self, owner: ContextOwner) -> bool {
        self.contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&owner)
            .is_some()
    }

    /// The global context.
    pub fn global(&self) -> Arc<InjectionContext> {
        Arc::clone(&self.global)
    }

    /// The context of a scene.
    ///
    /// Without `create`, a scene that has no context yet resolves to the
    /// global context. Contexts of unloaded scenes are dropped.
    pub fn for_scene(&self, scene: SceneId, create: bool) -> Arc<InjectionContext> {
        let owner = ContextOwner::Scene(scene);
        if !self.host.is_scene_loaded(scene) {
            if self.remove(owner) {
                log::debug!("Dropped injection context of unloaded {scene}.");
            }
            return self.global();
        }
        if let Some(existing) = self.get(owner) {
            return existing;
        }
        if !create {
            return self.global();
        }
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        contexts
            .entry(owner)
            .or_insert_with(|| {
                log::debug!("Created injection context for {scene}.");
                Arc::new(InjectionContext::new(owner))
            })
            .clone()
    }

    /// The nearest context for a node: its own, an ancestor's, or its scene's.
    pub fn for_node(&self, node: NodeId) -> Arc<InjectionContext> {
        if self.host.is_destroyed(node) {
            return self.global();
        }
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if let Some(context) = self.get(ContextOwner::Node(current)) {
                return context;
            }
            cursor = self.host.parent(current);
        }
        match self.host.scene_of(node) {
            Some(scene) => self.for_scene(scene, false),
            None => self.global(),
        }
    }

    /// The context a request in `scope` starts its lookup from.
    pub fn for_scope(&self, scope: Scope) -> Arc<InjectionContext> {
        match scope {
            Scope::Global => self.global(),
            Scope::Scene(scene) => self.for_scene(scene, false),
            Scope::Node(node) => self.for_node(node),
        }
    }

    /// Returns the local context of `node`, creating it if needed.
    pub fn create_local(&self, node: NodeId) -> Arc<InjectionContext> {
        let owner = ContextOwner::Node(node);
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        contexts
            .entry(owner)
            .or_insert_with(|| Arc::new(InjectionContext::new(owner)))
            .clone()
    }

    /// Drops the local context of `node`.
    pub fn remove_local(&self, node: NodeId) -> bool {
        self.remove(ContextOwner::Node(node))
    }

    /// The context a lookup falls back to after `context`.
    pub fn parent_of(&self, context: &InjectionContext) -> Option<Arc<InjectionContext>> {
        match context.owner() {
            ContextOwner::Global => None,
            ContextOwner::Scene(_) => Some(self.global()),
            ContextOwner::Node(node) => {
                if let Some(parent) = self.host.parent(node) {
                    return Some(self.for_node(parent));
                }
                let scene_context = self
                    .host
                    .scene_of(node)
                    .map(|scene| self.for_scene(scene, false));
                Some(scene_context.unwrap_or_else(|| self.global()))
            }
        }
    }

    /// Looks up `key` starting at the context for `scope` and walking up to
    /// the global context.
    pub fn try_get(&self, scope: Scope, key: TypeKey, match_subtypes: bool) -> Option<Instance> {
        let mut current = Some(self.for_scope(scope));
        while let Some(context) = current {
            if let Some(found) =
                context.find_local(key, match_subtypes, &self.catalog, self.host.as_ref())
            {
                log::trace!("Context {:?} supplied {}", context.owner(), key);
                return Some(found);
            }
            current = self.parent_of(&context);
        }
        None
    }

    /// Drops every context whose scene was unloaded or whose node was destroyed.
    ///
    /// Returns the number of dropped contexts.
    pub fn prune(&self) -> usize {
        let mut contexts = self.contexts.write().unwrap_or_else(PoisonError::into_inner);
        let before = contexts.len();
        contexts.retain(|owner, _| match owner {
            ContextOwner::Global => true,
            ContextOwner::Scene(scene) => self.host.is_scene_loaded(*scene),
            ContextOwner::Node(node) => !self.host.is_destroyed(*node),
        });
        before - contexts.len()
    }

    /// Number of scene and local contexts currently alive.
    pub fn len(&self) -> usize {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if only the global context exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ContextTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextTree")
            .field("global", &self.global.len())
            .field("scoped", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchemy_core::{SceneGraph, TypeInfo};

    trait Theme: Send + Sync {
        fn color(&self) -> &'static str;
    }

    struct Dark;
    struct Light;

    impl Theme for Dark {
        fn color(&self) -> &'static str {
            "black"
        }
    }

    impl Theme for Light {
        fn color(&self) -> &'static str {
            "white"
        }
    }

    struct Marker(u8);

    fn setup() -> (Arc<SceneGraph>, ContextTree, SceneId) {
        let catalog = TypeCatalog::new();
        catalog.declare::<dyn Theme>(TypeKind::Abstract);
        catalog.register(
            TypeInfo::declare::<Dark>(TypeKind::Plain).implements::<dyn Theme>(|d| d as Arc<dyn Theme>),
        );
        catalog.register(
            TypeInfo::declare::<Light>(TypeKind::Plain).implements::<dyn Theme>(|l| l as Arc<dyn Theme>),
        );
        catalog.declare::<Marker>(TypeKind::Component);
        let graph = Arc::new(SceneGraph::new());
        let scene = graph.load_scene("Main");
        let tree = ContextTree::new(catalog, graph.clone());
        (graph, tree, scene)
    }

    fn theme_of(tree: &ContextTree, scope: Scope) -> Option<&'static str> {
        tree.try_get(scope, TypeKey::of::<dyn Theme>(), true)
            .and_then(|found| found.downcast::<dyn Theme>())
            .map(|theme| theme.color())
    }

    #[test]
    fn test_register_is_deduplicated() {
        let (_, tree, _) = setup();
        let value = Instance::from_value(Dark);
        assert!(tree.global().register(value.clone()));
        assert!(!tree.global().register(value.clone()));
        assert_eq!(tree.global().len(), 1);
        assert!(tree.global().unregister(&ContextEntry::Object(value.clone())));
        assert!(!tree.global().unregister(&ContextEntry::Object(value)));
    }

    #[test]
    fn test_lookup_walks_up_to_global() {
        let (graph, tree, _) = setup();
        tree.global().register_value(Arc::new(Dark));
        let root = graph.create_node("root", None, None);
        let child = graph.create_node("child", Some(root), None);
        assert_eq!(theme_of(&tree, Scope::Node(child)), Some("black"));
        assert_eq!(theme_of(&tree, Scope::Global), Some("black"));
    }

    #[test]
    fn test_nearest_context_overrides_outer_ones() {
        let (graph, tree, scene) = setup();
        tree.global().register_value(Arc::new(Dark));
        let root = graph.create_node("root", None, None);
        let child = graph.create_node("child", Some(root), None);
        let sibling = graph.create_node("sibling", None, None);
        tree.create_local(root).register_value(Arc::new(Light));

        assert_eq!(theme_of(&tree, Scope::Node(child)), Some("white"));
        assert_eq!(theme_of(&tree, Scope::Node(sibling)), Some("black"));
        assert_eq!(theme_of(&tree, Scope::Scene(scene)), Some("black"));
    }

    #[test]
    fn test_scene_context_sits_between_nodes_and_global() {
        let (graph, tree, scene) = setup();
        tree.global().register_value(Arc::new(Dark));
        tree.for_scene(scene, true).register_value(Arc::new(Light));
        let node = graph.create_node("node", None, None);
        assert_eq!(theme_of(&tree, Scope::Node(node)), Some("white"));
        assert_eq!(
            tree.parent_of(&tree.for_scene(scene, false)).map(|c| c.owner()),
            Some(ContextOwner::Global)
        );
    }

    #[test]
    fn test_exact_match_beats_subtype_match() {
        let (_, tree, _) = setup();
        let global = tree.global();
        global.register_value(Arc::new(Light));
        let exact: Arc<dyn Theme> = Arc::new(Dark);
        global.register_value(exact);
        assert_eq!(theme_of(&tree, Scope::Global), Some("black"));
    }

    #[test]
    fn test_subtypes_only_when_requested() {
        let (_, tree, _) = setup();
        tree.global().register_value(Arc::new(Dark));
        assert!(tree
            .try_get(Scope::Global, TypeKey::of::<dyn Theme>(), false)
            .is_none());
    }

    #[test]
    fn test_registered_nodes_expose_components() {
        let (graph, tree, _) = setup();
        let holder = graph.create_node("holder", None, None);
        graph.attach_component(holder, Instance::from_value(Marker(7)));
        tree.global().register(holder);
        let found = tree
            .try_get(Scope::Global, TypeKey::of::<Marker>(), true)
            .and_then(|i| i.downcast::<Marker>())
            .map(|m| m.0);
        assert_eq!(found, Some(7));
    }

    #[test]
    fn test_get_all_lists_matching_instances() {
        let (_, tree, _) = setup();
        let global = tree.global();
        global.register_value(Arc::new(Dark));
        global.register_value(Arc::new(Light));
        let key = TypeKey::of::<dyn Theme>();
        assert_eq!(global.get_all(key, true, &TypeCatalog::new()).len(), 0);
        let catalog = {
            let catalog = TypeCatalog::new();
            catalog.register(
                TypeInfo::declare::<Dark>(TypeKind::Plain)
                    .implements::<dyn Theme>(|d| d as Arc<dyn Theme>),
            );
            catalog
        };
        assert_eq!(global.get_all(key, true, &catalog).len(), 1);
        assert_eq!(global.get_all(key, false, &catalog).len(), 0);
    }

    #[test]
    fn test_unloaded_scene_contexts_are_dropped() {
        let (graph, tree, scene) = setup();
        tree.for_scene(scene, true).register_value(Arc::new(Light));
        let node = graph.create_node("node", None, None);
        tree.create_local(node);
        assert_eq!(tree.len(), 2);

        graph.unload_scene(scene);
        assert_eq!(tree.prune(), 2);
        assert_eq!(tree.for_scene(scene, true).owner(), ContextOwner::Global);
    }
}
