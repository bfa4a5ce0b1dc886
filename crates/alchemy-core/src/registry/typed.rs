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

use super::Registry;
use crate::types::{Instance, TypeCatalog, TypeKey};

/// A registry keyed by type, with subtype-aware lookup.
///
/// Lookup prefers an exact key. Failing that, and when subtype matching is
/// requested, the first registered key (in insertion order) that is a
/// subtype of the requested type wins.
#[derive(Debug, Clone)]
pub struct TypeRegistry<V> {
    catalog: TypeCatalog,
    inner: Registry<TypeKey, V>,
}

impl<V> TypeRegistry<V> {
    /// Creates an empty registry resolving subtypes through `catalog`.
    #[must_use]
    pub fn new(catalog: TypeCatalog) -> Self {
        Self {
            catalog,
            inner: Registry::new(),
        }
    }

    /// The catalog used for subtype checks.
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Finds the registered key that answers a request for `key`.
    #[must_use]
    pub fn resolve_key(&self, key: TypeKey, match_subtypes: bool) -> Option<TypeKey> {
        if self.inner.is_registered(&key) {
            return Some(key);
        }
        if !match_subtypes {
            return None;
        }
        self.inner
            .keys()
            .copied()
            .find(|candidate| self.catalog.is_subtype(*candidate, key))
    }

    /// Registers a value. See [`Registry::register`].
    pub fn register(&mut self, key: TypeKey, value: V, overwrite: bool) -> bool {
        self.inner.register(key, value, overwrite)
    }

    /// Removes the exact key.
    pub fn unregister(&mut self, key: TypeKey) -> Option<V> {
        self.inner.unregister(&key)
    }

    /// Returns `true` if some key answers a request for `key`.
    #[must_use]
    pub fn is_registered(&self, key: TypeKey, match_subtypes: bool) -> bool {
        self.resolve_key(key, match_subtypes).is_some()
    }

    /// Returns the resolved key together with its value.
    #[must_use]
    pub fn try_get(&self, key: TypeKey, match_subtypes: bool) -> Option<(TypeKey, &V)> {
        let resolved = self.resolve_key(key, match_subtypes)?;
        self.inner.try_get(&resolved).map(|value| (resolved, value))
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&TypeKey, &V)> + '_ {
        self.inner.iter()
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.inner.keys().copied()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl TypeRegistry<Instance> {
    /// Looks up an instance and views it as `key`.
    #[must_use]
    pub fn try_get_instance(&self, key: TypeKey, match_subtypes: bool) -> Option<Instance> {
        let (_, instance) = self.try_get(key, match_subtypes)?;
        self.catalog.cast(instance, key)
    }

    /// Typed convenience over [`try_get_instance`](Self::try_get_instance).
    #[must_use]
    pub fn try_get_as<T: ?Sized + Send + Sync + 'static>(
        &self,
        match_subtypes: bool,
    ) -> Option<std::sync::Arc<T>> {
        self.try_get_instance(TypeKey::of::<T>(), match_subtypes)?
            .downcast::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeInfo, TypeKind};
    use std::sync::Arc;

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    struct Triangle;
    struct Square;

    impl Shape for Triangle {
        fn sides(&self) -> u32 {
            3
        }
    }

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    fn catalog() -> TypeCatalog {
        let catalog = TypeCatalog::new();
        catalog.declare::<dyn Shape>(TypeKind::Abstract);
        catalog.register(
            TypeInfo::declare::<Triangle>(TypeKind::Plain)
                .implements::<dyn Shape>(|t| t as Arc<dyn Shape>),
        );
        catalog.register(
            TypeInfo::declare::<Square>(TypeKind::Plain)
                .implements::<dyn Shape>(|s| s as Arc<dyn Shape>),
        );
        catalog
    }

    #[test]
    fn test_exact_match_wins_over_subtype() {
        let mut registry = TypeRegistry::new(catalog());
        registry.register(TypeKey::of::<Triangle>(), "triangle", false);
        registry.register(TypeKey::of::<dyn Shape>(), "shape", false);
        let (key, value) = registry.try_get(TypeKey::of::<dyn Shape>(), true).unwrap();
        assert_eq!(key, TypeKey::of::<dyn Shape>());
        assert_eq!(*value, "shape");
    }

    #[test]
    fn test_first_registered_subtype_wins() {
        let mut registry = TypeRegistry::new(catalog());
        registry.register(TypeKey::of::<Square>(), "square", false);
        registry.register(TypeKey::of::<Triangle>(), "triangle", false);
        let (key, _) = registry.try_get(TypeKey::of::<dyn Shape>(), true).unwrap();
        assert_eq!(key, TypeKey::of::<Square>());
    }

    #[test]
    fn test_subtype_matching_can_be_disabled() {
        let mut registry = TypeRegistry::new(catalog());
        registry.register(TypeKey::of::<Square>(), "square", false);
        assert!(!registry.is_registered(TypeKey::of::<dyn Shape>(), false));
        assert!(registry.is_registered(TypeKey::of::<dyn Shape>(), true));
    }

    #[test]
    fn test_instances_are_cast_to_requested_type() {
        let mut registry = TypeRegistry::new(catalog());
        registry.register(
            TypeKey::of::<Triangle>(),
            Instance::from_value(Triangle),
            false,
        );
        let shape = registry.try_get_as::<dyn Shape>(true).unwrap();
        assert_eq!(shape.sides(), 3);
        assert!(registry.try_get_as::<Square>(true).is_none());
    }
}
