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

//! The process-wide singleton directory.

use crate::error::{InjectionError, Result};
use alchemy_core::{Instance, TypeCatalog, TypeKey, TypeRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// A type with a process-wide accessor for its one instance.
///
/// Declaring a singleton with [`SingletonDirectory::declare`] lets the
/// directory create it lazily on first lookup.
pub trait Singleton: Send + Sync + 'static {
    /// Produces the instance, or `None` if it cannot exist right now.
    fn create() -> Option<Arc<Self>>;
}

type Accessor = Arc<dyn Fn() -> Option<Instance> + Send + Sync>;

/// Resets the creation flag when dropped.
struct CreationGuard<'a>(&'a AtomicBool);

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Maps a type to its one instance.
///
/// Entries are registered at most once per type and live until explicitly
/// removed. Lookups match subtypes by default.
pub struct SingletonDirectory {
    registry: RwLock<TypeRegistry<Instance>>,
    accessors: RwLock<HashMap<TypeKey, Accessor>>,
    creating: AtomicBool,
}

impl SingletonDirectory {
    /// Creates an empty directory.
    pub fn new(catalog: TypeCatalog) -> Self {
        Self {
            registry: RwLock::new(TypeRegistry::new(catalog)),
            accessors: RwLock::new(HashMap::new()),
            creating: AtomicBool::new(false),
        }
    }

    fn catalog(&self) -> TypeCatalog {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .catalog()
            .clone()
    }

    /// Declares a lazily created singleton.
    pub fn declare<T: Singleton>(&self) {
        let accessor: Accessor = Arc::new(|| T::create().map(Instance::new));
        self.accessors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(TypeKey::of::<T>(), accessor);
    }

    /// Returns `true` if a declared accessor could answer a request for `key`.
    pub fn is_declared(&self, key: TypeKey, match_subtypes: bool) -> bool {
        self.find_accessor(key, match_subtypes).is_some()
    }

    fn find_accessor(&self, key: TypeKey, match_subtypes: bool) -> Option<(TypeKey, Accessor)> {
        let accessors = self.accessors.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(accessor) = accessors.get(&key) {
            return Some((key, Arc::clone(accessor)));
        }
        if !match_subtypes {
            return None;
        }
        let catalog = self.catalog();
        let mut candidates: Vec<_> = accessors
            .iter()
            .filter(|(declared, _)| catalog.is_subtype(**declared, key))
            .collect();
        candidates.sort_by_key(|(declared, _)| declared.name());
        candidates
            .first()
            .map(|(declared, accessor)| (**declared, Arc::clone(accessor)))
    }

    /// Returns `true` if an instance is registered. Never creates one.
    pub fn contains(&self, key: TypeKey, match_subtypes: bool) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_registered(key, match_subtypes)
    }

    /// Returns the instance for `key`, creating it through its declared
    /// accessor if needed.
    ///
    /// Creation is not re-entrant: an accessor that itself asks for a
    /// singleton that does not exist yet gets `None`.
    pub fn try_get(&self, key: TypeKey, match_subtypes: bool) -> Option<Instance> {
        let existing = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .try_get_instance(key, match_subtypes);
        if existing.is_some() {
            return existing;
        }
        self.try_create(key, match_subtypes)
    }

    fn try_create(&self, key: TypeKey, match_subtypes: bool) -> Option<Instance> {
        let (declared, accessor) = self.find_accessor(key, match_subtypes)?;
        if self.creating.swap(true, Ordering::AcqRel) {
            log::debug!("Singleton creation already in progress; refusing {declared}.");
            return None;
        }
        let created = {
            let _guard = CreationGuard(&self.creating);
            accessor()
        }?;

        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if !registry.register(declared, created.clone(), false) {
            // Someone registered it while the accessor ran; keep theirs.
            return registry.try_get_instance(key, match_subtypes);
        }
        log::debug!("Created singleton {declared}.");
        registry.catalog().cast(&created, key)
    }

    /// Typed form of [`try_get`](Self::try_get), matching subtypes.
    pub fn try_get_as<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.try_get(TypeKey::of::<T>(), true)?.downcast::<T>()
    }

    /// Returns the instance for `key` or fails.
    pub fn get(&self, key: TypeKey) -> Result<Instance> {
        self.try_get(key, true)
            .ok_or(InjectionError::SingletonMissing(key))
    }

    /// Returns the instance for `key`, registering `factory()` if absent.
    pub fn get_or_create(
        &self,
        key: TypeKey,
        factory: impl FnOnce() -> Instance,
    ) -> Result<Instance> {
        if let Some(existing) = self.try_get(key, true) {
            return Ok(existing);
        }
        let created = factory();
        self.set(created.clone())?;
        self.catalog()
            .cast(&created, key)
            .ok_or(InjectionError::TypeMismatch {
                expected: key,
                found: created.key(),
            })
    }

    /// Registers `instance` under its own type. Fails if one exists.
    pub fn try_set(&self, instance: Instance) -> bool {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(instance.key(), instance, false)
    }

    /// Registers `instance`, failing with
    /// [`InjectionError::DuplicateSingletonRegistration`] if one exists.
    pub fn set(&self, instance: Instance) -> Result<Instance> {
        let key = instance.key();
        if self.try_set(instance.clone()) {
            Ok(instance)
        } else {
            log::error!("Singleton of type {key} already exists.");
            Err(InjectionError::DuplicateSingletonRegistration(key))
        }
    }

    /// Registers a batch of preloaded singletons, warning about duplicates.
    ///
    /// Returns how many were registered.
    pub fn preload(&self, instances: impl IntoIterator<Item = Instance>) -> usize {
        let mut registered = 0;
        for instance in instances {
            let key = instance.key();
            if self.try_set(instance) {
                registered += 1;
            } else {
                log::warn!("Singleton of type {key} already exists.");
            }
        }
        registered
    }

    /// Removes the exact entry for `key`.
    pub fn unregister(&self, key: TypeKey) -> Option<Instance> {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unregister(key)
    }

    /// Removes every instance. Declarations are kept.
    pub fn clear(&self) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if no instance is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SingletonDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonDirectory")
            .field("instances", &self.len())
            .finish()
    }
}
