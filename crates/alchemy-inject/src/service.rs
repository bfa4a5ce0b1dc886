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

//! The long-lived service contract and the directory of active services.

use alchemy_core::{Instance, TypeCatalog, TypeKey, TypeRegistry};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A long-lived unit of functionality activated by the engine.
///
/// Every hook has a default no-op implementation.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Runs once after the service was constructed and injected.
    async fn on_service_init(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Returns the service to a clean state without destroying it.
    fn on_service_reset(&self) {}

    /// Releases the service's resources before it is dropped.
    fn on_service_destroy(&self) {}
}

/// Lifecycle state of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceState {
    /// Not selected for activation.
    Disabled,
    /// Selected for activation, not built yet.
    Enabled,
    /// Built, members not injected yet.
    Constructed,
    /// Built and injected.
    Injected,
    /// Its init hook is running.
    Initializing,
    /// Its init hook completed.
    Initialized,
    /// Its reset hook is running.
    Resetting,
    /// Torn down.
    Destroyed,
}

#[derive(Clone)]
struct ServiceEntry {
    instance: Instance,
    handle: Arc<dyn Service>,
}

/// The directory of active services, in registration order.
///
/// Lifecycle states are kept per type and outlive the services themselves,
/// so a torn-down service still reports [`ServiceState::Destroyed`].
pub struct ServiceDirectory {
    registry: RwLock<TypeRegistry<ServiceEntry>>,
    states: RwLock<HashMap<TypeKey, ServiceState>>,
}

impl ServiceDirectory {
    /// Creates an empty directory.
    pub fn new(catalog: TypeCatalog) -> Self {
        Self {
            registry: RwLock::new(TypeRegistry::new(catalog)),
            states: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, TypeRegistry<ServiceEntry>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TypeRegistry<ServiceEntry>> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a service under its instance's type.
    ///
    /// Returns `false` if a service of that type is already active.
    pub fn register(&self, instance: Instance, handle: Arc<dyn Service>) -> bool {
        let key = instance.key();
        let entry = ServiceEntry { instance, handle };
        let registered = self.write().register(key, entry, false);
        if registered {
            log::debug!("Registered service {key}.");
            self.set_state(key, ServiceState::Injected);
        }
        registered
    }

    /// Registers a typed service.
    pub fn register_typed<T: Service>(&self, service: Arc<T>) -> bool {
        let handle: Arc<dyn Service> = service.clone();
        self.register(Instance::new(service), handle)
    }

    /// Returns `true` if a service answers a request for `key`.
    pub fn contains(&self, key: TypeKey, match_subtypes: bool) -> bool {
        self.read().is_registered(key, match_subtypes)
    }

    /// The service answering a request for `key`, viewed as `key`.
    pub fn try_get(&self, key: TypeKey, match_subtypes: bool) -> Option<Instance> {
        let registry = self.read();
        let (_, entry) = registry.try_get(key, match_subtypes)?;
        registry.catalog().cast(&entry.instance, key)
    }

    /// Typed form of [`try_get`](Self::try_get), matching subtypes.
    pub fn try_get_as<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.try_get(TypeKey::of::<T>(), true)?.downcast::<T>()
    }

    /// The lifecycle hooks of the service registered exactly under `key`.
    pub fn handle(&self, key: TypeKey) -> Option<Arc<dyn Service>> {
        self.read()
            .try_get(key, false)
            .map(|(_, entry)| Arc::clone(&entry.handle))
    }

    /// The last recorded state of the service type `key`.
    ///
    /// Known for every type a state was recorded for, active or not.
    pub fn state(&self, key: TypeKey) -> Option<ServiceState> {
        self.states
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    /// Records a state transition for `key`.
    pub fn set_state(&self, key: TypeKey, state: ServiceState) {
        log::trace!("Service {key} is now {state:?}.");
        self.states
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, state);
    }

    /// Snapshot of `(type, hooks)` pairs in registration order.
    pub fn entries(&self) -> Vec<(TypeKey, Arc<dyn Service>)> {
        self.read()
            .iter()
            .map(|(key, entry)| (*key, Arc::clone(&entry.handle)))
            .collect()
    }

    /// Registered service types in registration order.
    pub fn keys(&self) -> Vec<TypeKey> {
        self.read().keys().collect()
    }

    /// Removes the service registered exactly under `key`.
    pub fn unregister(&self, key: TypeKey) -> bool {
        self.write().unregister(key).is_some()
    }

    /// Removes every service. Recorded states are kept.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Number of active services.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no service is active.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ServiceDirectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.keys().iter().map(|key| key.short_name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchemy_core::{TypeInfo, TypeKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    #[derive(Default)]
    struct FrameClock {
        resets: AtomicUsize,
    }

    impl Clock for FrameClock {
        fn now(&self) -> u64 {
            42
        }
    }

    #[async_trait]
    impl Service for FrameClock {
        fn on_service_reset(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Other;

    impl Service for Other {}

    fn directory() -> ServiceDirectory {
        let catalog = TypeCatalog::new();
        catalog.register(
            TypeInfo::declare::<FrameClock>(TypeKind::Plain)
                .implements::<dyn Clock>(|c| c as Arc<dyn Clock>),
        );
        ServiceDirectory::new(catalog)
    }

    #[test]
    fn test_register_once_per_type() {
        let services = directory();
        assert!(services.register_typed(Arc::new(FrameClock::default())));
        assert!(!services.register_typed(Arc::new(FrameClock::default())));
        assert_eq!(services.len(), 1);
    }

    #[test]
    fn test_lookup_by_capability() {
        let services = directory();
        services.register_typed(Arc::new(FrameClock::default()));
        assert_eq!(services.try_get_as::<dyn Clock>().unwrap().now(), 42);
        assert!(!services.contains(TypeKey::of::<dyn Clock>(), false));
    }

    #[test]
    fn test_state_tracking() {
        let services = directory();
        let key = TypeKey::of::<FrameClock>();
        services.register_typed(Arc::new(FrameClock::default()));
        assert_eq!(services.state(key), Some(ServiceState::Injected));
        services.set_state(key, ServiceState::Initialized);
        assert_eq!(services.state(key), Some(ServiceState::Initialized));
        assert_eq!(services.state(TypeKey::of::<Other>()), None);

        // Disabled services are never registered but still have a state.
        services.set_state(TypeKey::of::<Other>(), ServiceState::Disabled);
        assert_eq!(services.state(TypeKey::of::<Other>()), Some(ServiceState::Disabled));
        assert!(!services.contains(TypeKey::of::<Other>(), false));
    }

    #[test]
    fn test_state_survives_clear() {
        let services = directory();
        let key = TypeKey::of::<FrameClock>();
        services.register_typed(Arc::new(FrameClock::default()));
        services.set_state(key, ServiceState::Destroyed);
        services.clear();
        assert!(services.is_empty());
        assert_eq!(services.state(key), Some(ServiceState::Destroyed));
    }

    #[test]
    fn test_entries_follow_registration_order() {
        let services = directory();
        services.register_typed(Arc::new(Other));
        services.register_typed(Arc::new(FrameClock::default()));
        assert_eq!(
            services.keys(),
            vec![TypeKey::of::<Other>(), TypeKey::of::<FrameClock>()]
        );
        for (_, handle) in services.entries() {
            handle.on_service_reset();
        }
        let clock = services.try_get_as::<FrameClock>().unwrap();
        assert_eq!(clock.resets.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_default_init_hook_succeeds() {
        let services = directory();
        services.register_typed(Arc::new(Other));
        let handle = services.handle(TypeKey::of::<Other>()).unwrap();
        assert!(handle.on_service_init().await.is_ok());
    }
}
