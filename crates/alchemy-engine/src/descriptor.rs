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

//! Service declarations and the catalog of known services.
//!
//! A service type implements [`EngineService`] to describe itself. The
//! engine only ever handles the erased [`ServiceDescriptor`], which carries
//! everything needed to register, order and activate the service.

use alchemy_core::{Instance, Registry, TypeKey};
use alchemy_inject::{Injectable, Injector, Service};
use std::fmt;
use std::sync::Arc;

/// Static metadata of a service type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Name shown in logs and matched against configuration toggles.
    pub display_name: String,
    /// Required services cannot be disabled.
    pub required: bool,
    /// Higher priorities initialize earlier, dependencies permitting.
    pub priority: i32,
    /// Service types this one supersedes.
    pub overrides: Vec<TypeKey>,
}

impl ServiceInfo {
    /// Metadata with the given display name, optional, at priority 0.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            required: false,
            priority: 0,
            overrides: Vec::new(),
        }
    }

    /// Sets the required flag.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Declares that this service supersedes `T` and every subtype of it.
    #[must_use]
    pub fn overrides<T: ?Sized + 'static>(mut self) -> Self {
        let key = TypeKey::of::<T>();
        if !self.overrides.contains(&key) {
            self.overrides.push(key);
        }
        self
    }
}

/// A service the engine can activate.
///
/// The injection manifest comes from [`Injectable`]; the lifecycle hooks come
/// from [`Service`].
pub trait EngineService: Service + Injectable {
    /// The service's metadata. Defaults to an optional service at priority 0
    /// named after the type.
    fn info() -> ServiceInfo {
        ServiceInfo::new(TypeKey::of::<Self>().short_name())
    }
}

/// The erased declaration of one service type.
#[derive(Clone)]
pub struct ServiceDescriptor {
    key: TypeKey,
    info: ServiceInfo,
    install: fn(&Injector),
    as_service: fn(&Instance) -> Option<Arc<dyn Service>>,
}

impl ServiceDescriptor {
    /// Describes the service type `T`.
    pub fn of<T: EngineService>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            info: T::info(),
            install: |injector| injector.register::<T>(),
            as_service: |instance| instance.downcast::<T>().map(|s| s as Arc<dyn Service>),
        }
    }

    /// The service's type.
    #[must_use]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// The service's metadata.
    #[must_use]
    pub fn info(&self) -> &ServiceInfo {
        &self.info
    }

    /// Shorthand for the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.display_name
    }

    /// Registers the service's manifest with `injector`.
    pub fn install(&self, injector: &Injector) {
        (self.install)(injector);
    }

    /// Views a constructed instance through the service contract.
    pub fn as_service(&self, instance: &Instance) -> Option<Arc<dyn Service>> {
        (self.as_service)(instance)
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("info", &self.info)
            .finish()
    }
}

/// A compile-time registration entry, submitted by [`register_service!`].
pub struct ServiceRegistration {
    /// Produces the descriptor of the registered service.
    pub describe: fn() -> ServiceDescriptor,
}

inventory::collect!(ServiceRegistration);

/// Registers a service type so that [`ServiceCatalog::discover`] finds it.
///
/// ```ignore
/// register_service!(AudioService);
/// ```
#[macro_export]
macro_rules! register_service {
    ($ty:ty) => {
        $crate::inventory::submit! {
            $crate::ServiceRegistration {
                describe: $crate::ServiceDescriptor::of::<$ty>,
            }
        }
    };
}

/// Every service type known to an engine, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ServiceCatalog {
    descriptors: Registry<TypeKey, ServiceDescriptor>,
}

impl ServiceCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects every service submitted through [`register_service!`].
    ///
    /// Registration order across crates is unspecified, so discovered
    /// services are sorted by display name.
    pub fn discover() -> Self {
        let mut discovered: Vec<ServiceDescriptor> = inventory::iter::<ServiceRegistration>
            .into_iter()
            .map(|registration| (registration.describe)())
            .collect();
        discovered.sort_by(|a, b| a.name().cmp(b.name()));

        let mut catalog = Self::new();
        for descriptor in discovered {
            catalog.add_descriptor(descriptor);
        }
        log::info!("ServiceCatalog: Discovered {} service(s).", catalog.len());
        catalog
    }

    /// Adds the service type `T`. Returns `false` if it was already known.
    pub fn add<T: EngineService>(&mut self) -> bool {
        self.add_descriptor(ServiceDescriptor::of::<T>())
    }

    /// Adds an erased descriptor. Returns `false` if its type was already known.
    pub fn add_descriptor(&mut self, descriptor: ServiceDescriptor) -> bool {
        let key = descriptor.key();
        let added = self.descriptors.register(key, descriptor, false);
        if !added {
            log::warn!("ServiceCatalog: {key} is already declared.");
        }
        added
    }

    /// The descriptor of `key`, if declared.
    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<&ServiceDescriptor> {
        self.descriptors.try_get(&key)
    }

    /// Registers the manifest of every declared service with `injector`.
    pub fn install(&self, injector: &Injector) {
        for descriptor in self.descriptors.values() {
            descriptor.install(injector);
        }
    }

    /// Iterates over the descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> + '_ {
        self.descriptors.values()
    }

    /// Number of declared services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns `true` if no service is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alchemy_inject::Manifest;

    #[derive(Default)]
    struct Audio;

    impl Service for Audio {}

    impl Injectable for Audio {
        fn manifest() -> Manifest<Self> {
            Manifest::<Self>::new().default_constructor()
        }
    }

    impl EngineService for Audio {
        fn info() -> ServiceInfo {
            ServiceInfo::new("Audio").required(true).priority(5)
        }
    }

    #[derive(Default)]
    struct Plain;

    impl Service for Plain {}

    impl Injectable for Plain {
        fn manifest() -> Manifest<Self> {
            Manifest::<Self>::new().default_constructor()
        }
    }

    impl EngineService for Plain {}

    register_service!(Audio);

    #[test]
    fn test_default_info_uses_type_name() {
        let info = Plain::info();
        assert_eq!(info.display_name, "Plain");
        assert!(!info.required);
        assert_eq!(info.priority, 0);
    }

    #[test]
    fn test_overrides_are_deduplicated() {
        let info = ServiceInfo::new("Mixer")
            .overrides::<Audio>()
            .overrides::<Audio>();
        assert_eq!(info.overrides, vec![TypeKey::of::<Audio>()]);
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let mut catalog = ServiceCatalog::new();
        assert!(catalog.add::<Audio>());
        assert!(!catalog.add::<Audio>());
        assert!(catalog.add::<Plain>());
        let names: Vec<_> = catalog.iter().map(ServiceDescriptor::name).collect();
        assert_eq!(names, vec!["Audio", "Plain"]);
    }

    #[test]
    fn test_discover_finds_registered_services() {
        let catalog = ServiceCatalog::discover();
        let audio = catalog.get(TypeKey::of::<Audio>()).expect("Audio is registered");
        assert!(audio.info().required);
        assert!(catalog.get(TypeKey::of::<Plain>()).is_none());
    }

    #[test]
    fn test_descriptor_views_instance_as_service() {
        let descriptor = ServiceDescriptor::of::<Audio>();
        assert!(descriptor
            .as_service(&Instance::from_value(Audio))
            .is_some());
        assert!(descriptor
            .as_service(&Instance::from_value(Plain))
            .is_none());
    }
}
