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

//! Engine settings and the resolution of which services take part in a run.

use crate::descriptor::{ServiceCatalog, ServiceDescriptor};
use crate::error::Result;
use alchemy_core::TypeCatalog;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Enables or disables one service by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceToggle {
    /// The service's display name.
    pub name: String,
    /// Whether the service should be activated.
    pub enabled: bool,
}

/// Engine settings, usually loaded from a JSON file.
///
/// Missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Run [`Engine::initialize`](crate::Engine::initialize) from
    /// [`Engine::start`](crate::Engine::start).
    pub auto_initialize: bool,
    /// Keep the engine root alive across scene unloads.
    pub scene_independent: bool,
    /// Place the engine's nodes on [`object_layer`](Self::object_layer).
    pub override_object_layer: bool,
    /// Layer used when `override_object_layer` is set.
    pub object_layer: u32,
    /// Per-service toggles. Services without a toggle are enabled.
    pub services: Vec<ServiceToggle>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_initialize: true,
            scene_independent: true,
            override_object_layer: false,
            object_layer: 0,
            services: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&content)?;
        log::info!("EngineConfig: Loaded '{}'.", path.display());
        Ok(config)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Enables the service named `name`.
    pub fn enable(&mut self, name: &str) {
        self.toggle(name, true);
    }

    /// Disables the service named `name`. Required services stay enabled.
    pub fn disable(&mut self, name: &str) {
        self.toggle(name, false);
    }

    fn toggle(&mut self, name: &str, enabled: bool) {
        match self.services.iter_mut().find(|t| t.name == name) {
            Some(toggle) => toggle.enabled = enabled,
            None => self.services.push(ServiceToggle {
                name: name.to_string(),
                enabled,
            }),
        }
    }

    /// Whether the service named `name` is toggled on.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.services.iter().any(|t| t.name == name && !t.enabled)
    }
}

/// The services of a catalog, split by how the configuration treats them.
#[derive(Debug, Clone, Default)]
pub struct ServiceList {
    all: Vec<ServiceDescriptor>,
    enabled: Vec<ServiceDescriptor>,
    overridden: Vec<ServiceDescriptor>,
}

impl ServiceList {
    /// Resolves `services` against `config`.
    ///
    /// A service is enabled when toggled on or required. It is overridden when
    /// another enabled service lists it, or one of its supertypes, in its
    /// overrides.
    pub fn resolve(services: &ServiceCatalog, config: &EngineConfig, types: &TypeCatalog) -> Self {
        let all: Vec<ServiceDescriptor> = services.iter().cloned().collect();
        let enabled: Vec<ServiceDescriptor> = all
            .iter()
            .filter(|d| d.info().required || config.is_enabled(d.name()))
            .cloned()
            .collect();
        let overridden = all
            .iter()
            .filter(|candidate| {
                enabled.iter().any(|by| {
                    by.key() != candidate.key()
                        && by
                            .info()
                            .overrides
                            .iter()
                            .any(|target| types.is_subtype(candidate.key(), *target))
                })
            })
            .cloned()
            .collect();
        Self {
            all,
            enabled,
            overridden,
        }
    }

    /// Every declared service.
    #[must_use]
    pub fn all(&self) -> &[ServiceDescriptor] {
        &self.all
    }

    /// Services toggled on or required.
    #[must_use]
    pub fn enabled(&self) -> &[ServiceDescriptor] {
        &self.enabled
    }

    /// Services superseded by an enabled service.
    #[must_use]
    pub fn overridden(&self) -> &[ServiceDescriptor] {
        &self.overridden
    }

    /// Whether `descriptor` is superseded.
    #[must_use]
    pub fn is_overridden(&self, descriptor: &ServiceDescriptor) -> bool {
        self.overridden.iter().any(|d| d.key() == descriptor.key())
    }

    /// Enabled services that are not overridden, in declaration order.
    #[must_use]
    pub fn active(&self) -> Vec<ServiceDescriptor> {
        self.enabled
            .iter()
            .filter(|d| !self.is_overridden(d))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EngineService, ServiceInfo};
    use alchemy_core::{SceneGraph, TypeKey};
    use alchemy_inject::{Injectable, Injector, Manifest, Service};
    use std::sync::Arc;

    trait Renderer: Send + Sync {}

    macro_rules! service {
        ($name:ident, $info:expr) => {
            #[derive(Default)]
            struct $name;
            impl Service for $name {}
            impl Injectable for $name {
                fn manifest() -> Manifest<Self> {
                    Manifest::<Self>::new()
                        .default_constructor()
                        .implements::<dyn Renderer>(|r| r as Arc<dyn Renderer>)
                }
            }
            impl Renderer for $name {}
            impl EngineService for $name {
                fn info() -> ServiceInfo {
                    $info
                }
            }
        };
    }

    service!(Basic, ServiceInfo::new("Basic"));
    service!(Fancy, ServiceInfo::new("Fancy").overrides::<dyn Renderer>());
    service!(Core, ServiceInfo::new("Core").required(true));

    fn catalog() -> (ServiceCatalog, TypeCatalog) {
        let mut services = ServiceCatalog::new();
        services.add::<Basic>();
        services.add::<Fancy>();
        services.add::<Core>();
        let injector = Injector::new(Arc::new(SceneGraph::new()));
        services.install(&injector);
        (services, injector.catalog().clone())
    }

    fn keys(list: &[ServiceDescriptor]) -> Vec<TypeKey> {
        list.iter().map(ServiceDescriptor::key).collect()
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let config = EngineConfig::from_json_str(r#"{ "object_layer": 4 }"#).unwrap();
        assert!(config.auto_initialize);
        assert!(config.scene_independent);
        assert!(!config.override_object_layer);
        assert_eq!(config.object_layer, 4);
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_invalid_json_is_a_config_error() {
        let err = EngineConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, crate::EngineError::Config(_)));
    }

    #[test]
    fn test_json_round_trip_keeps_toggles() {
        let mut config = EngineConfig::default();
        config.disable("Basic");
        let json = config.to_json_string().unwrap();
        assert_eq!(EngineConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_toggles() {
        let mut config = EngineConfig::default();
        assert!(config.is_enabled("Audio"));
        config.disable("Audio");
        assert!(!config.is_enabled("Audio"));
        config.enable("Audio");
        assert!(config.is_enabled("Audio"));
        assert_eq!(config.services.len(), 1);
    }

    #[test]
    fn test_required_services_ignore_disable() {
        let (services, types) = catalog();
        let mut config = EngineConfig::default();
        config.disable("Core");
        config.disable("Basic");

        let list = ServiceList::resolve(&services, &config, &types);

        assert_eq!(
            keys(list.enabled()),
            vec![TypeKey::of::<Fancy>(), TypeKey::of::<Core>()]
        );
    }

    #[test]
    fn test_override_by_supertype_excludes_implementations() {
        let (services, types) = catalog();
        let list = ServiceList::resolve(&services, &EngineConfig::default(), &types);

        // Fancy overrides every renderer but never itself.
        assert_eq!(
            keys(list.overridden()),
            vec![TypeKey::of::<Basic>(), TypeKey::of::<Core>()]
        );
        assert_eq!(keys(&list.active()), vec![TypeKey::of::<Fancy>()]);
        assert_eq!(list.all().len(), 3);
    }

    #[test]
    fn test_disabled_service_does_not_override() {
        let (services, types) = catalog();
        let mut config = EngineConfig::default();
        config.disable("Fancy");

        let list = ServiceList::resolve(&services, &config, &types);

        assert!(list.overridden().is_empty());
        assert_eq!(
            keys(&list.active()),
            vec![TypeKey::of::<Basic>(), TypeKey::of::<Core>()]
        );
    }
}
