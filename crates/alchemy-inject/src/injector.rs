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

//! The injector: resolution, construction and member injection.
//!
//! Resolution asks the provider chain for a type. When no provider is
//! capable and the request is forced, the injector builds the type itself:
//! it picks the injection constructor, resolves its parameters recursively,
//! then injects fields, properties and methods, in that order.
//!
//! Injection is not guarded against repetition. Injecting the same instance
//! twice re-resolves and re-assigns every member.

use crate::context::ContextTree;
use crate::error::{InjectionError, Result};
use crate::manifest::{Args, Injectable, Manifest, MemberKind, MemberSpec, Param, TypeManifest};
use crate::provider::{Provider, ProviderChain, ResolutionPolicy};
use crate::providers::{ComponentProvider, ContextProvider, ServiceProvider, SingletonProvider};
use crate::scope::Scope;
use crate::service::ServiceDirectory;
use crate::singleton::SingletonDirectory;
use alchemy_core::{Instance, ObjectHost, SceneId, TypeCatalog, TypeKey, TypeKind};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};

/// Pops the construction stack when a build finishes.
struct ConstructionGuard<'a> {
    stacks: &'a Mutex<HashMap<ThreadId, Vec<TypeKey>>>,
    thread: ThreadId,
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        let mut stacks = self.stacks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stack) = stacks.get_mut(&self.thread) {
            stack.pop();
            if stack.is_empty() {
                stacks.remove(&self.thread);
            }
        }
    }
}

/// The dependency injection container.
///
/// An injector owns every piece of shared resolution state: the type
/// catalog, the manifests of injectable types, the provider chain, the
/// context tree, and the singleton and service directories.
pub struct Injector {
    catalog: TypeCatalog,
    host: Arc<dyn ObjectHost>,
    manifests: RwLock<HashMap<TypeKey, Arc<TypeManifest>>>,
    chain: RwLock<ProviderChain>,
    policy: RwLock<ResolutionPolicy>,
    contexts: ContextTree,
    singletons: SingletonDirectory,
    services: ServiceDirectory,
    constructing: Mutex<HashMap<ThreadId, Vec<TypeKey>>>,
}

impl Injector {
    /// Creates an injector with a fresh catalog and the built-in providers.
    pub fn new(host: Arc<dyn ObjectHost>) -> Self {
        Self::with_catalog(TypeCatalog::new(), host)
    }

    /// Creates an injector sharing `catalog`, with the built-in providers.
    pub fn with_catalog(catalog: TypeCatalog, host: Arc<dyn ObjectHost>) -> Self {
        let injector = Self::bare(catalog, host);
        injector.add_provider(Arc::new(ContextProvider::default()));
        injector.add_provider(Arc::new(ComponentProvider));
        injector.add_provider(Arc::new(ServiceProvider));
        injector.add_provider(Arc::new(SingletonProvider));
        injector
    }

    /// Creates an injector with an empty provider chain.
    pub fn bare(catalog: TypeCatalog, host: Arc<dyn ObjectHost>) -> Self {
        Self {
            contexts: ContextTree::new(catalog.clone(), Arc::clone(&host)),
            singletons: SingletonDirectory::new(catalog.clone()),
            services: ServiceDirectory::new(catalog.clone()),
            manifests: RwLock::new(HashMap::new()),
            chain: RwLock::new(ProviderChain::new()),
            policy: RwLock::new(ResolutionPolicy::default()),
            constructing: Mutex::new(HashMap::new()),
            catalog,
            host,
        }
    }

    /// The declared-type catalog.
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// The object-hierarchy host.
    pub fn host(&self) -> &Arc<dyn ObjectHost> {
        &self.host
    }

    /// The context tree.
    pub fn contexts(&self) -> &ContextTree {
        &self.contexts
    }

    /// The singleton directory.
    pub fn singletons(&self) -> &SingletonDirectory {
        &self.singletons
    }

    /// The active service directory.
    pub fn services(&self) -> &ServiceDirectory {
        &self.services
    }

    /// The current resolution policy.
    pub fn policy(&self) -> ResolutionPolicy {
        *self.policy.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Changes the resolution policy.
    pub fn set_policy(&self, policy: ResolutionPolicy) {
        *self.policy.write().unwrap_or_else(PoisonError::into_inner) = policy;
    }

    /// Adds a provider to the chain.
    pub fn add_provider(&self, provider: Arc<dyn Provider>) {
        self.chain
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(provider);
    }

    /// Removes providers by name.
    pub fn remove_provider(&self, name: &str) -> usize {
        self.chain
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    /// Provider names in consultation order.
    pub fn provider_names(&self) -> Vec<String> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .names()
    }

    fn providers(&self) -> Vec<Arc<dyn Provider>> {
        self.chain
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Registers an injectable type.
    pub fn register<T: Injectable>(&self) {
        self.register_manifest(T::manifest());
    }

    /// Registers a manifest built by hand.
    pub fn register_manifest<T: Send + Sync + 'static>(&self, manifest: Manifest<T>) {
        let (info, manifest) = manifest.into_parts();
        self.catalog.register(info);
        log::debug!("Registered manifest for {}.", manifest.key());
        self.manifests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(manifest.key(), Arc::new(manifest));
    }

    /// Declares a capability type that is never constructed.
    pub fn declare_abstract<T: ?Sized + Send + Sync + 'static>(&self) {
        self.catalog.declare::<T>(TypeKind::Abstract);
    }

    /// The manifest of a registered type.
    pub fn manifest(&self, key: TypeKey) -> Option<Arc<TypeManifest>> {
        self.manifests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    fn view(&self, instance: Instance, key: TypeKey) -> Result<Instance> {
        if instance.key() == key {
            return Ok(instance);
        }
        self.catalog
            .cast(&instance, key)
            .ok_or(InjectionError::TypeMismatch {
                expected: key,
                found: instance.key(),
            })
    }

    // --- Provide ---

    /// Resolves `key` through the provider chain.
    ///
    /// The first capable provider answers. Under
    /// [`ResolutionPolicy::FailFast`] its failure is final; under
    /// [`ResolutionPolicy::Cascade`] the next capable provider is tried. When
    /// no provider is capable and `force` is set, the type is constructed.
    pub fn try_provide(&self, key: TypeKey, scope: Scope, force: bool) -> Result<Instance> {
        let policy = self.policy();
        for provider in self.providers() {
            if !provider.can_provide(key, scope, self) {
                continue;
            }
            log::trace!("Provider '{}' is capable of {}", provider.name(), key);
            match provider.try_provide(key, scope, self) {
                Some(instance) => return self.view(instance, key),
                None if policy == ResolutionPolicy::Cascade => {
                    log::warn!(
                        "Provider '{}' reported it can supply {} but produced nothing; cascading.",
                        provider.name(),
                        key
                    );
                }
                None => {
                    return Err(InjectionError::ProviderFailed {
                        provider: provider.name().to_string(),
                        key,
                    });
                }
            }
        }

        if force {
            return self.create(key, scope, force);
        }
        Err(InjectionError::DependencyUnresolved(key))
    }

    /// Typed form of [`try_provide`](Self::try_provide).
    pub fn provide<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: Scope,
        force: bool,
    ) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        let instance = self.try_provide(key, scope, force)?;
        instance
            .downcast::<T>()
            .ok_or(InjectionError::TypeMismatch {
                expected: key,
                found: instance.key(),
            })
    }

    /// Every instance of `key` that a capable provider yields, one per
    /// provider. Failing providers are skipped.
    pub fn provide_all(&self, key: TypeKey, scope: Scope) -> Vec<Instance> {
        self.providers()
            .iter()
            .filter(|provider| provider.can_provide(key, scope, self))
            .filter_map(|provider| provider.try_provide(key, scope, self))
            .filter_map(|instance| self.view(instance, key).ok())
            .collect()
    }

    /// Typed form of [`provide_all`](Self::provide_all).
    pub fn provide_all_as<T: ?Sized + Send + Sync + 'static>(&self, scope: Scope) -> Vec<Arc<T>> {
        self.provide_all(TypeKey::of::<T>(), scope)
            .iter()
            .filter_map(Instance::downcast::<T>)
            .collect()
    }

    // --- Create ---

    fn enter_construction(&self, key: TypeKey) -> Result<ConstructionGuard<'_>> {
        let thread = thread::current().id();
        let mut stacks = self
            .constructing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let stack = stacks.entry(thread).or_default();
        if let Some(start) = stack.iter().position(|entry| *entry == key) {
            let mut path = stack[start..].to_vec();
            path.push(key);
            let err = InjectionError::CyclicConstruction { path };
            log::error!("{err}");
            return Err(err);
        }
        stack.push(key);
        Ok(ConstructionGuard {
            stacks: &self.constructing,
            thread,
        })
    }

    /// Builds a new instance of `key` and injects it.
    ///
    /// Components prefer an instance already attached to the scope's node,
    /// and are otherwise attached to that node, or to a fresh root node when
    /// the scope has none. Abstract and unregistered types cannot be built.
    pub fn create(&self, key: TypeKey, scope: Scope, force: bool) -> Result<Instance> {
        let manifest = self.constructible(key)?;
        let _guard = self.enter_construction(key)?;
        match manifest.kind() {
            TypeKind::Component => self.create_component(&manifest, scope, force),
            _ => {
                let instance = self.build(&manifest, scope, force)?;
                self.inject(&instance, scope, force)?;
                Ok(instance)
            }
        }
    }

    /// Builds a new instance of `key` through its injection constructor,
    /// leaving its members for a later [`inject`](Self::inject).
    ///
    /// Components are attached on creation and come back injected, as from
    /// [`create`](Self::create).
    pub fn instantiate(&self, key: TypeKey, scope: Scope, force: bool) -> Result<Instance> {
        let manifest = self.constructible(key)?;
        let _guard = self.enter_construction(key)?;
        match manifest.kind() {
            TypeKind::Component => self.create_component(&manifest, scope, force),
            _ => self.build(&manifest, scope, force),
        }
    }

    fn constructible(&self, key: TypeKey) -> Result<Arc<TypeManifest>> {
        let manifest = match self.catalog.kind_of(key) {
            Some(TypeKind::Abstract) | None => None,
            Some(_) => self.manifest(key),
        };
        manifest.ok_or_else(|| {
            log::error!("Cannot construct {key}: no usable constructor.");
            InjectionError::NoUsableConstructor(key)
        })
    }

    /// Typed form of [`create`](Self::create).
    pub fn construct<T: Send + Sync + 'static>(&self, scope: Scope, force: bool) -> Result<Arc<T>> {
        let key = TypeKey::of::<T>();
        let instance = self.create(key, scope, force)?;
        instance
            .downcast::<T>()
            .ok_or(InjectionError::TypeMismatch {
                expected: key,
                found: instance.key(),
            })
    }

    fn create_component(
        &self,
        manifest: &TypeManifest,
        scope: Scope,
        force: bool,
    ) -> Result<Instance> {
        let key = manifest.key();
        let node = match scope {
            Scope::Node(node) if self.host.is_destroyed(node) => {
                log::error!("Cannot attach {key}: {node} was destroyed.");
                return Err(InjectionError::MissingScope(node));
            }
            Scope::Node(node) => node,
            Scope::Scene(scene) => self.host.create_node(key.short_name(), None, Some(scene)),
            Scope::Global => self.host.create_node(key.short_name(), None, None),
        };

        // Prefer existing components over new ones.
        if let Some(existing) = self
            .host
            .components(node)
            .into_iter()
            .find(|component| component.key() == key)
        {
            return Ok(existing);
        }

        let scope = Scope::Node(node);
        let instance = self.build(manifest, scope, force)?;
        self.host.attach_component(node, instance.clone());
        self.inject(&instance, scope, force)?;
        Ok(instance)
    }

    fn build(&self, manifest: &TypeManifest, scope: Scope, force: bool) -> Result<Instance> {
        let target = manifest.key();
        let constructor = manifest.injection_constructor().map_err(|err| {
            log::error!("Cannot construct {target}: {err}");
            err
        })?;

        let mut values = Vec::with_capacity(constructor.params().len());
        for param in constructor.params() {
            values.push(self.resolve_param(target, "new", param, scope, force)?);
        }
        let args = Args::new(target, constructor.params().to_vec(), values);

        (constructor.build)(&args).map_err(|source| {
            log::error!("Constructor of {target} failed: {source:#}");
            InjectionError::ConstructorFailed { target, source }
        })
    }

    /// Resolves one constructor parameter. Optional parameters fall back to
    /// their default; required ones fail the construction.
    fn resolve_param(
        &self,
        target: TypeKey,
        member: &str,
        param: &Param,
        scope: Scope,
        force: bool,
    ) -> Result<Option<Instance>> {
        match self.try_provide(param.key(), scope, force) {
            Ok(instance) => Ok(Some(instance)),
            Err(_) if param.is_optional() => Ok(param.default_value()),
            Err(source) => {
                log::error!(
                    "Failed to provide {} to {}::{} ({}): {source}",
                    param.key(),
                    target.short_name(),
                    member,
                    param.name()
                );
                Err(InjectionError::ParameterUnresolved {
                    target,
                    member: member.to_string(),
                    param: param.name().to_string(),
                    dependency: param.key(),
                    source: Box::new(source),
                })
            }
        }
    }

    // --- Inject ---

    /// Injects the marked members of `target`: fields, then properties,
    /// then methods.
    ///
    /// Types without a manifest have nothing to inject and succeed.
    pub fn inject(&self, target: &Instance, scope: Scope, force: bool) -> Result<()> {
        let Some(manifest) = self.manifest(target.key()) else {
            return Ok(());
        };

        let phases: [fn(MemberKind) -> bool; 3] = [
            |kind| matches!(kind, MemberKind::Field),
            |kind| matches!(kind, MemberKind::Property { .. }),
            |kind| matches!(kind, MemberKind::Method),
        ];
        for in_phase in phases {
            for member in manifest.members().iter().filter(|m| in_phase(m.kind())) {
                match member.kind() {
                    MemberKind::Method => self.inject_method(&manifest, member, target, scope, force)?,
                    _ => self.inject_member(&manifest, member, target, scope, force)?,
                }
            }
        }
        Ok(())
    }

    /// Typed form of [`inject`](Self::inject).
    pub fn inject_into<T: Send + Sync + 'static>(
        &self,
        target: &Arc<T>,
        scope: Scope,
        force: bool,
    ) -> Result<()> {
        self.inject(&Instance::new(Arc::clone(target)), scope, force)
    }

    fn inject_member(
        &self,
        manifest: &TypeManifest,
        member: &MemberSpec,
        target: &Instance,
        scope: Scope,
        force: bool,
    ) -> Result<()> {
        let owner = manifest.key();
        if member.kind() == (MemberKind::Property { writable: false }) {
            log::error!(
                "Failed to inject {}.{} because it is read-only",
                owner,
                member.name()
            );
            return Err(InjectionError::ReadOnlyInjectionTarget {
                target: owner,
                member: member.name().to_string(),
            });
        }
        let Some(param) = member.params().first() else {
            return Ok(());
        };

        let value = match self.try_provide(param.key(), scope, force) {
            Ok(instance) => Some(instance),
            Err(source) if member.inject().is_required() => {
                log::error!(
                    "Failed to inject {} into {}.{}: {source}",
                    param.key(),
                    owner,
                    member.name()
                );
                return Err(InjectionError::MemberUnresolved {
                    target: owner,
                    member: member.name().to_string(),
                    dependency: param.key(),
                    source: Box::new(source),
                });
            }
            Err(source) => {
                log::debug!(
                    "Optional {}.{} left empty: {source}",
                    owner.short_name(),
                    member.name()
                );
                None
            }
        };
        (member.apply)(target, &Args::new(owner, member.params().to_vec(), vec![value]))
    }

    fn inject_method(
        &self,
        manifest: &TypeManifest,
        member: &MemberSpec,
        target: &Instance,
        scope: Scope,
        force: bool,
    ) -> Result<()> {
        let owner = manifest.key();
        let mut values = Vec::with_capacity(member.params().len());
        let mut failure: Option<(&Param, InjectionError)> = None;
        for param in member.params() {
            match self.try_provide(param.key(), scope, force) {
                Ok(instance) => values.push(Some(instance)),
                Err(_) if param.is_optional() => values.push(param.default_value()),
                Err(source) => {
                    values.push(None);
                    if failure.is_none() {
                        failure = Some((param, source));
                    }
                }
            }
        }

        match failure {
            None => (member.apply)(target, &Args::new(owner, member.params().to_vec(), values)),
            Some((param, source)) if member.inject().is_required() => {
                log::error!(
                    "Failed to inject {} {} into {}.{}: {source}",
                    param.key(),
                    param.name(),
                    owner,
                    member.name()
                );
                Err(InjectionError::ParameterUnresolved {
                    target: owner,
                    member: member.name().to_string(),
                    param: param.name().to_string(),
                    dependency: param.key(),
                    source: Box::new(source),
                })
            }
            Some((param, _)) => {
                log::debug!(
                    "Skipped optional method {}.{}: {} is unavailable",
                    owner.short_name(),
                    member.name(),
                    param.key()
                );
                Ok(())
            }
        }
    }

    /// Injects every component attached anywhere in `scene`, each scoped to
    /// its own node.
    ///
    /// Returns `true` if every injection succeeded. Failures are logged and
    /// do not stop the pass.
    pub fn inject_scene(&self, scene: SceneId, force: bool) -> bool {
        let mut success = true;
        for root in self.host.scene_roots(scene) {
            for node in self.host.subtree(root) {
                for component in self.host.components(node) {
                    if self.manifest(component.key()).is_none() {
                        continue;
                    }
                    if let Err(err) = self.inject(&component, Scope::Node(node), force) {
                        log::warn!(
                            "Failed to inject dependencies into {} on {node}: {err}",
                            component.key()
                        );
                        success = false;
                    }
                }
            }
        }
        success
    }

    // --- Introspection ---

    /// Every type `key` depends on for construction and injection.
    ///
    /// Without `include_optional`, optional parameters, optional fields and
    /// properties, and optional methods are left out.
    pub fn dependencies(&self, key: TypeKey, include_optional: bool) -> Vec<TypeKey> {
        let Some(manifest) = self.manifest(key) else {
            return Vec::new();
        };

        let mut dependencies = Vec::new();
        let mut add = |key: TypeKey| {
            if !dependencies.contains(&key) {
                dependencies.push(key);
            }
        };

        if let Ok(constructor) = manifest.injection_constructor() {
            for param in constructor.params() {
                if include_optional || !param.is_optional() {
                    add(param.key());
                }
            }
        }
        for member in manifest.members() {
            let required = member.inject().is_required();
            match member.kind() {
                MemberKind::Field | MemberKind::Property { .. } => {
                    if include_optional || required {
                        member.params().iter().for_each(|param| add(param.key()));
                    }
                }
                MemberKind::Method => {
                    if !include_optional && !required {
                        continue;
                    }
                    for param in member.params() {
                        if include_optional || !param.is_optional() {
                            add(param.key());
                        }
                    }
                }
            }
        }
        dependencies
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("providers", &self.provider_names())
            .field("policy", &self.policy())
            .field("contexts", &self.contexts)
            .field("singletons", &self.singletons)
            .field("services", &self.services)
            .finish()
    }
}
