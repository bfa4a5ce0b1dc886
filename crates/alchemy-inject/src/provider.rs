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

//! The provider abstraction and the priority-ordered provider chain.
//!
//! A provider is a policy object answering "can you supply a value of this
//! type in this scope" and then, if so, supplying it. Two views exist:
//!
//! - [`Provider`]: the type-erased form the chain works with, keyed by
//!   [`TypeKey`] at runtime.
//! - [`Provide<T>`]: the typed capability a provider for one type implements.
//!   [`Typed`] bridges it to the erased form.

use crate::error::{InjectionError, Result};
use crate::injector::Injector;
use crate::scope::Scope;
use alchemy_core::{Instance, TypeKey};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// A type-erased source of instances.
pub trait Provider: Send + Sync {
    /// A human-readable name used in diagnostics.
    fn name(&self) -> &str;

    /// Higher priorities are consulted first.
    fn priority(&self) -> i32 {
        0
    }

    /// Returns `true` if this provider believes it can supply `key`.
    fn can_provide(&self, key: TypeKey, scope: Scope, injector: &Injector) -> bool;

    /// Attempts to supply `key`.
    fn try_provide(&self, key: TypeKey, scope: Scope, injector: &Injector) -> Option<Instance>;
}

/// The typed capability of supplying values of `T`.
pub trait Provide<T: ?Sized + Send + Sync + 'static>: Send + Sync {
    /// Returns `true` if a value can currently be supplied.
    fn can_provide(&self, _scope: Scope, _injector: &Injector) -> bool {
        true
    }

    /// Attempts to supply a value.
    fn try_provide(&self, scope: Scope, injector: &Injector) -> Option<Arc<T>>;

    /// Supplies a value or fails with [`InjectionError::DependencyUnresolved`].
    fn provide(&self, scope: Scope, injector: &Injector) -> Result<Arc<T>> {
        self.try_provide(scope, injector)
            .ok_or(InjectionError::DependencyUnresolved(TypeKey::of::<T>()))
    }
}

/// Adapts a [`Provide<T>`] into an erased [`Provider`] answering only for `T`.
pub struct Typed<P, T: ?Sized> {
    name: String,
    priority: i32,
    inner: P,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<P, T> Typed<P, T>
where
    P: Provide<T>,
    T: ?Sized + Send + Sync + 'static,
{
    /// Wraps `inner` with the given name and priority.
    pub fn new(name: impl Into<String>, priority: i32, inner: P) -> Self {
        Self {
            name: name.into(),
            priority,
            inner,
            _marker: PhantomData,
        }
    }

    /// The wrapped typed provider.
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P, T> Provider for Typed<P, T>
where
    P: Provide<T>,
    T: ?Sized + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_provide(&self, key: TypeKey, scope: Scope, injector: &Injector) -> bool {
        key == TypeKey::of::<T>() && self.inner.can_provide(scope, injector)
    }

    fn try_provide(&self, key: TypeKey, scope: Scope, injector: &Injector) -> Option<Instance> {
        if key != TypeKey::of::<T>() {
            return None;
        }
        self.inner.try_provide(scope, injector).map(Instance::new)
    }
}

/// A [`Provide<T>`] backed by a closure.
pub struct FnProvider<T: ?Sized, F> {
    provide: F,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T, F> FnProvider<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(Scope, &Injector) -> Option<Arc<T>> + Send + Sync,
{
    /// Wraps a closure.
    pub fn new(provide: F) -> Self {
        Self {
            provide,
            _marker: PhantomData,
        }
    }
}

impl<T, F> Provide<T> for FnProvider<T, F>
where
    T: ?Sized + Send + Sync + 'static,
    F: Fn(Scope, &Injector) -> Option<Arc<T>> + Send + Sync,
{
    fn try_provide(&self, scope: Scope, injector: &Injector) -> Option<Arc<T>> {
        (self.provide)(scope, injector)
    }
}

/// What the chain does when a capable provider produces nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionPolicy {
    /// The first capable provider's answer is final.
    #[default]
    FailFast,
    /// Fall through to the next capable provider.
    Cascade,
}

/// Providers ordered by descending priority.
///
/// Providers with equal priority keep their registration order.
#[derive(Default, Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn Provider>>,
}

impl ProviderChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a provider at its priority position.
    pub fn add(&mut self, provider: Arc<dyn Provider>) {
        let priority = provider.priority();
        let position = self
            .providers
            .iter()
            .position(|existing| existing.priority() < priority)
            .unwrap_or(self.providers.len());
        log::debug!(
            "ProviderChain: Registered '{}' (priority={}) at position {}",
            provider.name(),
            priority,
            position
        );
        self.providers.insert(position, provider);
    }

    /// Removes every provider with the given name. Returns how many were removed.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.providers.len();
        self.providers.retain(|provider| provider.name() != name);
        before - self.providers.len()
    }

    /// Iterates providers in consultation order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Provider>> {
        self.providers.iter()
    }

    /// Provider names in consultation order.
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// Returns the number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns `true` if the chain has no providers.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, i32);

    impl Provider for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }

        fn can_provide(&self, _: TypeKey, _: Scope, _: &Injector) -> bool {
            false
        }

        fn try_provide(&self, _: TypeKey, _: Scope, _: &Injector) -> Option<Instance> {
            None
        }
    }

    #[test]
    fn test_chain_orders_by_descending_priority() {
        let mut chain = ProviderChain::new();
        chain.add(Arc::new(Named("low", 1)));
        chain.add(Arc::new(Named("high", 10)));
        chain.add(Arc::new(Named("mid", 5)));
        assert_eq!(chain.names(), vec!["high", "mid", "low"]);
    }

    #[test]
    fn test_ties_keep_registration_order() {
        let mut chain = ProviderChain::new();
        chain.add(Arc::new(Named("first", 0)));
        chain.add(Arc::new(Named("top", 9)));
        chain.add(Arc::new(Named("second", 0)));
        chain.add(Arc::new(Named("third", 0)));
        assert_eq!(chain.names(), vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn test_remove_by_name() {
        let mut chain = ProviderChain::new();
        chain.add(Arc::new(Named("a", 0)));
        chain.add(Arc::new(Named("b", 0)));
        assert_eq!(chain.remove("a"), 1);
        assert_eq!(chain.remove("a"), 0);
        assert_eq!(chain.names(), vec!["b"]);
    }
}
