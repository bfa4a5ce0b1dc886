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

//! Keyed registries.
//!
//! [`Registry`] is a plain key/value table that remembers insertion order.
//! [`TypeRegistry`] layers subtype-aware lookup on top of it, so that asking
//! for a capability can be answered by the first registered implementor.

mod typed;

pub use typed::TypeRegistry;

use std::collections::HashMap;
use std::hash::Hash;

/// A key/value table with explicit overwrite control.
///
/// Iteration follows insertion order. Re-registering an existing key with
/// `overwrite` keeps the key's original position.
#[derive(Debug, Clone)]
pub struct Registry<K, V> {
    entries: HashMap<K, V>,
    order: Vec<K>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> Registry<K, V> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `value` with `key`.
    ///
    /// If the key is already present and `overwrite` is `false`, nothing
    /// changes and `false` is returned.
    pub fn register(&mut self, key: K, value: V, overwrite: bool) -> bool {
        if let Some(existing) = self.entries.get_mut(&key) {
            if !overwrite {
                return false;
            }
            *existing = value;
            return true;
        }
        self.order.push(key.clone());
        self.entries.insert(key, value);
        true
    }

    /// Removes a key. Removing an absent key is a no-op returning `None`.
    pub fn unregister(&mut self, key: &K) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.order.retain(|existing| existing != key);
        Some(value)
    }

    /// Returns `true` if the key is present.
    #[must_use]
    pub fn is_registered(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the value for `key`, if any.
    #[must_use]
    pub fn try_get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Returns a mutable reference to the value for `key`, if any.
    pub fn try_get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.order
            .iter()
            .filter_map(|key| self.entries.get_key_value(key))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.order.iter()
    }

    /// Iterates values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
