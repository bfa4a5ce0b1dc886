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

//! Interior-mutable injection targets.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// A shared, re-assignable dependency slot.
///
/// Injection writes through `&self`, so injectable types hold their injected
/// members in slots. Re-injecting an instance simply overwrites the slot.
pub struct Slot<T: ?Sized> {
    value: RwLock<Option<Arc<T>>>,
}

impl<T: ?Sized> Slot<T> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    /// Returns the current value.
    pub fn get(&self) -> Option<Arc<T>> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the current value.
    pub fn set(&self, value: Option<Arc<T>>) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value;
    }

    /// Returns `true` if the slot holds a value.
    pub fn is_set(&self) -> bool {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl<T: ?Sized> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot").field("set", &self.is_set()).finish()
    }
}
