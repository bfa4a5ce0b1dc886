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

use super::CONTEXT_PRIORITY;
use crate::injector::Injector;
use crate::provider::Provider;
use crate::scope::Scope;
use alchemy_core::{Instance, TypeKey};

/// Supplies overrides registered in the context tree.
#[derive(Debug, Clone)]
pub struct ContextProvider {
    priority: i32,
}

impl ContextProvider {
    /// A context provider with a custom priority.
    pub fn with_priority(priority: i32) -> Self {
        Self { priority }
    }
}

impl Default for ContextProvider {
    fn default() -> Self {
        Self::with_priority(CONTEXT_PRIORITY)
    }
}

impl Provider for ContextProvider {
    fn name(&self) -> &str {
        "context"
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_provide(&self, key: TypeKey, scope: Scope, injector: &Injector) -> bool {
        injector.contexts().try_get(scope, key, true).is_some()
    }

    fn try_provide(&self, key: TypeKey, scope: Scope, injector: &Injector) -> Option<Instance> {
        injector.contexts().try_get(scope, key, true)
    }
}
