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

use crate::injector::Injector;
use crate::provider::Provider;
use crate::scope::Scope;
use alchemy_core::{Instance, TypeKey};

/// Supplies components already attached to the scope's node.
#[derive(Debug, Clone, Default)]
pub struct ComponentProvider;

impl ComponentProvider {
    fn find(key: TypeKey, scope: Scope, injector: &Injector) -> Option<Instance> {
        let node = scope.node()?;
        injector
            .host()
            .components(node)
            .iter()
            .find_map(|component| injector.catalog().cast(component, key))
    }
}

impl Provider for ComponentProvider {
    fn name(&self) -> &str {
        "component"
    }

    fn can_provide(&self, key: TypeKey, scope: Scope, injector: &Injector) -> bool {
        Self::find(key, scope, injector).is_some()
    }

    fn try_provide(&self, key: TypeKey, scope: Scope, injector: &Injector) -> Option<Instance> {
        Self::find(key, scope, injector)
    }
}
