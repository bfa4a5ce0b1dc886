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

/// Supplies active services.
#[derive(Debug, Clone, Default)]
pub struct ServiceProvider;

impl Provider for ServiceProvider {
    fn name(&self) -> &str {
        "service"
    }

    fn can_provide(&self, key: TypeKey, _scope: Scope, injector: &Injector) -> bool {
        injector.services().contains(key, true)
    }

    fn try_provide(&self, key: TypeKey, _scope: Scope, injector: &Injector) -> Option<Instance> {
        injector.services().try_get(key, true)
    }
}
