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

//! Computes the order in which services are activated.

use crate::descriptor::ServiceDescriptor;
use crate::error::{EngineError, Result};
use alchemy_core::graph::order_by_topology;
use alchemy_core::TypeKey;
use alchemy_inject::Injector;
use std::cmp::Reverse;

/// Orders `services` for activation.
///
/// Services are first sorted by descending priority, required services
/// first among equals, then by display name. A depth-first topological sort
/// then moves every service after the services it requires. Dependencies on
/// an abstract type bind to the candidate services implementing it, and
/// dependencies on non-service types are followed through to the services
/// they need in turn.
///
/// `services` should already exclude disabled and overridden services; see
/// [`ServiceList::active`](crate::ServiceList::active).
///
/// # Errors
///
/// [`EngineError::CyclicServiceDependency`] if the services depend on each
/// other in a loop.
pub fn activation_order(
    services: &[ServiceDescriptor],
    injector: &Injector,
) -> Result<Vec<ServiceDescriptor>> {
    let mut sorted: Vec<&ServiceDescriptor> = services.iter().collect();
    sorted.sort_by_key(|d| {
        (
            Reverse(d.info().priority),
            !d.info().required,
            d.name().to_string(),
        )
    });

    let candidates: Vec<TypeKey> = sorted.iter().map(|d| d.key()).collect();
    let catalog = injector.catalog();

    let dependencies = |key: TypeKey| -> Vec<TypeKey> {
        let mut edges = Vec::new();
        for dependency in injector.dependencies(key, false) {
            if candidates.contains(&dependency) {
                edges.push(dependency);
                continue;
            }
            let implementations: Vec<TypeKey> = candidates
                .iter()
                .copied()
                .filter(|c| *c != key && catalog.is_subtype(*c, dependency))
                .collect();
            if implementations.is_empty() {
                edges.push(dependency);
            } else {
                edges.extend(implementations);
            }
        }
        edges
    };

    let order = order_by_topology(&candidates, dependencies).map_err(|err| {
        let err = EngineError::CyclicServiceDependency { cycle: err.cycle };
        log::error!("{err}");
        err
    })?;

    log::debug!(
        "Service activation order: {:?}",
        order.iter().map(TypeKey::short_name).collect::<Vec<_>>()
    );
    Ok(order
        .into_iter()
        .filter_map(|key| sorted.iter().find(|d| d.key() == key).map(|d| (*d).clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{EngineService, ServiceInfo};
    use alchemy_core::SceneGraph;
    use alchemy_inject::{Inject, Injectable, Manifest, Param, Service};
    use std::sync::Arc;

    #[derive(Default)]
    struct Clock;
    impl Service for Clock {}
    impl Injectable for Clock {
        fn manifest() -> Manifest<Self> {
            Manifest::<Self>::new().default_constructor()
        }
    }
    impl EngineService for Clock {}

    #[derive(Default)]
    struct Timers;
    impl Service for Timers {}
    impl Injectable for Timers {
        fn manifest() -> Manifest<Self> {
            Manifest::<Self>::new()
                .default_constructor()
                .method(
                    "bind",
                    Inject::Required,
                    vec![Param::required::<Clock>("clock")],
                    |_, _| {},
                )
        }
    }
    impl EngineService for Timers {
        fn info() -> ServiceInfo {
            ServiceInfo::new("Timers").priority(50)
        }
    }

    #[test]
    fn test_dependency_outranks_priority() {
        let injector = Injector::new(Arc::new(SceneGraph::new()));
        injector.register::<Clock>();
        injector.register::<Timers>();

        // Timers would go first on priority alone, but it needs Clock.
        let services = vec![
            ServiceDescriptor::of::<Clock>(),
            ServiceDescriptor::of::<Timers>(),
        ];
        let order = activation_order(&services, &injector).unwrap();

        let names: Vec<_> = order.iter().map(ServiceDescriptor::name).collect();
        assert_eq!(names, vec!["Clock", "Timers"]);
    }

    #[test]
    fn test_empty_input() {
        let injector = Injector::new(Arc::new(SceneGraph::new()));
        assert!(activation_order(&[], &injector).unwrap().is_empty());
    }
}
