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

use alchemy_core::{Instance, ObjectHost, SceneGraph, TypeCatalog, TypeKey};
use alchemy_inject::{
    FnProvider, Inject, Injectable, InjectionError, Injector, Manifest, Param, Provider,
    ResolutionPolicy, Scope, Singleton, Slot, Typed,
};
use anyhow::Result;
use std::sync::{Arc, Mutex};

// --- Test Setup: a small graph of injectable types ---

trait Logger: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Default)]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn name(&self) -> &'static str {
        "console"
    }
}

impl Injectable for ConsoleLogger {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::new()
            .default_constructor()
            .implements::<dyn Logger>(|l| l as Arc<dyn Logger>)
    }
}

#[derive(Default)]
struct Database;

impl Injectable for Database {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::new().default_constructor()
    }
}

/// Never registered, so it can never be built.
struct Metrics;

struct Port(u16);

struct Repository {
    db: Arc<Database>,
    logger: Slot<dyn Logger>,
    metrics: Slot<Metrics>,
}

impl Injectable for Repository {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::new()
            .inject_constructor(vec![Param::required::<Database>("db")], |args| {
                Ok(Repository {
                    db: args.require::<Database>(0)?,
                    logger: Slot::new(),
                    metrics: Slot::new(),
                })
            })
            .field::<dyn Logger>("logger", Inject::Required, |r, v| r.logger.set(v))
            .property::<Metrics>("metrics", Inject::Optional, |r, v| r.metrics.set(v))
    }
}

fn injector() -> (Arc<SceneGraph>, Injector) {
    let graph = Arc::new(SceneGraph::new());
    graph.load_scene("Main");
    let injector = Injector::new(graph.clone());
    injector.declare_abstract::<dyn Logger>();
    injector.register::<ConsoleLogger>();
    injector.register::<Database>();
    injector.register::<Repository>();
    (graph, injector)
}

fn root_cause(err: &InjectionError) -> &InjectionError {
    match err {
        InjectionError::ParameterUnresolved { source, .. }
        | InjectionError::MemberUnresolved { source, .. } => root_cause(source),
        other => other,
    }
}

// --- Provider chain ---

struct Scripted {
    name: &'static str,
    priority: i32,
    result: Option<u32>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl Provider for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_provide(&self, key: TypeKey, _: Scope, _: &Injector) -> bool {
        key == TypeKey::of::<u32>()
    }

    fn try_provide(&self, _: TypeKey, _: Scope, _: &Injector) -> Option<Instance> {
        self.calls.lock().unwrap().push(self.name);
        self.result.map(Instance::from_value)
    }
}

fn scripted_injector(calls: &Arc<Mutex<Vec<&'static str>>>) -> Injector {
    let injector = Injector::bare(TypeCatalog::new(), Arc::new(SceneGraph::new()));
    injector.add_provider(Arc::new(Scripted {
        name: "low",
        priority: 1,
        result: Some(2),
        calls: calls.clone(),
    }));
    injector.add_provider(Arc::new(Scripted {
        name: "high",
        priority: 10,
        result: None,
        calls: calls.clone(),
    }));
    injector
}

#[test]
fn test_capable_but_failing_provider_shadows_later_ones() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let injector = scripted_injector(&calls);

    let result = injector.provide::<u32>(Scope::Global, false);

    match result {
        Err(InjectionError::ProviderFailed { provider, .. }) => assert_eq!(provider, "high"),
        other => panic!("expected a provider failure, got {other:?}"),
    }
    assert_eq!(*calls.lock().unwrap(), vec!["high"]);
}

#[test]
fn test_cascade_policy_falls_through_to_next_provider() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let injector = scripted_injector(&calls);
    injector.set_policy(ResolutionPolicy::Cascade);

    let value = injector.provide::<u32>(Scope::Global, false).unwrap();

    assert_eq!(*value, 2);
    assert_eq!(*calls.lock().unwrap(), vec!["high", "low"]);
}

#[test]
fn test_unresolvable_without_force() {
    let (_, injector) = injector();
    assert!(matches!(
        injector.try_provide(TypeKey::of::<Database>(), Scope::Global, false),
        Err(InjectionError::DependencyUnresolved(_))
    ));
}

#[test]
fn test_typed_provider_bridge() {
    let (_, injector) = injector();
    injector.add_provider(Arc::new(Typed::<_, u32>::new(
        "answer",
        5,
        FnProvider::new(|_: Scope, _: &Injector| Some(Arc::new(42u32))),
    )));
    assert_eq!(*injector.provide::<u32>(Scope::Global, false).unwrap(), 42);
    assert!(injector.provide::<u64>(Scope::Global, false).is_err());
}

// --- Construction and injection ---

#[test]
fn test_required_field_failure_fails_construction() {
    let (_, injector) = injector();

    let err = injector
        .construct::<Repository>(Scope::Global, true)
        .err()
        .expect("logger is unresolvable");

    match err {
        InjectionError::MemberUnresolved { member, .. } => assert_eq!(member, "logger"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_optional_property_is_left_empty() -> Result<()> {
    let (_, injector) = injector();
    injector
        .contexts()
        .global()
        .register_value(Arc::new(ConsoleLogger));

    let repository = injector.construct::<Repository>(Scope::Global, true)?;

    assert_eq!(repository.logger.get().map(|l| l.name()), Some("console"));
    assert!(repository.metrics.get().is_none());
    Ok(())
}

#[test]
fn test_instantiate_leaves_members_for_inject() -> Result<()> {
    // --- 1. Setup ---
    let (_, injector) = injector();
    injector
        .contexts()
        .global()
        .register_value(Arc::new(ConsoleLogger));

    // --- 2. Build without members ---
    let instance = injector.instantiate(TypeKey::of::<Repository>(), Scope::Global, true)?;
    let repository = instance
        .downcast::<Repository>()
        .expect("instantiate returns the requested type");
    assert!(repository.logger.get().is_none());

    // --- 3. Inject ---
    injector.inject(&instance, Scope::Global, true)?;
    assert_eq!(repository.logger.get().map(|l| l.name()), Some("console"));
    Ok(())
}

#[test]
fn test_constructor_parameters_prefer_existing_instances() -> Result<()> {
    let (_, injector) = injector();
    injector
        .contexts()
        .global()
        .register_value(Arc::new(ConsoleLogger));
    let shared = Arc::new(Database);
    injector.singletons().try_set(Instance::new(shared.clone()));

    let repository = injector.construct::<Repository>(Scope::Global, true)?;

    assert!(Arc::ptr_eq(&repository.db, &shared));
    Ok(())
}

#[derive(Default)]
struct Wiring {
    calls: Mutex<Vec<String>>,
    order: Mutex<Vec<&'static str>>,
}

impl Injectable for Wiring {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::new()
            .default_constructor()
            .method(
                "connect",
                Inject::Required,
                vec![
                    Param::required::<Database>("db"),
                    Param::with_default::<Port>("port", || Arc::new(Port(8080))),
                ],
                |w, args| {
                    let port = args.get::<Port>(1).map(|p| p.0);
                    w.calls.lock().unwrap().push(format!("connect:{port:?}"));
                    w.order.lock().unwrap().push("method");
                },
            )
            .method(
                "audit",
                Inject::Optional,
                vec![Param::required::<Metrics>("metrics")],
                |w, _| w.calls.lock().unwrap().push("audit".to_string()),
            )
            .property::<Database>("primary", Inject::Optional, |w, _| {
                w.order.lock().unwrap().push("property")
            })
            .field::<Database>("replica", Inject::Optional, |w, _| {
                w.order.lock().unwrap().push("field")
            })
    }
}

#[test]
fn test_members_are_injected_fields_then_properties_then_methods() -> Result<()> {
    let (_, injector) = injector();
    injector.register::<Wiring>();

    let wiring = injector.construct::<Wiring>(Scope::Global, true)?;

    assert_eq!(
        *wiring.order.lock().unwrap(),
        vec!["field", "property", "method"]
    );
    Ok(())
}

#[test]
fn test_method_defaults_and_optional_methods() -> Result<()> {
    let (_, injector) = injector();
    injector.register::<Wiring>();

    let wiring = injector.construct::<Wiring>(Scope::Global, true)?;

    // Port falls back to its default; audit is skipped since Metrics is unavailable.
    assert_eq!(*wiring.calls.lock().unwrap(), vec!["connect:Some(8080)"]);
    Ok(())
}

#[derive(Default)]
struct Binder;

#[test]
fn test_required_method_with_missing_parameter_fails() {
    let (_, injector) = injector();
    injector.register_manifest(Manifest::<Binder>::new().default_constructor().method(
        "bind",
        Inject::Required,
        vec![Param::required::<Metrics>("metrics")],
        |_, _| {},
    ));

    match injector.construct::<Binder>(Scope::Global, true) {
        Err(InjectionError::ParameterUnresolved { member, param, .. }) => {
            assert_eq!(member, "bind");
            assert_eq!(param, "metrics");
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_readonly_property_is_a_configuration_error() {
    let (_, injector) = injector();
    injector.register_manifest(
        Manifest::<Binder>::new()
            .default_constructor()
            .readonly_property::<Database>("db", Inject::Optional),
    );

    assert!(matches!(
        injector.construct::<Binder>(Scope::Global, true),
        Err(InjectionError::ReadOnlyInjectionTarget { .. })
    ));
}

#[test]
fn test_ambiguous_constructors_are_reported() {
    let (_, injector) = injector();
    injector.register_manifest(
        Manifest::<Binder>::new()
            .constructor(vec![], |_| Ok(Binder))
            .constructor(vec![Param::required::<Database>("db")], |_| Ok(Binder)),
    );

    assert!(matches!(
        injector.construct::<Binder>(Scope::Global, true),
        Err(InjectionError::AmbiguousInjectionConstructor(_))
    ));
}

#[test]
fn test_abstract_types_cannot_be_constructed() {
    let (_, injector) = injector();
    assert!(matches!(
        injector.create(TypeKey::of::<dyn Logger>(), Scope::Global, true),
        Err(InjectionError::NoUsableConstructor(_))
    ));
}

struct Chicken;
struct Egg;

#[test]
fn test_cyclic_construction_is_detected() {
    let (_, injector) = injector();
    injector.register_manifest(
        Manifest::<Chicken>::new().constructor(vec![Param::required::<Egg>("egg")], |_| Ok(Chicken)),
    );
    injector.register_manifest(
        Manifest::<Egg>::new().constructor(vec![Param::required::<Chicken>("hen")], |_| Ok(Egg)),
    );

    let err = injector
        .construct::<Chicken>(Scope::Global, true)
        .err()
        .expect("construction should fail");

    match root_cause(&err) {
        InjectionError::CyclicConstruction { path } => assert_eq!(
            *path,
            vec![
                TypeKey::of::<Chicken>(),
                TypeKey::of::<Egg>(),
                TypeKey::of::<Chicken>()
            ]
        ),
        other => panic!("unexpected root cause: {other}"),
    }
}

// --- Components and scopes ---

#[derive(Default)]
struct Health {
    store: Slot<Database>,
}

impl Injectable for Health {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::component()
            .default_constructor()
            .field::<Database>("store", Inject::Required, |h, v| h.store.set(v))
    }
}

#[test]
fn test_component_is_attached_to_scope_node_once() -> Result<()> {
    let (graph, injector) = injector();
    injector.register::<Health>();
    let player = graph.create_node("player", None, None);

    let first = injector.construct::<Health>(Scope::Node(player), true)?;
    let second = injector.construct::<Health>(Scope::Node(player), true)?;

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(graph.components(player).len(), 1);
    assert!(first.store.get().is_some());

    let provided = injector.provide::<Health>(Scope::Node(player), false)?;
    assert!(Arc::ptr_eq(&first, &provided));
    Ok(())
}

#[test]
fn test_component_without_node_gets_fresh_root() -> Result<()> {
    let (graph, injector) = injector();
    injector.register::<Health>();
    let before = graph.node_count();

    injector.construct::<Health>(Scope::Global, true)?;

    assert_eq!(graph.node_count(), before + 1);
    Ok(())
}

#[test]
fn test_component_on_destroyed_node_fails() {
    let (graph, injector) = injector();
    injector.register::<Health>();
    let ghost = graph.create_node("ghost", None, None);
    graph.destroy_node(ghost);

    assert!(matches!(
        injector.construct::<Health>(Scope::Node(ghost), true),
        Err(InjectionError::MissingScope(_))
    ));
}

#[test]
fn test_context_override_beats_singleton() -> Result<()> {
    let (graph, injector) = injector();
    let singleton = Arc::new(Database);
    let local = Arc::new(Database);
    injector.singletons().try_set(Instance::new(singleton.clone()));
    let room = graph.create_node("room", None, None);
    let lamp = graph.create_node("lamp", Some(room), None);
    injector.contexts().create_local(room).register_value(local.clone());

    let in_room = injector.provide::<Database>(Scope::Node(lamp), false)?;
    let outside = injector.provide::<Database>(Scope::Global, false)?;

    assert!(Arc::ptr_eq(&in_room, &local));
    assert!(Arc::ptr_eq(&outside, &singleton));
    assert_eq!(injector.provide_all_as::<Database>(Scope::Node(lamp)).len(), 2);
    Ok(())
}

struct Clock;

impl Singleton for Clock {
    fn create() -> Option<Arc<Self>> {
        Some(Arc::new(Clock))
    }
}

#[test]
fn test_declared_singleton_is_provided_lazily() -> Result<()> {
    let (_, injector) = injector();
    injector.singletons().declare::<Clock>();

    let first = injector.provide::<Clock>(Scope::Global, false)?;
    let second = injector.provide::<Clock>(Scope::Global, false)?;

    assert!(Arc::ptr_eq(&first, &second));
    Ok(())
}

#[test]
fn test_inject_scene_reports_failures() -> Result<()> {
    let (graph, injector) = injector();
    injector.register::<Health>();
    let scene = graph.load_scene("Arena");
    let root = graph.create_node("arena", None, Some(scene));
    let unit = graph.create_node("unit", Some(root), None);
    let health = Arc::new(Health::default());
    graph.attach_component(unit, Instance::new(health.clone()));

    assert!(!injector.inject_scene(scene, false));

    injector.singletons().try_set(Instance::from_value(Database));
    assert!(injector.inject_scene(scene, false));
    assert!(health.store.get().is_some());
    Ok(())
}

#[test]
fn test_dependency_listing() {
    let (_, injector) = injector();
    let key = TypeKey::of::<Repository>();

    assert_eq!(
        injector.dependencies(key, false),
        vec![TypeKey::of::<Database>(), TypeKey::of::<dyn Logger>()]
    );
    assert_eq!(
        injector.dependencies(key, true),
        vec![
            TypeKey::of::<Database>(),
            TypeKey::of::<dyn Logger>(),
            TypeKey::of::<Metrics>()
        ]
    );
}
