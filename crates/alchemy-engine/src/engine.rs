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

//! The staged engine bootstrapper.
//!
//! An [`Engine`] owns the injector, the service catalog and the lifecycle
//! state machine:
//!
//! ```text
//! Uninitialized -> Initializing(PreInit -> ServiceInit -> PostInit) -> Initialized
//!                                   \-> Faulted
//! ```
//!
//! Initialization is single-flight: callers arriving while a run is in
//! progress wait for that run instead of starting another one. Destroying the
//! engine mid-run abandons the run at its next checkpoint and resolves every
//! waiting caller with [`EngineError::Aborted`].

use crate::config::{EngineConfig, ServiceList};
use crate::descriptor::{ServiceCatalog, ServiceDescriptor};
use crate::error::{EngineError, Result};
use crate::events::EngineEvent;
use crate::ordering::activation_order;
use alchemy_core::event::EventBus;
use alchemy_core::{Instance, NodeId, ObjectHost, TypeKey};
use alchemy_inject::{InjectionError, Injector, Scope, Service, ServiceDirectory, ServiceState};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// Name of the node every service node is parented to.
pub const ENGINE_ROOT_NAME: &str = "Alchemy<Engine>";

/// A sub-phase of initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InitPhase {
    /// User tasks running before any service is built.
    PreInit,
    /// Services being constructed, injected and initialized.
    ServiceInit,
    /// User tasks running after every service initialized.
    PostInit,
}

impl InitPhase {
    /// The share of overall progress this phase covers.
    #[must_use]
    pub fn progress_range(self) -> (f32, f32) {
        match self {
            InitPhase::PreInit => (0.0, 0.25),
            InitPhase::ServiceInit => (0.25, 0.75),
            InitPhase::PostInit => (0.75, 1.0),
        }
    }
}

impl fmt::Display for InitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InitPhase::PreInit => "pre-init",
            InitPhase::ServiceInit => "service-init",
            InitPhase::PostInit => "post-init",
        })
    }
}

/// Top-level lifecycle state of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Not initialized, or destroyed.
    #[default]
    Uninitialized,
    /// A run is in progress.
    Initializing(InitPhase),
    /// Every phase completed.
    Initialized,
    /// The last run failed. Cleared by [`Engine::destroy`].
    Faulted,
}

type TaskFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type InitTask = Box<dyn FnOnce() -> TaskFuture + Send>;
type Outcome = std::result::Result<(), Arc<EngineError>>;

#[derive(Default)]
struct Lifecycle {
    state: EngineState,
    root: Option<NodeId>,
    pre_init: Vec<InitTask>,
    post_init: Vec<InitTask>,
    late: Vec<(InitPhase, InitTask)>,
    in_flight: Option<watch::Sender<Option<Outcome>>>,
    failure: Option<Arc<EngineError>>,
}

/// How a call to [`Engine::initialize`] takes part in the lifecycle.
enum Flight {
    Ready,
    Faulted(Arc<EngineError>),
    Follow(watch::Receiver<Option<Outcome>>),
    Lead(u64, watch::Receiver<Option<Outcome>>),
}

/// Held by the caller driving a run. Dropping the run before it finished
/// aborts it, so its waiters are released and a later call can lead again.
struct LeadGuard<'a> {
    engine: &'a Engine,
    generation: u64,
}

impl Drop for LeadGuard<'_> {
    fn drop(&mut self) {
        self.engine.abandon(self.generation);
    }
}

/// The engine bootstrapper.
pub struct Engine {
    config: EngineConfig,
    catalog: ServiceCatalog,
    injector: Arc<Injector>,
    events: EventBus<EngineEvent>,
    lifecycle: Mutex<Lifecycle>,
    /// Bumped by every teardown; a run only continues while it is unchanged.
    generation: AtomicU64,
}

impl Engine {
    /// Creates an engine over `host` with a fresh injector.
    pub fn new(config: EngineConfig, catalog: ServiceCatalog, host: Arc<dyn ObjectHost>) -> Self {
        Self::with_injector(config, catalog, Arc::new(Injector::new(host)))
    }

    /// Creates an engine around an existing injector.
    ///
    /// The manifest of every catalogued service is registered with it.
    pub fn with_injector(
        config: EngineConfig,
        catalog: ServiceCatalog,
        injector: Arc<Injector>,
    ) -> Self {
        catalog.install(&injector);
        log::info!(
            "Engine: Created with {} declared service(s).",
            catalog.len()
        );
        Self {
            config,
            catalog,
            injector,
            events: EventBus::new(),
            lifecycle: Mutex::new(Lifecycle::default()),
            generation: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // --- Accessors ---

    /// The engine settings.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The declared services.
    #[must_use]
    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    /// The injector used to build services.
    #[must_use]
    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    /// The directory of active services.
    #[must_use]
    pub fn services(&self) -> &ServiceDirectory {
        self.injector.services()
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> EngineState {
        self.lock().state
    }

    /// The engine root node, once created.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.lock().root
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> flume::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// The declared services, resolved against the configuration.
    #[must_use]
    pub fn service_list(&self) -> ServiceList {
        ServiceList::resolve(&self.catalog, &self.config, self.injector.catalog())
    }

    fn scope(&self) -> Scope {
        self.root().map_or(Scope::Global, Scope::Node)
    }

    // --- Root ---

    fn ensure_root(&self) -> NodeId {
        let host = self.injector.host();
        let root = {
            let mut lifecycle = self.lock();
            if let Some(root) = lifecycle.root.filter(|root| !host.is_destroyed(*root)) {
                return root;
            }
            let root = host.create_node(ENGINE_ROOT_NAME, None, None);
            lifecycle.root = Some(root);
            root
        };

        if self.config.override_object_layer {
            host.set_layer(root, self.config.object_layer);
        }
        if self.config.scene_independent {
            host.make_persistent(root);
        }
        log::info!("Engine: Created root object '{ENGINE_ROOT_NAME}' ({root}).");
        self.events.publish(EngineEvent::EngineStarted);
        root
    }

    /// Creates the engine root and, if configured to, initializes.
    pub async fn start(&self) -> Result<()> {
        self.ensure_root();
        if self.config.auto_initialize {
            self.initialize().await
        } else {
            log::info!("Engine: Auto-initialization is disabled.");
            Ok(())
        }
    }

    // --- Tasks ---

    /// Adds a task to run before any service is built.
    ///
    /// A task added while a run is in flight runs after that run completes.
    /// Once initialized, it is spawned right away on the current runtime.
    pub fn add_pre_init_task<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_task(
            InitPhase::PreInit,
            Box::new(move || -> TaskFuture { Box::pin(task()) }),
        );
    }

    /// Adds a task to run after every service initialized.
    ///
    /// A task added while a run is in flight runs after that run completes.
    /// Once initialized, it is spawned right away on the current runtime.
    pub fn add_post_init_task<F, Fut>(&self, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.add_task(
            InitPhase::PostInit,
            Box::new(move || -> TaskFuture { Box::pin(task()) }),
        );
    }

    fn add_task(&self, phase: InitPhase, task: InitTask) {
        let mut lifecycle = self.lock();
        match (lifecycle.state, phase) {
            (EngineState::Uninitialized | EngineState::Faulted, InitPhase::PreInit) => {
                lifecycle.pre_init.push(task);
            }
            (EngineState::Uninitialized | EngineState::Faulted, _) => {
                lifecycle.post_init.push(task);
            }
            (EngineState::Initialized, _) => match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    log::warn!("Engine: A {phase} task was added after initialization; running it now.");
                    runtime.spawn(async move {
                        if let Err(err) = task().await {
                            log::error!("Engine: Late {phase} task failed: {err:#}");
                        }
                    });
                }
                Err(_) => {
                    log::warn!(
                        "Engine: A {phase} task was added after initialization outside a runtime; it runs on the next initialize()."
                    );
                    lifecycle.late.push((phase, task));
                }
            },
            (state, _) => {
                log::warn!(
                    "Engine: A {phase} task was added while {state:?}; it runs after the current initialization."
                );
                lifecycle.late.push((phase, task));
            }
        }
    }

    async fn run_late_tasks(&self) {
        let late = std::mem::take(&mut self.lock().late);
        for (phase, task) in late {
            if let Err(err) = task().await {
                log::error!("Engine: Late {phase} task failed: {err:#}");
            }
        }
    }

    // --- Initialize ---

    fn board(&self) -> Flight {
        let mut lifecycle = self.lock();
        match lifecycle.state {
            EngineState::Initialized => Flight::Ready,
            EngineState::Faulted => Flight::Faulted(
                lifecycle
                    .failure
                    .clone()
                    .unwrap_or_else(|| Arc::new(EngineError::Aborted)),
            ),
            EngineState::Initializing(_) => match &lifecycle.in_flight {
                Some(sender) => Flight::Follow(sender.subscribe()),
                None => Flight::Faulted(Arc::new(EngineError::Aborted)),
            },
            EngineState::Uninitialized => {
                let (sender, receiver) = watch::channel(None);
                lifecycle.in_flight = Some(sender);
                lifecycle.state = EngineState::Initializing(InitPhase::PreInit);
                Flight::Lead(self.generation.load(Ordering::SeqCst), receiver)
            }
        }
    }

    /// Runs the pre-init tasks, activates every enabled service in
    /// dependency order, then runs the post-init tasks.
    ///
    /// Does nothing once initialized. While a run is in progress, waits for
    /// that run and reports its outcome.
    ///
    /// # Errors
    ///
    /// * [`EngineError::Faulted`] wrapping the failure of the run: a
    ///   dependency cycle, a service that could not be built or failed to
    ///   initialize, or a failed task. The engine stays
    ///   [`EngineState::Faulted`] until destroyed.
    /// * [`EngineError::Aborted`] if the engine was destroyed during the run,
    ///   or the call leading it was dropped before it finished.
    pub async fn initialize(&self) -> Result<()> {
        let mut receiver = match self.board() {
            Flight::Ready => {
                self.run_late_tasks().await;
                return Ok(());
            }
            Flight::Faulted(err) => return Err(EngineError::Faulted(err)),
            Flight::Follow(receiver) => {
                log::debug!("Engine: Initialization already in flight; waiting for it.");
                receiver
            }
            Flight::Lead(generation, receiver) => {
                let _guard = LeadGuard {
                    engine: self,
                    generation,
                };
                let result = self.bootstrap(generation).await;
                self.finish(generation, result);
                receiver
            }
        };

        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .map(|outcome| outcome.clone());
        match outcome {
            Ok(Some(Ok(()))) => {
                self.run_late_tasks().await;
                Ok(())
            }
            Ok(Some(Err(err))) if matches!(*err, EngineError::Aborted) => {
                Err(EngineError::Aborted)
            }
            Ok(Some(Err(err))) => Err(EngineError::Faulted(err)),
            Ok(None) | Err(_) => Err(EngineError::Aborted),
        }
    }

    fn finish(&self, generation: u64, result: Result<()>) {
        let outcome: Outcome = result.map_err(Arc::new);
        {
            let mut lifecycle = self.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                // Destroyed mid-run; the teardown already resolved the waiters.
                return;
            }
            match &outcome {
                Ok(()) => lifecycle.state = EngineState::Initialized,
                Err(err) => {
                    lifecycle.state = EngineState::Faulted;
                    lifecycle.failure = Some(err.clone());
                }
            }
            if let Some(sender) = lifecycle.in_flight.take() {
                sender.send_replace(Some(outcome.clone()));
            }
        }

        match outcome {
            Ok(()) => {
                log::info!("Engine: Initialization complete.");
                self.events.publish(EngineEvent::InitCompleted);
            }
            Err(err) => log::error!("Engine: Initialization failed: {err}"),
        }
    }

    /// Aborts the run of `generation` if it never finished.
    fn abandon(&self, generation: u64) {
        let sender = {
            let mut lifecycle = self.lock();
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let Some(sender) = lifecycle.in_flight.take() else {
                return;
            };
            lifecycle.state = EngineState::Uninitialized;
            sender
        };
        log::warn!("Engine: The initializing caller went away; the run is abandoned.");
        sender.send_replace(Some(Err(Arc::new(EngineError::Aborted))));
    }

    async fn bootstrap(&self, generation: u64) -> Result<()> {
        log::info!("Engine: Initializing...");
        self.events.publish(EngineEvent::InitStarted);
        let root = self.ensure_root();

        let pre_init = std::mem::take(&mut self.lock().pre_init);
        self.run_tasks(InitPhase::PreInit, pre_init, generation)
            .await?;

        self.enter_phase(InitPhase::ServiceInit, generation)?;
        let active = self.service_list().active();
        self.mark_selection(&active);
        let order = activation_order(&active, &self.injector)?;
        log::info!("Engine: Activating {} service(s).", order.len());
        for (index, descriptor) in order.iter().enumerate() {
            self.ensure_alive(generation)?;
            self.activate(descriptor, root).await?;
            self.ensure_alive(generation)?;
            self.report_progress(InitPhase::ServiceInit, index + 1, order.len());
        }
        if order.is_empty() {
            self.report_progress(InitPhase::ServiceInit, 0, 0);
        }

        self.enter_phase(InitPhase::PostInit, generation)?;
        let post_init = std::mem::take(&mut self.lock().post_init);
        self.run_tasks(InitPhase::PostInit, post_init, generation)
            .await
    }

    /// Records which catalogued services take part in this run.
    fn mark_selection(&self, active: &[ServiceDescriptor]) {
        let services = self.services();
        for descriptor in self.catalog.iter() {
            let key = descriptor.key();
            if services.contains(key, false) {
                continue;
            }
            let state = if active.iter().any(|d| d.key() == key) {
                ServiceState::Enabled
            } else {
                ServiceState::Disabled
            };
            services.set_state(key, state);
        }
    }

    fn ensure_alive(&self, generation: u64) -> Result<()> {
        if self.generation.load(Ordering::SeqCst) == generation {
            return Ok(());
        }
        log::warn!("Engine: Destroyed during initialization; abandoning the run.");
        Err(EngineError::Aborted)
    }

    fn enter_phase(&self, phase: InitPhase, generation: u64) -> Result<()> {
        let mut lifecycle = self.lock();
        self.ensure_alive(generation)?;
        lifecycle.state = EngineState::Initializing(phase);
        log::debug!("Engine: Entering {phase}.");
        Ok(())
    }

    fn report_progress(&self, phase: InitPhase, done: usize, total: usize) {
        let (start, end) = phase.progress_range();
        let progress = if total == 0 {
            end
        } else {
            start + (end - start) * done as f32 / total as f32
        };
        log::debug!("Engine: Initialization at {:.0}%.", progress * 100.0);
        self.events.publish(EngineEvent::InitProgress(progress));
    }

    async fn run_tasks(
        &self,
        phase: InitPhase,
        tasks: Vec<InitTask>,
        generation: u64,
    ) -> Result<()> {
        let total = tasks.len();
        for (index, task) in tasks.into_iter().enumerate() {
            self.ensure_alive(generation)?;
            task().await.map_err(|source| {
                log::error!("Engine: {phase} task #{index} failed: {source:#}");
                EngineError::TaskFailed {
                    phase,
                    index,
                    source,
                }
            })?;
            self.ensure_alive(generation)?;
            self.report_progress(phase, index + 1, total);
        }
        if total == 0 {
            self.report_progress(phase, 0, 0);
        }
        Ok(())
    }

    /// Builds, registers and initializes one service under its own node.
    async fn activate(&self, descriptor: &ServiceDescriptor, root: NodeId) -> Result<()> {
        let key = descriptor.key();
        let services = self.injector.services();
        if services.contains(key, false) {
            log::debug!("Engine: Service '{}' is already active.", descriptor.name());
            return Ok(());
        }

        let host = self.injector.host();
        let node = host.create_node(descriptor.name(), Some(root), None);
        if self.config.override_object_layer {
            host.set_layer(node, self.config.object_layer);
        }

        let instance = self.build_service(key, Scope::Node(node)).map_err(|source| {
            log::error!(
                "Engine: Failed to construct service '{}': {source}",
                descriptor.name()
            );
            EngineError::ServiceConstruction {
                service: key,
                source,
            }
        })?;
        let handle = descriptor.as_service(&instance).ok_or_else(|| {
            log::error!("Engine: {} does not implement the service contract.", key);
            EngineError::NotAService(key)
        })?;

        services.register(instance, Arc::clone(&handle));
        services.set_state(key, ServiceState::Initializing);
        log::info!("Engine: Initializing service '{}'...", descriptor.name());
        handle.on_service_init().await.map_err(|source| {
            log::error!(
                "Engine: Service '{}' failed to initialize: {source:#}",
                descriptor.name()
            );
            EngineError::ServiceInit {
                service: key,
                source,
            }
        })?;
        services.set_state(key, ServiceState::Initialized);
        Ok(())
    }

    /// Resolves a service through the providers, or builds and injects it.
    fn build_service(
        &self,
        key: TypeKey,
        scope: Scope,
    ) -> std::result::Result<Instance, InjectionError> {
        match self.injector.try_provide(key, scope, false) {
            Err(InjectionError::DependencyUnresolved(_)) => {
                let instance = self.injector.instantiate(key, scope, true)?;
                self.services().set_state(key, ServiceState::Constructed);
                self.injector.inject(&instance, scope, true)?;
                Ok(instance)
            }
            provided => provided,
        }
    }

    // --- Reset & destroy ---

    /// Calls the reset hook of every active service not in `excluding`.
    ///
    /// Exclusions match subtypes too. Only meaningful once initialized;
    /// returns `false` otherwise.
    pub fn reset(&self, excluding: &[TypeKey]) -> bool {
        let state = self.state();
        if state != EngineState::Initialized {
            log::warn!("Engine: Cannot reset while {state:?}.");
            return false;
        }

        let catalog = self.injector.catalog();
        let services = self.services();
        for (key, handle) in services.entries() {
            if excluding.iter().any(|excluded| catalog.is_subtype(key, *excluded)) {
                continue;
            }
            services.set_state(key, ServiceState::Resetting);
            handle.on_service_reset();
            services.set_state(key, ServiceState::Initialized);
        }
        log::info!("Engine: Reset complete.");
        self.events
            .publish(EngineEvent::EngineReset(excluding.to_vec()));
        true
    }

    /// Tears every service down, in directory order, and returns the engine
    /// to [`EngineState::Uninitialized`].
    ///
    /// A run in progress is abandoned and its waiters receive
    /// [`EngineError::Aborted`]. Calling this on an engine with nothing to
    /// tear down is a no-op.
    pub fn destroy(&self) {
        let (root, in_flight) = {
            let mut lifecycle = self.lock();
            if lifecycle.state == EngineState::Uninitialized && self.services().is_empty() {
                log::debug!("Engine: Nothing to destroy.");
                return;
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            lifecycle.state = EngineState::Uninitialized;
            lifecycle.failure = None;
            lifecycle.late.clear();
            (lifecycle.root, lifecycle.in_flight.take())
        };

        if let Some(sender) = in_flight {
            log::warn!("Engine: Destroyed while initializing; pending callers are aborted.");
            sender.send_replace(Some(Err(Arc::new(EngineError::Aborted))));
        }

        let services = self.services();
        for (key, handle) in services.entries() {
            log::debug!("Engine: Destroying service {key}.");
            handle.on_service_destroy();
            services.set_state(key, ServiceState::Destroyed);
        }
        services.clear();

        if let Some(root) = root {
            let host = self.injector.host();
            for child in host.children(root) {
                host.destroy_node(child);
            }
        }
        log::info!("Engine: Destroyed.");
        self.events.publish(EngineEvent::EngineDestroyed);
    }

    // --- Lookups ---

    /// Resolves `T` from the engine's scope without constructing anything.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        Ok(self.injector.provide::<T>(self.scope(), false)?)
    }

    /// Resolves `T` from the engine's scope, constructing it if `force` is set.
    pub fn try_get<T: ?Sized + Send + Sync + 'static>(&self, force: bool) -> Option<Arc<T>> {
        self.injector.provide::<T>(self.scope(), force).ok()
    }

    /// Returns the active service `T`, building and registering it under the
    /// engine root if it is not active yet.
    ///
    /// A service created this way is injected but its init hook is not run.
    pub fn get_or_create<T: Service>(&self) -> Result<Arc<T>> {
        let services = self.services();
        if let Some(existing) = services.try_get_as::<T>() {
            return Ok(existing);
        }

        let root = self.ensure_root();
        let service = self.injector.provide::<T>(Scope::Node(root), true)?;
        if services.register_typed(Arc::clone(&service)) {
            log::info!(
                "Engine: Registered service {} on first use.",
                TypeKey::of::<T>()
            );
        }
        Ok(service)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("services", &self.catalog.len())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ranges_cover_the_whole_run() {
        let phases = [
            InitPhase::PreInit,
            InitPhase::ServiceInit,
            InitPhase::PostInit,
        ];
        let mut end = 0.0;
        for phase in phases {
            let (start, stop) = phase.progress_range();
            assert_eq!(start, end);
            end = stop;
        }
        assert_eq!(end, 1.0);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(InitPhase::ServiceInit.to_string(), "service-init");
    }
}
