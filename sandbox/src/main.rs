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

// Alchemy Engine Sandbox
// Boots a handful of demo services and tears them down again.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use alchemy_core::{ObjectHost, SceneGraph, TypeKey};
use alchemy_engine::{
    register_service, Engine, EngineConfig, EngineEvent, EngineService, ServiceCatalog,
    ServiceInfo,
};
use alchemy_inject::{Inject, Injectable, Manifest, Param, Service, Slot};
use anyhow::Result;
use async_trait::async_trait;

/// Shared settings every other service reads.
struct Settings {
    volume: f32,
}

#[async_trait]
impl Service for Settings {
    async fn on_service_init(&self) -> Result<()> {
        log::info!("Settings: volume at {:.0}%", self.volume * 100.0);
        Ok(())
    }
}

impl Injectable for Settings {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::new().constructor(vec![], |_| Ok(Settings { volume: 0.8 }))
    }
}

impl EngineService for Settings {
    fn info() -> ServiceInfo {
        ServiceInfo::new("Settings").required(true)
    }
}

/// Anything that can play a sound.
trait Output: Send + Sync {
    fn play(&self, clip: &str);
}

#[derive(Default)]
struct Speakers {
    played: AtomicU32,
}

impl Output for Speakers {
    fn play(&self, clip: &str) {
        self.played.fetch_add(1, Ordering::Relaxed);
        log::info!("Speakers: playing '{clip}'");
    }
}

#[async_trait]
impl Service for Speakers {
    fn on_service_destroy(&self) {
        log::info!(
            "Speakers: played {} clip(s)",
            self.played.load(Ordering::Relaxed)
        );
    }
}

impl Injectable for Speakers {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::new()
            .default_constructor()
            .implements::<dyn Output>(|s| s as Arc<dyn Output>)
    }
}

impl EngineService for Speakers {}

/// Mixes clips into whichever output is active.
struct Mixer {
    settings: Arc<Settings>,
    output: Slot<dyn Output>,
}

#[async_trait]
impl Service for Mixer {
    async fn on_service_init(&self) -> Result<()> {
        tokio::task::yield_now().await;
        if let Some(output) = self.output.get() {
            output.play("startup chime");
        }
        Ok(())
    }

    fn on_service_reset(&self) {
        log::info!("Mixer: reset at volume {:.2}", self.settings.volume);
    }
}

impl Injectable for Mixer {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::new()
            .inject_constructor(vec![Param::required::<Settings>("settings")], |args| {
                Ok(Mixer {
                    settings: args.require::<Settings>(0)?,
                    output: Slot::new(),
                })
            })
            .field::<dyn Output>("output", Inject::Required, |m, o| m.output.set(o))
    }
}

impl EngineService for Mixer {
    fn info() -> ServiceInfo {
        ServiceInfo::new("Mixer").priority(10)
    }
}

/// Disabled by the sandbox configuration.
#[derive(Default)]
struct Analytics;

impl Service for Analytics {}

impl Injectable for Analytics {
    fn manifest() -> Manifest<Self> {
        Manifest::<Self>::new().default_constructor()
    }
}

impl EngineService for Analytics {}

register_service!(Settings);
register_service!(Speakers);
register_service!(Mixer);
register_service!(Analytics);

fn load_config() -> Result<EngineConfig> {
    let mut config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.disable("Analytics");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    log::debug!("Sandbox config:\n{}", config.to_json_string()?);

    let graph = Arc::new(SceneGraph::new());
    graph.load_scene("Main");
    let engine = Engine::new(config, ServiceCatalog::discover(), graph.clone());
    engine.injector().declare_abstract::<dyn Output>();
    let events = engine.subscribe();

    engine.add_post_init_task(|| async {
        log::info!("Sandbox: every service is up.");
        anyhow::Ok(())
    });
    engine.start().await?;

    engine.get::<dyn Output>()?.play("menu theme");
    engine.reset(&[TypeKey::of::<Settings>()]);
    log::info!("Sandbox: {} node(s) in the scene graph.", graph.node_count());
    if let Some(root) = engine.root() {
        for child in graph.children(root) {
            log::info!("  - {}", graph.name(child).unwrap_or_default());
        }
    }

    engine.destroy();

    for event in events.try_iter() {
        match event {
            EngineEvent::InitProgress(progress) => {
                log::debug!("Event: progress {:.0}%", progress * 100.0)
            }
            other => log::info!("Event: {other:?}"),
        }
    }
    Ok(())
}
