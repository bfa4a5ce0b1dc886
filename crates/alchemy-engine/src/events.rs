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

//! Lifecycle notifications published by the engine.

use alchemy_core::TypeKey;

/// An engine lifecycle event.
///
/// Delivered to every subscriber of [`Engine::subscribe`](crate::Engine::subscribe).
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine root object was created.
    EngineStarted,
    /// An initialization run began.
    InitStarted,
    /// Overall initialization progress, from `0.0` to `1.0`.
    InitProgress(f32),
    /// Every phase of the run completed.
    InitCompleted,
    /// Services were reset; carries the excluded service types.
    EngineReset(Vec<TypeKey>),
    /// Every service was torn down.
    EngineDestroyed,
}
