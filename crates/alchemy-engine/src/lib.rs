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

//! The Alchemy engine bootstrapper.
//!
//! Services are declared through [`EngineService`], collected into a
//! [`ServiceCatalog`] (by hand or through [`register_service!`]), filtered by
//! the [`EngineConfig`], ordered by priority and dependency, and then driven
//! through a staged, single-flight initialization by the [`Engine`].

#![warn(missing_docs)]

pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod events;
pub mod ordering;

pub use config::{EngineConfig, ServiceList, ServiceToggle};
pub use descriptor::{
    EngineService, ServiceCatalog, ServiceDescriptor, ServiceInfo, ServiceRegistration,
};
pub use engine::{Engine, EngineState, InitPhase, ENGINE_ROOT_NAME};
pub use error::{EngineError, Result};
pub use events::EngineEvent;
pub use ordering::activation_order;

#[doc(hidden)]
pub use inventory;
