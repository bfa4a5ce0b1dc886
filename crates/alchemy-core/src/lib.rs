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

//! # Alchemy Core
//!
//! Foundational crate of the Alchemy injection framework: runtime type
//! identity and the declared-type catalog, keyed registries, dependency
//! ordering, the generic event bus, and the contract through which a host
//! exposes its object hierarchy.

#![warn(missing_docs)]

pub mod event;
pub mod graph;
pub mod host;
pub mod registry;
pub mod types;

pub use host::{NodeId, ObjectHost, SceneGraph, SceneId};
pub use registry::{Registry, TypeRegistry};
pub use types::{Instance, TypeCatalog, TypeInfo, TypeKey, TypeKind};
