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

//! # Alchemy Inject
//!
//! The dependency injection container of the Alchemy framework.
//!
//! Requests for a type flow through an [`Injector`]. It consults a
//! priority-ordered [`ProviderChain`] (scoped context overrides, attached
//! components, active services, singletons) and, when asked to, falls back
//! to building the type from its [`Manifest`]: constructor first, then
//! fields, properties and methods.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod injector;
pub mod manifest;
pub mod provider;
/// Built-in providers.
pub mod providers;
pub mod scope;
pub mod service;
pub mod singleton;
pub mod slot;

pub use context::{ContextEntry, ContextOwner, ContextTree, InjectionContext};
pub use error::InjectionError;
pub use injector::Injector;
pub use manifest::{Args, Inject, Injectable, Manifest, Param, TypeManifest};
pub use provider::{FnProvider, Provide, Provider, ProviderChain, ResolutionPolicy, Typed};
pub use scope::Scope;
pub use service::{Service, ServiceDirectory, ServiceState};
pub use singleton::{Singleton, SingletonDirectory};
pub use slot::Slot;
