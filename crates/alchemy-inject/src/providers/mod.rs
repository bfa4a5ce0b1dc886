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

//! The built-in providers every injector starts with.
//!
//! | Provider | Priority | Answers from |
//! |---|---|---|
//! | [`ContextProvider`] | 9999 | the context tree, nearest scope first |
//! | [`ComponentProvider`] | 0 | components attached to the scope's node |
//! | [`ServiceProvider`] | 0 | the active service directory |
//! | [`SingletonProvider`] | 0 | the singleton directory, creating declared singletons |

mod component;
mod context;
mod service;
mod singleton;

pub use component::ComponentProvider;
pub use context::ContextProvider;
pub use service::ServiceProvider;
pub use singleton::SingletonProvider;

/// Priority of the context provider, above every other built-in.
pub const CONTEXT_PRIORITY: i32 = 9999;
