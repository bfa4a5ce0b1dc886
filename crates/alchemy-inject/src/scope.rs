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

//! Request scopes.

use alchemy_core::{NodeId, SceneId};

/// The ambient scope of a request.
///
/// A scope selects which injection context applies, which node components
/// are looked up on, and where newly created components are attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// No particular object. Lookups use the global context.
    #[default]
    Global,
    /// A whole scene.
    Scene(SceneId),
    /// A node and, through the context tree, its ancestors.
    Node(NodeId),
}

impl Scope {
    /// The node this scope points at, if any.
    pub fn node(self) -> Option<NodeId> {
        match self {
            Scope::Node(node) => Some(node),
            _ => None,
        }
    }
}

impl From<NodeId> for Scope {
    fn from(node: NodeId) -> Self {
        Scope::Node(node)
    }
}

impl From<SceneId> for Scope {
    fn from(scene: SceneId) -> Self {
        Scope::Scene(scene)
    }
}
