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

//! Error types for resolution, construction and injection.

use alchemy_core::{NodeId, TypeKey};
use thiserror::Error;

/// Everything that can go wrong while resolving or injecting a dependency.
#[derive(Debug, Error)]
pub enum InjectionError {
    /// No provider could supply the type and construction was not allowed.
    #[error("no provider could supply `{0}`")]
    DependencyUnresolved(TypeKey),

    /// The first capable provider reported it could supply the type, then
    /// produced nothing.
    #[error("provider '{provider}' reported it can supply `{key}` but produced nothing")]
    ProviderFailed {
        /// Name of the failing provider.
        provider: String,
        /// The requested type.
        key: TypeKey,
    },

    /// A required constructor or method parameter could not be resolved.
    #[error("cannot resolve parameter '{param}: {dependency}' of `{target}::{member}`")]
    ParameterUnresolved {
        /// The type being built or injected.
        target: TypeKey,
        /// The constructor or method name.
        member: String,
        /// The parameter name.
        param: String,
        /// The parameter type.
        dependency: TypeKey,
        /// Why resolution failed.
        #[source]
        source: Box<InjectionError>,
    },

    /// A required field or property could not be resolved.
    #[error("cannot inject `{dependency}` into `{target}.{member}`")]
    MemberUnresolved {
        /// The type being injected.
        target: TypeKey,
        /// The field or property name.
        member: String,
        /// The member type.
        dependency: TypeKey,
        /// Why resolution failed.
        #[source]
        source: Box<InjectionError>,
    },

    /// More than one constructor is marked for injection, or several
    /// constructors exist and none is marked.
    #[error("cannot pick an injection constructor for `{0}`")]
    AmbiguousInjectionConstructor(TypeKey),

    /// The type is abstract, undeclared or has no constructor.
    #[error("`{0}` has no usable constructor")]
    NoUsableConstructor(TypeKey),

    /// A property marked for injection has no setter.
    #[error("cannot inject `{target}.{member}` because it is read-only")]
    ReadOnlyInjectionTarget {
        /// The type being injected.
        target: TypeKey,
        /// The property name.
        member: String,
    },

    /// The constructor itself returned an error.
    #[error("constructor of `{target}` failed")]
    ConstructorFailed {
        /// The type being built.
        target: TypeKey,
        /// The constructor's error.
        #[source]
        source: anyhow::Error,
    },

    /// Forced construction re-entered a type that is already being built.
    #[error("cyclic construction: {}", format_path(.path))]
    CyclicConstruction {
        /// The construction stack, ending with the repeated type.
        path: Vec<TypeKey>,
    },

    /// A singleton of this type is already registered.
    #[error("singleton of type `{0}` already exists")]
    DuplicateSingletonRegistration(TypeKey),

    /// No singleton of this type exists and none could be created.
    #[error("singleton of type `{0}` does not exist")]
    SingletonMissing(TypeKey),

    /// An instance was not of the expected type.
    #[error("expected an instance of `{expected}`, found `{found}`")]
    TypeMismatch {
        /// The requested type.
        expected: TypeKey,
        /// The type actually received.
        found: TypeKey,
    },

    /// The node a request was scoped to has been destroyed.
    #[error("scope {0} no longer exists")]
    MissingScope(NodeId),
}

fn format_path(path: &[TypeKey]) -> String {
    path.iter()
        .map(|key| key.short_name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Convenience alias for results produced by this crate.
pub type Result<T, E = InjectionError> = std::result::Result<T, E>;
