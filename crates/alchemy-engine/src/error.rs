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

//! Errors raised while loading configuration and bootstrapping services.

use crate::engine::InitPhase;
use alchemy_core::TypeKey;
use alchemy_inject::InjectionError;
use std::sync::Arc;
use thiserror::Error;

/// Errors of the engine bootstrapper.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The enabled services depend on each other in a loop.
    #[error("cyclic service dependency: {}", format_cycle(.cycle))]
    CyclicServiceDependency {
        /// The services on the loop, the first one repeated at the end.
        cycle: Vec<TypeKey>,
    },

    /// A service could not be constructed or injected.
    #[error("failed to construct service {service}")]
    ServiceConstruction {
        /// The service being activated.
        service: TypeKey,
        /// The injection failure.
        #[source]
        source: InjectionError,
    },

    /// A service's init hook failed.
    #[error("service {service} failed to initialize")]
    ServiceInit {
        /// The service being initialized.
        service: TypeKey,
        /// The hook's error.
        #[source]
        source: anyhow::Error,
    },

    /// A pre-init or post-init task failed.
    #[error("{phase} task #{index} failed")]
    TaskFailed {
        /// The phase the task belonged to.
        phase: InitPhase,
        /// The task's position within its phase.
        index: usize,
        /// The task's error.
        #[source]
        source: anyhow::Error,
    },

    /// The constructed value does not implement the service contract.
    #[error("{0} is not a service")]
    NotAService(TypeKey),

    /// The engine was torn down while it was initializing.
    #[error("engine was destroyed during initialization")]
    Aborted,

    /// The configuration file could not be read.
    #[error("failed to read engine configuration")]
    ConfigIo(#[from] std::io::Error),

    /// The configuration is not valid JSON for [`EngineConfig`](crate::EngineConfig).
    #[error("invalid engine configuration")]
    Config(#[from] serde_json::Error),

    /// A previous initialization failed; the engine stays faulted until destroyed.
    #[error(transparent)]
    Faulted(Arc<EngineError>),

    /// A lookup through the injector failed.
    #[error(transparent)]
    Injection(#[from] InjectionError),
}

impl EngineError {
    /// The underlying error, looking through [`EngineError::Faulted`].
    #[must_use]
    pub fn cause(&self) -> &EngineError {
        match self {
            EngineError::Faulted(inner) => inner.cause(),
            other => other,
        }
    }
}

/// Result alias for engine operations.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

fn format_cycle(cycle: &[TypeKey]) -> String {
    cycle
        .iter()
        .map(|key| key.short_name())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Audio;
    struct Input;

    #[test]
    fn test_cycle_message_names_every_service() {
        let err = EngineError::CyclicServiceDependency {
            cycle: vec![
                TypeKey::of::<Audio>(),
                TypeKey::of::<Input>(),
                TypeKey::of::<Audio>(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "cyclic service dependency: Audio -> Input -> Audio"
        );
    }

    #[test]
    fn test_cause_unwraps_faulted() {
        let err = EngineError::Faulted(Arc::new(EngineError::Aborted));
        assert!(matches!(err.cause(), EngineError::Aborted));
    }
}
