//! Error types for the registries.

use std::fmt;

use thiserror::Error;
use vaio_proto::ModuleType;

/// A module registry initialization source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStrategy {
    /// The durable module cache.
    Cache,
    /// The compiled-in module catalog.
    StaticDiscovery,
    /// The backend module list.
    Backend,
}

impl fmt::Display for InitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cache => "cache",
            Self::StaticDiscovery => "static discovery",
            Self::Backend => "backend",
        })
    }
}

/// Why one initialization source was not used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    /// The source that failed.
    pub strategy: InitStrategy,
    /// What went wrong.
    pub reason: String,
}

impl fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

fn join_failures(failures: &[StrategyFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Module registry errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Every initialization source failed.
    #[error("module registry initialization failed ({})", join_failures(.failures))]
    InitializationExhausted {
        /// One entry per attempted source, in order.
        failures: Vec<StrategyFailure>,
    },

    /// An operation needed an initialized registry.
    #[error("module registry is not initialized")]
    NotInitialized,
}

/// Component load errors. Cloneable so one result can be shared by every
/// waiter of a load.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// No module with this type and identifier is known.
    #[error("module {module_type}-{static_identifier} not found")]
    ModuleNotFound {
        /// Requested type.
        module_type: ModuleType,
        /// Requested identifier.
        static_identifier: String,
    },

    /// The module is known but has no local implementation.
    #[error("module {0} has no component loader")]
    NoLoader(String),

    /// The loader ran and failed.
    #[error("component load failed: {0}")]
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_lists_each_strategy() {
        let err = RegistryError::InitializationExhausted {
            failures: vec![
                StrategyFailure {
                    strategy: InitStrategy::Cache,
                    reason: "empty".into(),
                },
                StrategyFailure {
                    strategy: InitStrategy::Backend,
                    reason: "timed out".into(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "module registry initialization failed (cache: empty; backend: timed out)"
        );
    }

    #[test]
    fn test_load_error_messages() {
        let err = LoadError::ModuleNotFound {
            module_type: ModuleType::Service,
            static_identifier: "NvidiaPane".into(),
        };
        assert_eq!(err.to_string(), "module SERVICE-NvidiaPane not found");
    }
}
