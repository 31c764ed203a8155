//! Board errors and the user-facing error taxonomy.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use vaio_proto::{ModuleType, ProtoError};
use vaio_registry::RegistryError;
use vaio_session::SessionError;
use vaio_storage::{ApiError, StorageError};

/// Where an error surfaces to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ErrorCategory {
    /// Startup, registry and storage failures.
    System,
    /// Pane rendering and user input.
    Ui,
    /// Backend requests.
    Api,
    /// The socket channel.
    Socket,
    /// Session synchronization.
    Session,
}

impl ErrorCategory {
    /// Upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::Ui => "UI",
            Self::Api => "API",
            Self::Socket => "SOCKET",
            Self::Session => "SESSION",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from grid orchestration.
#[derive(Debug, Error)]
pub enum BoardError {
    /// The module registry could not start.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Session synchronization failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A backend request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A local store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No such module.
    #[error("module {module_type}-{identifier} not found")]
    ModuleNotFound {
        /// Requested type.
        module_type: ModuleType,
        /// Requested identifier.
        identifier: String,
    },

    /// A pane id could not be parsed.
    #[error("invalid pane id: {0}")]
    InvalidPaneId(String),

    /// A layout payload failed validation.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// The pane is not on the board.
    #[error("pane {0} is not active")]
    PaneNotActive(String),

    /// The socket channel failed.
    #[error("socket error: {0}")]
    Socket(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output could not be written.
    #[error("output error: {0}")]
    Output(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ProtoError> for BoardError {
    fn from(err: ProtoError) -> Self {
        Self::InvalidPaneId(err.to_string())
    }
}

impl BoardError {
    /// Taxonomy bucket of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Registry(_)
            | Self::Storage(_)
            | Self::Config(_)
            | Self::Output(_)
            | Self::Io(_)
            | Self::ModuleNotFound { .. } => ErrorCategory::System,
            Self::Session(_) => ErrorCategory::Session,
            Self::Api(_) => ErrorCategory::Api,
            Self::InvalidPaneId(_) | Self::InvalidLayout(_) | Self::PaneNotActive(_) => {
                ErrorCategory::Ui
            }
            Self::Socket(_) => ErrorCategory::Socket,
        }
    }
}
