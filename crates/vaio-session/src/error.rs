//! Session manager errors.

use thiserror::Error;
use vaio_storage::{ApiError, StorageError};

/// Errors from session synchronization.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The backend session did not have the expected shape.
    #[error("invalid session shape: {0}")]
    InvalidShape(String),

    /// A backend request failed, after any retries.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A local storage tier failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A pane id could not be parsed.
    #[error("invalid pane id: {0}")]
    InvalidPaneId(String),

    /// No tier holds a session.
    #[error("no session available: {0}")]
    Unavailable(String),
}

impl SessionError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Api(e) if e.is_transient())
    }
}
