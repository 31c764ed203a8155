//! Error types for the vaio-proto crate.

use thiserror::Error;

/// Errors raised when constructing typed identifiers or wire types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// The string is not a `TYPE-staticIdentifier[-instanceId]` pane id.
    #[error("invalid pane id: {0}")]
    InvalidPaneId(String),

    /// The module type is not one of SYSTEM, SERVICE or USER.
    #[error("invalid module type: {0}")]
    InvalidModuleType(String),

    /// The instance id is empty.
    #[error("invalid instance id: {0}")]
    InvalidInstanceId(String),

    /// Any other validation failure.
    #[error("validation error: {0}")]
    Validation(String),
}
