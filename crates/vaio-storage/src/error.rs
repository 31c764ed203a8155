//! Error types for the storage tiers.

use thiserror::Error;

/// Errors from the key-value tiers.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key contains characters that cannot be used as a file name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
}

/// Errors from the backend REST client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered with a non-2xx status.
    #[error("{endpoint} returned {status}: {body}")]
    Status {
        /// Request path.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Connection or protocol failure.
    #[error("transport error on {endpoint}: {message}")]
    Transport {
        /// Request path.
        endpoint: String,
        /// Underlying error message.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("request to {endpoint} timed out")]
    Timeout {
        /// Request path.
        endpoint: String,
    },

    /// The response body was not the expected JSON.
    #[error("could not decode response from {endpoint}: {message}")]
    Decode {
        /// Request path.
        endpoint: String,
        /// Decoder message.
        message: String,
    },
}

impl ApiError {
    /// Whether retrying the same request may succeed.
    ///
    /// Timeouts, transport failures, 5xx and 429 are transient.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Decode { .. } => false,
        }
    }

    /// The endpoint the failing request was sent to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Status { endpoint, .. }
            | Self::Transport { endpoint, .. }
            | Self::Timeout { endpoint }
            | Self::Decode { endpoint, .. } => endpoint,
        }
    }

    /// HTTP status, if the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
