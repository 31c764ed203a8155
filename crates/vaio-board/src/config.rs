//! Board configuration.

use std::path::PathBuf;
use std::time::Duration;

use vaio_session::SessionConfig;
use vaio_storage::MODULE_CACHE_MAX_AGE;

use crate::socket::Backoff;

/// Default backend address.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Everything [`Board::bootstrap`](crate::Board::bootstrap) needs to wire
/// the board together.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Backend REST base URL.
    pub backend_url: String,
    /// Socket channel URL. Without one, events stay in-process.
    pub socket_url: Option<String>,
    /// Directory for the durable store. Without one, the durable tier is
    /// in-memory.
    pub state_dir: Option<PathBuf>,
    /// Per-request backend timeout.
    pub request_timeout: Duration,
    /// Session retry and debounce settings.
    pub session: SessionConfig,
    /// Freshness limit for the module cache.
    pub module_cache_max_age: Duration,
    /// Socket reconnect schedule.
    pub reconnect: Backoff,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            socket_url: None,
            state_dir: None,
            request_timeout: Duration::from_secs(10),
            session: SessionConfig::default(),
            module_cache_max_age: MODULE_CACHE_MAX_AGE,
            reconnect: Backoff::default(),
        }
    }
}

impl BoardConfig {
    /// Defaults pointed at `backend_url`.
    #[must_use]
    pub fn new(backend_url: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            ..Self::default()
        }
    }

    /// Use a socket channel.
    #[must_use]
    pub fn with_socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = Some(url.into());
        self
    }

    /// Persist the durable tier under `dir`.
    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = Some(dir.into());
        self
    }

    /// Set the backend request timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set session behavior.
    #[must_use]
    pub const fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the module cache freshness limit.
    #[must_use]
    pub const fn with_module_cache_max_age(mut self, max_age: Duration) -> Self {
        self.module_cache_max_age = max_age;
        self
    }

    /// Set the reconnect schedule.
    #[must_use]
    pub const fn with_reconnect(mut self, reconnect: Backoff) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BoardConfig::default();
        assert_eq!(config.backend_url, DEFAULT_BACKEND_URL);
        assert!(config.socket_url.is_none());
        assert_eq!(config.module_cache_max_age, Duration::from_secs(86_400));
    }

    #[test]
    fn test_builder() {
        let config = BoardConfig::new("http://10.0.0.2:1888")
            .with_socket_url("ws://10.0.0.2:1888/ws")
            .with_state_dir("/tmp/vaio")
            .with_request_timeout(Duration::from_secs(3));
        assert_eq!(config.backend_url, "http://10.0.0.2:1888");
        assert_eq!(config.socket_url.as_deref(), Some("ws://10.0.0.2:1888/ws"));
        assert_eq!(config.state_dir, Some(PathBuf::from("/tmp/vaio")));
        assert_eq!(config.request_timeout, Duration::from_secs(3));
    }
}
