//! # vaio-session
//!
//! Session synchronization for vAio Board.
//!
//! [`SessionManager`] reads the session from the backend and writes layout
//! and module changes through the ephemeral, durable and backend tiers.
//! [`LayoutSaveDebouncer`] coalesces bursts of layout changes into single
//! saves, and [`RetryPolicy`] retries transient backend failures.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod debounce;
pub mod error;
pub mod manager;
pub mod retry;

pub use config::{DEFAULT_DEBOUNCE_WINDOW, SessionConfig};
pub use debounce::LayoutSaveDebouncer;
pub use error::SessionError;
pub use manager::{SessionManager, SessionSource, parse_session};
pub use retry::{RetryPolicy, with_retry};
