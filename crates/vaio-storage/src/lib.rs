//! # vaio-storage
//!
//! Storage tiers for vAio Board session state.
//!
//! Three tiers hold the same `{gridLayout, activeModules}` pair:
//!
//! - the ephemeral tier ([`MemoryStore`]), lost when the process exits,
//! - the durable tier ([`JsonFileStore`]), one JSON file per key,
//! - the backend ([`HttpBackend`]), the authoritative copy.
//!
//! The first two implement [`KeyValueStore`]; the backend implements the
//! [`SessionApi`] and [`ModuleApi`] traits so it can be swapped for a fake
//! in tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod cache;
pub mod error;
pub mod http;
pub mod kv;

pub use api::{BoxFuture, ModuleApi, SessionApi};
pub use cache::{
    ACTIVE_MODULES_KEY, LAYOUTS_KEY, LocalCache, MODULE_CACHE_KEY, MODULE_CACHE_MAX_AGE,
    SESSION_KEY, Timestamped,
};
pub use error::{ApiError, StorageError};
pub use http::{HttpBackend, HttpBackendConfig};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore, StoreExt};
