//! # vaio-registry
//!
//! Registries that decide which component renders a pane.
//!
//! - [`ModuleRegistry`] knows which modules exist. It either initializes
//!   from one of its sources or fails loudly.
//! - [`ComponentRegistry`] maps pane keys to loaded components. It never
//!   fails: load errors are recorded per key and surface as `None`.
//!
//! Both are plain values constructed at startup and shared through `Arc`;
//! there is no global instance.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod component;
pub mod components;
pub mod error;
pub mod events;
pub mod modules;

pub use catalog::{BuiltinPane, ModuleCatalog, ModuleDefinition, ModuleMetadata};
pub use component::{
    ComponentLoader, ComponentRef, ComponentResolver, ComponentView, PaneComponent, RenderContext,
};
pub use components::{ComponentRegistry, LoadErrorRecord};
pub use error::{InitStrategy, LoadError, RegistryError, StrategyFailure};
pub use events::{ChangeReason, ListenerId, RegistryEvent, RegistryEventKind, panic_message};
pub use modules::{ModuleRegistry, RefreshOutcome};
