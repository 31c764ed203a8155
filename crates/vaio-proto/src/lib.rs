//! # vaio-proto
//!
//! Identifiers and wire types shared by the vAio Board crates.
//!
//! Pane identifiers travel as `TYPE-staticIdentifier-instanceId` strings
//! (for compatibility with persisted sessions) but are handled internally
//! through the typed [`PaneId`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod ids;
pub mod layout;
pub mod module;
pub mod session;

pub use error::ProtoError;
pub use events::{MetricsNamespace, MetricsUpdate, PaneEventPayload, SocketEvent};
pub use ids::{
    InstanceId, ModuleType, PaneId, ParsedPaneId, canonical_key, create_pane_id,
    generate_instance_id, generate_unique_instance_id, parse_pane_id, segment_count,
};
pub use layout::{Breakpoint, LayoutItem, Layouts, Position, Size};
pub use module::{ModuleDraft, ModuleRecord, ModulesByType};
pub use session::{SessionMirror, SessionState};
