//! # vaio-board
//!
//! Grid orchestration for vAio Board.
//!
//! A [`Board`] ties the module and component registries, the session
//! manager and the socket channel together:
//!
//! ```text
//!  CLI / UI ──launch, remove, update──► Board ──REST──► backend
//!                                         │
//!                                    SocketEvent
//!                                         │
//!                      EventTransport (LocalBus | WsTransport)
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod grid;
pub mod output;
pub mod socket;
pub mod view;

pub use cli::{Cli, Commands, Format};
pub use commands::CommandRunner;
pub use config::{BoardConfig, DEFAULT_BACKEND_URL};
pub use error::{BoardError, ErrorCategory};
pub use grid::{Board, BoardDeps, BoardStatus};
pub use output::{OutputFormat, TableDisplay};
pub use socket::{
    Backoff, ConnectionState, EventTransport, LocalBus, MetricsSample, MetricsStore,
    RefreshListener, WsTransport,
};
pub use view::{ErrorPanel, PaneBody, PaneView, PanelAction};
