//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use vaio_proto::ModuleType;

use crate::config::{BoardConfig, DEFAULT_BACKEND_URL};

/// vAio Board - modular dashboard grid.
#[derive(Parser, Debug, Clone)]
#[command(name = "vaio-board")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Backend base URL.
    #[arg(short, long, env = "VAIO_BACKEND", default_value = DEFAULT_BACKEND_URL)]
    pub backend: String,

    /// Socket channel URL (ws:// or wss://). Events stay local without one.
    #[arg(short, long, env = "VAIO_SOCKET")]
    pub socket: Option<String>,

    /// Directory for the durable session and module cache.
    #[arg(long, env = "VAIO_STATE_DIR", default_value = ".vaio-board")]
    pub state_dir: PathBuf,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Board configuration from the global arguments.
    #[must_use]
    pub fn board_config(&self) -> BoardConfig {
        let config =
            BoardConfig::new(self.backend.as_str()).with_state_dir(self.state_dir.as_path());
        match &self.socket {
            Some(url) => config.with_socket_url(url.as_str()),
            None => config,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the session source, active panes and connection state.
    Status,

    /// List known modules.
    Modules {
        /// Only show one module type (SYSTEM, SERVICE or USER).
        #[arg(short = 't', long = "type")]
        module_type: Option<ModuleType>,
    },

    /// Launch a new pane instance.
    Launch {
        /// Module type (SYSTEM, SERVICE or USER).
        module_type: ModuleType,
        /// Module implementation name, e.g. `NvidiaPane`.
        static_identifier: String,
    },

    /// Remove a pane.
    Remove {
        /// Pane id, e.g. `SERVICE-NvidiaPane-q1w2e`.
        pane_id: String,
    },

    /// Re-pull the backend session.
    Sync {
        /// Push the local session to the backend instead.
        #[arg(long)]
        push: bool,
    },

    /// Render every pane.
    Render,

    /// Follow socket events until interrupted.
    Watch,

    /// Clear the stored session.
    ClearSession {
        /// Keep the backend session.
        #[arg(long)]
        local_only: bool,
    },

    /// Restore the backend's default modules.
    ResetDb,

    /// Remove every backend module.
    ClearDb,
}
