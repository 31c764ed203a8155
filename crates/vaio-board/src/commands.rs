//! CLI command execution against a bootstrapped board.

use std::io::Write;
use std::sync::Arc;

use tracing::info;

use crate::cli::Commands;
use crate::error::BoardError;
use crate::grid::Board;
use crate::output::{ActionResult, ModuleList, ModuleRow, OutputFormat, RenderedGrid};
use crate::socket::RefreshListener;

/// Runs one subcommand and writes its result.
#[derive(Debug)]
pub struct CommandRunner {
    board: Arc<Board>,
    format: OutputFormat,
}

impl CommandRunner {
    /// Create a runner.
    #[must_use]
    pub const fn new(board: Arc<Board>, format: OutputFormat) -> Self {
        Self { board, format }
    }

    /// Execute `command`. Scheduled layout saves are flushed before
    /// returning.
    pub async fn execute<W: Write>(
        &self,
        writer: &mut W,
        command: &Commands,
    ) -> Result<(), BoardError> {
        match command {
            Commands::Status => self.format.write(writer, &self.board.status())?,
            Commands::Modules { module_type } => {
                let all = self.board.modules().get_all_modules();
                let rows = all
                    .iter()
                    .filter(|(t, _)| module_type.is_none_or(|wanted| wanted == *t))
                    .flat_map(|(_, defs)| defs.iter().map(ModuleRow::from))
                    .collect();
                self.format.write(writer, &ModuleList(rows))?;
            }
            Commands::Launch {
                module_type,
                static_identifier,
            } => {
                let pane = self.board.launch_pane(*module_type, static_identifier).await?;
                self.format
                    .write(writer, &ActionResult::ok("launch").with_pane(pane.to_string()))?;
            }
            Commands::Remove { pane_id } => {
                self.board.remove_pane(pane_id).await?;
                self.format.write(writer, &ActionResult::ok("remove").with_pane(pane_id.as_str()))?;
            }
            Commands::Sync { push } => {
                if *push {
                    self.board.push_local().await?;
                } else {
                    self.board.resync().await?;
                }
                self.format.write(writer, &self.board.status())?;
            }
            Commands::Render => {
                let views = self.board.render().await;
                self.format.write(writer, &RenderedGrid(views))?;
            }
            Commands::Watch => self.watch(writer).await?,
            Commands::ClearSession { local_only } => {
                let cleared = self.board.clear_session(*local_only).await;
                let scope = if *local_only { "local tiers" } else { "local tiers and backend" };
                let mut result = ActionResult::ok("clear-session").with_detail(scope);
                result.success = cleared;
                self.format.write(writer, &result)?;
            }
            Commands::ResetDb => {
                let outcome = self.board.reset_module_db().await?;
                self.format.write(writer, &ActionResult::from_refresh("reset-db", outcome))?;
            }
            Commands::ClearDb => {
                let outcome = self.board.clear_module_db().await?;
                self.format.write(writer, &ActionResult::from_refresh("clear-db", outcome))?;
            }
        }
        self.board.flush().await
    }

    async fn watch<W: Write>(&self, writer: &mut W) -> Result<(), BoardError> {
        let listener = RefreshListener::spawn(Arc::clone(&self.board));
        info!("watching socket events, press ctrl-c to stop");
        tokio::signal::ctrl_c().await?;
        drop(listener);
        self.format.write(writer, &self.board.status())
    }
}
