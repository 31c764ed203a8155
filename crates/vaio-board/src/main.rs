//! vAio Board binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use vaio_board::{Board, Cli, CommandRunner, OutputFormat};
use vaio_registry::ModuleCatalog;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.board_config();
    let backend = config.backend_url.clone();
    let board = Board::bootstrap(config, ModuleCatalog::builtin(), None)
        .await
        .with_context(|| format!("could not start board against {backend}"))?;

    let runner = CommandRunner::new(Arc::new(board), OutputFormat::new(cli.format));
    let mut stdout = io::stdout().lock();
    runner.execute(&mut stdout, &cli.command).await?;
    Ok(())
}
