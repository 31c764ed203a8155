//! Applies socket events to a board.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::grid::Board;

/// Background task feeding a board's socket events into
/// [`Board::handle_event`].
///
/// Subscribes when spawned. Stops when dropped or when the channel closes.
#[derive(Debug)]
pub struct RefreshListener {
    task: JoinHandle<()>,
}

impl RefreshListener {
    /// Start listening. Must be called inside a tokio runtime.
    #[must_use]
    pub fn spawn(board: Arc<Board>) -> Self {
        let mut events = board.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        let name = event.name();
                        if let Err(e) = board.handle_event(event).await {
                            warn!(event = name, error = %e, "socket event handling failed");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "socket listener lagged, resyncing");
                        if let Err(e) = board.resync().await {
                            warn!(error = %e, "resync after lag failed");
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("socket channel closed, listener stopping");
                        break;
                    }
                }
            }
        });
        Self { task }
    }

    /// Whether the task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RefreshListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}
