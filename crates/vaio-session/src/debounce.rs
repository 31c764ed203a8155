//! Debounced layout persistence.
//!
//! Dragging a pane produces a burst of layout changes. The debouncer keeps
//! only the latest layouts and saves them once no new change has arrived
//! for the configured window.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, warn};
use vaio_proto::Layouts;

use crate::error::SessionError;
use crate::manager::SessionManager;

enum Command {
    Schedule(Layouts),
    Flush(oneshot::Sender<Result<(), SessionError>>),
}

/// Coalesces layout saves into one write per quiet window.
///
/// Dropping the debouncer sends any pending layouts before the background
/// task exits.
#[derive(Debug)]
pub struct LayoutSaveDebouncer {
    tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl LayoutSaveDebouncer {
    /// Start a debouncer that saves through `manager`, using its configured
    /// window. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        let window = manager.config().debounce_window;
        Self::with_window(manager, window)
    }

    /// Start a debouncer with an explicit window.
    #[must_use]
    pub fn with_window(manager: Arc<SessionManager>, window: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(manager, window, rx));
        Self { tx, task }
    }

    /// Queue `layouts`, replacing anything queued before, and restart the
    /// window.
    pub fn schedule(&self, layouts: Layouts) {
        if self.tx.send(Command::Schedule(layouts)).is_err() {
            warn!("layout debouncer stopped, dropping scheduled save");
        }
    }

    /// Save queued layouts now. `Ok` when nothing was queued.
    pub async fn flush(&self) -> Result<(), SessionError> {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Command::Flush(reply)).is_err() {
            return Ok(());
        }
        response.await.unwrap_or(Ok(()))
    }

    /// Stop the task after saving anything queued.
    pub async fn shutdown(self) {
        let Self { tx, task } = self;
        drop(tx);
        if let Err(e) = task.await {
            warn!(error = %e, "layout debouncer task failed");
        }
    }
}

async fn run(
    manager: Arc<SessionManager>,
    window: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut pending: Option<Layouts> = None;

    loop {
        let command = if pending.is_some() {
            tokio::select! {
                command = rx.recv() => command,
                () = sleep(window) => {
                    if let Some(layouts) = pending.take() {
                        save(&manager, &layouts).await.ok();
                    }
                    continue;
                }
            }
        } else {
            rx.recv().await
        };

        match command {
            Some(Command::Schedule(layouts)) => {
                if pending.replace(layouts).is_some() {
                    debug!("coalesced layout save");
                }
            }
            Some(Command::Flush(reply)) => {
                let result = match pending.take() {
                    Some(layouts) => save(&manager, &layouts).await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            None => {
                if let Some(layouts) = pending.take() {
                    save(&manager, &layouts).await.ok();
                }
                break;
            }
        }
    }
}

async fn save(manager: &SessionManager, layouts: &Layouts) -> Result<(), SessionError> {
    let result = manager.save_layouts(layouts).await;
    if let Err(e) = &result {
        warn!(error = %e, "debounced layout save failed");
    }
    result
}
