//! In-process event bus.

use tokio::sync::broadcast;
use tracing::trace;
use vaio_proto::SocketEvent;

use super::{EVENT_CHANNEL_CAPACITY, EventTransport};
use crate::error::BoardError;

/// Broadcast channel shared by boards in one process.
///
/// Clones share the channel, so a publish on one clone reaches subscribers
/// of every clone, including the publisher's own.
#[derive(Debug, Clone)]
pub struct LocalBus {
    tx: broadcast::Sender<SocketEvent>,
}

impl LocalBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTransport for LocalBus {
    fn publish(&self, event: SocketEvent) -> Result<(), BoardError> {
        let name = event.name();
        // No subscribers is not an error: nobody else is listening yet.
        match self.tx.send(event) {
            Ok(receivers) => trace!(event = name, receivers, "published"),
            Err(_) => trace!(event = name, "published with no subscribers"),
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.tx.subscribe()
    }
}
