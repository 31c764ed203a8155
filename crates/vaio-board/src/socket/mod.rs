//! The socket channel.
//!
//! Boards exchange [`SocketEvent`]s through an [`EventTransport`]:
//! [`LocalBus`] keeps events in-process, [`WsTransport`] speaks JSON text
//! frames to a websocket server and reconnects with [`Backoff`].

mod backoff;
mod bus;
mod metrics;
mod refresh;
mod ws;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;
use tokio::sync::broadcast;
use vaio_proto::SocketEvent;

use crate::error::BoardError;

pub use backoff::Backoff;
pub use bus::LocalBus;
pub use metrics::{MetricsSample, MetricsStore};
pub use refresh::RefreshListener;
pub use ws::WsTransport;

/// Capacity of the per-transport broadcast channel. Slow subscribers that
/// fall further behind than this skip events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// State of a transport's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// Not connected and not trying.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Events flow.
    Connected,
    /// Waiting before the next attempt.
    Reconnecting,
    /// Gave up after exhausting the reconnect budget.
    Failed,
}

impl ConnectionState {
    /// Lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Failed => "failed",
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Reconnecting,
            _ => Self::Failed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free cell holding a [`ConnectionState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new(state: ConnectionState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// A channel that carries socket events between boards.
pub trait EventTransport: Send + Sync {
    /// Send `event` to every other participant.
    fn publish(&self, event: SocketEvent) -> Result<(), BoardError>;

    /// Receive events from the channel, starting now.
    fn subscribe(&self) -> broadcast::Receiver<SocketEvent>;

    /// Current connection state.
    fn state(&self) -> ConnectionState {
        ConnectionState::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_round_trip() {
        let cell = StateCell::new(ConnectionState::Disconnected);
        for state in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Reconnecting,
            ConnectionState::Failed,
            ConnectionState::Disconnected,
        ] {
            cell.set(state);
            assert_eq!(cell.get(), state);
        }
    }
}
