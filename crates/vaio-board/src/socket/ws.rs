//! Websocket transport.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, warn};
use vaio_proto::SocketEvent;

use super::{Backoff, ConnectionState, EVENT_CHANNEL_CAPACITY, EventTransport, StateCell};
use crate::error::BoardError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why a live connection ended.
enum Ended {
    /// The transport was dropped.
    Closed,
    /// The connection broke.
    Lost(String),
}

/// A socket channel over a websocket connection.
///
/// Events are JSON text frames. The connection is kept up in a background
/// task that reconnects on loss; events published while disconnected are
/// sent once the connection is back. Dropping the transport stops the task.
pub struct WsTransport {
    url: String,
    outgoing: mpsc::UnboundedSender<SocketEvent>,
    incoming: broadcast::Sender<SocketEvent>,
    state: Arc<StateCell>,
    task: JoinHandle<()>,
}

impl WsTransport {
    /// Start connecting to `url`. Must be called inside a tokio runtime.
    #[must_use]
    pub fn connect(url: impl Into<String>, backoff: Backoff) -> Self {
        let url = url.into();
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let (incoming, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let state = Arc::new(StateCell::new(ConnectionState::Disconnected));

        let task = tokio::spawn(connection_loop(
            url.clone(),
            backoff,
            Arc::clone(&state),
            outgoing_rx,
            incoming.clone(),
        ));

        Self {
            url,
            outgoing,
            incoming,
            state,
            task,
        }
    }

    /// Server URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl EventTransport for WsTransport {
    fn publish(&self, event: SocketEvent) -> Result<(), BoardError> {
        self.outgoing
            .send(event)
            .map_err(|_| BoardError::Socket(format!("connection to {} is closed", self.url)))
    }

    fn subscribe(&self) -> broadcast::Receiver<SocketEvent> {
        self.incoming.subscribe()
    }

    fn state(&self) -> ConnectionState {
        self.state.get()
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn connection_loop(
    url: String,
    backoff: Backoff,
    state: Arc<StateCell>,
    mut outgoing: mpsc::UnboundedReceiver<SocketEvent>,
    incoming: broadcast::Sender<SocketEvent>,
) {
    let mut failures = 0u32;

    loop {
        state.set(ConnectionState::Connecting);

        let reason = match timeout(backoff.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((socket, _))) => {
                info!(url = %url, "socket connected");
                state.set(ConnectionState::Connected);
                failures = 0;
                match run_connection(socket, &mut outgoing, &incoming).await {
                    Ended::Closed => {
                        state.set(ConnectionState::Disconnected);
                        debug!(url = %url, "socket transport closed");
                        return;
                    }
                    Ended::Lost(reason) => reason,
                }
            }
            Ok(Err(e)) => {
                failures += 1;
                e.to_string()
            }
            Err(_) => {
                failures += 1;
                "connect timed out".to_string()
            }
        };

        if !backoff.allows(failures) {
            error!(url = %url, failures, reason = %reason, "socket reconnect budget exhausted");
            outgoing.close();
            state.set(ConnectionState::Failed);
            return;
        }

        let delay = backoff.delay(failures.max(1));
        warn!(
            url = %url,
            reason = %reason,
            delay_ms = delay.as_millis() as u64,
            "socket disconnected, reconnecting"
        );
        state.set(ConnectionState::Reconnecting);
        sleep(delay).await;
    }
}

async fn run_connection(
    socket: Socket,
    outgoing: &mut mpsc::UnboundedReceiver<SocketEvent>,
    incoming: &broadcast::Sender<SocketEvent>,
) -> Ended {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<SocketEvent>(&text) {
                    Ok(event) => {
                        debug!(event = event.name(), "socket event received");
                        // Nobody subscribed yet is fine.
                        let _ = incoming.send(event);
                    }
                    Err(e) => warn!(error = %e, "ignoring malformed socket frame"),
                },
                Some(Ok(Message::Close(_))) => {
                    return Ended::Lost("server closed connection".to_string());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Ended::Lost(e.to_string()),
                None => return Ended::Lost("connection closed".to_string()),
            },
            event = outgoing.recv() => match event {
                Some(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            let name = event.name();
                            warn!(event = name, error = %e, "could not encode socket event");
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Message::Text(json)).await {
                        return Ended::Lost(format!("write failed: {e}"));
                    }
                }
                None => {
                    let _ = write.close().await;
                    return Ended::Closed;
                }
            },
        }
    }
}
