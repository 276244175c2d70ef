//! WebSocket relay channel.
//!
//! Dials the relay with tokio-tungstenite and runs a single task that
//! writes queued outbound frames and reads inbound ones. Frames go out as
//! binary messages; inbound text messages are accepted too.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::{lock, ChannelCore, ChannelState, RelayChannel, RelayListener};

/// Relay channel over a WebSocket connection.
///
/// `connect()` must be called from within a Tokio runtime.
pub struct WebSocketRelay {
    url: String,
    core: Arc<ChannelCore>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketRelay {
    /// Create a channel for the given `ws://` or `wss://` URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            core: Arc::new(ChannelCore::new()),
            outbound: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Relay URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl RelayChannel for WebSocketRelay {
    fn set_listener(&self, listener: Arc<dyn RelayListener>) {
        self.core.set_listener(listener);
    }

    fn connect(&self) {
        if !self.core.begin_connect() {
            warn!(url = %self.url, state = ?self.core.state(), "connect ignored, channel already used");
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(url = %self.url, error = %e, "connect called outside a Tokio runtime");
                self.core.close();
                return;
            },
        };

        let (tx, rx) = mpsc::unbounded_channel();
        *lock(&self.outbound) = Some(tx);

        info!("Connecting to relay: {}", self.url);
        let handle = runtime.spawn(run_socket(self.url.clone(), self.core.clone(), rx));
        *lock(&self.task) = Some(handle);
    }

    fn send(&self, data: Bytes) {
        if self.core.state() != ChannelState::Open {
            debug!(bytes = data.len(), "relay not open, frame dropped");
            return;
        }

        if let Some(tx) = lock(&self.outbound).as_ref() {
            if tx.send(data).is_err() {
                debug!("relay writer gone, frame dropped");
            }
        }
    }

    fn disconnect(&self) {
        let state = self.core.state();

        // Dropping the sender makes the writer send a close frame and exit
        lock(&self.outbound).take();

        if state == ChannelState::Connecting {
            if let Some(task) = lock(&self.task).take() {
                task.abort();
            }
        }

        if self.core.close() {
            info!("Disconnected from relay: {}", self.url);
        }
    }

    fn state(&self) -> ChannelState {
        self.core.state()
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

impl Drop for WebSocketRelay {
    fn drop(&mut self) {
        // An open socket winds down once the outbound sender is dropped
        if self.core.state() == ChannelState::Connecting {
            if let Some(task) = lock(&self.task).take() {
                task.abort();
            }
        }
    }
}

/// Dial, then pump frames both ways until either side ends
async fn run_socket(url: String, core: Arc<ChannelCore>, mut outbound: mpsc::UnboundedReceiver<Bytes>) {
    let stream = match connect_async(url.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(url = %url, error = %e, "relay dial failed");
            core.close();
            return;
        },
    };

    if !core.open() {
        debug!("channel closed while dialing");
        return;
    }
    info!("Connected to relay: {}", url);

    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(data) => {
                    if let Err(e) = write.send(Message::Binary(data.to_vec())).await {
                        warn!(error = %e, "relay write failed");
                        break;
                    }
                },
                None => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                },
            },
            message = read.next() => match message {
                Some(Ok(Message::Binary(data))) => core.deliver(Bytes::from(data)),
                Some(Ok(Message::Text(text))) => core.deliver(Bytes::from(text)),
                Some(Ok(Message::Close(_))) | None => {
                    info!("Relay closed the connection");
                    break;
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => {
                    warn!(error = %e, "relay read failed");
                    break;
                },
            },
        }
    }

    core.close();
    debug!("Relay socket task terminated");
}
