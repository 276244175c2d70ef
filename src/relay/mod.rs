//! Relay channel abstraction.
//!
//! A relay channel is a duplex byte pipe to the intermediary relay. It reports
//! its lifecycle and inbound frames to a single registered [`RelayListener`].
//!
//! # Lifecycle
//!
//! ```text
//!            connect()             transport up
//!  [Idle] ─────────────> [Connecting] ─────────────> [Open]
//!     │                        │                        │
//!     │ disconnect()           │ dial failed /          │ error / close frame /
//!     │                        │ disconnect()           │ disconnect()
//!     v                        v                        v
//!  [Closed] <──────────────────┴────────────────────────┘
//! ```
//!
//! - `connect()` returns immediately; `on_open` signals readiness.
//! - `send()` outside `Open` is dropped, nothing is buffered.
//! - `on_close` fires at most once and `Closed` is terminal: a dead channel
//!   never reconnects, the owner builds a new one.
//!
//! # Implementations
//!
//! | Type             | Transport                      |
//! |------------------|--------------------------------|
//! | `WebSocketRelay` | WebSocket (tokio-tungstenite)  |
//! | `MemoryRelay`    | In-process hub (tests, sims)   |

mod memory;
mod websocket;

pub use memory::{MemoryHub, MemoryRelay};
pub use websocket::WebSocketRelay;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;

/// Channel lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelState {
    /// Created, `connect()` not called yet
    #[default]
    Idle,
    /// Transport is being established
    Connecting,
    /// Frames can be sent and received
    Open,
    /// Terminal
    Closed,
}

/// Receives channel events. Exactly one listener is registered per channel.
pub trait RelayListener: Send + Sync {
    /// Transport is ready
    fn on_open(&self);

    /// Transport is gone. Called at most once.
    fn on_close(&self);

    /// One inbound frame
    fn on_message(&self, data: Bytes);
}

/// Duplex byte channel to the relay.
pub trait RelayChannel: Send + Sync {
    /// Register the listener, replacing any previous one
    fn set_listener(&self, listener: Arc<dyn RelayListener>);

    /// Start establishing the transport. Completion is signaled by `on_open`.
    fn connect(&self);

    /// Send one frame. Dropped unless the channel is open.
    fn send(&self, data: Bytes);

    /// Release the transport. Fires `on_close` if the channel was not closed yet.
    fn disconnect(&self);

    /// Current lifecycle state
    fn state(&self) -> ChannelState;

    /// Channel name for logging
    fn name(&self) -> &'static str;
}

/// Listener slot and lifecycle bookkeeping shared by every implementation.
#[derive(Default)]
pub(crate) struct ChannelCore {
    listener: Mutex<Option<Arc<dyn RelayListener>>>,
    state: Mutex<ChannelState>,
    /// Held across a transition and its callback so `on_open` never follows `on_close`
    transitions: Mutex<()>,
}

impl ChannelCore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_listener(&self, listener: Arc<dyn RelayListener>) {
        *lock(&self.listener) = Some(listener);
    }

    pub(crate) fn state(&self) -> ChannelState {
        *lock(&self.state)
    }

    /// `Idle -> Connecting`. False if the channel was already used.
    pub(crate) fn begin_connect(&self) -> bool {
        let mut state = lock(&self.state);
        if *state != ChannelState::Idle {
            return false;
        }
        *state = ChannelState::Connecting;
        true
    }

    /// `Connecting -> Open`, then `on_open`. False if closed in the meantime.
    pub(crate) fn open(&self) -> bool {
        let _transition = lock(&self.transitions);
        {
            let mut state = lock(&self.state);
            if *state != ChannelState::Connecting {
                return false;
            }
            *state = ChannelState::Open;
        }

        if let Some(listener) = self.listener() {
            listener.on_open();
        }
        true
    }

    /// Hand an inbound frame to the listener while open
    pub(crate) fn deliver(&self, data: Bytes) {
        if self.state() != ChannelState::Open {
            tracing::trace!(bytes = data.len(), "frame arrived on a channel that is not open");
            return;
        }

        if let Some(listener) = self.listener() {
            listener.on_message(data);
        }
    }

    /// Move to `Closed`. Fires `on_close` only on the first call.
    pub(crate) fn close(&self) -> bool {
        let _transition = lock(&self.transitions);
        {
            let mut state = lock(&self.state);
            if *state == ChannelState::Closed {
                return false;
            }
            *state = ChannelState::Closed;
        }

        if let Some(listener) = self.listener() {
            listener.on_close();
        }
        true
    }

    fn listener(&self) -> Option<Arc<dyn RelayListener>> {
        lock(&self.listener).clone()
    }
}

/// Lock a std mutex, recovering the data if a holder panicked
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
