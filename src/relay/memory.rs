//! In-process relay.
//!
//! A [`MemoryHub`] stands in for the relay server: every frame sent by one
//! member is delivered, in send order, to every other open member.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::debug;

use super::{lock, ChannelCore, ChannelState, RelayChannel, RelayListener};

#[derive(Default)]
struct HubInner {
    members: Mutex<Vec<(u64, Arc<ChannelCore>)>>,
    next_id: AtomicU64,
}

/// Broadcast hub shared by [`MemoryRelay`] channels
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, not yet connected, channel on this hub
    pub fn channel(&self) -> MemoryRelay {
        MemoryRelay {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            hub: self.clone(),
            core: Arc::new(ChannelCore::new()),
        }
    }

    /// Number of joined members
    pub fn member_count(&self) -> usize {
        lock(&self.inner.members).len()
    }

    /// Close every member, as if the relay went away
    pub fn shutdown(&self) {
        let members: Vec<_> = lock(&self.inner.members).drain(..).collect();
        debug!(members = members.len(), "memory hub shutting down");

        for (_, core) in members {
            core.close();
        }
    }

    fn join(&self, id: u64, core: Arc<ChannelCore>) {
        lock(&self.inner.members).push((id, core));
    }

    fn leave(&self, id: u64) {
        lock(&self.inner.members).retain(|(member, _)| *member != id);
    }

    fn broadcast(&self, from: u64, data: &Bytes) {
        let targets: Vec<_> = lock(&self.inner.members)
            .iter()
            .filter(|(id, _)| *id != from)
            .map(|(_, core)| core.clone())
            .collect();

        for core in targets {
            core.deliver(data.clone());
        }
    }
}

/// Relay channel attached to a [`MemoryHub`].
///
/// Opens synchronously inside `connect()`.
pub struct MemoryRelay {
    id: u64,
    hub: MemoryHub,
    core: Arc<ChannelCore>,
}

impl RelayChannel for MemoryRelay {
    fn set_listener(&self, listener: Arc<dyn RelayListener>) {
        self.core.set_listener(listener);
    }

    fn connect(&self) {
        if !self.core.begin_connect() {
            debug!(id = self.id, "connect ignored, channel already used");
            return;
        }

        self.hub.join(self.id, self.core.clone());
        self.core.open();
    }

    fn send(&self, data: Bytes) {
        if self.core.state() != ChannelState::Open {
            debug!(id = self.id, "memory channel not open, frame dropped");
            return;
        }
        self.hub.broadcast(self.id, &data);
    }

    fn disconnect(&self) {
        self.hub.leave(self.id);
        self.core.close();
    }

    fn state(&self) -> ChannelState {
        self.core.state()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl Drop for MemoryRelay {
    fn drop(&mut self) {
        self.hub.leave(self.id);
    }
}
