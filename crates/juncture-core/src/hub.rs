//! Connection Hub - the set of currently connected peers

use dashmap::DashMap;
use juncture_protocol::Frame;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Identifier of one connection
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One remote peer, as seen by the core.
///
/// Implemented by the transport. Emission is fire-and-forget.
pub trait Peer: Send + Sync + 'static {
    fn id(&self) -> &ConnectionId;

    /// Queue `frame` for delivery. Returns false if the peer is gone.
    fn emit(&self, frame: &Frame) -> bool;
}

/// All currently connected peers
pub struct Hub {
    peers: DashMap<ConnectionId, Arc<dyn Peer>>,
}

impl Hub {
    pub fn new() -> Self {
        Self {
            peers: DashMap::new(),
        }
    }

    /// Register a newly accepted connection
    pub fn connect(&self, peer: Arc<dyn Peer>) {
        let id = peer.id().clone();
        if self.peers.insert(id.clone(), peer).is_some() {
            warn!(client = %id, "Replaced existing connection with same id");
        }
        info!(client = %id, peers = self.peers.len(), "Peer connected");
    }

    /// Forget a connection. Returns whether it was registered.
    pub fn disconnect(&self, id: &ConnectionId) -> bool {
        let removed = self.peers.remove(id).is_some();
        if removed {
            info!(client = %id, peers = self.peers.len(), "Peer disconnected");
        }
        removed
    }

    pub fn get(&self, id: &ConnectionId) -> Option<Arc<dyn Peer>> {
        self.peers.get(id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Emit `event` to every connected peer. Returns how many accepted it.
    ///
    /// Peers that can no longer accept messages are dropped.
    pub fn broadcast(&self, event: &str, data: Value) -> usize {
        let frame = Frame::new(event, data);
        let mut delivered = 0;
        let mut gone = Vec::new();

        for entry in self.peers.iter() {
            if entry.value().emit(&frame) {
                delivered += 1;
            } else {
                gone.push(entry.key().clone());
            }
        }

        for id in gone {
            warn!(client = %id, event = %event, "Dropping unreachable peer");
            self.peers.remove(&id);
        }

        debug!(event = %event, recipients = delivered, "Broadcast");
        delivered
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
