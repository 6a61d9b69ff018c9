//! WebSocket-backed peer

use juncture_core::{ConnectionId, Peer};
use juncture_protocol::Frame;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Frames that may wait for one connection's socket writer
pub const OUTBOUND_CAPACITY: usize = 1024;

/// Outbound side of one WebSocket connection.
///
/// Frames are queued to the connection task, which owns the socket writer.
/// A peer whose queue is full counts as gone.
pub struct WsPeer {
    id: ConnectionId,
    outbound: mpsc::Sender<Frame>,
}

impl WsPeer {
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<Frame>) -> Self {
        Self { id, outbound }
    }
}

impl Peer for WsPeer {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn emit(&self, frame: &Frame) -> bool {
        match self.outbound.try_send(frame.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                warn!(client = %self.id, event = %frame.event, "Outbound queue full");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}
