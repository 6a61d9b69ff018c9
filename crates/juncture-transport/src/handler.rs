//! Connection handler - turns inbound text into command invocations

use std::sync::Arc;
use juncture_core::{CommandBridge, Peer};
use juncture_protocol::Frame;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Handles inbound messages of a single client connection
pub struct ConnectionHandler {
    peer: Arc<dyn Peer>,
    bridge: Arc<CommandBridge>,
    max_frame_size: usize,
}

impl ConnectionHandler {
    pub fn new(peer: Arc<dyn Peer>, bridge: Arc<CommandBridge>, max_frame_size: usize) -> Self {
        Self {
            peer,
            bridge,
            max_frame_size,
        }
    }

    /// Process one inbound text message.
    ///
    /// Malformed frames and unknown commands are dropped without a reply.
    pub fn process(&self, text: &str) -> Option<JoinHandle<()>> {
        let frame = match Frame::decode(text, self.max_frame_size) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(client = %self.peer.id(), error = %e, "Dropping malformed frame");
                return None;
            }
        };

        debug!(client = %self.peer.id(), command = %frame.event, "Processing command");
        self.bridge.dispatch(self.peer.clone(), &frame.event, frame.data)
    }

    /// Process one inbound binary message as UTF-8 text
    pub fn process_binary(&self, data: &[u8]) -> Option<JoinHandle<()>> {
        match std::str::from_utf8(data) {
            Ok(text) => self.process(text),
            Err(e) => {
                warn!(client = %self.peer.id(), error = %e, "Dropping non UTF-8 frame");
                None
            }
        }
    }
}
