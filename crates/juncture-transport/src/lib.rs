//! Juncture Transport Layer
//!
//! Provides the network transport for Juncture:
//! - WebSocket: one JSON frame per text message
//! - Per-connection peers registered with the core hub

pub mod error;
pub mod handler;
pub mod peer;
pub mod websocket;

pub use error::TransportError;
pub use handler::ConnectionHandler;
pub use peer::{WsPeer, OUTBOUND_CAPACITY};
pub use websocket::{ServerConfig, WebSocketServer};
