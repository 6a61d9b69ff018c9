//! Juncture Core - Command Bridge and State Store
//!
//! This crate provides the core functionality for Juncture:
//! - Named command dispatch with correlated `-result`/`-error` replies
//! - Broadcast to every connected peer
//! - A durable JSON state document reconciled against default values

pub mod bridge;
pub mod error;
pub mod hub;
pub mod reconcile;
pub mod state;

pub use bridge::{BoxError, CommandBridge, CommandHandler, HandlerResult};
pub use error::{Error, Result};
pub use hub::{ConnectionId, Hub, Peer};
pub use reconcile::{reconcile, shallow_merge, Document};
pub use state::StateStore;
