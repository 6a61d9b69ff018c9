//! Juncture wire protocol
//!
//! Every message on a connection is a named event carrying a JSON payload.
//!
//! ## Frame Format
//! ```text
//! {"event": "<name>", "data": <json>}
//! ```
//!
//! ## Reply Channels
//! ```text
//! <command>           # peer -> server, invoke a command
//! <command>-result    # server -> peer, success payload
//! <command>-error     # server -> peer, {"message": "..."}
//! <event>             # server -> all peers, broadcast
//! ```

pub mod error;
pub mod frame;

pub use error::{ProtocolError, ProtocolResult};
pub use frame::{error_event, result_event, ErrorPayload, Frame, MAX_FRAME_SIZE};
