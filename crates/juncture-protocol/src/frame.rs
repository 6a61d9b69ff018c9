//! Named message frames

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default maximum frame size (100MB)
pub const MAX_FRAME_SIZE: usize = 100_000_000;

/// A single named message with its JSON payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Success reply for `command`
    pub fn result(command: &str, data: Value) -> Self {
        Self::new(result_event(command), data)
    }

    /// Failure reply for `command`; only the message text is carried
    pub fn error(command: &str, message: impl Into<String>) -> Self {
        let payload = ErrorPayload {
            message: message.into(),
        };
        Self::new(error_event(command), payload.into_value())
    }

    /// Encode the frame as a JSON text message
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }

    /// Decode a JSON text message, rejecting frames over `max_size` bytes
    pub fn decode(text: &str, max_size: usize) -> ProtocolResult<Self> {
        if text.len() > max_size {
            return Err(ProtocolError::FrameTooLarge {
                size: text.len(),
                max: max_size,
            });
        }

        let frame: Frame =
            serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;

        if frame.event.is_empty() {
            return Err(ProtocolError::MissingEvent);
        }

        Ok(frame)
    }

    /// If this frame is a reply, the command it answers and whether it succeeded
    pub fn reply_to(&self) -> Option<(&str, bool)> {
        if let Some(cmd) = self.event.strip_suffix("-result") {
            Some((cmd, true))
        } else {
            self.event.strip_suffix("-error").map(|cmd| (cmd, false))
        }
    }
}

/// Payload of a `<command>-error` reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl ErrorPayload {
    pub fn into_value(self) -> Value {
        serde_json::json!({ "message": self.message })
    }
}

/// Event name carrying successful replies for `command`
pub fn result_event(command: &str) -> String {
    format!("{}-result", command)
}

/// Event name carrying failure replies for `command`
pub fn error_event(command: &str) -> String {
    format!("{}-error", command)
}
