//! Error types for Juncture Core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid command name: {0:?}")]
    InvalidCommandName(String),

    #[error("Invalid event name: {0:?}")]
    InvalidEventName(String),

    #[error("State is not a JSON object: found {0}")]
    NotAnObject(&'static str),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(#[from] juncture_storage::StorageError),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias for Juncture Core operations
pub type Result<T> = std::result::Result<T, Error>;
