//! Juncture Storage Backends
//!
//! Provides whole-document persistence for the state store:
//! - File (default): a single JSON file on the local filesystem
//! - Memory: volatile blob, used for tests and embedded setups
//!
//! Backends only know how to read and overwrite one blob as a unit.
//! There are no partial or append writes.

pub mod file;
pub mod memory;

use async_trait::async_trait;

/// Storage backend trait
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the whole blob. Returns `StorageError::NotFound` if nothing was ever written.
    async fn read(&self) -> Result<Vec<u8>, StorageError>;

    /// Overwrite the whole blob
    async fn write(&self, data: &[u8]) -> Result<(), StorageError>;

    /// Human readable location, used in log lines
    fn describe(&self) -> String;
}

/// Storage error types
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("State not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Write rejected: {0}")]
    WriteRejected(String),
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e.to_string())
    }
}

pub use file::FileStorage;
pub use memory::MemoryStorage;
