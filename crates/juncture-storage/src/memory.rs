//! In-memory storage backend

use crate::{Storage, StorageError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// In-memory storage backend
///
/// Fast, volatile storage suitable for tests and embedding.
/// Data is lost when the process exits.
pub struct MemoryStorage {
    /// Current blob, `None` until the first write
    data: Mutex<Option<Vec<u8>>>,
    /// Number of successful writes
    writes: AtomicUsize,
    /// When set, every write fails
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(None),
            writes: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Create a backend that already holds `data`
    pub fn with_contents(data: impl Into<Vec<u8>>) -> Self {
        let storage = Self::new();
        *storage.data.lock() = Some(data.into());
        storage
    }

    /// Make subsequent writes fail (or succeed again)
    pub fn failing_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Copy of the current blob
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.data.lock().clone()
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self) -> Result<Vec<u8>, StorageError> {
        self.data
            .lock()
            .clone()
            .ok_or_else(|| StorageError::NotFound(self.describe()))
    }

    async fn write(&self, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StorageError::WriteRejected(self.describe()));
        }
        *self.data.lock() = Some(data.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
