//! State Store - a JSON document kept consistent with a default shape
//! and mirrored to a storage backend

use crate::error::{Error, Result};
use crate::reconcile::{kind_of, reconcile, shallow_merge, Document};
use juncture_storage::Storage;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Durable state document
///
/// The in-memory document is the source of truth. Every mutation is
/// followed by a full overwrite of the backing blob.
pub struct StateStore {
    storage: Arc<dyn Storage>,
    document: RwLock<Document>,
    /// Serializes merge+write so the stored blob follows the last merge
    write_lock: Mutex<()>,
}

impl StateStore {
    /// Load the document from `storage`, reconciled against `defaults`.
    ///
    /// A missing, unreadable or corrupt blob is never fatal: it is
    /// replaced by `defaults`, which become the in-memory document.
    pub async fn load(storage: Arc<dyn Storage>, defaults: Document) -> Self {
        let document = match Self::read_document(storage.as_ref()).await {
            Ok(live) => {
                info!(location = %storage.describe(), "State loaded");
                reconcile(live, &defaults)
            }
            Err(e) => {
                warn!(location = %storage.describe(), error = %e, "Failed to load state, restoring defaults");
                if let Err(e) = write_document(storage.as_ref(), &defaults).await {
                    error!(location = %storage.describe(), error = %e, "Failed to write default state");
                }
                defaults.clone()
            }
        };

        Self {
            storage,
            document: RwLock::new(document),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_document(storage: &dyn Storage) -> Result<Document> {
        let data = storage.read().await?;
        match serde_json::from_slice::<Value>(&data)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::NotAnObject(kind_of(&other))),
        }
    }

    /// Write the whole document to storage. Failures are logged, not returned.
    pub async fn save(&self) {
        let _guard = self.write_lock.lock().await;
        self.save_locked().await;
    }

    /// Write the whole document to storage, returning any failure
    pub async fn try_save(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let snapshot = self.snapshot();
        write_document(self.storage.as_ref(), &snapshot).await
    }

    async fn save_locked(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = write_document(self.storage.as_ref(), &snapshot).await {
            error!(location = %self.storage.describe(), error = %e, "Failed to save state");
        }
    }

    /// Shallow-merge `patch` into the document, then save
    pub async fn set_state(&self, patch: Document) {
        let _guard = self.write_lock.lock().await;
        {
            let mut document = self.document.write();
            debug!(keys = patch.len(), "Merging state patch");
            shallow_merge(&mut document, patch);
        }
        self.save_locked().await;
    }

    /// Copy of the whole document
    pub fn snapshot(&self) -> Document {
        self.document.read().clone()
    }

    /// Copy of one top-level value
    pub fn get(&self, key: &str) -> Option<Value> {
        self.document.read().get(key).cloned()
    }
}

async fn write_document(storage: &dyn Storage, document: &Document) -> Result<()> {
    let data = serde_json::to_vec_pretty(document)?;
    storage.write(&data).await?;
    Ok(())
}
