//! Remote storage collaborators.
//!
//! The engine only needs two calls from the object store: download the
//! current blob with its concurrency token, and upload a new blob guarded
//! by the token the client last saw.

use crate::sync::models::{RemoteBlob, UploadOutcome, NO_PRIOR_HASH};
use crate::{LockboxError, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::sync::Mutex;

/// Authenticated upload/download endpoint holding the encrypted vault.
#[async_trait]
pub trait VaultStorage: Send + Sync {
    /// Fetch the current blob. `None` when no vault has been written yet.
    async fn download(&self) -> Result<Option<RemoteBlob>>;

    /// Replace the blob if the server's token still equals `expected_hash`.
    ///
    /// `expected_hash == ""` asserts that no blob exists yet.
    async fn upload(&self, content: &str, expected_hash: &str) -> Result<UploadOutcome>;
}

#[async_trait]
impl<S: VaultStorage + ?Sized> VaultStorage for std::sync::Arc<S> {
    async fn download(&self) -> Result<Option<RemoteBlob>> {
        (**self).download().await
    }

    async fn upload(&self, content: &str, expected_hash: &str) -> Result<UploadOutcome> {
        (**self).upload(content, expected_hash).await
    }
}

/// Content hash used as the concurrency token by [`MemoryStorage`].
pub fn content_hash(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// In-process store with the same compare-and-swap semantics as the server.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blob: Mutex<Option<RemoteBlob>>,
    uploads: AtomicU32,
    conflicts: AtomicU32,
    offline: AtomicBool,
}

impl MemoryStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store already holding `content`.
    pub fn with_content(content: impl Into<String>) -> Self {
        let content = content.into();
        let hash = content_hash(&content);
        Self {
            blob: Mutex::new(Some(RemoteBlob { content, hash })),
            ..Self::default()
        }
    }

    /// Make every call fail with a transport error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Uploads attempted so far, committed or not.
    pub fn upload_count(&self) -> u32 {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Uploads rejected for a stale token.
    pub fn conflict_count(&self) -> u32 {
        self.conflicts.load(Ordering::SeqCst)
    }

    /// Current token, or `""` when empty.
    pub async fn current_hash(&self) -> String {
        self.blob
            .lock()
            .await
            .as_ref()
            .map(|b| b.hash.clone())
            .unwrap_or_else(|| NO_PRIOR_HASH.to_string())
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LockboxError::Transport("storage unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VaultStorage for MemoryStorage {
    async fn download(&self) -> Result<Option<RemoteBlob>> {
        self.check_online()?;
        Ok(self.blob.lock().await.clone())
    }

    async fn upload(&self, content: &str, expected_hash: &str) -> Result<UploadOutcome> {
        self.check_online()?;
        self.uploads.fetch_add(1, Ordering::SeqCst);

        let mut blob = self.blob.lock().await;
        let current = blob.as_ref().map(|b| b.hash.as_str()).unwrap_or(NO_PRIOR_HASH);
        if current != expected_hash {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
            return Ok(UploadOutcome::Conflict);
        }

        let hash = content_hash(content);
        *blob = Some(RemoteBlob {
            content: content.to_string(),
            hash: hash.clone(),
        });
        Ok(UploadOutcome::Committed(hash))
    }
}
