//! Sync data models: wire format of the storage endpoint and save outcomes.

use serde::{Deserialize, Serialize};

/// Concurrency token meaning "no blob has been written yet".
pub const NO_PRIOR_HASH: &str = "";

/// What the storage endpoint returns on download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBlob {
    /// The encrypted vault, stored verbatim.
    pub content: String,
    /// Concurrency token for this version of the blob.
    pub hash: String,
}

/// Request body for uploading a new blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub content: String,
    /// Token the client last observed; the server rejects the write if its
    /// current token differs.
    pub hash: String,
}

/// Result of a hash-checked upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Written; carries the new concurrency token.
    Committed(String),
    /// The expected token did not match: someone else wrote first.
    Conflict,
}

/// Stages of a single save, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStage {
    Idle,
    Uploading,
    Committed,
    Conflicted,
    Reconciling,
    Failed,
}

/// Summary of a completed save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    /// Number of uploads performed, including the one that committed.
    pub attempts: u32,
    /// Whether remote changes were merged into the working set.
    pub merged: bool,
    /// Concurrency token after the save.
    pub hash: String,
}
