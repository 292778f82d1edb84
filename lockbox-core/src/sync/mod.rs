//! Remote sync of the encrypted vault
//!
//! The vault lives on the server as a single encrypted blob:
//! - Fetch downloads, decrypts and migrates it
//! - Save uploads guarded by the content hash last seen
//! - A rejected upload triggers a field-level merge and a bounded retry

#[cfg(feature = "http")]
pub mod client;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod models;
pub mod storage;

#[cfg(feature = "http")]
pub use client::HttpStorage;
pub use config::{RetryPolicy, SyncConfig};
pub use conflict::{ConflictResolver, Resolution};
pub use engine::SyncEngine;
pub use models::{RemoteBlob, SaveReport, SaveStage, UploadOutcome, NO_PRIOR_HASH};
pub use storage::{content_hash, MemoryStorage, VaultStorage};
