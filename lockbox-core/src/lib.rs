//! Lockbox Core Library
//!
//! Client side of an encrypted password vault: the whole vault is serialized,
//! encrypted with a key derived from the master password, and stored as one
//! opaque blob on a server that never sees plaintext. Concurrent edits from
//! several devices are reconciled field by field before re-upload.

pub mod crypto;
pub mod import;
pub mod migration;
pub mod model;
pub mod sync;
pub mod vault;

pub use crypto::{decrypt, encrypt, BlobFormat, CryptoError, KdfParams, VaultKey};
pub use migration::{apply_migrations, upgrade, MigrationError};
pub use model::{now_millis, Folder, Property, Secret, SecretField, SecretFile, Timestamp, CURRENT_VERSION};
pub use sync::{ConflictResolver, MemoryStorage, SaveReport, SyncConfig, SyncEngine, VaultStorage};
pub use vault::{ImportSummary, Vault};

use thiserror::Error;

/// Result type for vault operations
pub type Result<T> = std::result::Result<T, LockboxError>;

/// General error type for vault operations
#[derive(Error, Debug)]
pub enum LockboxError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    #[error("Migration error: {0}")]
    Migration(#[from] migration::MigrationError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not save the vault after {attempts} attempts, try again")]
    SaveConflict { attempts: u32 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Vault is locked")]
    VaultLocked,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LockboxError {
    /// True when the error means the master password did not open the blob.
    pub fn is_incorrect_password(&self) -> bool {
        matches!(self, Self::Crypto(CryptoError::DecryptionFailed(_)))
    }
}
