//! Cryptographic primitives for the vault blob.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA256 key derivation
//! - AES-256-CBC encryption/decryption of the serialized vault
//! - The legacy and salted blob envelopes
//! - Secure key management

pub mod cipher;
pub mod envelope;
pub mod kdf;

pub use cipher::{decrypt, encrypt, VaultKey};
pub use envelope::{BlobFormat, Envelope};
pub use kdf::{derive_key, KdfParams};

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Key derivation failed: {0}")]
    KdfFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),
}

/// Result type for crypto operations
pub type Result<T> = std::result::Result<T, CryptoError>;
