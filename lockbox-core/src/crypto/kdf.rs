//! PBKDF2 key derivation for master password processing.
//!
//! Uses PBKDF2-HMAC-SHA256 with:
//! - Iterations: 100,000 for legacy blobs, stored in the envelope otherwise
//! - Output length: 32 bytes (256 bits)
//! - Salt length: 16 bytes (all zero for legacy blobs)

use crate::crypto::{CryptoError, Result};
use sha2::Sha256;

/// Iteration count every existing vault blob was written with.
pub const LEGACY_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Parameters for PBKDF2 key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Salt for key derivation (16 bytes)
    pub salt: [u8; SALT_LEN],

    /// Number of PBKDF2 iterations
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::legacy()
    }
}

impl KdfParams {
    /// Zero salt, 100k iterations. Bit-compatible with every legacy blob.
    pub fn legacy() -> Self {
        Self {
            salt: [0u8; SALT_LEN],
            iterations: LEGACY_ITERATIONS,
        }
    }

    /// Fresh random salt with the given iteration count
    pub fn random(iterations: u32) -> Self {
        Self {
            salt: rand::random(),
            iterations,
        }
    }

    /// Same salt, different iteration count
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Whether this uses the fixed all-zero salt
    pub fn is_legacy_salt(&self) -> bool {
        self.salt == [0u8; SALT_LEN]
    }

    /// Verify that parameters are within acceptable ranges
    pub fn validate(&self) -> Result<()> {
        if self.iterations < 1 {
            return Err(CryptoError::KdfFailed(
                "Iteration count too low (minimum: 1)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Derive a 256-bit key from a password using PBKDF2-HMAC-SHA256
///
/// # Arguments
/// * `password` - The master password as bytes
/// * `params` - KDF parameters (salt, iterations)
///
/// # Returns
/// A 32-byte key
pub fn derive_key(password: &[u8], params: &KdfParams) -> Result<[u8; 32]> {
    params.validate()?;

    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password, &params.salt, params.iterations, &mut key);

    Ok(key)
}
