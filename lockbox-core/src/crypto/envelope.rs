//! Blob envelopes: how ciphertext, KDF parameters and IV are laid out in the
//! stored string.
//!
//! Two formats are accepted:
//! - `Legacy`: `base64(ciphertext)`, zero salt, 100k iterations, zero IV
//! - `Salted`: `lbx2$` + `base64(iterations(4, BE) || salt(16) || iv(16) || ciphertext)`
//!
//! The `$` in the prefix never occurs in base64 output, so the formats cannot
//! be confused.

use crate::crypto::cipher::{
    decrypt_to_string, encrypt_bytes, VaultKey, IV_LEN, LEGACY_IV,
};
use crate::crypto::kdf::{KdfParams, SALT_LEN};
use crate::crypto::{CryptoError, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Prefix marking a salted envelope
pub const SALTED_PREFIX: &str = "lbx2$";

const ITERATIONS_LEN: usize = 4;
const HEADER_LEN: usize = ITERATIONS_LEN + SALT_LEN + IV_LEN;

/// Which envelope a blob is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlobFormat {
    /// Fixed zero salt and IV; readable by every existing client
    #[default]
    Legacy,
    /// Random per-vault salt and per-save IV stored in the blob
    Salted,
}

/// A parsed blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub format: BlobFormat,
    pub kdf: KdfParams,
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Parse a stored blob, detecting its format.
    pub fn parse(blob: &str) -> Result<Self> {
        let blob = blob.trim();

        if let Some(body) = blob.strip_prefix(SALTED_PREFIX) {
            let raw = STANDARD
                .decode(body)
                .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid base64: {}", e)))?;

            // header + at least one block
            if raw.len() < HEADER_LEN + 16 {
                return Err(CryptoError::DecryptionFailed(
                    "Salted blob too short".to_string(),
                ));
            }

            let mut iterations = [0u8; ITERATIONS_LEN];
            iterations.copy_from_slice(&raw[..ITERATIONS_LEN]);
            let mut salt = [0u8; SALT_LEN];
            salt.copy_from_slice(&raw[ITERATIONS_LEN..ITERATIONS_LEN + SALT_LEN]);
            let mut iv = [0u8; IV_LEN];
            iv.copy_from_slice(&raw[ITERATIONS_LEN + SALT_LEN..HEADER_LEN]);

            let kdf = KdfParams {
                salt,
                iterations: u32::from_be_bytes(iterations),
            };
            kdf.validate()
                .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

            return Ok(Self {
                format: BlobFormat::Salted,
                kdf,
                iv,
                ciphertext: raw[HEADER_LEN..].to_vec(),
            });
        }

        let ciphertext = STANDARD
            .decode(blob)
            .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid base64: {}", e)))?;

        Ok(Self {
            format: BlobFormat::Legacy,
            kdf: KdfParams::legacy(),
            iv: LEGACY_IV,
            ciphertext,
        })
    }

    /// Encrypt `plaintext` into an envelope.
    ///
    /// For `Legacy` the parameters are ignored and forced to
    /// [`KdfParams::legacy`]; the key must have been derived with those.
    pub fn seal(format: BlobFormat, key: &VaultKey, kdf: KdfParams, plaintext: &str) -> Self {
        let (kdf, iv) = match format {
            BlobFormat::Legacy => (KdfParams::legacy(), LEGACY_IV),
            BlobFormat::Salted => (kdf, rand::random::<[u8; IV_LEN]>()),
        };

        Self {
            format,
            kdf,
            iv,
            ciphertext: encrypt_bytes(key, &iv, plaintext.as_bytes()),
        }
    }

    /// KDF parameters needed to derive the key for this envelope.
    pub fn kdf_params(&self) -> KdfParams {
        self.kdf
    }

    /// Decrypt the envelope with a key derived from [`Envelope::kdf_params`].
    pub fn open(&self, key: &VaultKey) -> Result<String> {
        decrypt_to_string(key, &self.iv, &self.ciphertext)
    }

    /// Render to the stored string form.
    pub fn encode(&self) -> String {
        match self.format {
            BlobFormat::Legacy => STANDARD.encode(&self.ciphertext),
            BlobFormat::Salted => {
                let mut raw = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
                raw.extend_from_slice(&self.kdf.iterations.to_be_bytes());
                raw.extend_from_slice(&self.kdf.salt);
                raw.extend_from_slice(&self.iv);
                raw.extend_from_slice(&self.ciphertext);
                format!("{}{}", SALTED_PREFIX, STANDARD.encode(raw))
            }
        }
    }
}
