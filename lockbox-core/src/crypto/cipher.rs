//! AES-256-CBC encryption and decryption of the serialized vault.
//!
//! Uses AES-256-CBC with:
//! - 256-bit key derived from the master password
//! - 128-bit IV (all zero for legacy blobs)
//! - PKCS#7 padding, checked on decrypt
//!
//! The legacy wire format is plain base64 of the ciphertext, with no salt or
//! IV stored alongside it.

use crate::crypto::kdf::{derive_key, KdfParams};
use crate::crypto::{CryptoError, Result};
use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// IV length in bytes
pub const IV_LEN: usize = 16;

/// The fixed IV used by legacy blobs
pub const LEGACY_IV: [u8; IV_LEN] = [0u8; IV_LEN];

/// A symmetric key derived from the master password.
///
/// Only lives while the vault is unlocked; wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; 32],
}

impl VaultKey {
    /// Derive a key from a password. CPU-bound: callers on an async runtime
    /// should run this on a blocking thread.
    pub fn derive(password: &[u8], params: &KdfParams) -> Result<Self> {
        let key = derive_key(password, params)?;
        Ok(Self { key })
    }

    /// Get the raw key bytes (use sparingly)
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey(..)")
    }
}

/// Encrypt bytes with AES-256-CBC and PKCS#7 padding.
pub fn encrypt_bytes(key: &VaultKey, iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    Aes256CbcEnc::new(key.as_bytes().into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt AES-256-CBC ciphertext and strip PKCS#7 padding.
///
/// # Security
/// - A wrong key almost always breaks the padding, which is reported as
///   an error rather than returning garbage
pub fn decrypt_bytes(key: &VaultKey, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(CryptoError::DecryptionFailed(format!(
            "Ciphertext length {} is not a positive multiple of the block size",
            ciphertext.len()
        )));
    }

    Aes256CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed("Invalid padding".to_string()))
}

/// Decrypt to a UTF-8 string.
pub fn decrypt_to_string(key: &VaultKey, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Result<String> {
    let bytes = decrypt_bytes(key, iv, ciphertext)?;
    String::from_utf8(bytes).map_err(|_| CryptoError::DecryptionFailed("Invalid UTF-8".to_string()))
}

/// Encrypt a string with an already-derived key into the legacy blob format.
pub fn encrypt_legacy(key: &VaultKey, plaintext: &str) -> String {
    STANDARD.encode(encrypt_bytes(key, &LEGACY_IV, plaintext.as_bytes()))
}

/// Decrypt a legacy blob with an already-derived key.
pub fn decrypt_legacy(key: &VaultKey, ciphertext: &str) -> Result<String> {
    let raw = STANDARD
        .decode(ciphertext.trim())
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid base64: {}", e)))?;
    decrypt_to_string(key, &LEGACY_IV, &raw)
}

/// Encrypt a UTF-8 string with a password.
///
/// Deterministic: the key comes from PBKDF2 with the fixed zero salt and the
/// cipher runs with the fixed zero IV, so the same input always produces the
/// same base64 output.
pub fn encrypt(plaintext: &str, password: &str) -> Result<String> {
    let key = VaultKey::derive(password.as_bytes(), &KdfParams::legacy())?;
    Ok(encrypt_legacy(&key, plaintext))
}

/// Decrypt a blob produced by [`encrypt`] (or a salted envelope).
///
/// Fails with [`CryptoError::DecryptionFailed`] for a wrong password or a
/// corrupted blob.
pub fn decrypt(ciphertext: &str, password: &str) -> Result<String> {
    let envelope = crate::crypto::Envelope::parse(ciphertext)?;
    let key = VaultKey::derive(password.as_bytes(), &envelope.kdf_params())?;
    envelope.open(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{BlobFormat, Envelope};

    fn fast_key(password: &str) -> VaultKey {
        VaultKey::derive(password.as_bytes(), &KdfParams::legacy().with_iterations(10)).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = fast_key("pw");
        let plaintext = "Hello, World! This is a test.";

        let blob = encrypt_legacy(&key, plaintext);
        assert_eq!(decrypt_legacy(&key, &blob).unwrap(), plaintext);
    }

    #[test]
    fn test_unicode_roundtrip() {
        let key = fast_key("pw");
        let plaintext = "пароль 🔐 {\"label\":\"Bank\"}";

        let blob = encrypt_legacy(&key, plaintext);
        assert_eq!(decrypt_legacy(&key, &blob).unwrap(), plaintext);
    }

    #[test]
    fn test_deterministic_output() {
        let key = fast_key("pw");
        assert_eq!(encrypt_legacy(&key, "same data"), encrypt_legacy(&key, "same data"));
    }

    #[test]
    fn test_known_legacy_vector() {
        // PBKDF2-SHA256(pw, 16 zero bytes, 10 rounds) + AES-256-CBC, zero IV
        let key = fast_key("pw");
        assert_eq!(encrypt_legacy(&key, "hello vault"), "U36Gf7QfaJ1hOHqrpJXcsA==");
        assert_eq!(
            decrypt_legacy(&key, "U36Gf7QfaJ1hOHqrpJXcsA==").unwrap(),
            "hello vault"
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = encrypt_legacy(&fast_key("password-one"), "Secret data that spans blocks");
        assert!(decrypt_legacy(&fast_key("password-two"), &blob).is_err());
    }

    #[test]
    fn test_tampering_detected() {
        let key = fast_key("pw");
        let mut raw = STANDARD.decode(encrypt_legacy(&key, "Original data")).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xFF;

        assert!(decrypt_bytes(&key, &LEGACY_IV, &raw).is_err());
    }

    #[test]
    fn test_malformed_input_fails() {
        let key = fast_key("pw");
        assert!(decrypt_legacy(&key, "not base64 !!").is_err());
        assert!(decrypt_legacy(&key, "").is_err());
        assert!(decrypt_bytes(&key, &LEGACY_IV, &[0u8; 15]).is_err());
    }

    #[test]
    fn test_password_api_reads_salted_blob_iterations() {
        let params = KdfParams::random(10);
        let key = VaultKey::derive(b"pw", &params).unwrap();
        let blob = Envelope::seal(BlobFormat::Salted, &key, params, "data").encode();

        assert_eq!(decrypt(&blob, "pw").unwrap(), "data");
        assert!(decrypt(&blob, "other").is_err());
    }

    #[test]
    fn test_password_api_matches_webcrypto_blob() {
        let blob = encrypt(r#"{"version":"0.0.5","folders":[],"secrets":[]}"#, "correct horse")
            .unwrap();
        assert_eq!(
            blob,
            "ET5dPu9O7Rcls7sF7BJmS79mJ8mw17rgpywFUNSopE/4L0230N9ausEJVKzY/W1/"
        );
        assert_eq!(
            decrypt(&blob, "correct horse").unwrap(),
            r#"{"version":"0.0.5","folders":[],"secrets":[]}"#
        );
        assert!(decrypt(&blob, "wrong horse").is_err());
    }
}
