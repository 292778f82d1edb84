//! Sync configuration, loaded from a TOML file.

use crate::crypto::kdf::LEGACY_ITERATIONS;
use crate::crypto::BlobFormat;
use crate::{LockboxError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for talking to the storage endpoint and saving the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the API server.
    pub server_url: String,
    /// Path of the secret-file resource under `server_url`.
    pub secret_file_path: String,
    /// Bearer token sent with every request, if the server wants one.
    pub auth_token: Option<String>,
    pub request_timeout_secs: u64,
    /// Conflict-driven retries after the first upload before giving up.
    pub max_conflict_retries: u32,
    /// Base delay for exponential backoff between conflict retries.
    pub retry_base_delay_ms: u64,
    /// PBKDF2 iterations for newly salted vaults. Legacy blobs always use
    /// 100,000 and salted blobs carry their own count.
    pub kdf_iterations: u32,
    /// Envelope used when writing. Both formats are always readable.
    pub blob_format: BlobFormat,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:3000".to_string(),
            secret_file_path: "/googleDrive/secretFile".to_string(),
            auth_token: None,
            request_timeout_secs: 30,
            max_conflict_retries: 3,
            retry_base_delay_ms: 250,
            kdf_iterations: LEGACY_ITERATIONS,
            blob_format: BlobFormat::Legacy,
        }
    }
}

impl SyncConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| LockboxError::Config(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.server_url.trim().is_empty() {
            return Err(LockboxError::Config("server_url is empty".to_string()));
        }
        if !self.secret_file_path.starts_with('/') {
            return Err(LockboxError::Config(
                "secret_file_path must start with '/'".to_string(),
            ));
        }
        if self.kdf_iterations == 0 {
            return Err(LockboxError::Config(
                "kdf_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Full URL of the secret-file resource.
    pub fn secret_file_url(&self) -> String {
        format!(
            "{}{}",
            self.server_url.trim_end_matches('/'),
            self.secret_file_path
        )
    }

    /// Retry policy derived from these settings.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_conflict_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
        }
    }
}

/// Bound and pacing of conflict retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        SyncConfig::default().retry_policy()
    }
}

impl RetryPolicy {
    /// Retry without waiting.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based): base * 2^(retry-1), capped at 10s.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(factor)
            .min(Duration::from_secs(10))
    }
}
