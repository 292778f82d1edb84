//! Sync engine: orchestrates the fetch and save cycle against remote storage.

use crate::crypto::{BlobFormat, CryptoError, Envelope, KdfParams, VaultKey};
use crate::migration;
use crate::model::SecretFile;
use crate::sync::config::{RetryPolicy, SyncConfig};
use crate::sync::conflict::ConflictResolver;
use crate::sync::models::{RemoteBlob, SaveReport, SaveStage, UploadOutcome, NO_PRIOR_HASH};
use crate::sync::storage::VaultStorage;
use crate::vault::Vault;
use crate::{LockboxError, Result};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// State established by a successful unlock and dropped on [`SyncEngine::lock`].
struct Session {
    password: Zeroizing<String>,
    key: VaultKey,
    /// Parameters `key` was derived with.
    kdf: KdfParams,
    /// Concurrency token of the blob last read or written.
    hash: String,
}

/// Downloads, decrypts and saves the vault through a [`VaultStorage`].
///
/// Saves are serialized by the session lock, so two `save` calls on one
/// engine never race each other for the same expected hash. The engine keeps
/// a single concurrency token and so serves a single working set.
pub struct SyncEngine<S> {
    storage: S,
    config: SyncConfig,
    retry: RetryPolicy,
    session: Mutex<Option<Session>>,
}

impl<S: VaultStorage> SyncEngine<S> {
    /// Create an engine with the retry policy from `config`.
    pub fn new(storage: S, config: SyncConfig) -> Self {
        let retry = config.retry_policy();
        Self {
            storage,
            config,
            retry,
            session: Mutex::new(None),
        }
    }

    /// Override the conflict retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub async fn is_unlocked(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Forget the session password and key.
    pub async fn lock(&self) {
        if self.session.lock().await.take().is_some() {
            info!("Vault session locked");
        }
    }

    /// Write a new, empty vault. Fails if the server already holds one.
    pub async fn initialize(&self, master_password: &str) -> Result<Vault> {
        let mut guard = self.session.lock().await;

        let params = self.write_params(None);
        let key = derive(master_password, params).await?;

        let vault = Vault::new();
        let plaintext = serialize(&vault.to_file())?;
        let blob = Envelope::seal(self.config.blob_format, &key, params, &plaintext).encode();

        match self.storage.upload(&blob, NO_PRIOR_HASH).await? {
            UploadOutcome::Committed(hash) => {
                info!(format = ?self.config.blob_format, "Created new vault");
                *guard = Some(Session {
                    password: Zeroizing::new(master_password.to_string()),
                    key,
                    kdf: params,
                    hash,
                });
                Ok(vault)
            }
            UploadOutcome::Conflict => Err(LockboxError::InvalidInput(
                "A vault already exists on the server".to_string(),
            )),
        }
    }

    /// Download, decrypt and migrate the vault, unlocking the session.
    ///
    /// A wrong password surfaces as an error for which
    /// [`LockboxError::is_incorrect_password`] is true.
    pub async fn fetch(&self, master_password: &str) -> Result<Vault> {
        let mut guard = self.session.lock().await;

        let remote = self
            .storage
            .download()
            .await?
            .ok_or_else(|| LockboxError::NotFound("No vault on the server".to_string()))?;

        let envelope = Envelope::parse(&remote.content)?;
        let params = envelope.kdf_params();
        let key = derive(master_password, params).await?;
        let file = decode(&envelope, &key)?;

        info!(
            secrets = file.secrets.len(),
            folders = file.folders.len(),
            "Vault unlocked"
        );

        *guard = Some(Session {
            password: Zeroizing::new(master_password.to_string()),
            key,
            kdf: params,
            hash: remote.hash,
        });

        Ok(Vault::from_file(file))
    }

    /// Encrypt and upload the working set.
    ///
    /// When another writer got there first, the server's copy is merged into
    /// `vault` and the upload is retried, at most `max_retries` times.
    /// Transport failures are returned immediately.
    ///
    /// `vault` must be the working set this engine fetched or initialized;
    /// saving an unrelated `Vault` replaces the server copy without a merge.
    pub async fn save(&self, vault: &mut Vault) -> Result<SaveReport> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(LockboxError::VaultLocked)?;

        let format = self.config.blob_format;
        let mut attempts = 0u32;
        let mut merged = false;
        debug!(stage = ?SaveStage::Idle, "Save requested");

        loop {
            attempts += 1;

            self.prepare_key(session).await?;
            let plaintext = serialize(&vault.to_file())?;
            let blob = Envelope::seal(format, &session.key, session.kdf, &plaintext).encode();

            debug!(stage = ?SaveStage::Uploading, attempt = attempts, "Uploading vault");
            let outcome = match self.storage.upload(&blob, &session.hash).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(stage = ?SaveStage::Failed, error = %e, "Upload failed");
                    return Err(e);
                }
            };

            match outcome {
                UploadOutcome::Committed(hash) => {
                    info!(stage = ?SaveStage::Committed, attempts, merged, "Vault saved");
                    session.hash = hash.clone();
                    return Ok(SaveReport {
                        attempts,
                        merged,
                        hash,
                    });
                }
                UploadOutcome::Conflict => {
                    warn!(stage = ?SaveStage::Conflicted, attempt = attempts, "Vault changed on the server");

                    if attempts > self.retry.max_retries {
                        warn!(stage = ?SaveStage::Failed, attempts, "Giving up after repeated conflicts");
                        return Err(LockboxError::SaveConflict { attempts });
                    }

                    let delay = self.retry.delay_for(attempts);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }

                    debug!(stage = ?SaveStage::Reconciling, "Merging server copy");
                    self.reconcile(session, vault).await?;
                    merged = true;
                }
            }
        }
    }

    /// KDF parameters for writing in the configured format.
    ///
    /// Legacy blobs always use the fixed legacy parameters. Salted blobs keep
    /// the vault's current salt and iteration count, or start a fresh salt
    /// with the configured count.
    fn write_params(&self, current: Option<KdfParams>) -> KdfParams {
        match self.config.blob_format {
            BlobFormat::Legacy => KdfParams::legacy(),
            BlobFormat::Salted => match current {
                Some(kdf) if !kdf.is_legacy_salt() => kdf,
                _ => KdfParams::random(self.config.kdf_iterations),
            },
        }
    }

    /// Make sure the session key matches the parameters the next blob is
    /// written with.
    async fn prepare_key(&self, session: &mut Session) -> Result<()> {
        let kdf = self.write_params(Some(session.kdf));
        if kdf != session.kdf {
            debug!(format = ?self.config.blob_format, iterations = kdf.iterations, "Deriving key for new parameters");
            session.key = derive(&session.password, kdf).await?;
            session.kdf = kdf;
        }
        Ok(())
    }

    /// Pull the server's copy, merge it into `vault` and adopt its hash.
    async fn reconcile(&self, session: &mut Session, vault: &mut Vault) -> Result<()> {
        let remote = match self.storage.download().await? {
            Some(remote) => remote,
            None => {
                debug!("Server copy disappeared, retrying as first write");
                session.hash = NO_PRIOR_HASH.to_string();
                return Ok(());
            }
        };

        let remote_file = self.open_remote(session, &remote).await?;
        let merged = ConflictResolver::merge(&vault.to_file(), &remote_file);
        debug!(
            secrets = merged.secrets.len(),
            folders = merged.folders.len(),
            "Merged server copy"
        );

        vault.replace(merged);
        session.hash = remote.hash;
        Ok(())
    }

    async fn open_remote(&self, session: &Session, remote: &RemoteBlob) -> Result<SecretFile> {
        let envelope = Envelope::parse(&remote.content)?;
        if envelope.kdf_params() == session.kdf {
            return decode(&envelope, &session.key);
        }

        let key = derive(&session.password, envelope.kdf_params()).await?;
        decode(&envelope, &key)
    }
}

/// Run PBKDF2 off the async executor.
async fn derive(password: &str, params: KdfParams) -> Result<VaultKey> {
    let password = Zeroizing::new(password.to_string());
    tokio::task::spawn_blocking(move || VaultKey::derive(password.as_bytes(), &params))
        .await
        .map_err(|e| CryptoError::KdfFailed(e.to_string()))?
        .map_err(LockboxError::from)
}

/// Decrypt an envelope and bring its document to the current schema.
fn decode(envelope: &Envelope, key: &VaultKey) -> Result<SecretFile> {
    let plaintext = Zeroizing::new(envelope.open(key)?);
    let doc: serde_json::Value = serde_json::from_str(&plaintext).map_err(|_| {
        CryptoError::DecryptionFailed("Decrypted content is not a vault document".to_string())
    })?;
    migration::upgrade(doc)
}

fn serialize(file: &SecretFile) -> Result<String> {
    file.to_json()
        .map_err(|e| LockboxError::Serialization(e.to_string()))
}
