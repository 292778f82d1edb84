//! HTTP client for the secret-file endpoint of the API server.

use crate::sync::config::SyncConfig;
use crate::sync::models::{RemoteBlob, UploadOutcome, UploadRequest};
use crate::sync::storage::VaultStorage;
use crate::{LockboxError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

/// [`VaultStorage`] backed by the server's `GET`/`POST` secret-file resource.
pub struct HttpStorage {
    client: reqwest::Client,
    url: String,
    auth_token: Option<String>,
}

impl HttpStorage {
    /// Create a client from sync settings.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| LockboxError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: config.secret_file_url(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl VaultStorage for HttpStorage {
    async fn download(&self) -> Result<Option<RemoteBlob>> {
        let resp = self
            .authorize(self.client.get(&self.url))
            .send()
            .await
            .map_err(|e| LockboxError::Transport(e.to_string()))?;

        match resp.status() {
            StatusCode::NOT_FOUND => {
                debug!("No secret file on the server yet");
                Ok(None)
            }
            status if status.is_success() => {
                let blob = resp.json::<RemoteBlob>().await.map_err(|e| {
                    LockboxError::Transport(format!("Invalid download response: {}", e))
                })?;
                Ok(Some(blob))
            }
            status => Err(server_error(status, resp).await),
        }
    }

    async fn upload(&self, content: &str, expected_hash: &str) -> Result<UploadOutcome> {
        let body = UploadRequest {
            content: content.to_string(),
            hash: expected_hash.to_string(),
        };

        let resp = self
            .authorize(self.client.post(&self.url))
            .json(&body)
            .send()
            .await
            .map_err(|e| LockboxError::Transport(e.to_string()))?;

        match resp.status() {
            StatusCode::CONFLICT => Ok(UploadOutcome::Conflict),
            status if status.is_success() => {
                let hash = resp
                    .text()
                    .await
                    .map_err(|e| LockboxError::Transport(e.to_string()))?;
                Ok(UploadOutcome::Committed(hash.trim().to_string()))
            }
            status => Err(server_error(status, resp).await),
        }
    }
}

async fn server_error(status: StatusCode, resp: reqwest::Response) -> LockboxError {
    let body = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
    LockboxError::Transport(format!("Server error {}: {}", status, body))
}
