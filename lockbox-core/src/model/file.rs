//! The serialized unit that is encrypted and stored as a single blob.

use crate::model::secret::{Folder, Secret};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schema version written by this build.
pub const CURRENT_VERSION: &str = "0.0.5";

/// Every secret and folder in the vault, tagged with its schema version.
///
/// Order of `folders` and `secrets` carries no meaning; records are
/// identified by `id` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretFile {
    pub version: String,
    #[serde(default)]
    pub folders: Vec<Folder>,
    #[serde(default)]
    pub secrets: Vec<Secret>,
}

impl Default for SecretFile {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl SecretFile {
    /// A file at the current schema version.
    pub fn new(folders: Vec<Folder>, secrets: Vec<Secret>) -> Self {
        Self {
            version: CURRENT_VERSION.to_string(),
            folders,
            secrets,
        }
    }

    /// Whether no migration is needed.
    pub fn is_current(&self) -> bool {
        self.version == CURRENT_VERSION
    }

    /// Look up a secret by id.
    pub fn secret(&self, id: &Uuid) -> Option<&Secret> {
        self.secrets.iter().find(|s| &s.id == id)
    }

    /// Look up a folder by id.
    pub fn folder(&self, id: &Uuid) -> Option<&Folder> {
        self.folders.iter().find(|f| &f.id == id)
    }

    /// Serialize to the JSON text that gets encrypted.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
