//! The working set: the decrypted vault currently being edited.
//!
//! Callers own its lifecycle: the sync engine hands one out on unlock, UI
//! actions mutate it, and it is dropped on sign-out. Every mutation stamps
//! the touched property and the record so a later merge can tell which side
//! changed what.

use crate::import::ImportBatch;
use crate::model::{Folder, Secret, SecretField, SecretFile, Timestamp};
use crate::{LockboxError, Result};
use uuid::Uuid;

/// In-memory folders and secrets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vault {
    folders: Vec<Folder>,
    secrets: Vec<Secret>,
}

/// Counts from a bulk import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub secrets_added: usize,
    pub folders_added: usize,
    /// Records skipped because their id already exists.
    pub skipped: usize,
}

impl Vault {
    /// An empty vault.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a decrypted, migrated file.
    pub fn from_file(file: SecretFile) -> Self {
        Self {
            folders: file.folders,
            secrets: file.secrets,
        }
    }

    /// Snapshot at the current schema version, ready to serialize.
    pub fn to_file(&self) -> SecretFile {
        SecretFile::new(self.folders.clone(), self.secrets.clone())
    }

    /// Replace the whole working set, e.g. with a merge result.
    pub fn replace(&mut self, file: SecretFile) {
        self.folders = file.folders;
        self.secrets = file.secrets;
    }

    pub fn secrets(&self) -> &[Secret] {
        &self.secrets
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn secret(&self, id: &Uuid) -> Option<&Secret> {
        self.secrets.iter().find(|s| &s.id == id)
    }

    pub fn folder(&self, id: &Uuid) -> Option<&Folder> {
        self.folders.iter().find(|f| &f.id == id)
    }

    fn secret_mut(&mut self, id: &Uuid) -> Result<&mut Secret> {
        self.secrets
            .iter_mut()
            .find(|s| &s.id == id)
            .ok_or_else(|| LockboxError::NotFound(format!("secret {}", id)))
    }

    fn folder_mut(&mut self, id: &Uuid) -> Result<&mut Folder> {
        self.folders
            .iter_mut()
            .find(|f| &f.id == id)
            .ok_or_else(|| LockboxError::NotFound(format!("folder {}", id)))
    }

    fn check_folders(&self, folder_ids: &[Uuid]) -> Result<()> {
        match folder_ids.iter().find(|id| self.folder(id).is_none()) {
            Some(missing) => Err(LockboxError::InvalidInput(format!(
                "unknown folder {}",
                missing
            ))),
            None => Ok(()),
        }
    }

    /// Add a new secret at the top of the list.
    pub fn add_secret(&mut self, secret: Secret) -> Result<Uuid> {
        if self.secret(&secret.id).is_some() {
            return Err(LockboxError::InvalidInput(format!(
                "secret {} already exists",
                secret.id
            )));
        }
        self.check_folders(&secret.folders.value)?;

        let id = secret.id;
        self.secrets.insert(0, secret);
        Ok(id)
    }

    /// Set one scalar property of a secret.
    pub fn update_secret(
        &mut self,
        id: &Uuid,
        field: SecretField,
        value: impl Into<String>,
        now: Timestamp,
    ) -> Result<()> {
        self.secret_mut(id)?.set(field, value, now);
        Ok(())
    }

    /// Replace a secret's website list.
    pub fn set_websites(&mut self, id: &Uuid, websites: Vec<String>, now: Timestamp) -> Result<()> {
        self.secret_mut(id)?.set_websites(websites, now);
        Ok(())
    }

    /// Replace a secret's folder membership.
    pub fn set_secret_folders(
        &mut self,
        id: &Uuid,
        folder_ids: Vec<Uuid>,
        now: Timestamp,
    ) -> Result<()> {
        self.check_folders(&folder_ids)?;
        self.secret_mut(id)?.set_folders(folder_ids, now);
        Ok(())
    }

    /// Remove a secret.
    pub fn delete_secret(&mut self, id: &Uuid) -> Result<Secret> {
        let index = self
            .secrets
            .iter()
            .position(|s| &s.id == id)
            .ok_or_else(|| LockboxError::NotFound(format!("secret {}", id)))?;
        Ok(self.secrets.remove(index))
    }

    /// Create a folder.
    pub fn add_folder(&mut self, label: impl Into<String>, now: Timestamp) -> Uuid {
        let folder = Folder::new(label, now);
        let id = folder.id;
        self.folders.push(folder);
        id
    }

    /// Rename a folder.
    pub fn rename_folder(&mut self, id: &Uuid, label: impl Into<String>, now: Timestamp) -> Result<()> {
        self.folder_mut(id)?.rename(label, now);
        Ok(())
    }

    /// Remove a folder and unfile every secret that was in it.
    pub fn delete_folder(&mut self, id: &Uuid, now: Timestamp) -> Result<Folder> {
        let index = self
            .folders
            .iter()
            .position(|f| &f.id == id)
            .ok_or_else(|| LockboxError::NotFound(format!("folder {}", id)))?;
        let folder = self.folders.remove(index);

        for secret in &mut self.secrets {
            secret.remove_folder(id, now);
        }

        Ok(folder)
    }

    /// Secrets whose label contains `query`, ignoring case. An empty query
    /// matches everything.
    pub fn search(&self, query: &str) -> Vec<&Secret> {
        let query = query.trim().to_lowercase();
        self.secrets
            .iter()
            .filter(|s| query.is_empty() || s.label.value.to_lowercase().contains(&query))
            .collect()
    }

    /// Secrets filed under a folder.
    pub fn secrets_in_folder(&self, folder_id: &Uuid) -> Vec<&Secret> {
        self.secrets.iter().filter(|s| s.in_folder(folder_id)).collect()
    }

    /// Insert imported records whose ids are not present yet.
    pub fn import(&mut self, batch: ImportBatch) -> ImportSummary {
        let mut summary = ImportSummary::default();

        let mut secrets = Vec::new();
        for secret in batch.secrets {
            if self.secret(&secret.id).is_some() || secrets.iter().any(|s: &Secret| s.id == secret.id) {
                summary.skipped += 1;
                continue;
            }
            secrets.push(secret);
        }

        let mut folders = Vec::new();
        for folder in batch.folders {
            if self.folder(&folder.id).is_some() || folders.iter().any(|f: &Folder| f.id == folder.id) {
                summary.skipped += 1;
                continue;
            }
            folders.push(folder);
        }

        summary.secrets_added = secrets.len();
        summary.folders_added = folders.len();

        secrets.append(&mut self.secrets);
        self.secrets = secrets;
        folders.append(&mut self.folders);
        self.folders = folders;

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_update_secret() {
        let mut vault = Vault::new();
        let id = vault.add_secret(Secret::new("Bank", 10)).unwrap();

        vault.update_secret(&id, SecretField::Password, "hunter2", 20).unwrap();
        vault
            .set_websites(&id, vec!["https://bank.example".to_string()], 30)
            .unwrap();

        let secret = vault.secret(&id).unwrap();
        assert_eq!(secret.value(SecretField::Password), Some("hunter2"));
        assert_eq!(secret.password.as_ref().unwrap().last_updated, 20);
        assert_eq!(secret.websites().len(), 1);
        assert_eq!(secret.last_updated, 30);
        assert_eq!(secret.label.last_updated, 10);
    }

    #[test]
    fn new_secrets_go_first() {
        let mut vault = Vault::new();
        vault.add_secret(Secret::new("First", 1)).unwrap();
        let second = vault.add_secret(Secret::new("Second", 2)).unwrap();
        assert_eq!(vault.secrets()[0].id, second);
    }

    #[test]
    fn duplicate_or_misfiled_secret_rejected() {
        let mut vault = Vault::new();
        let secret = Secret::new("Bank", 1);
        vault.add_secret(secret.clone()).unwrap();
        assert!(vault.add_secret(secret).is_err());

        let mut orphan = Secret::new("Orphan", 1);
        orphan.set_folders(vec![Uuid::now_v7()], 2);
        assert!(matches!(
            vault.add_secret(orphan),
            Err(LockboxError::InvalidInput(_))
        ));
    }

    #[test]
    fn deleting_folder_unfiles_secrets() {
        let mut vault = Vault::new();
        let work = vault.add_folder("Work", 1);
        let home = vault.add_folder("Home", 1);
        let id = vault.add_secret(Secret::new("VPN", 1)).unwrap();
        vault.set_secret_folders(&id, vec![work, home], 2).unwrap();
        assert_eq!(vault.secrets_in_folder(&work).len(), 1);

        vault.delete_folder(&work, 3).unwrap();
        let secret = vault.secret(&id).unwrap();
        assert_eq!(secret.folders.value, vec![home]);
        assert_eq!(secret.folders.last_updated, 3);
        assert!(vault.folder(&work).is_none());
        assert!(vault.delete_folder(&work, 4).is_err());
    }

    #[test]
    fn rename_folder_stamps_it() {
        let mut vault = Vault::new();
        let id = vault.add_folder("Work", 1);
        vault.rename_folder(&id, "Office", 5).unwrap();
        let folder = vault.folder(&id).unwrap();
        assert_eq!(folder.label, "Office");
        assert_eq!(folder.last_updated, 5);
    }

    #[test]
    fn search_is_case_insensitive() {
        let mut vault = Vault::new();
        vault.add_secret(Secret::new("Online Banking", 1)).unwrap();
        vault.add_secret(Secret::new("Email", 1)).unwrap();

        assert_eq!(vault.search("bank").len(), 1);
        assert_eq!(vault.search("  ").len(), 2);
        assert!(vault.search("nothing").is_empty());
    }

    #[test]
    fn delete_secret_removes_it() {
        let mut vault = Vault::new();
        let id = vault.add_secret(Secret::new("Bank", 1)).unwrap();
        assert_eq!(vault.delete_secret(&id).unwrap().id, id);
        assert!(vault.secrets().is_empty());
        assert!(matches!(
            vault.delete_secret(&id),
            Err(LockboxError::NotFound(_))
        ));
    }

    #[test]
    fn file_roundtrip_keeps_records() {
        let mut vault = Vault::new();
        vault.add_folder("Work", 1);
        vault.add_secret(Secret::new("Bank", 1)).unwrap();

        let file = vault.to_file();
        assert!(file.is_current());
        assert_eq!(Vault::from_file(file), vault);
    }

    #[test]
    fn import_skips_existing_ids() {
        let mut vault = Vault::new();
        let existing = Secret::new("Bank", 1);
        vault.add_secret(existing.clone()).unwrap();

        let batch = ImportBatch {
            secrets: vec![existing, Secret::new("Mail", 2)],
            folders: vec![Folder::new("Imported", 2)],
        };
        let summary = vault.import(batch);

        assert_eq!(summary.secrets_added, 1);
        assert_eq!(summary.folders_added, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(vault.secrets().len(), 2);
        assert_eq!(vault.secrets()[0].label.value, "Mail");
    }
}
