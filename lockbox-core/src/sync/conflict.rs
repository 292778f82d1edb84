//! Field-level last-write-wins reconciliation of two vault snapshots.

use crate::model::{Folder, Property, Secret, SecretField, SecretFile, Timestamp};
use std::collections::HashMap;
use uuid::Uuid;

/// Conflict resolution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Accept the remote copy (remote is newer or equal).
    AcceptRemote,
    /// Keep the local copy (local is strictly newer).
    KeepLocal,
}

pub struct ConflictResolver;

impl ConflictResolver {
    /// Decide between two copies of the same thing by their update time.
    ///
    /// The local copy wins only when strictly newer; ties go to the remote,
    /// which is what another device already committed.
    pub fn resolve(local_updated: Timestamp, remote_updated: Timestamp) -> Resolution {
        if local_updated > remote_updated {
            Resolution::KeepLocal
        } else {
            Resolution::AcceptRemote
        }
    }

    /// Merge the local snapshot with the server's snapshot.
    ///
    /// Folders and secrets are unioned by id. Records present on both sides
    /// are reconciled: folders as a whole, secrets property by property. The
    /// result carries the remote schema version; both inputs are expected to
    /// be migrated already.
    pub fn merge(local: &SecretFile, remote: &SecretFile) -> SecretFile {
        SecretFile {
            version: remote.version.clone(),
            folders: Self::merge_folders(&local.folders, &remote.folders),
            secrets: Self::merge_secrets(&local.secrets, &remote.secrets),
        }
    }

    fn merge_folders(local: &[Folder], remote: &[Folder]) -> Vec<Folder> {
        let local_by_id: HashMap<Uuid, &Folder> = local.iter().map(|f| (f.id, f)).collect();

        let mut merged: Vec<Folder> = remote
            .iter()
            .map(|theirs| match local_by_id.get(&theirs.id) {
                Some(ours) => match Self::resolve(ours.last_updated, theirs.last_updated) {
                    Resolution::KeepLocal => (*ours).clone(),
                    Resolution::AcceptRemote => theirs.clone(),
                },
                None => theirs.clone(),
            })
            .collect();

        merged.extend(
            local
                .iter()
                .filter(|ours| !remote.iter().any(|theirs| theirs.id == ours.id))
                .cloned(),
        );
        merged
    }

    fn merge_secrets(local: &[Secret], remote: &[Secret]) -> Vec<Secret> {
        let local_by_id: HashMap<Uuid, &Secret> = local.iter().map(|s| (s.id, s)).collect();

        let mut merged: Vec<Secret> = remote
            .iter()
            .map(|theirs| match local_by_id.get(&theirs.id) {
                Some(ours) => Self::merge_secret(ours, theirs),
                None => theirs.clone(),
            })
            .collect();

        merged.extend(
            local
                .iter()
                .filter(|ours| !remote.iter().any(|theirs| theirs.id == ours.id))
                .cloned(),
        );
        merged
    }

    /// Merge two copies of one secret field by field.
    pub fn merge_secret(ours: &Secret, theirs: &Secret) -> Secret {
        let created = if ours.created != 0 {
            ours.created
        } else {
            theirs.created
        };

        let mut merged = Secret {
            id: ours.id,
            label: Property::newest(&ours.label, &theirs.label).clone(),
            username: None,
            email: None,
            password: None,
            website: pick(ours.website.as_ref(), theirs.website.as_ref()),
            phone: None,
            notes: None,
            mfa: None,
            folders: Property::newest(&ours.folders, &theirs.folders).clone(),
            created,
            last_updated: ours.last_updated.max(theirs.last_updated),
        };

        for field in SecretField::ALL {
            if field == SecretField::Label {
                continue;
            }
            merged.put_property(field, pick(ours.property(field), theirs.property(field)));
        }

        merged
    }
}

/// Newest of two optional properties; whichever exists if only one does.
fn pick<T: Clone>(ours: Option<&Property<T>>, theirs: Option<&Property<T>>) -> Option<Property<T>> {
    match (ours, theirs) {
        (Some(ours), Some(theirs)) => Some(Property::newest(ours, theirs).clone()),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn secret(n: u128, label: &str, label_updated: Timestamp) -> Secret {
        let mut s = Secret::with_id(id(n), label, 1);
        s.label = Property::with_times(label.to_string(), 1, label_updated);
        s.last_updated = label_updated;
        s
    }

    fn folder(n: u128, label: &str, updated: Timestamp) -> Folder {
        Folder {
            id: id(n),
            label: label.to_string(),
            created: 1,
            last_updated: updated,
        }
    }

    fn file(folders: Vec<Folder>, secrets: Vec<Secret>) -> SecretFile {
        SecretFile::new(folders, secrets)
    }

    #[test]
    fn strictly_newer_local_wins() {
        assert_eq!(ConflictResolver::resolve(20, 10), Resolution::KeepLocal);
        assert_eq!(ConflictResolver::resolve(10, 20), Resolution::AcceptRemote);
    }

    #[test]
    fn tie_goes_to_remote() {
        assert_eq!(ConflictResolver::resolve(10, 10), Resolution::AcceptRemote);
    }

    #[test]
    fn merge_with_itself_is_identity() {
        let mut s = secret(1, "Bank", 5);
        s.set(SecretField::Password, "pw", 6);
        s.set_websites(vec!["https://bank.example".to_string()], 7);
        s.set_folders(vec![id(100)], 8);
        let f = file(vec![folder(100, "Money", 3)], vec![s, secret(2, "Mail", 4)]);

        assert_eq!(ConflictResolver::merge(&f, &f), f);
    }

    #[test]
    fn newer_password_wins_per_field() {
        let mut a = secret(1, "Bank", 5);
        a.password = Some(Property::with_times("old".to_string(), 1, 10));
        let mut b = secret(1, "Bank", 5);
        b.password = Some(Property::with_times("new".to_string(), 1, 20));

        let merged = ConflictResolver::merge(&file(vec![], vec![a.clone()]), &file(vec![], vec![b.clone()]));
        assert_eq!(merged.secrets[0].password, b.password);

        // order of arguments does not change the winner
        let merged = ConflictResolver::merge(&file(vec![], vec![b.clone()]), &file(vec![], vec![a]));
        assert_eq!(merged.secrets[0].password, b.password);
    }

    #[test]
    fn fields_are_merged_independently() {
        let mut ours = secret(1, "Bank", 5);
        ours.set(SecretField::Username, "alice-local", 50);
        ours.set(SecretField::Notes, "old notes", 10);

        let mut theirs = secret(1, "Bank", 5);
        theirs.set(SecretField::Username, "alice-remote", 40);
        theirs.set(SecretField::Notes, "new notes", 60);
        theirs.set(SecretField::Phone, "555-0100", 30);

        let merged = ConflictResolver::merge_secret(&ours, &theirs);
        assert_eq!(merged.value(SecretField::Username), Some("alice-local"));
        assert_eq!(merged.value(SecretField::Notes), Some("new notes"));
        assert_eq!(merged.value(SecretField::Phone), Some("555-0100"));
        assert!(merged.email.is_none());
        assert_eq!(merged.last_updated, 60);
    }

    #[test]
    fn folder_membership_is_taken_whole() {
        let mut ours = secret(1, "Bank", 5);
        ours.folders = Property::with_times(vec![id(100), id(101)], 1, 10);
        let mut theirs = secret(1, "Bank", 5);
        theirs.folders = Property::with_times(vec![id(102)], 1, 20);

        let merged = ConflictResolver::merge_secret(&ours, &theirs);
        assert_eq!(merged.folders.value, vec![id(102)]);
    }

    #[test]
    fn created_prefers_local_unless_missing() {
        let mut ours = secret(1, "Bank", 5);
        ours.created = 0;
        let mut theirs = secret(1, "Bank", 5);
        theirs.created = 3;
        assert_eq!(ConflictResolver::merge_secret(&ours, &theirs).created, 3);

        ours.created = 2;
        assert_eq!(ConflictResolver::merge_secret(&ours, &theirs).created, 2);
    }

    #[test]
    fn folders_union_by_id() {
        let local = file(vec![folder(100, "LocalOnly", 5), folder(101, "Shared", 9)], vec![]);
        let remote = file(vec![folder(101, "Shared-old", 4), folder(102, "RemoteOnly", 7)], vec![]);

        let merged = ConflictResolver::merge(&local, &remote);
        assert_eq!(merged.folders.len(), 3);
        assert_eq!(merged.folder(&id(100)), Some(&local.folders[0]));
        assert_eq!(merged.folder(&id(102)), Some(&remote.folders[1]));
        assert_eq!(merged.folder(&id(101)).unwrap().label, "Shared");
    }

    #[test]
    fn concurrent_label_edit_and_new_secret() {
        let local = file(vec![], vec![secret(1, "Bank", 5)]);
        let remote = file(vec![], vec![secret(1, "Bank2", 8), secret(2, "Email", 8)]);

        let merged = ConflictResolver::merge(&local, &remote);
        assert_eq!(merged.secrets.len(), 2);
        assert_eq!(merged.secret(&id(1)).unwrap().label.value, "Bank2");
        assert!(merged.secret(&id(2)).is_some());
    }

    #[test]
    fn result_takes_remote_version() {
        let local = file(vec![], vec![]);
        let mut remote = file(vec![], vec![]);
        remote.version = "0.0.9".to_string();
        assert_eq!(ConflictResolver::merge(&local, &remote).version, "0.0.9");
    }
}
