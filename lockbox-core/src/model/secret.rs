//! Secret and folder records.

use crate::model::property::{Property, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scalar string properties of a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretField {
    Label,
    Username,
    Email,
    Password,
    Phone,
    Notes,
    Mfa,
}

impl SecretField {
    /// Every scalar property, in display order.
    pub const ALL: [SecretField; 7] = [
        Self::Label,
        Self::Username,
        Self::Email,
        Self::Password,
        Self::Phone,
        Self::Notes,
        Self::Mfa,
    ];

    /// JSON key of this property.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Username => "username",
            Self::Email => "email",
            Self::Password => "password",
            Self::Phone => "phone",
            Self::Notes => "notes",
            Self::Mfa => "mfa",
        }
    }
}

impl std::str::FromStr for SecretField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| format!("unknown secret field: {}", s))
    }
}

/// A credential record.
///
/// `id` is immutable and client-generated (time-ordered UUIDv7 for new
/// records). Every mutable field is a [`Property`]; the record-level
/// `last_updated` is the latest update of any field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Secret {
    pub id: Uuid,
    pub label: Property<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<Property<Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<Property<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa: Option<Property<String>>,
    /// Ids of the folders this secret belongs to, taken as a whole on merge.
    pub folders: Property<Vec<Uuid>>,
    pub created: Timestamp,
    pub last_updated: Timestamp,
}

impl Secret {
    /// A new secret with only a label, outside any folder.
    pub fn new(label: impl Into<String>, now: Timestamp) -> Self {
        Self::with_id(Uuid::now_v7(), label, now)
    }

    /// A new secret with a caller-chosen id.
    pub fn with_id(id: Uuid, label: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id,
            label: Property::new(label.into(), now),
            username: None,
            email: None,
            password: None,
            website: None,
            phone: None,
            notes: None,
            mfa: None,
            folders: Property::new(Vec::new(), now),
            created: now,
            last_updated: now,
        }
    }

    /// Read a scalar property.
    pub fn property(&self, field: SecretField) -> Option<&Property<String>> {
        match field {
            SecretField::Label => Some(&self.label),
            SecretField::Username => self.username.as_ref(),
            SecretField::Email => self.email.as_ref(),
            SecretField::Password => self.password.as_ref(),
            SecretField::Phone => self.phone.as_ref(),
            SecretField::Notes => self.notes.as_ref(),
            SecretField::Mfa => self.mfa.as_ref(),
        }
    }

    /// Slot of an optional scalar property; `None` for the label.
    fn optional_slot(&mut self, field: SecretField) -> Option<&mut Option<Property<String>>> {
        match field {
            SecretField::Label => None,
            SecretField::Username => Some(&mut self.username),
            SecretField::Email => Some(&mut self.email),
            SecretField::Password => Some(&mut self.password),
            SecretField::Phone => Some(&mut self.phone),
            SecretField::Notes => Some(&mut self.notes),
            SecretField::Mfa => Some(&mut self.mfa),
        }
    }

    /// Replace a scalar property wholesale (used by merge).
    pub fn put_property(&mut self, field: SecretField, property: Option<Property<String>>) {
        match self.optional_slot(field) {
            Some(slot) => *slot = property,
            None => {
                if let Some(property) = property {
                    self.label = property;
                }
            }
        }
    }

    /// Value of a scalar property, if set.
    pub fn value(&self, field: SecretField) -> Option<&str> {
        self.property(field).map(|p| p.value.as_str())
    }

    /// Set a scalar property, creating it on first use.
    pub fn set(&mut self, field: SecretField, value: impl Into<String>, now: Timestamp) {
        let value = value.into();
        match self.optional_slot(field) {
            Some(Some(property)) => property.set(value, now),
            Some(slot) => *slot = Some(Property::new(value, now)),
            None => self.label.set(value, now),
        }
        self.touch(now);
    }

    /// Website list, empty when unset.
    pub fn websites(&self) -> &[String] {
        self.website.as_ref().map(|p| p.value.as_slice()).unwrap_or(&[])
    }

    /// Replace the website list.
    pub fn set_websites(&mut self, websites: Vec<String>, now: Timestamp) {
        match self.website.as_mut() {
            Some(property) => property.set(websites, now),
            None => self.website = Some(Property::new(websites, now)),
        }
        self.touch(now);
    }

    /// Replace the folder membership set.
    pub fn set_folders(&mut self, folders: Vec<Uuid>, now: Timestamp) {
        self.folders.set(folders, now);
        self.touch(now);
    }

    /// Whether this secret is filed under `folder_id`.
    pub fn in_folder(&self, folder_id: &Uuid) -> bool {
        self.folders.value.contains(folder_id)
    }

    /// Drop `folder_id` from the membership set. Returns whether it was there.
    pub fn remove_folder(&mut self, folder_id: &Uuid, now: Timestamp) -> bool {
        if !self.in_folder(folder_id) {
            return false;
        }
        let remaining = self
            .folders
            .value
            .iter()
            .filter(|id| *id != folder_id)
            .copied()
            .collect();
        self.set_folders(remaining, now);
        true
    }

    /// Raise the record-level `last_updated` to `now`.
    pub fn touch(&mut self, now: Timestamp) {
        self.last_updated = self.last_updated.max(now);
    }
}

/// A folder. Only the whole record carries timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    pub label: String,
    pub created: Timestamp,
    pub last_updated: Timestamp,
}

impl Folder {
    /// A new folder with a fresh id.
    pub fn new(label: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: Uuid::now_v7(),
            label: label.into(),
            created: now,
            last_updated: now,
        }
    }

    /// Rename, stamping the record.
    pub fn rename(&mut self, label: impl Into<String>, now: Timestamp) {
        self.label = label.into();
        self.last_updated = now.max(self.created);
    }
}
