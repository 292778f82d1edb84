//! Enpass JSON export

use crate::import::ImportBatch;
use crate::model::{Folder, Property, Secret, Timestamp};
use crate::{LockboxError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// Top level of an Enpass export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnpassExport {
    #[serde(default)]
    pub folders: Vec<EnpassFolder>,
    #[serde(default)]
    pub items: Vec<EnpassItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnpassFolder {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    /// Seconds since the epoch.
    #[serde(default)]
    pub updated_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnpassItem {
    pub uuid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub fields: Vec<EnpassField>,
    #[serde(default)]
    pub folders: Vec<String>,
    /// Seconds since the epoch.
    #[serde(default, rename = "createdAt")]
    pub created_at: i64,
    /// Seconds since the epoch.
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub trashed: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnpassField {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub value: String,
}

impl EnpassItem {
    /// Value of the first field of the given type, or `""`.
    fn field(&self, kind: &str) -> String {
        self.fields
            .iter()
            .find(|f| f.kind == kind)
            .map(|f| f.value.clone())
            .unwrap_or_default()
    }
}

/// Parse an export from JSON text.
pub fn parse(content: &str) -> Result<EnpassExport> {
    serde_json::from_str(content)
        .map_err(|e| LockboxError::Serialization(format!("Failed to parse Enpass export: {}", e)))
}

/// Read and convert an export file.
pub fn import_file(path: &Path) -> Result<ImportBatch> {
    let content = std::fs::read_to_string(path)?;
    let batch = convert(&parse(&content)?)?;
    info!(
        secrets = batch.secrets.len(),
        folders = batch.folders.len(),
        "Read Enpass export"
    );
    Ok(batch)
}

/// Convert a parsed export. Trashed items are left out.
pub fn convert(export: &EnpassExport) -> Result<ImportBatch> {
    let mut batch = ImportBatch::default();

    for item in &export.items {
        if item.trashed != 0 {
            debug!(uuid = %item.uuid, "Skipping trashed item");
            continue;
        }
        batch.secrets.push(convert_item(item)?);
    }

    for folder in &export.folders {
        let updated = seconds_to_millis(folder.updated_at);
        batch.folders.push(Folder {
            id: parse_id(&folder.uuid)?,
            label: folder.title.clone(),
            created: updated,
            last_updated: updated,
        });
    }

    Ok(batch)
}

fn convert_item(item: &EnpassItem) -> Result<Secret> {
    let created = seconds_to_millis(item.created_at);
    let updated = seconds_to_millis(item.updated_at).max(created);
    let prop = |value: String| Some(Property::with_times(value, created, updated));

    let url = item.field("url");
    let website = if url.trim().is_empty() {
        Vec::new()
    } else {
        vec![url]
    };

    let folders = item
        .folders
        .iter()
        .map(String::as_str)
        .map(parse_id)
        .collect::<Result<Vec<_>>>()?;

    Ok(Secret {
        id: parse_id(&item.uuid)?,
        label: Property::with_times(item.title.clone(), created, updated),
        username: prop(item.field("username")),
        email: prop(item.field("email")),
        password: prop(item.field("password")),
        website: Some(Property::with_times(website, created, updated)),
        phone: prop(item.field("phone")),
        notes: prop(item.note.clone()),
        mfa: prop(item.field("totp")),
        folders: Property::with_times(folders, created, updated),
        created,
        last_updated: updated,
    })
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| LockboxError::InvalidInput(format!("Invalid Enpass uuid: {}", raw)))
}

fn seconds_to_millis(seconds: i64) -> Timestamp {
    seconds.saturating_mul(1000)
}
