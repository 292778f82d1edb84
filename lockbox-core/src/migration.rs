//! Schema migrations for the serialized vault.
//!
//! Older vault blobs carry shapes the current types cannot represent (plain
//! string fields, a scalar website, missing folder membership), so the
//! pipeline works on the untyped JSON document and only deserializes into
//! [`SecretFile`] once the document is at [`CURRENT_VERSION`].
//!
//! Each step backfills what its version introduced and leaves already
//! upgraded shapes alone, so re-running a step is harmless.

use crate::model::{now_millis, SecretFile, Timestamp, CURRENT_VERSION};
use crate::{LockboxError, Result};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while upgrading a vault document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationError {
    #[error("Vault document is not a JSON object")]
    NotAnObject,

    #[error("Vault document has no version tag")]
    MissingVersion,

    #[error("Unknown vault schema version: {0}")]
    UnknownVersion(String),
}

type StepFn = fn(&mut Map<String, Value>, Timestamp);

/// One entry of the migration table.
struct MigrationStep {
    from: &'static str,
    to: &'static str,
    name: &'static str,
    apply: StepFn,
}

/// Ordered upgrade path. Adding a schema version is one new entry here.
const MIGRATIONS: &[MigrationStep] = &[
    MigrationStep {
        from: "0.0.1",
        to: "0.0.2",
        name: "folders",
        apply: backfill_folders,
    },
    MigrationStep {
        from: "0.0.2",
        to: "0.0.3",
        name: "mfa",
        apply: backfill_mfa,
    },
    MigrationStep {
        from: "0.0.3",
        to: "0.0.4",
        name: "property-time",
        apply: wrap_properties,
    },
    MigrationStep {
        from: "0.0.4",
        to: "0.0.5",
        name: "website-array",
        apply: website_to_array,
    },
];

/// Scalar fields wrapped into properties by the 0.0.3 step.
const SCALAR_FIELDS: [&str; 7] = [
    "label", "username", "email", "password", "phone", "notes", "mfa",
];

/// Upgrade a raw vault document to the current schema version.
pub fn apply_migrations(doc: Value) -> std::result::Result<Value, MigrationError> {
    apply_migrations_at(doc, now_millis())
}

/// Same as [`apply_migrations`] with an explicit clock for backfilled timestamps.
pub fn apply_migrations_at(
    mut doc: Value,
    now: Timestamp,
) -> std::result::Result<Value, MigrationError> {
    let obj = doc.as_object_mut().ok_or(MigrationError::NotAnObject)?;
    let start = version_of(obj)?;

    loop {
        let version = version_of(obj)?;
        if version == CURRENT_VERSION {
            break;
        }

        let step = MIGRATIONS
            .iter()
            .find(|step| step.from == version)
            .ok_or_else(|| MigrationError::UnknownVersion(version.clone()))?;

        debug!(from = step.from, to = step.to, step = step.name, "Applying vault migration");
        (step.apply)(obj, now);
        obj.insert("version".to_string(), Value::String(step.to.to_string()));
    }

    if start != CURRENT_VERSION {
        info!(from = %start, to = CURRENT_VERSION, "Vault document upgraded");
    }

    Ok(doc)
}

/// Upgrade a raw document and deserialize it.
pub fn upgrade(doc: Value) -> Result<SecretFile> {
    let doc = apply_migrations(doc)?;
    serde_json::from_value(doc)
        .map_err(|e| LockboxError::Serialization(format!("Invalid vault document: {}", e)))
}

/// Bring a typed file whose version tag lags behind up to date.
pub fn upgrade_file(file: SecretFile) -> Result<SecretFile> {
    if file.is_current() {
        return Ok(file);
    }
    let doc = serde_json::to_value(&file)
        .map_err(|e| LockboxError::Serialization(e.to_string()))?;
    upgrade(doc)
}

fn version_of(obj: &Map<String, Value>) -> std::result::Result<String, MigrationError> {
    obj.get("version")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(MigrationError::MissingVersion)
}

fn property(value: Value, now: Timestamp) -> Value {
    json!({ "value": value, "created": now, "lastUpdated": now })
}

fn is_property(value: &Value) -> bool {
    value.as_object().is_some_and(|o| o.contains_key("value"))
}

fn is_missing(obj: &Map<String, Value>, key: &str) -> bool {
    obj.get(key).map_or(true, Value::is_null)
}

fn records_mut<'a>(
    obj: &'a mut Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    obj.get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|items| items.iter_mut())
        .filter_map(Value::as_object_mut)
}

fn website_list(raw: &str) -> Value {
    if raw.trim().is_empty() {
        json!([])
    } else {
        json!([raw])
    }
}

/// 0.0.1 -> 0.0.2: every secret gets an empty folder membership.
fn backfill_folders(doc: &mut Map<String, Value>, now: Timestamp) {
    for secret in records_mut(doc, "secrets") {
        if is_missing(secret, "folders") {
            secret.insert("folders".to_string(), property(json!([]), now));
        }
    }
}

/// 0.0.2 -> 0.0.3: every secret gets an mfa field.
fn backfill_mfa(doc: &mut Map<String, Value>, now: Timestamp) {
    for secret in records_mut(doc, "secrets") {
        if is_missing(secret, "mfa") {
            secret.insert("mfa".to_string(), property(json!(""), now));
        }
    }
}

/// 0.0.3 -> 0.0.4: scalar fields become properties with their own timestamps.
fn wrap_properties(doc: &mut Map<String, Value>, now: Timestamp) {
    for folder in records_mut(doc, "folders") {
        let created = folder
            .get("created")
            .and_then(Value::as_i64)
            .filter(|created| *created != 0)
            .or_else(|| folder.get("lastUpdated").and_then(Value::as_i64))
            .unwrap_or(now);
        folder.insert("created".to_string(), json!(created));
        if is_missing(folder, "lastUpdated") {
            folder.insert("lastUpdated".to_string(), json!(created));
        }
    }

    for secret in records_mut(doc, "secrets") {
        for field in SCALAR_FIELDS {
            let wrapped = match secret.get(field) {
                Some(value) if is_property(value) => continue,
                Some(Value::String(s)) => property(json!(s), now),
                _ => property(json!(""), now),
            };
            secret.insert(field.to_string(), wrapped);
        }

        let website = match secret.get("website") {
            Some(value) if is_property(value) => None,
            Some(Value::String(s)) => Some(property(website_list(s), now)),
            Some(Value::Array(items)) => Some(property(Value::Array(items.clone()), now)),
            _ => Some(property(json!([]), now)),
        };
        if let Some(website) = website {
            secret.insert("website".to_string(), website);
        }

        if let Some(folders) = secret.get("folders").filter(|v| v.is_array()).cloned() {
            secret.insert("folders".to_string(), property(folders, now));
        }

        for stamp in ["created", "lastUpdated"] {
            if is_missing(secret, stamp) {
                secret.insert(stamp.to_string(), json!(now));
            }
        }
    }
}

/// 0.0.4 -> 0.0.5: a website stored as a single string becomes a list.
fn website_to_array(doc: &mut Map<String, Value>, now: Timestamp) {
    for secret in records_mut(doc, "secrets") {
        let Some(website) = secret.get_mut("website") else {
            continue;
        };

        match website {
            Value::String(raw) => {
                let list = website_list(raw);
                *website = property(list, now);
            }
            Value::Object(prop) => {
                if let Some(Value::String(raw)) = prop.get("value") {
                    let list = website_list(raw);
                    prop.insert("value".to_string(), list);
                }
            }
            _ => {}
        }
    }
}
