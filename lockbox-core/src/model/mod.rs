//! Vault data model: field-level versioned secrets, folders and the
//! serialized file that is encrypted as one blob.

pub mod file;
pub mod property;
pub mod secret;

pub use file::{SecretFile, CURRENT_VERSION};
pub use property::{now_millis, Property, Timestamp};
pub use secret::{Folder, Secret, SecretField};
