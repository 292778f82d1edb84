//! One-shot imports from other password managers.
//!
//! An importer turns a third-party export into [`Secret`]s and [`Folder`]s
//! whose property timestamps come from the export itself. The batch is then
//! handed to [`Vault::import`](crate::vault::Vault::import).

pub mod enpass;

use crate::model::{Folder, Secret};

/// Records produced by an importer, not yet part of any vault.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportBatch {
    pub secrets: Vec<Secret>,
    pub folders: Vec<Folder>,
}
