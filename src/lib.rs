mod crypto;
mod error;
mod format;
mod model;
mod reminder;
mod repository;
mod storage;
mod store;
mod vault;

pub use crate::crypto::{CipherSuite, KdfParams};
pub use crate::error::{StorageError, VaultError};
pub use crate::format::{MIN_ARCHIVE_LEN, VaultArchive};
pub use crate::model::{
    Folder, Geometry, Note, NotePatch, Reminder, ReminderChange, Settings, Snapshot,
};
pub use crate::reminder::{ReminderScheduler, schedule_upcoming};
pub use crate::repository::{FileRepository, NoteRepository};
pub use crate::store::NoteStore;
pub use crate::vault::{ImportSummary, Vault};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Location of the notes document in the platform data directory.
pub fn default_data_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "stickyvault")
        .context("could not determine platform directories")?;

    Ok(project_dirs.data_dir().join("notes.json"))
}
