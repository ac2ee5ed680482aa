//! Durable storage of folders, notes, reminders and settings.
//!
//! The in-memory [`NoteStore`](crate::NoteStore) and the vault importer talk
//! to durable storage only through [`NoteRepository`].

mod file;

pub use file::FileRepository;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::model::{Folder, Note, NotePatch, Settings, Snapshot};

#[async_trait]
pub trait NoteRepository: Send + Sync {
    async fn list_folders(&self) -> Result<Vec<Folder>, StorageError>;

    async fn create_folder(&self, name: &str) -> Result<Folder, StorageError>;

    /// Renames a folder. The trimmed name must be non-empty and not used by
    /// another folder.
    async fn rename_folder(&self, id: i64, name: &str) -> Result<Folder, StorageError>;

    /// Deletes the folder together with its notes and their reminders.
    async fn delete_folder(&self, id: i64) -> Result<(), StorageError>;

    async fn list_notes(&self, folder_id: i64) -> Result<Vec<Note>, StorageError>;

    async fn create_note(&self, folder_id: i64) -> Result<Note, StorageError>;

    /// Notes in any folder whose title or body contains `query`, ignoring
    /// case, best match first.
    async fn search_notes(&self, query: &str) -> Result<Vec<Note>, StorageError>;

    /// Merges the patch into the stored note and returns the result.
    async fn update_note(&self, patch: &NotePatch) -> Result<Note, StorageError>;

    async fn delete_note(&self, id: i64) -> Result<(), StorageError>;

    async fn load_settings(&self) -> Result<Settings, StorageError>;

    async fn save_settings(&self, settings: &Settings) -> Result<(), StorageError>;

    async fn dump_all(&self) -> Result<Snapshot, StorageError>;

    /// Replaces everything with `snapshot`. Either all of it is stored or
    /// nothing changes.
    async fn restore_all(&self, snapshot: Snapshot) -> Result<(), StorageError>;
}
