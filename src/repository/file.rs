use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::NoteRepository;
use crate::error::StorageError;
use crate::model::{
    Folder, Note, NotePatch, Reminder, ReminderChange, Settings, Snapshot, now_millis,
    rank_matches,
};
use crate::storage::AtomicFile;

/// Durable store keeping the whole collection in one JSON document.
///
/// Every mutation is applied to a copy of the document, written atomically,
/// and only then becomes the new in-memory state.
pub struct FileRepository {
    file: AtomicFile,
    doc: Mutex<Snapshot>,
}

impl FileRepository {
    /// Opens the document at `path`, creating an empty one if missing.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let file = AtomicFile::new(path);

        let doc = if file.exists() {
            let bytes = file.read()?;
            let doc: Snapshot = serde_json::from_slice(&bytes)?;
            doc.validate().map_err(StorageError::InvalidSnapshot)?;
            debug!(path = %file.path().display(), folders = doc.folders.len(), notes = doc.notes.len(), "opened notes document");
            doc
        } else {
            let settings =
                Settings::generate().map_err(|e| StorageError::Backend(e.to_string()))?;
            let doc = Snapshot::empty(settings);
            persist(&file, &doc).await?;
            info!(path = %file.path().display(), "created notes document");
            doc
        };

        Ok(Self {
            file,
            doc: Mutex::new(doc),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Runs `change` against a copy of the document and commits it once the
    /// copy has been persisted.
    async fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Snapshot) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut doc = self.doc.lock().await;
        let mut next = doc.clone();
        let out = change(&mut next)?;
        persist(&self.file, &next).await?;
        *doc = next;
        Ok(out)
    }
}

async fn persist(file: &AtomicFile, doc: &Snapshot) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec_pretty(doc)?;
    let file = file.clone();
    tokio::task::spawn_blocking(move || file.write(&bytes))
        .await
        .map_err(|e| StorageError::Backend(format!("write task failed: {e}")))?
}

fn next_id(ids: impl Iterator<Item = i64>) -> Result<i64, StorageError> {
    ids.max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| StorageError::Backend("id space exhausted".into()))
}

/// Trimmed folder name, rejected if empty or already taken by a folder other
/// than `except`.
fn folder_name(doc: &Snapshot, name: &str, except: Option<i64>) -> Result<String, StorageError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(StorageError::InvalidFolderName);
    }
    if doc
        .folders
        .iter()
        .any(|f| f.name == name && Some(f.id) != except)
    {
        return Err(StorageError::DuplicateFolderName(name.to_string()));
    }
    Ok(name.to_string())
}

fn sync_reminder(
    doc: &mut Snapshot,
    note_id: i64,
    change: ReminderChange,
) -> Result<(), StorageError> {
    match change {
        ReminderChange::Keep => {}
        ReminderChange::Clear => doc.reminders.retain(|r| r.note_id != note_id),
        ReminderChange::Set(at) => {
            if let Some(reminder) = doc.reminders.iter_mut().find(|r| r.note_id == note_id) {
                reminder.remind_at = at;
                reminder.done = false;
            } else {
                let id = next_id(doc.reminders.iter().map(|r| r.id))?;
                doc.reminders.push(Reminder {
                    id,
                    note_id,
                    remind_at: at,
                    done: false,
                });
            }
        }
    }
    Ok(())
}

#[async_trait]
impl NoteRepository for FileRepository {
    async fn list_folders(&self) -> Result<Vec<Folder>, StorageError> {
        Ok(self.doc.lock().await.folders.clone())
    }

    async fn create_folder(&self, name: &str) -> Result<Folder, StorageError> {
        self.mutate(|doc| {
            let folder = Folder {
                id: next_id(doc.folders.iter().map(|f| f.id))?,
                name: folder_name(doc, name, None)?,
                created_at: now_millis(),
            };
            doc.folders.push(folder.clone());
            Ok(folder)
        })
        .await
    }

    async fn rename_folder(&self, id: i64, name: &str) -> Result<Folder, StorageError> {
        self.mutate(|doc| {
            if !doc.folders.iter().any(|f| f.id == id) {
                return Err(StorageError::FolderNotFound(id));
            }
            let name = folder_name(doc, name, Some(id))?;
            let folder = doc
                .folders
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or(StorageError::FolderNotFound(id))?;
            folder.name = name;
            debug!(folder = id, "folder renamed");
            Ok(folder.clone())
        })
        .await
    }

    async fn delete_folder(&self, id: i64) -> Result<(), StorageError> {
        self.mutate(|doc| {
            if !doc.folders.iter().any(|f| f.id == id) {
                return Err(StorageError::FolderNotFound(id));
            }
            doc.folders.retain(|f| f.id != id);

            let (gone, kept): (Vec<Note>, Vec<Note>) =
                std::mem::take(&mut doc.notes).into_iter().partition(|n| n.folder_id == id);
            doc.notes = kept;
            doc.reminders
                .retain(|r| !gone.iter().any(|n| n.id == r.note_id));

            debug!(folder = id, notes = gone.len(), "cascaded folder delete");
            Ok(())
        })
        .await
    }

    async fn list_notes(&self, folder_id: i64) -> Result<Vec<Note>, StorageError> {
        let doc = self.doc.lock().await;
        if !doc.folders.iter().any(|f| f.id == folder_id) {
            return Err(StorageError::FolderNotFound(folder_id));
        }
        Ok(doc
            .notes
            .iter()
            .filter(|n| n.folder_id == folder_id)
            .cloned()
            .collect())
    }

    async fn search_notes(&self, query: &str) -> Result<Vec<Note>, StorageError> {
        Ok(rank_matches(&self.doc.lock().await.notes, query))
    }

    async fn create_note(&self, folder_id: i64) -> Result<Note, StorageError> {
        self.mutate(|doc| {
            if !doc.folders.iter().any(|f| f.id == folder_id) {
                return Err(StorageError::FolderNotFound(folder_id));
            }
            let note = Note::new(next_id(doc.notes.iter().map(|n| n.id))?, folder_id, now_millis());
            doc.notes.push(note.clone());
            Ok(note)
        })
        .await
    }

    async fn update_note(&self, patch: &NotePatch) -> Result<Note, StorageError> {
        self.mutate(|doc| {
            if let Some(folder_id) = patch.folder_id {
                if !doc.folders.iter().any(|f| f.id == folder_id) {
                    return Err(StorageError::FolderNotFound(folder_id));
                }
            }

            let note = doc
                .notes
                .iter_mut()
                .find(|n| n.id == patch.id)
                .ok_or(StorageError::NoteNotFound(patch.id))?;
            patch.apply_to(note, now_millis());
            let note = note.clone();

            sync_reminder(doc, note.id, patch.remind_at)?;
            Ok(note)
        })
        .await
    }

    async fn delete_note(&self, id: i64) -> Result<(), StorageError> {
        self.mutate(|doc| {
            let before = doc.notes.len();
            doc.notes.retain(|n| n.id != id);
            if doc.notes.len() == before {
                return Err(StorageError::NoteNotFound(id));
            }
            doc.reminders.retain(|r| r.note_id != id);
            Ok(())
        })
        .await
    }

    async fn load_settings(&self) -> Result<Settings, StorageError> {
        Ok(self.doc.lock().await.settings.clone())
    }

    async fn save_settings(&self, settings: &Settings) -> Result<(), StorageError> {
        self.mutate(|doc| {
            doc.settings = settings.clone();
            Ok(())
        })
        .await
    }

    async fn dump_all(&self) -> Result<Snapshot, StorageError> {
        Ok(self.doc.lock().await.clone())
    }

    async fn restore_all(&self, snapshot: Snapshot) -> Result<(), StorageError> {
        snapshot.validate().map_err(StorageError::InvalidSnapshot)?;

        let mut doc = self.doc.lock().await;
        persist(&self.file, &snapshot).await?;
        info!(
            folders = snapshot.folders.len(),
            notes = snapshot.notes.len(),
            "restored notes document"
        );
        *doc = snapshot;
        Ok(())
    }
}
