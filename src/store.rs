use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StorageError;
use crate::model::{Folder, Note, NotePatch, Settings};
use crate::repository::NoteRepository;

/// In-memory view of the folders and of the notes in the current folder.
///
/// Every mutation goes to the repository first; the view changes only after
/// the repository call succeeded, so a failed call leaves it untouched.
pub struct NoteStore<R> {
    repo: R,
    folders: Vec<Folder>,
    notes: Vec<Note>,
    current_folder_id: Option<i64>,
    settings: Option<Settings>,
}

impl<R: NoteRepository> NoteStore<R> {
    /// Creates an empty view over `repo`. Call [`refresh`](Self::refresh) to
    /// load it.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            folders: Vec::new(),
            notes: Vec::new(),
            current_folder_id: None,
            settings: None,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn folders(&self) -> &[Folder] {
        &self.folders
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: i64) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn current_folder_id(&self) -> Option<i64> {
        self.current_folder_id
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    /// Reloads folders, settings and the notes of the current folder.
    ///
    /// The current folder is kept if it still exists, otherwise the first
    /// folder becomes current.
    pub async fn refresh(&mut self) -> Result<(), StorageError> {
        let folders = self.repo.list_folders().await?;
        let settings = self.repo.load_settings().await?;

        let current = self
            .current_folder_id
            .filter(|id| folders.iter().any(|f| f.id == *id))
            .or_else(|| folders.first().map(|f| f.id));

        let notes = match current {
            Some(id) => self.repo.list_notes(id).await?,
            None => Vec::new(),
        };

        debug!(folders = folders.len(), notes = notes.len(), current = ?current, "store refreshed");
        self.folders = folders;
        self.notes = notes;
        self.current_folder_id = current;
        self.settings = Some(settings);
        Ok(())
    }

    pub async fn add_folder(&mut self, name: &str) -> Result<Folder, StorageError> {
        let folder = self.repo.create_folder(name).await?;
        debug!(folder = folder.id, "folder added");
        self.folders.push(folder.clone());
        Ok(folder)
    }

    pub async fn rename_folder(&mut self, id: i64, name: &str) -> Result<Folder, StorageError> {
        let folder = self.repo.rename_folder(id, name).await?;
        debug!(folder = id, "folder renamed");
        if let Some(cached) = self.folders.iter_mut().find(|f| f.id == id) {
            *cached = folder.clone();
        }
        Ok(folder)
    }

    /// Removes the folder and every cached note that belonged to it.
    pub async fn remove_folder(&mut self, id: i64) -> Result<(), StorageError> {
        self.repo.delete_folder(id).await?;
        debug!(folder = id, "folder removed");

        self.folders.retain(|f| f.id != id);
        self.notes.retain(|n| n.folder_id != id);
        if self.current_folder_id == Some(id) {
            self.current_folder_id = None;
        }
        Ok(())
    }

    /// Creates a note in the current folder. Does nothing when no folder is
    /// selected.
    pub async fn add_note(&mut self) -> Result<Option<Note>, StorageError> {
        let Some(folder_id) = self.current_folder_id else {
            return Ok(None);
        };

        let note = self.repo.create_note(folder_id).await?;
        debug!(note = note.id, folder = folder_id, "note added");
        self.notes.push(note.clone());
        Ok(Some(note))
    }

    /// Applies a partial update. The repository returns the merged note with
    /// a fresh `updated_at`, which replaces the cached copy. A note moved to
    /// another folder leaves the view; one moved into the current folder
    /// joins it.
    pub async fn update_note(&mut self, patch: &NotePatch) -> Result<Note, StorageError> {
        let updated = self.repo.update_note(patch).await?;
        debug!(note = updated.id, "note updated");

        let in_view = Some(updated.folder_id) == self.current_folder_id;
        match self.notes.iter().position(|n| n.id == updated.id) {
            Some(i) if in_view => self.notes[i] = updated.clone(),
            Some(i) => {
                self.notes.remove(i);
            }
            None if in_view => self.notes.push(updated.clone()),
            None => {}
        }
        Ok(updated)
    }

    pub async fn remove_note(&mut self, id: i64) -> Result<(), StorageError> {
        self.repo.delete_note(id).await?;
        debug!(note = id, "note removed");
        self.notes.retain(|n| n.id != id);
        Ok(())
    }

    /// Makes `id` the current folder and loads its notes.
    pub async fn set_current_folder(&mut self, id: i64) -> Result<(), StorageError> {
        let notes = self.repo.list_notes(id).await?;
        self.current_folder_id = Some(id);
        self.notes = notes;
        Ok(())
    }

    pub async fn set_theme(&mut self, theme: &str) -> Result<(), StorageError> {
        let mut settings = match &self.settings {
            Some(s) => s.clone(),
            None => self.repo.load_settings().await?,
        };
        settings.theme = theme.to_string();

        self.repo.save_settings(&settings).await?;
        self.settings = Some(settings);
        Ok(())
    }

    /// Searches every folder, not only the one in view. The view is left
    /// as it is.
    pub async fn search(&self, query: &str) -> Result<Vec<Note>, StorageError> {
        self.repo.search_notes(query).await
    }

    /// Notes in view with a reminder after `now`, soonest first.
    pub fn upcoming_reminders(&self, now: DateTime<Utc>) -> Vec<&Note> {
        let mut notes: Vec<&Note> = self
            .notes
            .iter()
            .filter(|n| n.remind_at.is_some_and(|at| at > now))
            .collect();
        notes.sort_by_key(|n| n.remind_at);
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ReminderChange;
    use crate::repository::testing::FlakyRepository;
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    async fn store(dir: &tempfile::TempDir) -> NoteStore<FlakyRepository> {
        let mut store = NoteStore::new(FlakyRepository::open(dir).await);
        store.refresh().await.unwrap();
        store
    }

    #[tokio::test]
    async fn refresh_selects_first_folder() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        assert_eq!(store.current_folder_id(), None);
        assert!(store.settings().is_some());

        let first = store.add_folder("First").await.unwrap();
        store.add_folder("Second").await.unwrap();
        store.refresh().await.unwrap();

        assert_eq!(store.current_folder_id(), Some(first.id));
        assert_eq!(store.folders().len(), 2);
    }

    #[tokio::test]
    async fn refresh_keeps_existing_selection() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        store.add_folder("First").await.unwrap();
        let second = store.add_folder("Second").await.unwrap();

        store.set_current_folder(second.id).await.unwrap();
        store.refresh().await.unwrap();

        assert_eq!(store.current_folder_id(), Some(second.id));
    }

    #[tokio::test]
    async fn add_note_without_folder_is_noop() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;

        assert!(store.add_note().await.unwrap().is_none());
        assert!(store.notes().is_empty());
    }

    #[tokio::test]
    async fn add_note_goes_to_current_folder() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let folder = store.add_folder("Inbox").await.unwrap();
        store.set_current_folder(folder.id).await.unwrap();

        let note = store.add_note().await.unwrap().unwrap();

        assert_eq!(note.folder_id, folder.id);
        assert_eq!(store.notes(), &[note]);
    }

    #[tokio::test]
    async fn update_note_merges_and_stamps() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let folder = store.add_folder("Inbox").await.unwrap();
        store.set_current_folder(folder.id).await.unwrap();
        let note = store.add_note().await.unwrap().unwrap();

        let patch = NotePatch {
            title: Some("Call Ada".into()),
            pinned: Some(true),
            ..NotePatch::new(note.id)
        };
        let updated = store.update_note(&patch).await.unwrap();

        assert_eq!(updated.title, "Call Ada");
        assert!(updated.pinned);
        assert_eq!(updated.geometry, note.geometry);
        assert!(updated.updated_at >= note.updated_at);
        assert_eq!(store.note(note.id), Some(&updated));
    }

    #[tokio::test]
    async fn moving_note_out_of_folder_drops_it_from_view() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let here = store.add_folder("Here").await.unwrap();
        let there = store.add_folder("There").await.unwrap();
        store.set_current_folder(here.id).await.unwrap();
        let note = store.add_note().await.unwrap().unwrap();

        let patch = NotePatch {
            folder_id: Some(there.id),
            ..NotePatch::new(note.id)
        };
        store.update_note(&patch).await.unwrap();
        assert!(store.note(note.id).is_none());

        store.set_current_folder(there.id).await.unwrap();
        assert!(store.note(note.id).is_some());
    }

    #[tokio::test]
    async fn remove_folder_drops_its_notes() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let folder = store.add_folder("Doomed").await.unwrap();
        store.set_current_folder(folder.id).await.unwrap();
        store.add_note().await.unwrap();
        store.add_note().await.unwrap();

        store.remove_folder(folder.id).await.unwrap();

        assert!(store.notes().iter().all(|n| n.folder_id != folder.id));
        assert!(store.folders().is_empty());
        assert_eq!(store.current_folder_id(), None);
    }

    #[tokio::test]
    async fn remove_note_works() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let folder = store.add_folder("Inbox").await.unwrap();
        store.set_current_folder(folder.id).await.unwrap();
        let note = store.add_note().await.unwrap().unwrap();

        store.remove_note(note.id).await.unwrap();

        assert!(store.notes().is_empty());
        assert!(matches!(
            store.remove_note(note.id).await,
            Err(StorageError::NoteNotFound(_))
        ));
    }

    #[tokio::test]
    async fn failed_storage_call_leaves_view_untouched() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let folder = store.add_folder("Inbox").await.unwrap();
        store.set_current_folder(folder.id).await.unwrap();
        let note = store.add_note().await.unwrap().unwrap();
        let folders = store.folders().to_vec();
        let notes = store.notes().to_vec();

        store.repository().set_failing(true);

        assert!(store.add_folder("Other").await.is_err());
        assert!(store.remove_folder(folder.id).await.is_err());
        assert!(store.add_note().await.is_err());
        let patch = NotePatch {
            title: Some("never".into()),
            ..NotePatch::new(note.id)
        };
        assert!(store.update_note(&patch).await.is_err());
        assert!(store.remove_note(note.id).await.is_err());
        assert!(store.set_current_folder(folder.id).await.is_err());
        assert!(store.set_theme("midnight").await.is_err());

        assert_eq!(store.folders(), folders.as_slice());
        assert_eq!(store.notes(), notes.as_slice());
        assert_eq!(store.current_folder_id(), Some(folder.id));
        assert_eq!(store.settings().unwrap().theme, "parchment");
    }

    #[tokio::test]
    async fn set_current_folder_rejects_unknown_id() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;

        assert!(matches!(
            store.set_current_folder(5).await,
            Err(StorageError::FolderNotFound(5))
        ));
        assert_eq!(store.current_folder_id(), None);
    }

    #[tokio::test]
    async fn set_theme_persists() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;

        store.set_theme("midnight").await.unwrap();
        store.refresh().await.unwrap();

        assert_eq!(store.settings().unwrap().theme, "midnight");
    }

    #[tokio::test]
    async fn upcoming_reminders_are_sorted_and_future_only() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let folder = store.add_folder("Inbox").await.unwrap();
        store.set_current_folder(folder.id).await.unwrap();
        let now = Utc.timestamp_millis_opt(1_800_000_000_000).unwrap();

        for offset in [3, -1, 1] {
            let note = store.add_note().await.unwrap().unwrap();
            let patch = NotePatch {
                remind_at: ReminderChange::Set(now + Duration::hours(offset)),
                ..NotePatch::new(note.id)
            };
            store.update_note(&patch).await.unwrap();
        }
        store.add_note().await.unwrap();

        let upcoming: Vec<_> = store
            .upcoming_reminders(now)
            .iter()
            .map(|n| n.remind_at.unwrap())
            .collect();
        assert_eq!(upcoming, vec![now + Duration::hours(1), now + Duration::hours(3)]);
    }

    #[tokio::test]
    async fn rename_folder_updates_view_after_storage() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let folder = store.add_folder("Inbox").await.unwrap();
        store.add_folder("Archive").await.unwrap();

        assert!(store.rename_folder(folder.id, "Archive").await.is_err());
        assert_eq!(store.folders()[0].name, "Inbox");

        store.repository().set_failing(true);
        assert!(store.rename_folder(folder.id, "Today").await.is_err());
        assert_eq!(store.folders()[0].name, "Inbox");

        store.repository().set_failing(false);
        store.rename_folder(folder.id, "Today").await.unwrap();
        assert_eq!(store.folders()[0].name, "Today");
    }

    #[tokio::test]
    async fn search_leaves_view_alone() {
        let dir = tempdir().unwrap();
        let mut store = store(&dir).await;
        let here = store.add_folder("Here").await.unwrap();
        let there = store.add_folder("There").await.unwrap();
        store.set_current_folder(there.id).await.unwrap();
        let note = store.add_note().await.unwrap().unwrap();
        store
            .update_note(&NotePatch {
                title: Some("Passport renewal".into()),
                ..NotePatch::new(note.id)
            })
            .await
            .unwrap();
        store.set_current_folder(here.id).await.unwrap();

        let hits = store.search("passport").await.unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].folder_id, there.id);
        assert!(store.notes().is_empty());
        assert_eq!(store.current_folder_id(), Some(here.id));
    }
}
