//! Notes, folders, reminders and settings, plus the snapshot that carries
//! all of them in and out of a vault.
//!
//! Field names serialize in camelCase and timestamps as epoch milliseconds.

use std::collections::HashSet;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{SALT_LEN, generate_salt};
use crate::error::VaultError;

/// Current time at the millisecond precision timestamps are stored with.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: i64,
    pub name: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

/// On-screen placement of a sticky note.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            width: 280,
            height: 220,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub title: String,
    /// Note body. Plaintext today; reserved for per-note encryption.
    pub body_enc: String,
    pub folder_id: i64,
    pub pinned: bool,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub remind_at: Option<DateTime<Utc>>,
}

impl Note {
    /// Relevance of this note for a lowercase search term, or `None` if it
    /// does not match. Title hits outrank body hits.
    pub fn match_score(&self, needle: &str) -> Option<u8> {
        let title = self.title.to_lowercase();
        if title == needle {
            Some(4)
        } else if title.starts_with(needle) {
            Some(3)
        } else if title.contains(needle) {
            Some(2)
        } else if self.body_enc.to_lowercase().contains(needle) {
            Some(1)
        } else {
            None
        }
    }

    pub(crate) fn new(id: i64, folder_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: String::new(),
            body_enc: String::new(),
            folder_id,
            pinned: false,
            geometry: Geometry::default(),
            created_at: now,
            updated_at: now,
            remind_at: None,
        }
    }
}

/// Change to a note's reminder carried by a [`NotePatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReminderChange {
    #[default]
    Keep,
    Set(DateTime<Utc>),
    Clear,
}

/// Partial update of a note. Every field except `id` is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub id: i64,
    pub title: Option<String>,
    pub body_enc: Option<String>,
    pub folder_id: Option<i64>,
    pub pinned: Option<bool>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub remind_at: ReminderChange,
}

impl NotePatch {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    /// Merges the present fields into `note` and stamps `updated_at`.
    pub fn apply_to(&self, note: &mut Note, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            note.title = title.clone();
        }
        if let Some(body) = &self.body_enc {
            note.body_enc = body.clone();
        }
        if let Some(folder_id) = self.folder_id {
            note.folder_id = folder_id;
        }
        if let Some(pinned) = self.pinned {
            note.pinned = pinned;
        }
        if let Some(x) = self.x {
            note.geometry.x = x;
        }
        if let Some(y) = self.y {
            note.geometry.y = y;
        }
        if let Some(width) = self.width {
            note.geometry.width = width;
        }
        if let Some(height) = self.height {
            note.geometry.height = height;
        }
        match self.remind_at {
            ReminderChange::Keep => {}
            ReminderChange::Set(at) => note.remind_at = Some(at),
            ReminderChange::Clear => note.remind_at = None,
        }
        note.updated_at = now;
    }
}

/// Notes matching `query` case-insensitively, best match first. Ties go to
/// the most recently updated note. A blank query matches nothing.
pub fn rank_matches<'a>(notes: impl IntoIterator<Item = &'a Note>, query: &str) -> Vec<Note> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<(u8, &Note)> = notes
        .into_iter()
        .filter_map(|n| n.match_score(&needle).map(|score| (score, n)))
        .collect();
    hits.sort_by(|(sa, a), (sb, b)| {
        sb.cmp(sa)
            .then(b.updated_at.cmp(&a.updated_at))
            .then(a.id.cmp(&b.id))
    });
    hits.into_iter().map(|(_, n)| n.clone()).collect()
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: i64,
    pub note_id: i64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub remind_at: DateTime<Utc>,
    #[serde(default)]
    pub done: bool,
}

/// Application settings. Exactly one record exists.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub theme: String,
    pub font_size: u32,
    pub hotkey_binding: String,
    /// Base64 salt kept across sessions.
    pub salt: String,
}

impl Settings {
    pub const DEFAULT_THEME: &'static str = "parchment";

    /// Default settings with a freshly generated salt.
    pub fn generate() -> Result<Self, VaultError> {
        Ok(Self {
            theme: Self::DEFAULT_THEME.to_string(),
            font_size: 16,
            hotkey_binding: "Ctrl+Shift+Space".to_string(),
            salt: STANDARD.encode(generate_salt()?),
        })
    }

    pub fn salt_bytes(&self) -> Option<[u8; SALT_LEN]> {
        STANDARD.decode(&self.salt).ok()?.try_into().ok()
    }
}

/// Every folder, note, reminder and the settings at one instant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub folders: Vec<Folder>,
    pub notes: Vec<Note>,
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    pub settings: Settings,
}

impl Snapshot {
    pub fn empty(settings: Settings) -> Self {
        Self {
            folders: Vec::new(),
            notes: Vec::new(),
            reminders: Vec::new(),
            settings,
        }
    }

    /// Checks ids are unique and every reference resolves.
    pub fn validate(&self) -> Result<(), String> {
        let mut folder_ids = HashSet::new();
        for folder in &self.folders {
            if !folder_ids.insert(folder.id) {
                return Err(format!("duplicate folder id {}", folder.id));
            }
            if folder.name.trim().is_empty() {
                return Err(format!("folder {} has an empty name", folder.id));
            }
        }

        let mut note_ids = HashSet::new();
        for note in &self.notes {
            if !note_ids.insert(note.id) {
                return Err(format!("duplicate note id {}", note.id));
            }
            if !folder_ids.contains(&note.folder_id) {
                return Err(format!(
                    "note {} references missing folder {}",
                    note.id, note.folder_id
                ));
            }
        }

        let mut reminder_ids = HashSet::new();
        let mut reminded_notes = HashSet::new();
        for reminder in &self.reminders {
            if !reminder_ids.insert(reminder.id) {
                return Err(format!("duplicate reminder id {}", reminder.id));
            }
            if !reminded_notes.insert(reminder.note_id) {
                return Err(format!(
                    "note {} has more than one reminder",
                    reminder.note_id
                ));
            }
            if !note_ids.contains(&reminder.note_id) {
                return Err(format!(
                    "reminder {} references missing note {}",
                    reminder.id, reminder.note_id
                ));
            }
        }

        Ok(())
    }
}
