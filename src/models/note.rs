use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::file::FileAttachment;

pub const MAX_TITLE_LEN: usize = 500;
pub const MAX_SEARCH_LIMIT: i64 = 100;

/// A user's note.
///
/// `metadata` is a free-form JSON object. Two keys carry meaning: `category`
/// (written by enrichment) and `is_private` (excludes the note from
/// "ask my notes" context).
///
/// Notes move through a soft-delete lifecycle: trashing sets `is_deleted`,
/// restoring clears it, and only a permanent delete removes the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
    pub is_favorite: bool,
    pub is_archived: bool,
    pub is_hidden: bool,
    pub is_locked: bool,
    #[serde(skip)]
    pub lock_pin_hash: Option<String>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Starts at 1 and increases by one on every update.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Attachments; only populated when a single note is fetched.
    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

impl Note {
    pub fn category(&self) -> Option<&str> {
        self.metadata.get("category").and_then(Value::as_str)
    }

    pub fn is_private(&self) -> bool {
        self.metadata
            .get("is_private")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Title and body joined, as fed to similarity and search scoring.
    pub fn full_text(&self) -> String {
        format!("{} {}", self.title, self.content.as_deref().unwrap_or(""))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateNoteInput {
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Partial update. Omitted fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateNoteInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub is_archived: Option<bool>,
    #[serde(default)]
    pub is_hidden: Option<bool>,
}

/// Snapshot of a note taken before a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteVersion {
    pub id: Uuid,
    pub note_id: Uuid,
    pub version_number: i64,
    pub title: String,
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Query string for listing notes.
#[derive(Debug, Clone, Deserialize)]
pub struct NoteListQuery {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_list_limit")]
    pub limit: i64,
    /// Show archived notes instead of active ones.
    #[serde(default)]
    pub archived: bool,
}

impl Default for NoteListQuery {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_list_limit(),
            archived: false,
        }
    }
}

fn default_list_limit() -> i64 {
    100
}

/// Filters for note search. Every filter is optional and they combine with AND.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteSearch {
    #[serde(default)]
    pub query: Option<String>,
    /// Matches notes sharing at least one of these tags.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_favorite: Option<bool>,
    #[serde(default)]
    pub is_archived: Option<bool>,
    #[serde(default)]
    pub date_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_to: Option<DateTime<Utc>>,
    #[serde(default = "default_search_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

impl Default for NoteSearch {
    fn default() -> Self {
        Self {
            query: None,
            tags: None,
            is_favorite: None,
            is_archived: None,
            date_from: None,
            date_to: None,
            limit: default_search_limit(),
            offset: 0,
        }
    }
}

fn default_search_limit() -> i64 {
    50
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinInput {
    pub pin: String,
}

/// Result of a lock, unlock or hide toggle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyResponse {
    pub success: bool,
    pub message: String,
}

/// Outcome of a PIN-guarded state change, decided inside the database layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Done,
    NotFound,
    AlreadyLocked,
    NotLocked,
    WrongPin,
}
