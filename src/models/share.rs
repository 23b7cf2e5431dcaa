use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::note::Note;

/// A public link to a note.
///
/// Links are never deleted by their owner, only deactivated, so view counts
/// survive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedLink {
    pub id: Uuid,
    pub note_id: Uuid,
    pub token: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the link requires a password to open.
    pub has_password: bool,
    pub view_count: i64,
    pub last_viewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateShareInput {
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SharedAccessInput {
    #[serde(default)]
    pub password: Option<String>,
}

/// Result of opening a shared link.
#[derive(Debug, Clone)]
pub enum SharedAccess {
    Granted(Box<Note>),
    /// Unknown token, deactivated link or expired link.
    Unavailable,
    WrongPassword,
}
