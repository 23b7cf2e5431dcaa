use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// An append-only record of something a user did.
///
/// AI operations use an `ai_` prefixed `activity_type`, which is how
/// [`Analytics::ai_operations_count`] finds them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub note_id: Option<Uuid>,
    pub activity_type: String,
    pub description: Option<String>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewActivity {
    pub activity_type: String,
    pub description: Option<String>,
    pub note_id: Option<Uuid>,
    pub metadata: Map<String, Value>,
}

impl NewActivity {
    pub fn new(activity_type: impl Into<String>) -> Self {
        Self {
            activity_type: activity_type.into(),
            ..Default::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn note(mut self, note_id: Uuid) -> Self {
        self.note_id = Some(note_id);
        self
    }

    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitySummary {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineDay {
    /// `YYYY-MM-DD`, UTC.
    pub date: String,
    pub count: i64,
}

/// Dashboard numbers for one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analytics {
    pub total_notes: i64,
    pub notes_this_week: i64,
    pub total_files: i64,
    /// Active share links only.
    pub total_shared: i64,
    pub ai_operations_count: i64,
    /// Most recent first, at most ten.
    pub recent_activities: Vec<ActivitySummary>,
    pub notes_by_tag: BTreeMap<String, i64>,
    /// Oldest day first, seven entries ending today.
    pub activity_timeline: Vec<TimelineDay>,
}
