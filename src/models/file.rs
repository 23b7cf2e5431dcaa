use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A file attached to a note. The stored bytes are fetched separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileAttachment {
    pub id: Uuid,
    pub note_id: Uuid,
    /// Generated storage name.
    pub filename: String,
    /// Name as uploaded.
    pub original_filename: String,
    /// MIME type.
    pub file_type: String,
    pub file_size: i64,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

/// Raw bytes of an attachment, for download.
#[derive(Debug, Clone)]
pub struct FileDownload {
    pub original_filename: String,
    pub file_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUploadResponse {
    pub file_id: Uuid,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub message: String,
}

/// Attachment metadata plus any text extracted at upload time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContent {
    pub id: Uuid,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub extracted_text: Option<String>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl From<FileAttachment> for FileContent {
    fn from(file: FileAttachment) -> Self {
        Self {
            id: file.id,
            extracted_text: file
                .metadata
                .get("extracted_text")
                .and_then(Value::as_str)
                .map(str::to_string),
            filename: file.original_filename,
            file_type: file.file_type,
            file_size: file.file_size,
            metadata: file.metadata,
            created_at: file.created_at,
        }
    }
}
