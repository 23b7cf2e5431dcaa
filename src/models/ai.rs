//! Request and response bodies for the AI endpoints.
//!
//! Option fields such as `mode`, `style` and `length` stay plain strings on the
//! wire; unknown values select the documented default rather than failing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::{ActionOptions, AiOutput, Category, ExtractedTask, Flashcard};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewriteRequest {
    pub text: String,
    #[serde(default)]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateNoteRequest {
    pub topic: String,
    #[serde(default)]
    pub length: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsRequest {
    pub text: String,
    #[serde(default)]
    pub max_tags: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub current_text: String,
    pub cursor_position: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskNotesRequest {
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardsRequest {
    pub note_id: Uuid,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSearchRequest {
    pub query: String,
}

/// Body for the unified dispatch endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub text: String,
    pub action: String,
    #[serde(flatten)]
    pub options: ActionOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatInput {
    pub text: String,
    #[serde(default)]
    pub context: Option<String>,
    /// Continue this session; a new one is started when absent.
    #[serde(default)]
    pub chat_id: Option<Uuid>,
}

// ============================================================
// Responses
// ============================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTextResponse {
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<Uuid>,
}

impl AiTextResponse {
    pub fn new(result: String) -> Self {
        Self {
            result,
            chat_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTextResponse {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowchartResponse {
    pub mermaid_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatResponse {
    pub formatted_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub category: Category,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_title: Option<String>,
    pub tasks: Vec<ExtractedTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedNote {
    pub id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedNotesResponse {
    pub related_notes: Vec<RelatedNote>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskNotesResponse {
    pub answer: String,
    pub notes_searched: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardsResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_title: Option<String>,
    pub flashcards: Vec<Flashcard>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBriefResponse {
    pub brief: String,
    pub recent_notes_count: usize,
    pub pending_tasks_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: Uuid,
    pub title: String,
    pub score: usize,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticSearchResponse {
    pub query: String,
    pub expanded_terms: Vec<String>,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResponse {
    pub action: String,
    pub result: AiOutput,
}
