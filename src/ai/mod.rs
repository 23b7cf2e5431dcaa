//! AI orchestration: prompt construction, one model call, best-effort parsing.
//!
//! [`Assistant`] is stateless apart from its [`ModelClient`]; every entry
//! point is an independent exchange with the configured provider.

pub mod client;
pub mod parse;
pub mod prompts;

use serde::{Deserialize, Serialize};

pub use client::{
    AiError, ChatMessage, ChatRequest, ChatTransport, HttpTransport, ModelClient, Provider,
    ProviderSettings, TransportError,
};
pub use parse::{ExtractedTask, Flashcard};
pub use prompts::{BriefTask, Category, NoteLength, RelatedCandidate, RewriteStyle, SummaryMode};

use prompts::Prompt;

pub const DEFAULT_MAX_TAGS: usize = 5;
pub const DEFAULT_FLASHCARD_COUNT: usize = 5;
pub const SEARCH_EXPANSION_TERMS: usize = 5;

/// A note produced from a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedNote {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown action: {0}")]
pub struct UnknownAction(pub String);

/// Every action reachable through the unified dispatch endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiAction {
    Summarize,
    Rewrite,
    Improve,
    Professional,
    Casual,
    Concise,
    Generate,
    Tags,
    Format,
    Category,
    Tasks,
}

impl AiAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Summarize => "summarize",
            Self::Rewrite => "rewrite",
            Self::Improve => "improve",
            Self::Professional => "professional",
            Self::Casual => "casual",
            Self::Concise => "concise",
            Self::Generate => "generate",
            Self::Tags => "tags",
            Self::Format => "format",
            Self::Category => "category",
            Self::Tasks => "tasks",
        }
    }
}

impl std::str::FromStr for AiAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize" => Ok(Self::Summarize),
            "rewrite" => Ok(Self::Rewrite),
            "improve" => Ok(Self::Improve),
            "professional" => Ok(Self::Professional),
            "casual" => Ok(Self::Casual),
            "concise" => Ok(Self::Concise),
            "generate" => Ok(Self::Generate),
            "tags" => Ok(Self::Tags),
            "format" => Ok(Self::Format),
            "category" => Ok(Self::Category),
            "tasks" => Ok(Self::Tasks),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Per-action options for [`Assistant::run_action`]. Unset fields use each action's default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionOptions {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub length: Option<String>,
    #[serde(default)]
    pub max_tags: Option<usize>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Result of a dispatched action, shaped by the action that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AiOutput {
    Text(String),
    Tags(Vec<String>),
    Note(GeneratedNote),
    Category(Category),
    Tasks(Vec<ExtractedTask>),
}

#[derive(Clone)]
pub struct Assistant {
    client: ModelClient,
}

impl Assistant {
    pub fn new(client: ModelClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ModelClient {
        &self.client
    }

    async fn run(&self, prompt: Prompt) -> Result<String, AiError> {
        self.client.complete(&prompt.system, &prompt.user).await
    }

    pub async fn summarize(
        &self,
        text: &str,
        mode: SummaryMode,
        context: Option<&str>,
    ) -> Result<String, AiError> {
        self.run(prompts::summarize(text, mode, context)).await
    }

    pub async fn rewrite(&self, text: &str, style: RewriteStyle) -> Result<String, AiError> {
        self.run(prompts::rewrite(text, style)).await
    }

    /// Generate a markdown note, then tag it with a second call.
    pub async fn generate_note(
        &self,
        topic: &str,
        length: NoteLength,
    ) -> Result<GeneratedNote, AiError> {
        let content = self.run(prompts::generate_note(topic, length)).await?;
        let title = parse::note_title(&content, topic);
        let tags = self.generate_tags(&content, DEFAULT_MAX_TAGS).await?;
        Ok(GeneratedNote {
            title,
            content,
            tags,
        })
    }

    pub async fn generate_tags(&self, text: &str, max_tags: usize) -> Result<Vec<String>, AiError> {
        let raw = self.run(prompts::tags(text, max_tags)).await?;
        Ok(parse::comma_list(&raw, max_tags))
    }

    pub async fn detect_category(&self, text: &str) -> Result<Category, AiError> {
        let raw = self.run(prompts::category(text)).await?;
        Ok(parse::category(&raw))
    }

    pub async fn auto_format(&self, text: &str) -> Result<String, AiError> {
        self.run(prompts::auto_format(text)).await
    }

    pub async fn extract_tasks(&self, text: &str) -> Result<Vec<ExtractedTask>, AiError> {
        let raw = self.run(prompts::extract_tasks(text)).await?;
        Ok(parse::tasks(&raw))
    }

    pub async fn generate_flashcards(
        &self,
        text: &str,
        count: usize,
    ) -> Result<Vec<Flashcard>, AiError> {
        let raw = self.run(prompts::flashcards(text, count)).await?;
        Ok(parse::flashcards(&raw))
    }

    /// Indices into `candidates` of at most three related notes.
    pub async fn find_related_notes(
        &self,
        current: &str,
        candidates: &[RelatedCandidate],
    ) -> Result<Vec<usize>, AiError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let raw = self.run(prompts::related_notes(current, candidates)).await?;
        Ok(parse::related_indices(&raw, candidates.len()))
    }

    /// One chat turn. The caller owns history storage.
    pub async fn chat(
        &self,
        text: &str,
        history: &[ChatMessage],
        context: Option<&str>,
    ) -> Result<String, AiError> {
        self.client
            .chat(prompts::chat_messages(text, history, context))
            .await
    }

    /// Continuation for the text before `cursor_position`; empty when there is too little context.
    pub async fn suggest(&self, current_text: &str, cursor_position: usize) -> Result<String, AiError> {
        match prompts::suggestion(current_text, cursor_position) {
            Some(prompt) => self.run(prompt).await,
            None => Ok(String::new()),
        }
    }

    pub async fn expand_search_query(&self, query: &str) -> Result<Vec<String>, AiError> {
        let raw = self.run(prompts::expand_search_query(query)).await?;
        Ok(parse::comma_list(&raw, SEARCH_EXPANSION_TERMS))
    }

    pub async fn daily_brief(
        &self,
        note_titles: &[String],
        tasks: &[BriefTask],
    ) -> Result<String, AiError> {
        self.run(prompts::daily_brief(note_titles, tasks)).await
    }

    pub async fn ask_notes(&self, question: &str, notes_context: &str) -> Result<String, AiError> {
        self.run(prompts::ask_notes(question, notes_context)).await
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, AiError> {
        self.run(prompts::generate_text(prompt)).await
    }

    pub async fn generate_flowchart(&self, prompt: &str) -> Result<String, AiError> {
        let raw = self.run(prompts::flowchart(prompt)).await?;
        Ok(parse::flowchart(&raw))
    }

    /// Dispatch one of the closed set of actions.
    pub async fn run_action(
        &self,
        action: AiAction,
        text: &str,
        options: &ActionOptions,
    ) -> Result<AiOutput, AiError> {
        let output = match action {
            AiAction::Summarize => AiOutput::Text(
                self.summarize(
                    text,
                    SummaryMode::from_option(options.mode.as_deref()),
                    options.context.as_deref(),
                )
                .await?,
            ),
            AiAction::Rewrite => AiOutput::Text(
                self.rewrite(text, RewriteStyle::from_option(options.style.as_deref()))
                    .await?,
            ),
            AiAction::Improve => AiOutput::Text(self.rewrite(text, RewriteStyle::Improve).await?),
            AiAction::Professional => {
                AiOutput::Text(self.rewrite(text, RewriteStyle::Professional).await?)
            }
            AiAction::Casual => AiOutput::Text(self.rewrite(text, RewriteStyle::Casual).await?),
            AiAction::Concise => AiOutput::Text(self.rewrite(text, RewriteStyle::Concise).await?),
            AiAction::Generate => AiOutput::Note(
                self.generate_note(text, NoteLength::from_option(options.length.as_deref()))
                    .await?,
            ),
            AiAction::Tags => AiOutput::Tags(
                self.generate_tags(text, options.max_tags.unwrap_or(DEFAULT_MAX_TAGS))
                    .await?,
            ),
            AiAction::Format => AiOutput::Text(self.auto_format(text).await?),
            AiAction::Category => AiOutput::Category(self.detect_category(text).await?),
            AiAction::Tasks => AiOutput::Tasks(self.extract_tasks(text).await?),
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_action_name_round_trips() {
        for name in [
            "summarize",
            "rewrite",
            "improve",
            "professional",
            "casual",
            "concise",
            "generate",
            "tags",
            "format",
            "category",
            "tasks",
        ] {
            let action: AiAction = name.parse().unwrap();
            assert_eq!(action.as_str(), name);
        }
    }

    #[test]
    fn unknown_action_fails_to_parse() {
        let err = "translate".parse::<AiAction>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown action: translate");
    }

    #[test]
    fn outputs_serialize_untagged() {
        let json = serde_json::to_value(AiOutput::Category(Category::Work)).unwrap();
        assert_eq!(json, serde_json::json!("work"));
        let json = serde_json::to_value(AiOutput::Tags(vec!["a".into()])).unwrap();
        assert_eq!(json, serde_json::json!(["a"]));
    }
}
