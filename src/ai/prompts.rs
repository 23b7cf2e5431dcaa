//! Prompt templates for every orchestration action.
//!
//! Each builder is a pure function from caller input to a [`Prompt`]. Option
//! strings coming from requests are parsed into closed enums; an unrecognized
//! option selects that enum's `Default` variant.

use serde::{Deserialize, Serialize};

use super::client::ChatMessage;

/// Marker appended to any input cut down to its character budget.
pub const TRUNCATION_MARKER: &str = "... (truncated)";

/// Budget for free-text actions (summarize, rewrite, format, generation).
pub const GENERIC_BUDGET: usize = 100_000;
/// Budget applied before tagging.
pub const TAGGING_BUDGET: usize = 20_000;
/// Portion of the tagging input actually quoted in the prompt.
pub const TAGGING_EXCERPT: usize = 1_000;
pub const CATEGORY_BUDGET: usize = 5_000;
/// Budget for task and flashcard extraction.
pub const EXTRACTION_BUDGET: usize = 10_000;
pub const RELATED_CURRENT_BUDGET: usize = 500;
pub const RELATED_CANDIDATE_BUDGET: usize = 200;
/// Per-note body budget when building "ask my notes" context.
pub const ASK_NOTES_BUDGET: usize = 800;

/// Characters before the cursor considered for a completion suggestion.
pub const SUGGESTION_WINDOW: usize = 200;
/// Minimum non-blank window length before a suggestion is requested.
pub const SUGGESTION_MIN_CONTEXT: usize = 10;

const DEFAULT_SYSTEM: &str = "You are a helpful assistant.";

/// A system/user prompt pair ready to send to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Cut `text` to `max_chars` characters and append [`TRUNCATION_MARKER`].
///
/// Text at or under the budget is returned unchanged. Counting is by `char`,
/// so a multi-byte character is never split.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// First `max_chars` characters of `text`, without a marker.
fn prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

// ============================================================
// Options
// ============================================================

/// Summary flavours. Unknown names fall back to [`SummaryMode::Short`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMode {
    #[default]
    Short,
    Bullets,
    KeyTakeaways,
    Eli5,
    Detailed,
}

impl SummaryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Bullets => "bullets",
            Self::KeyTakeaways => "key_takeaways",
            Self::Eli5 => "eli5",
            Self::Detailed => "detailed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "short" => Some(Self::Short),
            "bullets" => Some(Self::Bullets),
            "key_takeaways" => Some(Self::KeyTakeaways),
            "eli5" => Some(Self::Eli5),
            "detailed" => Some(Self::Detailed),
            _ => None,
        }
    }

    /// Parse an optional request value, falling back to the default.
    pub fn from_option(s: Option<&str>) -> Self {
        s.and_then(Self::from_str).unwrap_or_default()
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::Short => "Write a concise 1-2 sentence summary.",
            Self::Bullets => "Summarize as 5 clear bullet points.",
            Self::KeyTakeaways => "List the 3-5 most important key takeaways.",
            Self::Eli5 => "Explain this simply, as if to someone with no background knowledge.",
            Self::Detailed => "Write a comprehensive summary covering all main points.",
        }
    }
}

/// Rewrite tones. Unknown names fall back to [`RewriteStyle::Improve`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewriteStyle {
    #[default]
    Improve,
    Professional,
    Casual,
    Concise,
}

impl RewriteStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Improve => "improve",
            Self::Professional => "professional",
            Self::Casual => "casual",
            Self::Concise => "concise",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "improve" => Some(Self::Improve),
            "professional" => Some(Self::Professional),
            "casual" => Some(Self::Casual),
            "concise" => Some(Self::Concise),
            _ => None,
        }
    }

    pub fn from_option(s: Option<&str>) -> Self {
        s.and_then(Self::from_str).unwrap_or_default()
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::Improve => "Improve the following text while maintaining its original meaning. Make it clearer and more engaging:",
            Self::Professional => "Rewrite the following text in a professional tone:",
            Self::Casual => "Rewrite the following text in a casual, friendly tone:",
            Self::Concise => "Make the following text more concise without losing important information:",
        }
    }
}

/// Target length of a generated note. Unknown names fall back to medium.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteLength {
    Short,
    #[default]
    Medium,
    Long,
}

impl NoteLength {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "short" => Some(Self::Short),
            "medium" => Some(Self::Medium),
            "long" => Some(Self::Long),
            _ => None,
        }
    }

    pub fn from_option(s: Option<&str>) -> Self {
        s.and_then(Self::from_str).unwrap_or_default()
    }

    fn instruction(&self) -> &'static str {
        match self {
            Self::Short => "about 3-5 paragraphs",
            Self::Medium => "about 7-10 paragraphs",
            Self::Long => "about 12-15 paragraphs",
        }
    }
}

/// The fixed set of note categories the classifier may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Work,
    Study,
    Personal,
    Ideas,
    Tasks,
    Finance,
    Health,
    Travel,
    #[default]
    Other,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Self::Work,
        Self::Study,
        Self::Personal,
        Self::Ideas,
        Self::Tasks,
        Self::Finance,
        Self::Health,
        Self::Travel,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Study => "study",
            Self::Personal => "personal",
            Self::Ideas => "ideas",
            Self::Tasks => "tasks",
            Self::Finance => "finance",
            Self::Health => "health",
            Self::Travel => "travel",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

// ============================================================
// Builders
// ============================================================

pub fn chat(context: Option<&str>) -> String {
    let mut system = String::from(
        "You are a helpful AI assistant for NoteAI Pro. You help users with their notes, organization, and information needs.",
    );
    if let Some(context) = context {
        system.push_str("\n\nContext about the current task or file:\n");
        system.push_str(context);
    }
    system
}

/// Assemble the full message list for a chat turn: system, prior history, new user turn.
pub fn chat_messages(text: &str, history: &[ChatMessage], context: Option<&str>) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(chat(context)));
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage::user(text));
    messages
}

pub fn summarize(text: &str, mode: SummaryMode, context: Option<&str>) -> Prompt {
    let safe_text = truncate(text, GENERIC_BUDGET);
    let mut user = format!("{}\n\nText to summarize:\n{}", mode.instruction(), safe_text);
    if let Some(context) = context {
        user = format!("Context: {}\n\n{}", context, user);
    }
    Prompt::new("You are an expert summarization assistant.", user)
}

pub fn rewrite(text: &str, style: RewriteStyle) -> Prompt {
    let safe_text = truncate(text, GENERIC_BUDGET);
    Prompt::new(
        "You are a skilled writing assistant that helps improve text quality.",
        format!("{}\n\n{}", style.instruction(), safe_text),
    )
}

pub fn generate_note(topic: &str, length: NoteLength) -> Prompt {
    let user = format!(
        "Generate a comprehensive note about: {topic}

Write {}.

Please structure the note with:
1. A clear, descriptive title
2. Well-organized content with headers and bullet points
3. Key takeaways or summary at the end

Format the response as markdown.",
        length.instruction()
    );
    Prompt::new(
        "You are a knowledgeable assistant that creates well-structured, informative notes.",
        user,
    )
}

pub fn tags(text: &str, max_tags: usize) -> Prompt {
    let safe_text = truncate(text, TAGGING_BUDGET);
    let user = format!(
        "Analyze the following text and generate {max_tags} relevant, concise tags (single words or short phrases).
Return only the tags as a comma-separated list, nothing else.

Text:
{}",
        prefix(&safe_text, TAGGING_EXCERPT)
    );
    Prompt::new(
        "You are a content analysis assistant that generates relevant tags.",
        user,
    )
}

pub fn suggestion(current_text: &str, cursor_position: usize) -> Option<Prompt> {
    let chars: Vec<char> = current_text.chars().collect();
    let end = cursor_position.min(chars.len());
    let start = end.saturating_sub(SUGGESTION_WINDOW);
    let context: String = chars[start..end].iter().collect();

    if context.trim().chars().count() < SUGGESTION_MIN_CONTEXT {
        return None;
    }

    Some(Prompt::new(
        "You are a writing assistant providing brief, contextual suggestions.",
        format!(
            "Given this text context, suggest a brief, natural continuation (1-2 sentences max):\n\n{context}"
        ),
    ))
}

pub fn category(text: &str) -> Prompt {
    let safe_text = truncate(text, CATEGORY_BUDGET);
    let names: Vec<&str> = Category::ALL.iter().map(Category::as_str).collect();
    let user = format!(
        "Analyze the following note and assign ONE category from this list:
[{}]

Return ONLY the category name in lowercase, nothing else.

Note:
{safe_text}",
        names.join(", ")
    );
    Prompt::new(
        "You are a text classification expert. Respond with only one word.",
        user,
    )
}

pub fn auto_format(text: &str) -> Prompt {
    let safe_text = truncate(text, GENERIC_BUDGET);
    let user = format!(
        "Clean and format the following messy text into well-structured markdown. Apply these rules:
1. Create clear headings using #, ##, ### where appropriate.
2. Convert any lists to properly formatted bullet points or numbered lists.
3. Format any tasks or to-do items as markdown checkboxes: - [ ] task
4. Add proper paragraph breaks for readability.
5. Preserve ALL original information - do not remove or summarize anything.
6. If there are dates, times, or deadlines, make them stand out.

Text to format:
{safe_text}"
    );
    Prompt::new(
        "You are a professional document formatter. Return clean, readable markdown.",
        user,
    )
}

pub fn extract_tasks(text: &str) -> Prompt {
    let safe_text = truncate(text, EXTRACTION_BUDGET);
    let user = format!(
        r#"Extract ALL tasks, to-do items, action items, and deadlines from the following text.

Return as a valid JSON array with objects containing:
- "task": the task description
- "deadline": the deadline if mentioned (or null if none)
- "priority": "high", "medium", or "low" based on urgency indicators

Example output:
[{{"task": "Submit project report", "deadline": "Friday 5pm", "priority": "high"}}, {{"task": "Buy groceries", "deadline": null, "priority": "low"}}]

If no tasks are found, return an empty array: []

Text:
{safe_text}"#
    );
    Prompt::new(
        "You are a task extraction expert. Return valid JSON only.",
        user,
    )
}

/// A candidate note offered to the related-notes ranking.
#[derive(Debug, Clone)]
pub struct RelatedCandidate {
    pub title: String,
    pub content: String,
}

pub fn related_notes(current: &str, candidates: &[RelatedCandidate]) -> Prompt {
    let current_summary = truncate(current, RELATED_CURRENT_BUDGET);
    let notes_list = candidates
        .iter()
        .enumerate()
        .map(|(i, n)| {
            format!(
                "{i}: {}",
                truncate(&format!("{} {}", n.title, n.content), RELATED_CANDIDATE_BUDGET)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let user = format!(
        r#"Given the current note and a list of other notes, identify the 3 most semantically related notes.

CURRENT NOTE:
{current_summary}

OTHER NOTES (numbered):
{notes_list}

Return ONLY the indices of the 3 most related notes as comma-separated numbers (e.g., "2, 5, 1").
If fewer than 3 are related, return only those that are relevant.
If none are related, return "none"."#
    );
    Prompt::new("You are a semantic similarity expert.", user)
}

pub fn expand_search_query(query: &str) -> Prompt {
    let user = format!(
        r#"Given the search query "{query}", generate 5 related keywords or phrases that someone might also be looking for.

Return ONLY a comma-separated list of terms, nothing else.
Example: for "python", you might return "programming, coding, script, automation, development"."#
    );
    Prompt::new("You are a search query expansion expert.", user)
}

pub fn flashcards(text: &str, count: usize) -> Prompt {
    let safe_text = truncate(text, EXTRACTION_BUDGET);
    let user = format!(
        r#"Create {count} flashcards from the following study material.
Each flashcard should test understanding of a key concept.

Return as a valid JSON array with objects containing "question" and "answer".
Example: [{{"question": "What is photosynthesis?", "answer": "The process by which plants convert sunlight into energy."}}]

Material:
{safe_text}"#
    );
    Prompt::new(
        "You are an educational content creator. Return valid JSON only.",
        user,
    )
}

/// A pending task line for the daily brief.
#[derive(Debug, Clone)]
pub struct BriefTask {
    pub task: String,
    pub deadline: Option<String>,
}

pub fn daily_brief(note_titles: &[String], tasks: &[BriefTask]) -> Prompt {
    let notes_summary = note_titles
        .iter()
        .take(10)
        .map(|t| format!("- {t}"))
        .collect::<Vec<_>>()
        .join("\n");
    let tasks_summary = tasks
        .iter()
        .take(10)
        .map(|t| {
            format!(
                "- {} (Due: {})",
                t.task,
                t.deadline.as_deref().unwrap_or("No deadline")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let notes_summary = if notes_summary.is_empty() {
        "No recent notes".to_string()
    } else {
        notes_summary
    };
    let tasks_summary = if tasks_summary.is_empty() {
        "No pending tasks".to_string()
    } else {
        tasks_summary
    };

    let user = format!(
        "Create a friendly, concise daily brief for the user. Include:
1. A warm greeting
2. Summary of their recent activity
3. Key priorities for today
4. Any upcoming deadlines to watch

RECENT NOTES:
{notes_summary}

PENDING TASKS:
{tasks_summary}

Keep it brief and motivating!"
    );
    Prompt::new("You are a helpful personal productivity assistant.", user)
}

/// Render one note as a block of "ask my notes" context.
pub fn ask_notes_block(title: &str, content: &str) -> String {
    format!("=== Note: {title} ===\n{}", truncate(content, ASK_NOTES_BUDGET))
}

pub fn ask_notes(question: &str, notes_context: &str) -> Prompt {
    let system = r#"You are an AI assistant that answers questions ONLY based on the user's notes provided below.
If the answer cannot be found in the notes, clearly say "I couldn't find information about this in your notes."
Do not make up information. Cite which note the information comes from when possible."#;
    let user = format!(
        "USER'S NOTES:
{notes_context}

USER'S QUESTION:
{question}

Answer based only on the notes above:"
    );
    Prompt::new(system, user)
}

pub fn generate_text(prompt: &str) -> Prompt {
    Prompt::new(
        DEFAULT_SYSTEM,
        format!(
            "Generate content based on this prompt: {}",
            truncate(prompt, GENERIC_BUDGET)
        ),
    )
}

pub fn flowchart(prompt: &str) -> Prompt {
    let user = format!(
        "Generate a Mermaid.js flowchart diagram for: {}

Return ONLY the Mermaid code without any markdown code fences or explanations.
Start directly with 'flowchart' or 'graph'.

Example format:
flowchart TD
    A[Start] --> B[Process]
    B --> C[Decision]
    C -->|Yes| D[Action]
    C -->|No| E[End]",
        truncate(prompt, GENERIC_BUDGET)
    );
    Prompt::new(DEFAULT_SYSTEM, user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_text_untouched() {
        assert_eq!(truncate("hello", 5), "hello");
        assert_eq!(truncate("", 0), "");
    }

    #[test]
    fn truncate_appends_marker_past_budget() {
        let out = truncate("abcdefghij", 4);
        assert_eq!(out, "abcd... (truncated)");
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        let text = "ééééé";
        assert_eq!(truncate(text, 5), text);
        assert_eq!(truncate(text, 2), "éé... (truncated)");
    }

    #[test]
    fn truncate_holds_for_every_budget() {
        let text: String = "xyz".repeat(40);
        for budget in 0..=text.len() + 2 {
            let out = truncate(&text, budget);
            if text.chars().count() > budget {
                assert!(out.ends_with(TRUNCATION_MARKER));
                assert_eq!(&out[..budget], &text[..budget]);
                assert_eq!(out.len(), budget + TRUNCATION_MARKER.len());
            } else {
                assert_eq!(out, text);
            }
        }
    }

    #[test]
    fn unknown_summary_mode_matches_short() {
        let bogus = summarize("text", SummaryMode::from_option(Some("bogus")), None);
        let short = summarize("text", SummaryMode::Short, None);
        assert_eq!(bogus, short);
        assert!(short.user.starts_with("Write a concise 1-2 sentence summary."));
    }

    #[test]
    fn unknown_rewrite_style_matches_improve() {
        let bogus = rewrite("text", RewriteStyle::from_option(Some("shouty")));
        let improve = rewrite("text", RewriteStyle::Improve);
        assert_eq!(bogus, improve);
    }

    #[test]
    fn missing_length_defaults_to_medium() {
        assert_eq!(NoteLength::from_option(None), NoteLength::Medium);
        assert!(generate_note("rust", NoteLength::from_option(Some("epic")))
            .user
            .contains("about 7-10 paragraphs"));
    }

    #[test]
    fn summarize_prefixes_context() {
        let p = summarize("body", SummaryMode::Bullets, Some("meeting notes"));
        assert!(p.user.starts_with("Context: meeting notes\n\nSummarize as 5 clear bullet points."));
    }

    #[test]
    fn tagging_quotes_only_the_excerpt() {
        let text = "a".repeat(5_000);
        let p = tags(&text, 5);
        let quoted = p.user.rsplit("Text:\n").next().unwrap();
        assert_eq!(quoted.len(), TAGGING_EXCERPT);
        assert!(p.user.contains("generate 5 relevant"));
    }

    #[test]
    fn category_prompt_lists_every_category() {
        let p = category("note");
        for c in Category::ALL {
            assert!(p.user.contains(c.as_str()));
        }
    }

    #[test]
    fn suggestion_requires_enough_context() {
        assert!(suggestion("short", 5).is_none());
        assert!(suggestion("          x", 11).is_none());
        let p = suggestion("The meeting is scheduled for", 28).unwrap();
        assert!(p.user.ends_with("The meeting is scheduled for"));
    }

    #[test]
    fn suggestion_uses_window_before_cursor() {
        let text = format!("{}{}", "a".repeat(300), "tail");
        let p = suggestion(&text, 300).unwrap();
        let context = p.user.rsplit("\n\n").next().unwrap();
        assert_eq!(context, "a".repeat(SUGGESTION_WINDOW));
    }

    #[test]
    fn related_prompt_numbers_candidates() {
        let candidates = vec![
            RelatedCandidate { title: "Rust".into(), content: "ownership".into() },
            RelatedCandidate { title: "Go".into(), content: "goroutines".into() },
        ];
        let p = related_notes("current", &candidates);
        assert!(p.user.contains("0: Rust ownership"));
        assert!(p.user.contains("1: Go goroutines"));
    }

    #[test]
    fn daily_brief_handles_empty_inputs() {
        let p = daily_brief(&[], &[]);
        assert!(p.user.contains("No recent notes"));
        assert!(p.user.contains("No pending tasks"));
    }

    #[test]
    fn daily_brief_lists_deadlines() {
        let tasks = vec![
            BriefTask { task: "Pay rent".into(), deadline: Some("Friday".into()) },
            BriefTask { task: "Call mom".into(), deadline: None },
        ];
        let p = daily_brief(&["Budget".to_string()], &tasks);
        assert!(p.user.contains("- Budget"));
        assert!(p.user.contains("- Pay rent (Due: Friday)"));
        assert!(p.user.contains("- Call mom (Due: No deadline)"));
    }

    #[test]
    fn chat_messages_keep_history_order() {
        let history = vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")];
        let messages = chat_messages("next", &history, Some("file.txt"));
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert!(messages[0].content.contains("Context about the current task or file:\nfile.txt"));
        assert_eq!(messages[3].content, "next");
    }
}
