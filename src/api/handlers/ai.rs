use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use uuid::Uuid;

use super::{ai_error, internal_error, not_found, unknown_action};
use crate::ai::{
    self, prompts, AiAction, BriefTask, NoteLength, RelatedCandidate, RewriteStyle, SummaryMode,
    DEFAULT_FLASHCARD_COUNT, DEFAULT_MAX_TAGS,
};
use crate::api::{AppState, CurrentUser};
use crate::models::ai::*;
use crate::models::*;

/// Notes considered when looking for related notes.
const RELATED_POOL: i64 = 50;
/// Notes fetched for "ask my notes"; only the first `ASK_NOTES_CONTEXT` are quoted.
const ASK_NOTES_POOL: i64 = 30;
const ASK_NOTES_CONTEXT: usize = 20;
const NO_NOTES_ANSWER: &str = "You don't have any notes yet. Create some notes first!";
const BRIEF_WINDOW_DAYS: i64 = 7;
const BRIEF_NOTES: i64 = 10;
const BRIEF_TASK_SOURCES: usize = 5;
const SEMANTIC_POOL: i64 = 100;
const SEMANTIC_RESULTS: usize = 20;
const PREVIEW_CHARS: usize = 150;
/// Activity descriptions quote at most this much of the user's input.
const QUOTE_CHARS: usize = 50;
const CHAT_HISTORY_LIMIT: i64 = 50;

fn quote(text: &str) -> String {
    text.chars().take(QUOTE_CHARS).collect()
}

fn log_ai(
    state: &AppState,
    user: &User,
    activity: NewActivity,
) -> Result<(), (StatusCode, String)> {
    state
        .db
        .log_activity(user.id, activity)
        .map(|_| ())
        .map_err(internal_error)
}

fn live_notes(state: &AppState, user: &User, limit: i64) -> Result<Vec<Note>, (StatusCode, String)> {
    let query = NoteListQuery {
        limit,
        ..Default::default()
    };
    state.db.list_notes(user.id, &query).map_err(internal_error)
}

// ============================================================
// Text operations
// ============================================================

pub async fn summarize(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SummarizeRequest>,
) -> Result<Json<AiTextResponse>, (StatusCode, String)> {
    let mode = SummaryMode::from_option(req.mode.as_deref());
    let result = state
        .assistant
        .summarize(&req.text, mode, req.context.as_deref())
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_summarize").description("Used AI summarization"),
    )?;
    Ok(Json(AiTextResponse::new(result)))
}

pub async fn rewrite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<RewriteRequest>,
) -> Result<Json<AiTextResponse>, (StatusCode, String)> {
    let style = RewriteStyle::from_option(req.style.as_deref());
    let result = state
        .assistant
        .rewrite(&req.text, style)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_rewrite").description(format!("Used AI rewrite ({})", style.as_str())),
    )?;
    Ok(Json(AiTextResponse::new(result)))
}

pub async fn generate_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<GenerateNoteRequest>,
) -> Result<Json<ai::GeneratedNote>, (StatusCode, String)> {
    let length = NoteLength::from_option(req.length.as_deref());
    let note = state
        .assistant
        .generate_note(&req.topic, length)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_generate").description(format!("Generated note about: {}", req.topic)),
    )?;
    Ok(Json(note))
}

pub async fn generate_text(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<PromptRequest>,
) -> Result<Json<GeneratedTextResponse>, (StatusCode, String)> {
    let text = state
        .assistant
        .generate_text(&req.prompt)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_text_gen").description(format!("Generated text: {}", quote(&req.prompt))),
    )?;
    Ok(Json(GeneratedTextResponse { text }))
}

pub async fn generate_flowchart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<PromptRequest>,
) -> Result<Json<FlowchartResponse>, (StatusCode, String)> {
    let mermaid_code = state
        .assistant
        .generate_flowchart(&req.prompt)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_flowchart")
            .description(format!("Generated flowchart: {}", quote(&req.prompt))),
    )?;
    Ok(Json(FlowchartResponse { mermaid_code }))
}

pub async fn suggestions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SuggestionRequest>,
) -> Result<Json<AiTextResponse>, (StatusCode, String)> {
    let suggestion = state
        .assistant
        .suggest(&req.current_text, req.cursor_position)
        .await
        .map_err(ai_error)?;

    if !suggestion.is_empty() {
        log_ai(
            &state,
            &user,
            NewActivity::new("ai_suggestion").description("Used AI writing suggestions"),
        )?;
    }
    Ok(Json(AiTextResponse::new(suggestion)))
}

pub async fn generate_tags(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<TagsRequest>,
) -> Result<Json<TagsResponse>, (StatusCode, String)> {
    let tags = state
        .assistant
        .generate_tags(&req.text, req.max_tags.unwrap_or(DEFAULT_MAX_TAGS))
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_tags").description(format!("Generated {} tags", tags.len())),
    )?;
    Ok(Json(TagsResponse { tags }))
}

pub async fn auto_format(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<TextRequest>,
) -> Result<Json<FormatResponse>, (StatusCode, String)> {
    let formatted_text = state
        .assistant
        .auto_format(&req.text)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_format").description("Auto-formatted text"),
    )?;
    Ok(Json(FormatResponse { formatted_text }))
}

pub async fn detect_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<TextRequest>,
) -> Result<Json<CategoryResponse>, (StatusCode, String)> {
    let category = state
        .assistant
        .detect_category(&req.text)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_category")
            .description(format!("Detected category: {}", category.as_str())),
    )?;
    Ok(Json(CategoryResponse { category }))
}

pub async fn extract_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<TextRequest>,
) -> Result<Json<TasksResponse>, (StatusCode, String)> {
    let tasks = state
        .assistant
        .extract_tasks(&req.text)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_extract_tasks").description(format!("Extracted {} tasks", tasks.len())),
    )?;
    Ok(Json(TasksResponse {
        note_id: None,
        note_title: None,
        tasks,
    }))
}

/// Dispatch any of the named actions through one endpoint.
pub async fn run_action(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, (StatusCode, String)> {
    let action: AiAction = req.action.parse().map_err(unknown_action)?;
    let result = state
        .assistant
        .run_action(action, &req.text, &req.options)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_action")
            .description(format!("Ran AI action: {}", action.as_str()))
            .meta("action", action.as_str()),
    )?;
    Ok(Json(ActionResponse {
        action: action.as_str().to_string(),
        result,
    }))
}

// ============================================================
// Operations over stored notes
// ============================================================

pub async fn note_tasks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TasksResponse>, (StatusCode, String)> {
    let note = state
        .db
        .get_note(user.id, id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    let Some(content) = note.content.as_deref().filter(|c| !c.is_empty()) else {
        return Ok(Json(TasksResponse {
            note_id: None,
            note_title: None,
            tasks: Vec::new(),
        }));
    };

    let tasks = state
        .assistant
        .extract_tasks(content)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_extract_tasks")
            .description(format!("Extracted {} tasks", tasks.len()))
            .note(note.id),
    )?;
    Ok(Json(TasksResponse {
        note_id: Some(note.id),
        note_title: Some(note.title),
        tasks,
    }))
}

pub async fn related_notes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RelatedNotesResponse>, (StatusCode, String)> {
    let note = state
        .db
        .get_note(user.id, id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    let others: Vec<Note> = live_notes(&state, &user, RELATED_POOL)?
        .into_iter()
        .filter(|n| n.id != note.id)
        .collect();
    if others.is_empty() {
        return Ok(Json(RelatedNotesResponse {
            related_notes: Vec::new(),
        }));
    }

    let candidates: Vec<RelatedCandidate> = others
        .iter()
        .map(|n| RelatedCandidate {
            title: n.title.clone(),
            content: n.content.clone().unwrap_or_default(),
        })
        .collect();

    let indices = state
        .assistant
        .find_related_notes(&note.full_text(), &candidates)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_related")
            .description(format!("Found related notes for: {}", note.title))
            .note(note.id),
    )?;

    let related_notes = indices
        .into_iter()
        .map(|i| RelatedNote {
            id: others[i].id,
            title: others[i].title.clone(),
        })
        .collect();
    Ok(Json(RelatedNotesResponse { related_notes }))
}

pub async fn ask_notes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<AskNotesRequest>,
) -> Result<Json<AskNotesResponse>, (StatusCode, String)> {
    let notes: Vec<Note> = live_notes(&state, &user, ASK_NOTES_POOL)?
        .into_iter()
        .filter(|n| !n.is_private())
        .collect();

    if notes.is_empty() {
        return Ok(Json(AskNotesResponse {
            answer: NO_NOTES_ANSWER.to_string(),
            notes_searched: 0,
        }));
    }

    let notes_context = notes
        .iter()
        .take(ASK_NOTES_CONTEXT)
        .map(|n| prompts::ask_notes_block(&n.title, n.content.as_deref().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\n\n");

    let answer = state
        .assistant
        .ask_notes(&req.question, &notes_context)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_ask_notes").description(format!("Asked: {}", quote(&req.question))),
    )?;
    Ok(Json(AskNotesResponse {
        answer,
        notes_searched: notes.len(),
    }))
}

pub async fn flashcards(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<FlashcardsRequest>,
) -> Result<Json<FlashcardsResponse>, (StatusCode, String)> {
    let note = state
        .db
        .get_note(user.id, req.note_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    let Some(content) = note.content.as_deref().filter(|c| !c.is_empty()) else {
        return Ok(Json(FlashcardsResponse {
            note_title: None,
            flashcards: Vec::new(),
        }));
    };

    let flashcards = state
        .assistant
        .generate_flashcards(content, req.count.unwrap_or(DEFAULT_FLASHCARD_COUNT))
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_flashcards")
            .description(format!(
                "Generated {} flashcards from: {}",
                flashcards.len(),
                note.title
            ))
            .note(note.id),
    )?;
    Ok(Json(FlashcardsResponse {
        note_title: Some(note.title),
        flashcards,
    }))
}

pub async fn daily_brief(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DailyBriefResponse>, (StatusCode, String)> {
    let since = Utc::now() - Duration::days(BRIEF_WINDOW_DAYS);
    let recent = state
        .db
        .notes_updated_since(user.id, since, BRIEF_NOTES)
        .map_err(internal_error)?;

    let mut tasks = Vec::new();
    for note in recent.iter().take(BRIEF_TASK_SOURCES) {
        let Some(content) = note.content.as_deref().filter(|c| !c.is_empty()) else {
            continue;
        };
        match state.assistant.extract_tasks(content).await {
            Ok(found) => tasks.extend(found.into_iter().map(|t| BriefTask {
                task: t.task,
                deadline: t.deadline,
            })),
            Err(e) => tracing::warn!("Task extraction for brief failed on note {}: {}", note.id, e),
        }
    }

    let titles: Vec<String> = recent.iter().map(|n| n.title.clone()).collect();
    let brief = state
        .assistant
        .daily_brief(&titles, &tasks)
        .await
        .map_err(ai_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_daily_brief").description("Generated daily brief"),
    )?;
    Ok(Json(DailyBriefResponse {
        brief,
        recent_notes_count: recent.len(),
        pending_tasks_count: tasks.len(),
    }))
}

/// Keyword search widened with model-suggested terms. Earlier terms weigh more,
/// so the user's own query dominates the ranking.
pub async fn semantic_search(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<SemanticSearchRequest>,
) -> Result<Json<SemanticSearchResponse>, (StatusCode, String)> {
    let expanded_terms = state
        .assistant
        .expand_search_query(&req.query)
        .await
        .map_err(ai_error)?;

    let terms: Vec<String> = std::iter::once(req.query.as_str())
        .chain(expanded_terms.iter().map(String::as_str))
        .map(str::to_lowercase)
        .collect();

    let mut scored: Vec<(Note, usize)> = live_notes(&state, &user, SEMANTIC_POOL)?
        .into_iter()
        .filter_map(|note| {
            let text = note.full_text().to_lowercase();
            let score: usize = terms
                .iter()
                .enumerate()
                .filter(|(_, term)| text.contains(term.as_str()))
                .map(|(i, _)| terms.len() - i)
                .sum();
            (score > 0).then_some((note, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let results = scored
        .into_iter()
        .take(SEMANTIC_RESULTS)
        .map(|(note, score)| SearchHit {
            id: note.id,
            preview: note
                .content
                .as_deref()
                .unwrap_or("")
                .chars()
                .take(PREVIEW_CHARS)
                .collect(),
            title: note.title,
            score,
        })
        .collect();

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_semantic_search").description(format!("Semantic search: {}", req.query)),
    )?;
    Ok(Json(SemanticSearchResponse {
        query: req.query,
        expanded_terms,
        results,
    }))
}

// ============================================================
// Chat
// ============================================================

/// One chat turn. Without a `chat_id` a new session is started; the
/// response always names the session so the client can continue it.
pub async fn chat(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<ChatInput>,
) -> Result<Json<AiTextResponse>, (StatusCode, String)> {
    let session = match req.chat_id {
        Some(chat_id) => state
            .db
            .get_chat_session(user.id, chat_id)
            .map_err(internal_error)?
            .ok_or_else(|| not_found("Chat session"))?,
        None => state
            .db
            .create_chat_session(user.id)
            .map_err(internal_error)?,
    };

    let history: Vec<ai::ChatMessage> = state
        .db
        .get_chat_messages(session.id, CHAT_HISTORY_LIMIT)
        .map_err(internal_error)?
        .into_iter()
        .map(|m| ai::ChatMessage::new(m.role.as_str(), m.content))
        .collect();

    state
        .db
        .add_chat_message(session.id, ChatRole::User, &req.text)
        .map_err(internal_error)?;

    let result = state
        .assistant
        .chat(&req.text, &history, req.context.as_deref())
        .await
        .map_err(ai_error)?;

    state
        .db
        .add_chat_message(session.id, ChatRole::Assistant, &result)
        .map_err(internal_error)?;

    log_ai(
        &state,
        &user,
        NewActivity::new("ai_chat")
            .description("Used AI chat session")
            .meta("chat_id", session.id.to_string()),
    )?;
    Ok(Json(AiTextResponse {
        result,
        chat_id: Some(session.id),
    }))
}

pub async fn create_chat_session(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<(StatusCode, Json<ChatSession>), (StatusCode, String)> {
    state
        .db
        .create_chat_session(user.id)
        .map(|s| (StatusCode::CREATED, Json(s)))
        .map_err(internal_error)
}

pub async fn list_chat_sessions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ChatSessionQuery>,
) -> Result<Json<Vec<ChatSession>>, (StatusCode, String)> {
    state
        .db
        .list_chat_sessions(user.id, query.skip, query.limit)
        .map(Json)
        .map_err(internal_error)
}

pub async fn chat_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ChatMessage>>, (StatusCode, String)> {
    let session = state
        .db
        .get_chat_session(user.id, id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Chat session"))?;

    state
        .db
        .get_chat_messages(session.id, CHAT_HISTORY_LIMIT)
        .map(Json)
        .map_err(internal_error)
}
