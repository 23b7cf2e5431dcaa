use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{bad_request, internal_error, not_found};
use crate::ai::DEFAULT_MAX_TAGS;
use crate::api::{AppState, CurrentUser};
use crate::auth;
use crate::config::{RecategorizePolicy, RetagPolicy};
use crate::models::*;

fn validate_title(title: &str) -> Result<(), (StatusCode, String)> {
    let len = title.chars().count();
    if len == 0 || len > MAX_TITLE_LEN {
        return Err(bad_request(format!(
            "Title must be between 1 and {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

// ============================================================
// Enrichment
// ============================================================

/// Best-effort AI tagging and categorization. Failures are logged and the
/// note is returned as it was.
async fn enrich(state: &AppState, mut note: Note, retag: bool, recategorize: bool) -> Note {
    let Some(content) = note.content.clone().filter(|c| !c.trim().is_empty()) else {
        return note;
    };
    if !(retag || recategorize) {
        return note;
    }
    if !state.assistant.client().is_configured() {
        tracing::debug!("Skipping enrichment for note {}: no AI provider", note.id);
        return note;
    }

    let mut tags = None;
    if retag {
        match state.assistant.generate_tags(&content, DEFAULT_MAX_TAGS).await {
            Ok(generated) => tags = Some(generated),
            Err(e) => tracing::warn!("Auto-tagging failed for note {}: {}", note.id, e),
        }
    }

    let mut category = None;
    if recategorize {
        match state.assistant.detect_category(&content).await {
            Ok(detected) => category = Some(detected),
            Err(e) => tracing::warn!("Category detection failed for note {}: {}", note.id, e),
        }
    }

    if tags.is_none() && category.is_none() {
        return note;
    }

    match state.db.apply_enrichment(
        note.user_id,
        note.id,
        tags.clone(),
        category.map(|c| c.as_str()),
    ) {
        Ok(Some(enriched)) => note = enriched,
        Ok(None) => return note,
        Err(e) => {
            tracing::warn!("Failed to store enrichment for note {}: {}", note.id, e);
            return note;
        }
    }

    let mut activities = Vec::new();
    if tags.is_some() {
        activities.push(
            NewActivity::new("ai_auto_tag")
                .description(format!("Auto-generated tags for: {}", note.title))
                .note(note.id),
        );
    }
    if let Some(category) = category {
        activities.push(
            NewActivity::new("ai_auto_category")
                .description(format!("Auto-detected category: {}", category.as_str()))
                .note(note.id),
        );
    }
    for activity in activities {
        if let Err(e) = state.db.log_activity(note.user_id, activity) {
            tracing::warn!("Failed to log enrichment activity: {}", e);
        }
    }

    note
}

// ============================================================
// Notes
// ============================================================

pub async fn list_notes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<NoteListQuery>,
) -> Result<Json<Vec<Note>>, (StatusCode, String)> {
    state
        .db
        .list_notes(user.id, &query)
        .map(Json)
        .map_err(internal_error)
}

pub async fn create_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<CreateNoteInput>,
) -> Result<(StatusCode, Json<Note>), (StatusCode, String)> {
    validate_title(&input.title)?;

    let note = state.db.create_note(user.id, input).map_err(internal_error)?;
    state
        .db
        .log_activity(
            user.id,
            NewActivity::new("note_created")
                .description(format!("Created note: {}", note.title))
                .note(note.id),
        )
        .map_err(internal_error)?;

    let note = if state.settings.enrichment.auto_enrich_on_create {
        let retag = note.tags.is_empty();
        let recategorize = note.category().is_none();
        enrich(&state, note, retag, recategorize).await
    } else {
        note
    };

    Ok((StatusCode::CREATED, Json(note)))
}

pub async fn get_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, (StatusCode, String)> {
    let note = state
        .db
        .get_note_with_files(user.id, id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    state
        .db
        .log_activity(
            user.id,
            NewActivity::new("note_viewed")
                .description(format!("Viewed note: {}", note.title))
                .note(note.id),
        )
        .map_err(internal_error)?;

    Ok(Json(note))
}

pub async fn update_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateNoteInput>,
) -> Result<Json<Note>, (StatusCode, String)> {
    if let Some(title) = &input.title {
        validate_title(title)?;
    }
    let content_changed = input.content.as_deref().is_some_and(|c| !c.is_empty());

    let note = state
        .db
        .update_note(user.id, id, input)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    state
        .db
        .log_activity(
            user.id,
            NewActivity::new("note_updated")
                .description(format!("Updated note: {}", note.title))
                .note(note.id),
        )
        .map_err(internal_error)?;

    if !content_changed {
        return Ok(Json(note));
    }

    let policy = state.settings.enrichment;
    let retag = match policy.retag_on_update {
        RetagPolicy::Never => false,
        RetagPolicy::WhenEmpty => note.tags.is_empty(),
        RetagPolicy::Always => true,
    };
    let recategorize = match policy.recategorize_on_update {
        RecategorizePolicy::Never => false,
        RecategorizePolicy::WhenMissing => note.category().is_none(),
        RecategorizePolicy::Always => true,
    };

    Ok(Json(enrich(&state, note, retag, recategorize).await))
}

pub async fn delete_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let note = state
        .db
        .get_note(user.id, id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    if !state.db.delete_note(user.id, id).map_err(internal_error)? {
        return Err(not_found("Note"));
    }

    state
        .db
        .log_activity(
            user.id,
            NewActivity::new("note_deleted").description(format!("Deleted note: {}", note.title)),
        )
        .map_err(internal_error)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn archive_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, (StatusCode, String)> {
    state
        .db
        .set_archived(user.id, id, true)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

pub async fn unarchive_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, (StatusCode, String)> {
    state
        .db
        .set_archived(user.id, id, false)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

pub async fn search_notes(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(search): Json<NoteSearch>,
) -> Result<Json<Vec<Note>>, (StatusCode, String)> {
    if !(1..=MAX_SEARCH_LIMIT).contains(&search.limit) {
        return Err(bad_request(format!(
            "limit must be between 1 and {MAX_SEARCH_LIMIT}"
        )));
    }
    if search.offset < 0 {
        return Err(bad_request("offset must not be negative"));
    }

    state
        .db
        .search_notes(user.id, &search)
        .map(Json)
        .map_err(internal_error)
}

pub async fn list_versions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<NoteVersion>>, (StatusCode, String)> {
    state
        .db
        .get_note_versions(user.id, id)
        .map_err(internal_error)?
        .map(Json)
        .ok_or_else(|| not_found("Note"))
}

// ============================================================
// Privacy
// ============================================================

fn privacy_ok(message: &str) -> Json<PrivacyResponse> {
    Json(PrivacyResponse {
        success: true,
        message: message.to_string(),
    })
}

pub async fn lock_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<PinInput>,
) -> Result<Json<PrivacyResponse>, (StatusCode, String)> {
    if !auth::is_valid_pin(&input.pin) {
        return Err(bad_request("PIN must be 4 to 6 digits"));
    }
    let pin_hash = auth::hash_password(&input.pin).map_err(internal_error)?;

    match state
        .db
        .lock_note(user.id, id, &pin_hash)
        .map_err(internal_error)?
    {
        LockOutcome::Done => Ok(privacy_ok("Note locked successfully")),
        LockOutcome::AlreadyLocked => Err(bad_request("Note is already locked")),
        _ => Err(not_found("Note")),
    }
}

pub async fn unlock_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
    Json(input): Json<PinInput>,
) -> Result<Json<PrivacyResponse>, (StatusCode, String)> {
    let outcome = state
        .db
        .unlock_note(user.id, id, |hash| auth::verify_password(&input.pin, hash))
        .map_err(internal_error)?;

    match outcome {
        LockOutcome::Done => Ok(privacy_ok("Note unlocked successfully")),
        LockOutcome::NotLocked => Err(bad_request("Note is not locked")),
        LockOutcome::WrongPin => Err((StatusCode::UNAUTHORIZED, "Incorrect PIN".to_string())),
        _ => Err(not_found("Note")),
    }
}

pub async fn toggle_hide(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<PrivacyResponse>, (StatusCode, String)> {
    let hidden = state
        .db
        .toggle_hidden(user.id, id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    Ok(privacy_ok(if hidden {
        "Note is now hidden"
    } else {
        "Note is now visible"
    }))
}

// ============================================================
// Trash
// ============================================================

pub async fn trash_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if !state.db.trash_note(user.id, id).map_err(internal_error)? {
        return Err(not_found("Note"));
    }
    state
        .db
        .log_activity(user.id, NewActivity::new("note_trashed").note(id))
        .map_err(internal_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Note>, (StatusCode, String)> {
    let note = state
        .db
        .restore_note(user.id, id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    state
        .db
        .log_activity(
            user.id,
            NewActivity::new("note_restored")
                .description(format!("Restored note: {}", note.title))
                .note(note.id),
        )
        .map_err(internal_error)?;

    Ok(Json(note))
}

pub async fn list_trash(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Note>>, (StatusCode, String)> {
    state
        .db
        .list_trash(user.id)
        .map(Json)
        .map_err(internal_error)
}

pub async fn purge_note(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.db.purge_note(user.id, id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Note"))
    }
}

pub async fn empty_trash(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let deleted = state.db.empty_trash(user.id).map_err(internal_error)?;
    tracing::info!("Emptied trash for user {}: {} notes", user.id, deleted);
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}
