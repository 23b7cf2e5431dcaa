use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::{internal_error, not_found};
use crate::api::{AppState, CurrentUser};
use crate::auth;
use crate::models::*;

pub async fn create_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(note_id): Path<Uuid>,
    Json(input): Json<CreateShareInput>,
) -> Result<(StatusCode, Json<SharedLink>), (StatusCode, String)> {
    let note = state
        .db
        .get_note(user.id, note_id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("Note"))?;

    let password_hash = match input.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => Some(auth::hash_password(password).map_err(internal_error)?),
        None => None,
    };

    let link = state
        .db
        .create_share(
            note.id,
            &auth::generate_token(),
            input.expires_at,
            password_hash.as_deref(),
        )
        .map_err(internal_error)?;

    state
        .db
        .log_activity(
            user.id,
            NewActivity::new("note_shared")
                .description(format!("Created share link for: {}", note.title))
                .note(note.id),
        )
        .map_err(internal_error)?;

    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn list_shares(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(note_id): Path<Uuid>,
) -> Result<Json<Vec<SharedLink>>, (StatusCode, String)> {
    if state
        .db
        .get_note(user.id, note_id)
        .map_err(internal_error)?
        .is_none()
    {
        return Err(not_found("Note"));
    }

    state
        .db
        .list_shares(note_id)
        .map(Json)
        .map_err(internal_error)
}

pub async fn deactivate_share(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state
        .db
        .deactivate_share(user.id, id)
        .map_err(internal_error)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("Share link"))
    }
}

/// Public endpoint: no bearer token, the link token is the credential.
pub async fn access_shared_note(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Option<Json<SharedAccessInput>>,
) -> Result<Json<Note>, (StatusCode, String)> {
    let password = body.and_then(|Json(b)| b.password);

    let access = state
        .db
        .access_shared_note(&token, |hash| {
            password
                .as_deref()
                .is_some_and(|p| auth::verify_password(p, hash))
        })
        .map_err(internal_error)?;

    match access {
        SharedAccess::Granted(note) => Ok(Json(*note)),
        SharedAccess::Unavailable => Err((
            StatusCode::NOT_FOUND,
            "Shared note not found or expired".to_string(),
        )),
        SharedAccess::WrongPassword => {
            Err((StatusCode::UNAUTHORIZED, "Invalid password".to_string()))
        }
    }
}
