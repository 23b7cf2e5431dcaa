use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::{bad_request, internal_error, not_found};
use crate::api::{AppState, CurrentUser};
use crate::files::{self, FileError};
use crate::models::*;

fn file_error(e: FileError) -> (StatusCode, String) {
    tracing::warn!("Rejected upload: {}", e);
    bad_request(e.to_string())
}

/// Accept a multipart upload in the `file` field and attach it to a note.
pub async fn upload_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(note_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileUploadResponse>), (StatusCode, String)> {
    if state
        .db
        .get_note(user.id, note_id)
        .map_err(internal_error)?
        .is_none()
    {
        return Err(not_found("Note"));
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("multipart error: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("read field error: {e}")))?;
        upload = Some((filename, content_type, data.to_vec()));
        break;
    }

    let (filename, content_type, data) =
        upload.ok_or_else(|| bad_request("missing 'file' field"))?;
    let processed = files::process_upload(
        &filename,
        content_type.as_deref(),
        data,
        user.id,
        &state.settings,
    )
    .map_err(file_error)?;

    let file = state
        .db
        .create_file(note_id, processed)
        .map_err(internal_error)?;
    tracing::info!("Stored file {} on note {}", file.id, note_id);

    Ok((
        StatusCode::CREATED,
        Json(FileUploadResponse {
            file_id: file.id,
            filename: file.filename,
            file_type: file.file_type,
            file_size: file.file_size,
            message: "File uploaded successfully".to_string(),
        }),
    ))
}

pub async fn download_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let file = state
        .db
        .get_file_data(user.id, id)
        .map_err(internal_error)?
        .ok_or_else(|| not_found("File"))?;

    Ok((
        [
            (header::CONTENT_TYPE, file.file_type),
            (
                header::CONTENT_DISPOSITION,
                files::attachment_disposition(&file.original_filename),
            ),
        ],
        file.data,
    ))
}

pub async fn file_content(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FileContent>, (StatusCode, String)> {
    state
        .db
        .get_file(user.id, id)
        .map_err(internal_error)?
        .map(|f| Json(f.into()))
        .ok_or_else(|| not_found("File"))
}

pub async fn delete_file(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    if state.db.delete_file(user.id, id).map_err(internal_error)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("File"))
    }
}
