pub mod ai;
pub mod analytics;
pub mod auth;
pub mod files;
pub mod notes;
pub mod shares;

use axum::{http::StatusCode, response::IntoResponse, Json};

use crate::ai::{AiError, UnknownAction};

pub const API_VERSION: &str = "1.0.0";
pub const APP_NAME: &str = "NoteAI Pro";

// ============================================================
// Error Handling
// ============================================================

/// Log an internal error and return a sanitized response to the client.
/// The full error is logged server-side; clients only see a generic message.
pub(crate) fn internal_error(e: impl std::fmt::Display) -> (StatusCode, String) {
    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

/// Map an orchestration failure to a client-facing status.
pub(crate) fn ai_error(e: AiError) -> (StatusCode, String) {
    let status = match e {
        AiError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        AiError::TextTooLong => StatusCode::BAD_REQUEST,
        AiError::Generation(_) => StatusCode::BAD_GATEWAY,
    };
    tracing::warn!("AI request failed: {}", e);
    (status, e.to_string())
}

pub(crate) fn unknown_action(e: UnknownAction) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, e.to_string())
}

pub(crate) fn bad_request(msg: impl Into<String>) -> (StatusCode, String) {
    (StatusCode::BAD_REQUEST, msg.into())
}

pub(crate) fn not_found(what: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("{what} not found"))
}

// ============================================================
// Health
// ============================================================

pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": format!("Welcome to {APP_NAME} API"),
        "version": API_VERSION,
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "app_name": APP_NAME,
        "timestamp": chrono::Utc::now(),
    }))
}
