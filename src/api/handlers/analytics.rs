use axum::{extract::State, http::StatusCode, Json};

use super::internal_error;
use crate::api::{AppState, CurrentUser};
use crate::models::Analytics;

pub async fn analytics(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Analytics>, (StatusCode, String)> {
    state
        .db
        .analytics(user.id)
        .map(Json)
        .map_err(internal_error)
}
