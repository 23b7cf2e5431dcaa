use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};

use super::AppState;
use crate::auth;
use crate::models::User;

const CREDENTIALS_ERROR: &str = "Could not validate credentials";

/// The account named by a valid `Authorization: Bearer <jwt>` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let unauthorized = || (StatusCode::UNAUTHORIZED, CREDENTIALS_ERROR.to_string());

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(unauthorized)?;

        let user_id = auth::decode_access_token(token.trim(), &state.settings.secret_key)
            .map_err(|e| {
                tracing::debug!("Rejected access token: {}", e);
                unauthorized()
            })?;

        let user = state.db.get_user(user_id).map_err(|e| {
            tracing::error!("Internal error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        })?;

        user.map(CurrentUser).ok_or_else(unauthorized)
    }
}
