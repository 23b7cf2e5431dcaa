use axum::{extract::State, http::StatusCode, Json};
use chrono::{Duration, Utc};

use super::{bad_request, internal_error};
use crate::api::{AppState, CurrentUser};
use crate::auth;
use crate::models::*;

// ============================================================
// Accounts
// ============================================================

fn issue_token(state: &AppState, user: User) -> Result<TokenResponse, (StatusCode, String)> {
    let access_token = auth::create_access_token(
        user.id,
        &state.settings.secret_key,
        state.settings.access_token_expire_minutes,
    )
    .map_err(internal_error)?;

    Ok(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
        user,
    })
}

pub async fn signup(
    State(state): State<AppState>,
    Json(input): Json<SignupInput>,
) -> Result<(StatusCode, Json<TokenResponse>), (StatusCode, String)> {
    auth::validate_name(&input.name).map_err(bad_request)?;
    if !auth::is_valid_email(&input.email) {
        return Err(bad_request("Invalid email address"));
    }
    auth::validate_password(&input.password).map_err(bad_request)?;

    if state
        .db
        .get_user_by_email(&input.email)
        .map_err(internal_error)?
        .is_some()
    {
        return Err(bad_request("Email already registered"));
    }

    let hash = auth::hash_password(&input.password).map_err(internal_error)?;
    let mut user = state
        .db
        .create_user(input.name.trim(), &input.email, &hash)
        .map_err(internal_error)?;
    user.last_login = Some(state.db.record_login(user.id).map_err(internal_error)?);

    state
        .db
        .log_activity(
            user.id,
            NewActivity::new("user_created").description("User account created"),
        )
        .map_err(internal_error)?;
    tracing::info!("Registered user {}", user.id);

    let token = issue_token(&state, user)?;
    Ok((StatusCode::CREATED, Json(token)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginInput>,
) -> Result<Json<TokenResponse>, (StatusCode, String)> {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        )
    };

    let mut user = state
        .db
        .get_user_by_email(&input.email)
        .map_err(internal_error)?
        .ok_or_else(invalid)?;
    if !auth::verify_password(&input.password, &user.password_hash) {
        return Err(invalid());
    }

    user.last_login = Some(state.db.record_login(user.id).map_err(internal_error)?);
    state
        .db
        .log_activity(user.id, NewActivity::new("login").description("User logged in"))
        .map_err(internal_error)?;

    issue_token(&state, user).map(Json)
}

/// Tokens are stateless, so there is nothing to revoke server-side.
pub async fn logout(CurrentUser(_user): CurrentUser) -> Json<MessageResponse> {
    Json(MessageResponse::new("Successfully logged out"))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<UpdateUserInput>,
) -> Result<Json<User>, (StatusCode, String)> {
    if let Some(name) = &input.name {
        auth::validate_name(name).map_err(bad_request)?;
    }

    state
        .db
        .update_user(user.id, input)
        .map_err(internal_error)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "User not found".to_string()))
}

// ============================================================
// Passwords
// ============================================================

pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(input): Json<ChangePasswordInput>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    if !auth::verify_password(&input.current_password, &user.password_hash) {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Current password is incorrect".to_string(),
        ));
    }
    auth::validate_password(&input.new_password).map_err(bad_request)?;

    let hash = auth::hash_password(&input.new_password).map_err(internal_error)?;
    state
        .db
        .update_password(user.id, &hash)
        .map_err(internal_error)?;

    Ok(Json(MessageResponse::new("Password changed successfully")))
}

/// Issue a reset token. The message is the same whether or not the email is
/// registered; debug builds echo the token back.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(input): Json<ForgotPasswordInput>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    let token = auth::generate_token();
    let expires = Utc::now() + Duration::hours(auth::RESET_TOKEN_TTL_HOURS);

    let stored = state
        .db
        .set_reset_token(&input.email, &token, expires)
        .map_err(internal_error)?;

    let mut response =
        MessageResponse::new("If the email exists, password reset instructions have been sent");
    if stored && state.settings.debug {
        response.reset_token = Some(token);
    }
    Ok(Json(response))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(input): Json<ResetPasswordInput>,
) -> Result<Json<MessageResponse>, (StatusCode, String)> {
    auth::validate_password(&input.new_password).map_err(bad_request)?;

    let hash = auth::hash_password(&input.new_password).map_err(internal_error)?;
    let reset = state
        .db
        .reset_password_with_token(&input.token, &hash)
        .map_err(internal_error)?;

    if !reset {
        return Err(bad_request("Invalid or expired reset token"));
    }
    Ok(Json(MessageResponse::new("Password reset successful")))
}
