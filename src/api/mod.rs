mod extract;
mod handlers;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::ai::Assistant;
use crate::config::Settings;
use crate::db::Database;

pub use extract::CurrentUser;

/// Multipart framing on top of the file itself.
const UPLOAD_OVERHEAD_BYTES: usize = 64 * 1024;

/// Shared handler state. Everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub assistant: Arc<Assistant>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(db: Database, assistant: Assistant, settings: Settings) -> Self {
        Self {
            db,
            assistant: Arc::new(assistant),
            settings: Arc::new(settings),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let upload_limit = state.settings.max_file_size_bytes() as usize + UPLOAD_OVERHEAD_BYTES;

    let api = Router::new()
        // Auth
        .route("/auth/signup", post(handlers::auth::signup))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/auth/reset-password", post(handlers::auth::reset_password))
        .route("/auth/me", get(handlers::auth::me).put(handlers::auth::update_me))
        .route("/auth/change-password", post(handlers::auth::change_password))
        // Notes
        .route("/notes", get(handlers::notes::list_notes).post(handlers::notes::create_note))
        .route("/notes/search", post(handlers::notes::search_notes))
        .route(
            "/notes/{id}",
            get(handlers::notes::get_note)
                .put(handlers::notes::update_note)
                .delete(handlers::notes::delete_note),
        )
        .route("/notes/{id}/archive", post(handlers::notes::archive_note))
        .route("/notes/{id}/unarchive", post(handlers::notes::unarchive_note))
        .route("/notes/{id}/versions", get(handlers::notes::list_versions))
        .route("/notes/{id}/lock", post(handlers::notes::lock_note))
        .route("/notes/{id}/unlock", post(handlers::notes::unlock_note))
        .route("/notes/{id}/toggle-hide", post(handlers::notes::toggle_hide))
        // Trash
        .route("/notes/{id}/trash", post(handlers::notes::trash_note))
        .route("/notes/{id}/restore", post(handlers::notes::restore_note))
        .route(
            "/trash",
            get(handlers::notes::list_trash).delete(handlers::notes::empty_trash),
        )
        .route("/trash/{id}", delete(handlers::notes::purge_note))
        // Files
        .route(
            "/notes/{id}/files",
            post(handlers::files::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/files/{id}",
            get(handlers::files::download_file).delete(handlers::files::delete_file),
        )
        .route("/files/{id}/content", get(handlers::files::file_content))
        // Sharing
        .route("/notes/{id}/share", post(handlers::shares::create_share))
        .route("/notes/{id}/shares", get(handlers::shares::list_shares))
        .route("/shares/{id}", delete(handlers::shares::deactivate_share))
        .route("/shared/{token}", post(handlers::shares::access_shared_note))
        // AI over stored notes
        .route("/notes/{id}/tasks", get(handlers::ai::note_tasks))
        .route("/notes/{id}/related", get(handlers::ai::related_notes))
        // AI
        .route("/ai/summarize", post(handlers::ai::summarize))
        .route("/ai/rewrite", post(handlers::ai::rewrite))
        .route("/ai/generate", post(handlers::ai::generate_note))
        .route("/ai/generate-text", post(handlers::ai::generate_text))
        .route("/ai/generate-flowchart", post(handlers::ai::generate_flowchart))
        .route("/ai/suggestions", post(handlers::ai::suggestions))
        .route("/ai/tags", post(handlers::ai::generate_tags))
        .route("/ai/format", post(handlers::ai::auto_format))
        .route("/ai/detect-category", post(handlers::ai::detect_category))
        .route("/ai/extract-tasks", post(handlers::ai::extract_tasks))
        .route("/ai/ask-notes", post(handlers::ai::ask_notes))
        .route("/ai/flashcards", post(handlers::ai::flashcards))
        .route("/ai/daily-brief", get(handlers::ai::daily_brief))
        .route("/ai/semantic-search", post(handlers::ai::semantic_search))
        .route("/ai/action", post(handlers::ai::run_action))
        // Chat
        .route("/ai/chat", post(handlers::ai::chat))
        .route(
            "/ai/chat/sessions",
            get(handlers::ai::list_chat_sessions).post(handlers::ai::create_chat_session),
        )
        .route("/ai/chat/sessions/{id}/messages", get(handlers::ai::chat_messages))
        // Analytics
        .route("/analytics", get(handlers::analytics::analytics));

    let cors = cors_layer(state.settings.cors_origins.as_deref());

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    let Some(origins) = origins else {
        return CorsLayer::permissive();
    };

    let mut parsed = Vec::new();
    for origin in origins {
        match HeaderValue::from_str(origin) {
            Ok(value) => parsed.push(value),
            Err(err) => tracing::warn!("ignoring invalid CORS origin '{origin}': {err}"),
        }
    }

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
        .allow_origin(parsed)
}
