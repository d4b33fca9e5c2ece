//! Axum-based HTTP API with body limits and request timeouts.
//!
//! All state lives behind `AppState`; handlers are thin wrappers that
//! authenticate, call the store and the progression calculator, and shape
//! JSON responses.

mod admin;
mod handlers;

use admin::{
    handle_create_level, handle_create_skill, handle_delete_level, handle_delete_skill,
    handle_list_levels, handle_list_skills, handle_update_level, handle_update_skill,
};
use handlers::{
    handle_get_experience, handle_get_progress, handle_get_skill_tree, handle_health,
    handle_login, handle_logout, handle_post_experience, handle_post_progress,
    handle_save_skill_tree, handle_user_skills,
};

use crate::auth;
use crate::config::Config;
use crate::error::{AuthError, StoreError};
use crate::model::User;
use crate::store::{JsonStore, Store};
use anyhow::Result;
use axum::{
    Router,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post, put},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB)
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) to prevent slow-loris attacks
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared state for all axum handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub admin_username: Arc<str>,
    pub session_ttl: chrono::Duration,
}

/// Status-plus-JSON pair every handler resolves to.
pub(crate) type ApiResponse = (StatusCode, Json<serde_json::Value>);

/// Run the HTTP API server.
pub async fn run_server(host: &str, port: u16, config: Config) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    run_server_with_listener(listener, config).await
}

/// Run the HTTP API server from a pre-bound listener.
pub async fn run_server_with_listener(
    listener: tokio::net::TcpListener,
    config: Config,
) -> Result<()> {
    let addr = listener.local_addr()?;

    let store = JsonStore::open(&config.data_dir)?;
    let state = AppState {
        store: Arc::new(store),
        admin_username: Arc::from(config.admin_username.as_str()),
        session_ttl: chrono::Duration::days(config.session_ttl_days),
    };

    tracing::info!("listening on {addr}");
    tracing::info!("data directory: {}", config.data_dir.display());

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/api/auth/login", post(handle_login))
        .route("/api/auth/logout", post(handle_logout))
        .route("/api/user/progress", get(handle_get_progress))
        .route("/api/user/progress", post(handle_post_progress))
        .route("/api/user/experience", get(handle_get_experience))
        .route("/api/user/experience", post(handle_post_experience))
        .route("/api/user/skills", get(handle_user_skills))
        .route("/api/skill-tree", get(handle_get_skill_tree))
        .route("/api/skill-tree", post(handle_save_skill_tree))
        .route("/api/admin/levels", get(handle_list_levels))
        .route("/api/admin/levels", post(handle_create_level))
        .route("/api/admin/levels/{id}", put(handle_update_level))
        .route("/api/admin/levels/{id}", delete(handle_delete_level))
        .route("/api/admin/skills", get(handle_list_skills))
        .route("/api/admin/skills", post(handle_create_skill))
        .route("/api/admin/skills/{id}", put(handle_update_skill))
        .route("/api/admin/skills/{id}", delete(handle_delete_skill))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ));

    axum::serve(listener, app).await?;

    Ok(())
}

/// Map a store failure to its HTTP shape: missing records are 404, rejected
/// submissions 400, everything else an opaque 500.
pub(crate) fn store_error_response(error: &StoreError) -> ApiResponse {
    match error {
        StoreError::NotFound { .. } => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": error.to_string()})),
        ),
        StoreError::Constraint(message) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": message})),
        ),
        StoreError::Io(_) | StoreError::Serialize(_) => {
            tracing::error!("store failure: {error}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            )
        }
    }
}

pub(crate) fn auth_error_response(error: &AuthError) -> ApiResponse {
    match error {
        AuthError::Store(store_error) => store_error_response(store_error),
        AuthError::MissingBearer | AuthError::InvalidSession | AuthError::AdminRequired => (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": error.to_string()})),
        ),
    }
}

/// Resolve the request's bearer session to a user, or produce the 401.
pub(crate) fn authenticated_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<User, ApiResponse> {
    auth::authenticate(state.store.as_ref(), headers)
        .map_err(|error| auth_error_response(&error))
}

/// Like [`authenticated_user`], additionally requiring the admin username.
pub(crate) fn admin_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiResponse> {
    let user = authenticated_user(state, headers)?;
    if user.username != *state.admin_username {
        return Err(auth_error_response(&AuthError::AdminRequired));
    }
    Ok(user)
}
