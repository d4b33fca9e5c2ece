//! Admin-only catalog CRUD. Every handler requires a session belonging to
//! the configured admin username.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};

use super::{ApiResponse, AppState, admin_user, store_error_response};
use crate::store::{LevelDraft, SkillDraft};

type JsonBody<T> = Result<Json<T>, axum::extract::rejection::JsonRejection>;

fn bad_request(message: impl Into<String>) -> ApiResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({"error": message.into()})),
    )
}

fn parse_body<T>(body: JsonBody<T>) -> Result<T, ApiResponse> {
    match body {
        Ok(Json(parsed)) => Ok(parsed),
        Err(rejection) => Err(bad_request(format!("invalid JSON: {rejection}"))),
    }
}

fn validate_level_draft(draft: &LevelDraft) -> Result<(), ApiResponse> {
    if draft.name.trim().is_empty() {
        return Err(bad_request("level name must not be empty"));
    }
    Ok(())
}

fn validate_skill_draft(draft: &SkillDraft) -> Result<(), ApiResponse> {
    if draft.name.trim().is_empty() {
        return Err(bad_request("skill name must not be empty"));
    }
    Ok(())
}

/// GET /api/admin/levels
pub(super) async fn handle_list_levels(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = admin_user(&state, &headers) {
        return response;
    }
    match state.store.all_levels() {
        Ok(levels) => (
            StatusCode::OK,
            Json(serde_json::json!({"levels": levels})),
        ),
        Err(error) => store_error_response(&error),
    }
}

/// POST /api/admin/levels
pub(super) async fn handle_create_level(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<LevelDraft>,
) -> ApiResponse {
    if let Err(response) = admin_user(&state, &headers) {
        return response;
    }
    let draft = match parse_body(body) {
        Ok(draft) => draft,
        Err(response) => return response,
    };
    if let Err(response) = validate_level_draft(&draft) {
        return response;
    }
    match state.store.create_level(draft) {
        Ok(level) => {
            tracing::info!("created level {}", level.name);
            (StatusCode::CREATED, Json(serde_json::json!(level)))
        }
        Err(error) => store_error_response(&error),
    }
}

/// PUT /api/admin/levels/{id}
pub(super) async fn handle_update_level(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: JsonBody<LevelDraft>,
) -> ApiResponse {
    if let Err(response) = admin_user(&state, &headers) {
        return response;
    }
    let draft = match parse_body(body) {
        Ok(draft) => draft,
        Err(response) => return response,
    };
    if let Err(response) = validate_level_draft(&draft) {
        return response;
    }
    match state.store.update_level(&id, draft) {
        Ok(level) => (StatusCode::OK, Json(serde_json::json!(level))),
        Err(error) => store_error_response(&error),
    }
}

/// DELETE /api/admin/levels/{id} — cascades the level's assignments.
pub(super) async fn handle_delete_level(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = admin_user(&state, &headers) {
        return response;
    }
    match state.store.delete_level(&id) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"success": true})),
        ),
        Err(error) => store_error_response(&error),
    }
}

/// GET /api/admin/skills — name-sorted for the editor listing.
pub(super) async fn handle_list_skills(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = admin_user(&state, &headers) {
        return response;
    }
    match state.store.all_skills() {
        Ok(mut skills) => {
            skills.sort_by(|a, b| a.name.cmp(&b.name));
            (
                StatusCode::OK,
                Json(serde_json::json!({"skills": skills})),
            )
        }
        Err(error) => store_error_response(&error),
    }
}

/// POST /api/admin/skills
pub(super) async fn handle_create_skill(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<SkillDraft>,
) -> ApiResponse {
    if let Err(response) = admin_user(&state, &headers) {
        return response;
    }
    let draft = match parse_body(body) {
        Ok(draft) => draft,
        Err(response) => return response,
    };
    if let Err(response) = validate_skill_draft(&draft) {
        return response;
    }
    match state.store.create_skill(draft) {
        Ok(skill) => {
            tracing::info!("created skill {}", skill.name);
            (StatusCode::CREATED, Json(serde_json::json!(skill)))
        }
        Err(error) => store_error_response(&error),
    }
}

/// PUT /api/admin/skills/{id}
pub(super) async fn handle_update_skill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: JsonBody<SkillDraft>,
) -> ApiResponse {
    if let Err(response) = admin_user(&state, &headers) {
        return response;
    }
    let draft = match parse_body(body) {
        Ok(draft) => draft,
        Err(response) => return response,
    };
    if let Err(response) = validate_skill_draft(&draft) {
        return response;
    }
    match state.store.update_skill(&id, draft) {
        Ok(skill) => (StatusCode::OK, Json(serde_json::json!(skill))),
        Err(error) => store_error_response(&error),
    }
}

/// DELETE /api/admin/skills/{id} — cascades the skill's assignments.
pub(super) async fn handle_delete_skill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResponse {
    if let Err(response) = admin_user(&state, &headers) {
        return response;
    }
    match state.store.delete_skill(&id) {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"success": true})),
        ),
        Err(error) => store_error_response(&error),
    }
}
