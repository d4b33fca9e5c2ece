use std::collections::HashMap;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use serde::Deserialize;

use super::{ApiResponse, AppState, authenticated_user, store_error_response};
use crate::auth;
use crate::model::{Skill, User};
use crate::progression::{self, Progress};
use crate::store::{Placement, validate_placements};

#[derive(Deserialize)]
pub(super) struct LoginBody {
    pub username: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AwardExperienceBody {
    pub experience_points: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AdjustExperienceBody {
    pub experience_change: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SkillTreeBody {
    pub skill_tree_config: Vec<Placement>,
}

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

/// GET /health
pub(super) async fn handle_health() -> ApiResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// POST /api/auth/login — find-or-create the user, mint a session token.
pub(super) async fn handle_login(
    State(state): State<AppState>,
    body: JsonBody<LoginBody>,
) -> ApiResponse {
    let login_body = match parse_body(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    let username = login_body.username.trim();
    if username.is_empty() {
        return bad_request("username must not be empty");
    }

    match auth::login(state.store.as_ref(), username, state.session_ttl) {
        Ok(outcome) => {
            if outcome.created {
                tracing::info!("created user {username}");
            }
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "token": outcome.session.id,
                    "user": outcome.user,
                    "created": outcome.created,
                })),
            )
        }
        Err(error) => super::auth_error_response(&error),
    }
}

/// POST /api/auth/logout — invalidate the presented session token.
pub(super) async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let token = match auth::bearer_token(&headers) {
        Ok(token) => token,
        Err(error) => return super::auth_error_response(&error),
    };
    match state.store.delete_session(token) {
        Ok(removed) => (
            StatusCode::OK,
            Json(serde_json::json!({"success": removed})),
        ),
        Err(error) => store_error_response(&error),
    }
}

/// Assemble a user's full progress view: current standing plus the unlock
/// states of the skills assigned to the upcoming level, in position order.
fn user_progress(state: &AppState, user: &User) -> Result<Progress, ApiResponse> {
    let levels = state.store.all_levels().map_err(|e| store_error_response(&e))?;
    let assignments = state
        .store
        .assignments_for_user(&user.id)
        .map_err(|e| store_error_response(&e))?;
    let catalog = state.store.all_skills().map_err(|e| store_error_response(&e))?;
    let by_id: HashMap<&str, &Skill> = catalog.iter().map(|s| (s.id.as_str(), s)).collect();

    // First pass locates the upcoming level; its assigned skills feed the
    // final computation.
    let baseline = progression::compute_progress(user.experience, &levels, &[]);
    let next_level_id = baseline.next_level.and_then(|ordinal| {
        levels
            .iter()
            .find(|level| level.effective_ordinal() == ordinal)
            .map(|level| level.id.clone())
    });

    let next_level_skills: Vec<Skill> = next_level_id
        .map(|level_id| {
            assignments
                .iter()
                .filter(|assignment| assignment.level_id == level_id)
                .filter_map(|assignment| by_id.get(assignment.skill_id.as_str()).copied())
                .cloned()
                .collect()
        })
        .unwrap_or_default();

    Ok(progression::compute_progress(
        user.experience,
        &levels,
        &next_level_skills,
    ))
}

/// GET /api/user/progress
pub(super) async fn handle_get_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user = match authenticated_user(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    match user_progress(&state, &user) {
        Ok(progress) => (
            StatusCode::OK,
            Json(serde_json::to_value(progress).unwrap_or_default()),
        ),
        Err(response) => response,
    }
}

/// POST /api/user/progress — award experience points on top of the total.
pub(super) async fn handle_post_progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<AwardExperienceBody>,
) -> ApiResponse {
    let user = match authenticated_user(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let parsed = match parse_body(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };
    if parsed.experience_points == 0 {
        return bad_request("experiencePoints must be greater than zero");
    }

    let levels = match state.store.all_levels() {
        Ok(levels) => levels,
        Err(error) => return store_error_response(&error),
    };
    let new_total = user.experience.saturating_add(parsed.experience_points);
    let old_level = progression::level_for_experience(user.experience, &levels);
    let new_level = progression::level_for_experience(new_total, &levels);

    let updated = match state
        .store
        .set_user_experience(&user.username, new_total, new_level)
    {
        Ok(updated) => updated,
        Err(error) => return store_error_response(&error),
    };

    match user_progress(&state, &updated) {
        Ok(progress) => {
            let mut value = serde_json::to_value(progress).unwrap_or_default();
            if let Some(object) = value.as_object_mut() {
                object.insert("leveledUp".into(), serde_json::json!(new_level > old_level));
            }
            (StatusCode::OK, Json(value))
        }
        Err(response) => response,
    }
}

/// GET /api/user/experience
pub(super) async fn handle_get_experience(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user = match authenticated_user(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "experience": user.experience,
            "level": user.level,
        })),
    )
}

/// POST /api/user/experience — apply a signed delta, clamped at zero.
pub(super) async fn handle_post_experience(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<AdjustExperienceBody>,
) -> ApiResponse {
    let user = match authenticated_user(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let parsed = match parse_body(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let previous = user.experience;
    let updated_experience = if parsed.experience_change < 0 {
        previous.saturating_sub(parsed.experience_change.unsigned_abs())
    } else {
        previous.saturating_add(parsed.experience_change.unsigned_abs())
    };

    let levels = match state.store.all_levels() {
        Ok(levels) => levels,
        Err(error) => return store_error_response(&error),
    };
    let old_level = progression::level_for_experience(previous, &levels);
    let new_level = progression::level_for_experience(updated_experience, &levels);

    match state
        .store
        .set_user_experience(&user.username, updated_experience, new_level)
    {
        Ok(updated) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "experience": updated.experience,
                "change": parsed.experience_change,
                "previousExperience": previous,
                "level": updated.level,
                "leveledUp": new_level > old_level,
            })),
        ),
        Err(error) => store_error_response(&error),
    }
}

/// Group a user's assigned skills per level, in stored (position) order.
fn skills_by_level(
    state: &AppState,
    user: &User,
) -> Result<HashMap<String, Vec<Skill>>, ApiResponse> {
    let assignments = state
        .store
        .assignments_for_user(&user.id)
        .map_err(|e| store_error_response(&e))?;
    let catalog = state.store.all_skills().map_err(|e| store_error_response(&e))?;
    let by_id: HashMap<&str, &Skill> = catalog.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut grouped: HashMap<String, Vec<Skill>> = HashMap::new();
    for assignment in &assignments {
        if let Some(skill) = by_id.get(assignment.skill_id.as_str()) {
            grouped
                .entry(assignment.level_id.clone())
                .or_default()
                .push((*skill).clone());
        }
    }
    Ok(grouped)
}

/// GET /api/user/skills — flat unlock view of the user's assigned skills.
/// Users with no assignments see the whole catalog, locked.
pub(super) async fn handle_user_skills(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user = match authenticated_user(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let grouped = match skills_by_level(&state, &user) {
        Ok(grouped) => grouped,
        Err(response) => return response,
    };

    if grouped.is_empty() {
        let catalog = match state.store.all_skills() {
            Ok(catalog) => catalog,
            Err(error) => return store_error_response(&error),
        };
        let locked: Vec<serde_json::Value> = catalog
            .iter()
            .map(|skill| {
                serde_json::json!({
                    "id": skill.id,
                    "name": skill.name,
                    "emoji": skill.emoji,
                    "experienceNeeded": skill.experience_needed,
                    "isUnlocked": false,
                })
            })
            .collect();
        return (StatusCode::OK, Json(serde_json::json!({"skills": locked})));
    }

    let levels = match state.store.all_levels() {
        Ok(levels) => levels,
        Err(error) => return store_error_response(&error),
    };
    let tree = progression::compute_tree_unlocks(user.experience, &levels, &grouped);
    let flattened: Vec<_> = tree.into_iter().flat_map(|level| level.skills).collect();
    (
        StatusCode::OK,
        Json(serde_json::json!({"skills": flattened})),
    )
}

/// GET /api/skill-tree — the user's tree, level by level, plus the catalog
/// skills not yet placed anywhere (always locked).
pub(super) async fn handle_get_skill_tree(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResponse {
    let user = match authenticated_user(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let grouped = match skills_by_level(&state, &user) {
        Ok(grouped) => grouped,
        Err(response) => return response,
    };
    let levels = match state.store.all_levels() {
        Ok(levels) => levels,
        Err(error) => return store_error_response(&error),
    };
    let catalog = match state.store.all_skills() {
        Ok(catalog) => catalog,
        Err(error) => return store_error_response(&error),
    };

    let tree = progression::compute_tree_unlocks(user.experience, &levels, &grouped);
    let unlocks_by_level: HashMap<&str, _> = tree
        .iter()
        .map(|entry| (entry.level_id.as_str(), &entry.skills))
        .collect();

    let level_views: Vec<serde_json::Value> = levels
        .iter()
        .map(|level| {
            let skills = unlocks_by_level
                .get(level.id.as_str())
                .map(|skills| serde_json::to_value(skills).unwrap_or_default())
                .unwrap_or_else(|| serde_json::json!([]));
            serde_json::json!({
                "id": level.id,
                "name": level.name,
                "ordinal": level.effective_ordinal(),
                "experienceNeeded": level.experience_needed,
                "newSkillCount": level.new_skill_count,
                "skills": skills,
            })
        })
        .collect();

    let assigned: std::collections::HashSet<&str> = grouped
        .values()
        .flatten()
        .map(|skill| skill.id.as_str())
        .collect();
    let unassigned: Vec<serde_json::Value> = catalog
        .iter()
        .filter(|skill| !assigned.contains(skill.id.as_str()))
        .map(|skill| {
            serde_json::json!({
                "id": skill.id,
                "name": skill.name,
                "emoji": skill.emoji,
                "experienceNeeded": skill.experience_needed,
                "isUnlocked": false,
            })
        })
        .collect();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "levels": level_views,
            "unassignedSkills": unassigned,
        })),
    )
}

/// POST /api/skill-tree — wholesale replace of the user's assignments.
/// Rejected submissions leave the previous tree untouched.
pub(super) async fn handle_save_skill_tree(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: JsonBody<SkillTreeBody>,
) -> ApiResponse {
    let user = match authenticated_user(&state, &headers) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let parsed = match parse_body(body) {
        Ok(parsed) => parsed,
        Err(response) => return response,
    };

    let levels = match state.store.all_levels() {
        Ok(levels) => levels,
        Err(error) => return store_error_response(&error),
    };
    let catalog = match state.store.all_skills() {
        Ok(catalog) => catalog,
        Err(error) => return store_error_response(&error),
    };
    if let Err(error) = validate_placements(&levels, &catalog, &parsed.skill_tree_config) {
        return store_error_response(&error);
    }

    match state
        .store
        .replace_assignments_for_user(&user.id, &parsed.skill_tree_config)
    {
        Ok(inserted) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "configs": inserted,
            })),
        ),
        Err(error) => store_error_response(&error),
    }
}
