//! Username-only authentication backed by persisted bearer sessions.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use chrono::Duration;

use crate::error::AuthError;
use crate::model::{Session, User};
use crate::store::Store;

/// Result of a login: the resolved user, a fresh session, and whether the
/// user record was created on this call.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
    pub created: bool,
}

/// Log a user in by username, creating the user record on first sight.
pub fn login(store: &dyn Store, username: &str, ttl: Duration) -> Result<LoginOutcome, AuthError> {
    let (user, created) = match store.get_user(username)? {
        Some(user) => (user, false),
        None => (store.create_user(username)?, true),
    };
    let session = store.create_session(&user.id, ttl)?;
    Ok(LoginOutcome {
        user,
        session,
        created,
    })
}

/// Extract the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingBearer)
}

/// Resolve the request's session token to its user. Expired or unknown
/// tokens fail with `InvalidSession`.
pub fn authenticate(store: &dyn Store, headers: &HeaderMap) -> Result<User, AuthError> {
    let token = bearer_token(headers)?;
    let session = store
        .get_session(token)?
        .ok_or(AuthError::InvalidSession)?;
    store
        .get_user_by_id(&session.user_id)?
        .ok_or(AuthError::InvalidSession)
}
