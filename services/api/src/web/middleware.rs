//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;

/// Pulls the session id out of the `Cookie` header, if present.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
}

/// Middleware that validates the auth session cookie and extracts the user id.
///
/// If valid, inserts the user id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session_id = session_cookie(req.headers())
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user_id = state
        .db
        .validate_auth_session(&session_id)
        .await
        .map_err(|e| {
            error!("Failed to validate auth session: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);

    Ok(next.run(req).await)
}
