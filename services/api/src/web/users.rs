//! services/api/src/web/users.rs
//!
//! User profile and settings endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use edu_papers_core::domain::{Badge, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::port_error;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// A user as exposed over the wire: everything but the password hash.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub level: i32,
    pub current_xp: i64,
    #[schema(value_type = Vec<Object>)]
    pub badges: Vec<Badge>,
    #[schema(value_type = Object)]
    pub settings: serde_json::Value,
    pub offline_mode: bool,
    pub join_date: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            is_admin: user.is_admin,
            level: user.level,
            current_xp: user.current_xp,
            badges: user.badges,
            settings: user.settings,
            offline_mode: user.offline_mode,
            join_date: user.join_date,
        }
    }
}

/// Whitelisted settings keys. Anything else in the body is ignored.
#[derive(Deserialize, ToSchema)]
pub struct SettingsRequest {
    pub notifications: Option<bool>,
    pub theme: Option<String>,
    pub language: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/users/profile/{id} - A single user's public profile.
#[utoipa::path(
    get,
    path = "/api/users/profile/{id}",
    params(("id" = Uuid, Path, description = "The user's id")),
    responses(
        (status = 200, description = "The user's profile", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state.db.get_user(id).await.map_err(port_error)?;
    Ok(Json(UserResponse::from(user)))
}

/// GET /api/users/registered - All registered users, hashes stripped.
#[utoipa::path(
    get,
    path = "/api/users/registered",
    responses(
        (status = 200, description = "All registered users", body = [UserResponse])
    )
)]
pub async fn registered_users_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let users = state.db.get_all_users().await.map_err(port_error)?;
    let users: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(users))
}

/// PUT /api/users/settings - Merge whitelisted settings keys into the
/// caller's stored settings.
#[utoipa::path(
    put,
    path = "/api/users/settings",
    request_body = SettingsRequest,
    responses(
        (status = 200, description = "Updated settings", body = UserResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SettingsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut user = state.db.get_user(user_id).await.map_err(port_error)?;

    // Settings may be any JSON shape historically; normalize to an object
    // before merging.
    if !user.settings.is_object() {
        user.settings = serde_json::json!({});
    }
    if let Some(settings) = user.settings.as_object_mut() {
        if let Some(notifications) = req.notifications {
            settings.insert("notifications".to_string(), notifications.into());
        }
        if let Some(theme) = req.theme {
            settings.insert("theme".to_string(), theme.into());
        }
        if let Some(language) = req.language {
            settings.insert("language".to_string(), language.into());
        }
    }

    state
        .db
        .update_settings(user_id, user.settings.clone())
        .await
        .map_err(port_error)?;

    Ok(Json(UserResponse::from(user)))
}
