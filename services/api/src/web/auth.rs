//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user registration, login, and logout.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use edu_papers_core::domain::NewUser;
use edu_papers_core::ports::PortError;
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::session_cookie;
use crate::web::rest::port_error;
use crate::web::state::AppState;
use crate::web::users::UserResponse;

const SESSION_DAYS: i64 = 30;

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username or email address.
    pub identifier: String,
    pub password: String,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn session_cookie_value(session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    )
}

async fn open_session(
    state: &Arc<AppState>,
    user_id: Uuid,
) -> Result<String, (StatusCode, String)> {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
    state
        .db
        .create_auth_session(&session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create session".to_string(),
            )
        })?;
    Ok(session_cookie_value(&session_id))
}

fn validate_registration(req: &RegisterRequest) -> Result<(), (StatusCode, String)> {
    if req.username.trim().len() < 3 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Username must be at least 3 characters".to_string(),
        ));
    }
    if !req.email.contains('@') {
        return Err((StatusCode::BAD_REQUEST, "Invalid email address".to_string()));
    }
    if req.password.len() < 6 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Password must be at least 6 characters".to_string(),
        ));
    }
    Ok(())
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/auth/register - Create a new user account.
///
/// New users start at level 1 with zero XP and no badges.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Invalid registration data"),
        (status = 409, description = "Username or email already taken"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_registration(&req)?;

    // Reject duplicates on either identifier up front.
    for identifier in [&req.username, &req.email] {
        match state.db.find_credentials(identifier).await {
            Ok(_) => {
                return Err((
                    StatusCode::CONFLICT,
                    "Username or email already taken".to_string(),
                ))
            }
            Err(PortError::NotFound(_)) => {}
            Err(e) => return Err(port_error(e)),
        }
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })?
        .to_string();

    let user = state
        .db
        .create_user(NewUser {
            username: req.username.trim().to_string(),
            email: req.email.trim().to_string(),
            password_hash,
            is_admin: false,
        })
        .await
        .map_err(port_error)?;

    state
        .db
        .log_account_creation(&user.username, &user.email)
        .await
        .map_err(port_error)?;

    let cookie = open_session(&state, user.id).await?;

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(user)),
    ))
}

/// POST /api/auth/login - Login with username or email.
///
/// Every attempt, successful or not, lands in the login audit log.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = UserResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let invalid = || {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid username or password".to_string(),
        )
    };

    let creds = match state.db.find_credentials(&req.identifier).await {
        Ok(creds) => creds,
        Err(PortError::NotFound(_)) => {
            state
                .db
                .log_login_attempt(None, &req.identifier, false)
                .await
                .map_err(port_error)?;
            return Err(invalid());
        }
        Err(e) => return Err(port_error(e)),
    };

    let parsed_hash = PasswordHash::new(&creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();

    state
        .db
        .log_login_attempt(Some(creds.user_id), &req.identifier, valid)
        .await
        .map_err(port_error)?;

    if !valid {
        return Err(invalid());
    }

    let user = state.db.get_user(creds.user_id).await.map_err(port_error)?;
    let cookie = open_session(&state, user.id).await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(user)),
    ))
}

/// POST /api/auth/logout - Logout and invalidate the session.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session_id = session_cookie(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?
        .to_string();

    state
        .db
        .delete_auth_session(&session_id)
        .await
        .map_err(port_error)?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
