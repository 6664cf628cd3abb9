//! services/api/src/web/rest.rs
//!
//! The master OpenAPI definition, the health endpoint, and helpers shared
//! across the REST handler modules.

use crate::web::state::AppState;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use edu_papers_core::domain::User;
use edu_papers_core::ports::PortError;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        crate::web::auth::register_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        crate::web::users::profile_handler,
        crate::web::users::registered_users_handler,
        crate::web::users::update_settings_handler,
        crate::web::papers::list_papers_handler,
        crate::web::papers::pending_papers_handler,
        crate::web::papers::get_paper_handler,
        crate::web::papers::papers_by_user_handler,
        crate::web::papers::create_paper_handler,
        crate::web::papers::download_paper_handler,
        crate::web::papers::approve_paper_handler,
        crate::web::papers::reject_paper_handler,
        crate::web::quizzes::list_quizzes_handler,
        crate::web::quizzes::get_quiz_handler,
        crate::web::quizzes::attempt_quiz_handler,
        crate::web::quizzes::submit_attempt_handler,
        crate::web::quizzes::user_attempts_handler,
        crate::web::offline::enable_offline_handler,
        crate::web::offline::disable_offline_handler,
        crate::web::offline::sync_offline_data_handler,
        crate::web::offline::sync_status_handler,
        crate::web::offline::list_actions_handler,
        crate::web::ai::chat_handler,
        crate::web::ai::chat_history_handler,
    ),
    components(schemas(
        HealthResponse,
        crate::web::auth::RegisterRequest,
        crate::web::auth::LoginRequest,
        crate::web::users::UserResponse,
        crate::web::users::SettingsRequest,
        crate::web::papers::PaperResponse,
        crate::web::papers::CreatePaperRequest,
        crate::web::papers::DownloadResponse,
        crate::web::papers::RejectRequest,
        crate::web::quizzes::QuizResponse,
        crate::web::quizzes::QuizDetailResponse,
        crate::web::quizzes::QuestionResponse,
        crate::web::quizzes::AttemptRequest,
        crate::web::quizzes::QuestionResult,
        crate::web::quizzes::AttemptResponse,
        crate::web::quizzes::SubmitAttemptRequest,
        crate::web::quizzes::AwardResponse,
        crate::web::quizzes::QuizAttemptResponse,
        crate::web::offline::OfflineModeResponse,
        crate::web::offline::SyncStatusResponse,
        crate::web::offline::ActionResponse,
        crate::web::ai::ChatRequest,
        crate::web::ai::ChatResponse,
        crate::web::ai::MessageResponse,
    )),
    tags(
        (name = "Edu Papers API", description = "REST endpoints for the educational resource sharing platform.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Shared Handler Helpers
//=========================================================================================

/// Maps a port error to the HTTP response pair used by every handler.
/// Storage details are logged, never leaked to the client.
pub(crate) fn port_error(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        PortError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        PortError::Storage(msg) => {
            error!("Storage error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

/// Loads the calling user and rejects the request unless they are an admin.
pub(crate) async fn require_admin(
    state: &Arc<AppState>,
    user_id: Uuid,
) -> Result<User, (StatusCode, String)> {
    let user = state.db.get_user(user_id).await.map_err(port_error)?;
    if !user.is_admin {
        return Err((StatusCode::FORBIDDEN, "Admin access required".to_string()));
    }
    Ok(user)
}

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// GET /api/health - Liveness probe.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_errors_map_to_their_status_codes() {
        let (status, _) = port_error(PortError::NotFound("user".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = port_error(PortError::Validation("bad delta".to_string()));
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // A registration racing past the duplicate pre-check hits the unique
        // constraint and must come back as a conflict, not a server error.
        let (status, msg) = port_error(PortError::Conflict("username taken".to_string()));
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(msg, "username taken");
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let (status, msg) = port_error(PortError::Storage(
            "connection to 10.0.0.3:5432 refused".to_string(),
        ));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!msg.contains("10.0.0.3"));
    }
}
