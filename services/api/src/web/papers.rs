//! services/api/src/web/papers.rs
//!
//! Paper listing, upload, download counting, and the admin review flow.
//! Approving a paper is one of the two XP call sites: the uploader receives
//! a flat 100 XP through the shared award service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use edu_papers_core::domain::{NewPaper, Paper, PaperStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::{port_error, require_admin};
use crate::web::state::AppState;

/// XP granted to the uploader when an admin approves a paper.
const APPROVAL_XP: i64 = 100;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaperResponse {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub year: String,
    pub uploader_id: Uuid,
    pub uploader_name: String,
    pub content_type: String,
    #[schema(value_type = String)]
    pub status: PaperStatus,
    pub file_type: String,
    pub upload_date: DateTime<Utc>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub download_count: i64,
    pub rejection_reason: Option<String>,
}

impl From<Paper> for PaperResponse {
    fn from(paper: Paper) -> Self {
        Self {
            id: paper.id,
            title: paper.title,
            subject: paper.subject,
            level: paper.level,
            year: paper.year,
            uploader_id: paper.uploader_id,
            uploader_name: paper.uploader_name,
            content_type: paper.content_type,
            status: paper.status,
            file_type: paper.file_type,
            upload_date: paper.upload_date,
            description: paper.description,
            tags: paper.tags,
            download_count: paper.download_count,
            rejection_reason: paper.rejection_reason,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaperRequest {
    pub title: String,
    pub subject: String,
    pub level: String,
    pub year: String,
    pub content_type: String,
    pub file_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub download_count: i64,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectRequest {
    pub reason: String,
}

fn to_responses(papers: Vec<Paper>) -> Vec<PaperResponse> {
    papers.into_iter().map(PaperResponse::from).collect()
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/papers - All approved papers, newest first.
#[utoipa::path(
    get,
    path = "/api/papers",
    responses(
        (status = 200, description = "Approved papers", body = [PaperResponse])
    )
)]
pub async fn list_papers_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let papers = state
        .db
        .list_papers(Some(PaperStatus::Approved))
        .await
        .map_err(port_error)?;
    Ok(Json(to_responses(papers)))
}

/// GET /api/papers/pending - Papers awaiting review. Admin only.
#[utoipa::path(
    get,
    path = "/api/papers/pending",
    responses(
        (status = 200, description = "Pending papers", body = [PaperResponse]),
        (status = 403, description = "Admin access required")
    )
)]
pub async fn pending_papers_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id).await?;
    let papers = state
        .db
        .list_papers(Some(PaperStatus::Pending))
        .await
        .map_err(port_error)?;
    Ok(Json(to_responses(papers)))
}

/// GET /api/papers/{id} - A single paper by id.
#[utoipa::path(
    get,
    path = "/api/papers/{id}",
    params(("id" = Uuid, Path, description = "The paper's id")),
    responses(
        (status = 200, description = "The paper", body = PaperResponse),
        (status = 404, description = "Paper not found")
    )
)]
pub async fn get_paper_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let paper = state.db.get_paper(id).await.map_err(port_error)?;
    Ok(Json(PaperResponse::from(paper)))
}

/// GET /api/papers/user/{id} - All papers uploaded by one user.
#[utoipa::path(
    get,
    path = "/api/papers/user/{id}",
    params(("id" = Uuid, Path, description = "The uploader's user id")),
    responses(
        (status = 200, description = "The user's uploads", body = [PaperResponse])
    )
)]
pub async fn papers_by_user_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let papers = state
        .db
        .list_papers_by_uploader(id)
        .await
        .map_err(port_error)?;
    Ok(Json(to_responses(papers)))
}

/// POST /api/papers - Upload paper metadata. Lands in review regardless of
/// anything the client claims about status.
#[utoipa::path(
    post,
    path = "/api/papers",
    request_body = CreatePaperRequest,
    responses(
        (status = 201, description = "Paper created, pending review", body = PaperResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn create_paper_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<CreatePaperRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let uploader = state.db.get_user(user_id).await.map_err(port_error)?;

    let paper = state
        .db
        .create_paper(NewPaper {
            title: req.title,
            subject: req.subject,
            level: req.level,
            year: req.year,
            uploader_id: uploader.id,
            uploader_name: uploader.username,
            content_type: req.content_type,
            status: PaperStatus::Pending,
            file_type: req.file_type,
            description: req.description,
            tags: req.tags,
        })
        .await
        .map_err(port_error)?;

    Ok((StatusCode::CREATED, Json(PaperResponse::from(paper))))
}

/// POST /api/papers/{id}/download - Record a download.
#[utoipa::path(
    post,
    path = "/api/papers/{id}/download",
    params(("id" = Uuid, Path, description = "The paper's id")),
    responses(
        (status = 200, description = "New download count", body = DownloadResponse),
        (status = 404, description = "Paper not found")
    )
)]
pub async fn download_paper_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let download_count = state
        .db
        .increment_download_count(id)
        .await
        .map_err(port_error)?;
    Ok(Json(DownloadResponse { download_count }))
}

/// POST /api/papers/{id}/approve - Approve a pending paper. Admin only.
///
/// The uploader is awarded 100 XP through the shared award service, which
/// handles level-ups and badges.
#[utoipa::path(
    post,
    path = "/api/papers/{id}/approve",
    params(("id" = Uuid, Path, description = "The paper's id")),
    responses(
        (status = 200, description = "Paper approved", body = PaperResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Paper not found")
    )
)]
pub async fn approve_paper_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id).await?;

    let paper = state.db.get_paper(id).await.map_err(port_error)?;
    state
        .db
        .set_paper_status(paper.id, PaperStatus::Approved, None)
        .await
        .map_err(port_error)?;

    // The status write is already committed at this point; a failed grant
    // still surfaces to the caller as a server error.
    state
        .progression
        .award_xp(paper.uploader_id, APPROVAL_XP)
        .await
        .map_err(port_error)?;

    let paper = state.db.get_paper(id).await.map_err(port_error)?;
    Ok(Json(PaperResponse::from(paper)))
}

/// POST /api/papers/{id}/reject - Reject a pending paper with a reason.
/// Admin only.
#[utoipa::path(
    post,
    path = "/api/papers/{id}/reject",
    params(("id" = Uuid, Path, description = "The paper's id")),
    request_body = RejectRequest,
    responses(
        (status = 200, description = "Paper rejected", body = PaperResponse),
        (status = 403, description = "Admin access required"),
        (status = 404, description = "Paper not found")
    )
)]
pub async fn reject_paper_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    require_admin(&state, user_id).await?;

    let paper = state.db.get_paper(id).await.map_err(port_error)?;
    state
        .db
        .set_paper_status(paper.id, PaperStatus::Rejected, Some(&req.reason))
        .await
        .map_err(port_error)?;

    let paper = state.db.get_paper(id).await.map_err(port_error)?;
    Ok(Json(PaperResponse::from(paper)))
}
