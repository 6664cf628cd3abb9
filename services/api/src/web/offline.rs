//! services/api/src/web/offline.rs
//!
//! Offline mode toggles, the sync replay endpoint, and the audit-log views.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use edu_papers_core::domain::{ActionType, OfflineAction, SubmittedAction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::port_error;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OfflineModeResponse {
    pub offline_mode: bool,
}

/// The ordered batch of actions queued on the client while disconnected.
#[derive(Deserialize, ToSchema)]
pub struct SyncRequest {
    #[schema(value_type = Vec<Object>)]
    pub actions: Vec<SubmittedAction>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusResponse {
    pub offline_mode: bool,
    pub pending_actions: i64,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct ActionsQuery {
    pub synced: Option<bool>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action_id: Uuid,
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub kind: ActionType,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub synced: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

impl From<OfflineAction> for ActionResponse {
    fn from(action: OfflineAction) -> Self {
        Self {
            action_id: action.action_id,
            kind: action.kind,
            data: action.data,
            timestamp: action.timestamp,
            synced: action.synced,
            synced_at: action.synced_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/offline/enable - Turn the caller's offline mode on.
#[utoipa::path(
    post,
    path = "/api/offline/enable",
    responses(
        (status = 200, description = "Offline mode enabled", body = OfflineModeResponse)
    )
)]
pub async fn enable_offline_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .set_offline_mode(user_id, true)
        .await
        .map_err(port_error)?;
    Ok(Json(OfflineModeResponse { offline_mode: true }))
}

/// POST /api/offline/disable - Turn the caller's offline mode off.
#[utoipa::path(
    post,
    path = "/api/offline/disable",
    responses(
        (status = 200, description = "Offline mode disabled", body = OfflineModeResponse)
    )
)]
pub async fn disable_offline_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    state
        .db
        .set_offline_mode(user_id, false)
        .await
        .map_err(port_error)?;
    Ok(Json(OfflineModeResponse {
        offline_mode: false,
    }))
}

/// POST /api/sync/offline-data - Replay a batch of queued offline actions.
///
/// Actions are applied strictly in submission order. The report lists every
/// action as either synced (including duplicates of already-replayed ids,
/// which are skipped) or failed with its error; one bad action never aborts
/// the batch.
#[utoipa::path(
    post,
    path = "/api/sync/offline-data",
    responses(
        (status = 200, description = "Per-action sync report"),
        (status = 404, description = "User not found")
    )
)]
pub async fn sync_offline_data_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SyncRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let report = state
        .replayer
        .replay(user_id, &req.actions)
        .await
        .map_err(port_error)?;
    Ok(Json(report))
}

/// GET /api/sync/status/{id} - Offline flag, pending action count, and the
/// time of the most recent successful sync.
#[utoipa::path(
    get,
    path = "/api/sync/status/{id}",
    params(("id" = Uuid, Path, description = "The user's id")),
    responses(
        (status = 200, description = "The user's sync status", body = SyncStatusResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn sync_status_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state.db.get_user(id).await.map_err(port_error)?;
    let pending_actions = state.db.count_pending_actions(id).await.map_err(port_error)?;
    let last_synced_at = state.db.last_synced_at(id).await.map_err(port_error)?;

    Ok(Json(SyncStatusResponse {
        offline_mode: user.offline_mode,
        pending_actions,
        last_synced_at,
    }))
}

/// GET /api/offline/actions/{id} - The audit log of a user's replayed
/// actions, newest first. `?synced=` filters by sync state.
#[utoipa::path(
    get,
    path = "/api/offline/actions/{id}",
    params(
        ("id" = Uuid, Path, description = "The user's id"),
        ("synced" = Option<bool>, Query, description = "Filter by sync state")
    ),
    responses(
        (status = 200, description = "The user's audit log", body = [ActionResponse])
    )
)]
pub async fn list_actions_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ActionsQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actions = state
        .db
        .list_offline_actions(id, query.synced)
        .await
        .map_err(port_error)?;
    let actions: Vec<ActionResponse> = actions.into_iter().map(ActionResponse::from).collect();
    Ok(Json(actions))
}
