//! services/api/src/web/ai.rs
//!
//! The stubbed study assistant. No model is called: replies are canned,
//! keyed on simple keyword matches, with live counts pulled from storage
//! where they make the reply more useful. Both sides of the exchange are
//! persisted to the transcript.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use edu_papers_core::domain::{Message, NewMessage, PaperStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::port_error;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.id,
            content: message.content,
            is_user: message.is_user,
            timestamp: message.timestamp,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub reply: MessageResponse,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/ai/chat - Send a message to the assistant and get the canned
/// reply.
#[utoipa::path(
    post,
    path = "/api/ai/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The assistant's reply", body = ChatResponse),
        (status = 400, description = "Empty message"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Message is empty".to_string()));
    }

    state
        .db
        .insert_message(NewMessage {
            user_id: Some(user_id),
            content: message.to_string(),
            is_user: true,
        })
        .await
        .map_err(port_error)?;

    let content = compose_reply(&state, user_id, message)
        .await
        .map_err(port_error)?;

    let reply = state
        .db
        .insert_message(NewMessage {
            user_id: Some(user_id),
            content,
            is_user: false,
        })
        .await
        .map_err(port_error)?;

    Ok(Json(ChatResponse {
        reply: MessageResponse::from(reply),
    }))
}

/// GET /api/ai/history - The caller's transcript, oldest first.
#[utoipa::path(
    get,
    path = "/api/ai/history",
    responses(
        (status = 200, description = "The chat transcript", body = [MessageResponse]),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn chat_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let messages = state
        .db
        .list_messages(Some(user_id))
        .await
        .map_err(port_error)?;
    let messages: Vec<MessageResponse> = messages.into_iter().map(MessageResponse::from).collect();
    Ok(Json(messages))
}

//=========================================================================================
// Canned Replies
//=========================================================================================

async fn compose_reply(
    state: &Arc<AppState>,
    user_id: Uuid,
    message: &str,
) -> Result<String, edu_papers_core::ports::PortError> {
    let lower = message.to_lowercase();

    if lower.contains("paper") || lower.contains("exam") {
        let papers = state.db.list_papers(Some(PaperStatus::Approved)).await?;
        return Ok(if papers.is_empty() {
            "There are no approved papers yet. Upload one and it will appear here once \
             an admin approves it."
                .to_string()
        } else {
            let titles: Vec<&str> = papers.iter().take(3).map(|p| p.title.as_str()).collect();
            format!(
                "There are {} approved papers available. Recent ones include: {}.",
                papers.len(),
                titles.join(", ")
            )
        });
    }

    if lower.contains("quiz") {
        let quizzes = state.db.list_quizzes().await?;
        return Ok(format!(
            "There are {} quizzes available. Each correct answer earns you 10 XP when \
             you submit your attempt.",
            quizzes.len()
        ));
    }

    if lower.contains("xp") || lower.contains("level") || lower.contains("badge") {
        let user = state.db.get_user(user_id).await?;
        return Ok(format!(
            "You are level {} with {} XP. Earn more by taking quizzes (10 XP per correct \
             answer) or uploading papers (100 XP on approval).",
            user.level, user.current_xp
        ));
    }

    if lower.contains("hello") || lower.contains("hi ") || lower == "hi" {
        return Ok(
            "Hello! I can help you find papers, take quizzes, and track your progress. \
             What are you studying today?"
                .to_string(),
        );
    }

    Ok(
        "I can help with past papers, quizzes, and your XP progress. Try asking about \
         papers for a subject, or how to earn your next badge."
            .to_string(),
    )
}
