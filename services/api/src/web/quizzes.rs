//! services/api/src/web/quizzes.rs
//!
//! Quiz listing, attempt grading, and reward submission. Submitting a graded
//! attempt is the second XP call site: ten XP per correct answer through the
//! shared award service.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use edu_papers_core::domain::{NewQuizAttempt, Quiz, QuizAttempt, QuizQuestion};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::rest::port_error;
use crate::web::state::AppState;

/// XP granted per correct answer on a submitted attempt.
const XP_PER_CORRECT_ANSWER: i64 = 10;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: String,
    pub created_at: DateTime<Utc>,
}

impl From<Quiz> for QuizResponse {
    fn from(quiz: Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title,
            description: quiz.description,
            difficulty: quiz.difficulty,
            created_at: quiz.created_at,
        }
    }
}

/// A question as served to quiz takers: the correct answer index and the
/// explanation stay server-side until the attempt is graded.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub topic: Option<String>,
}

impl From<QuizQuestion> for QuestionResponse {
    fn from(q: QuizQuestion) -> Self {
        Self {
            id: q.id,
            question: q.question,
            options: q.options,
            topic: q.topic,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizDetailResponse {
    #[serde(flatten)]
    pub quiz: QuizResponse,
    pub questions: Vec<QuestionResponse>,
}

/// Answer indices in question order. `-1` (or any out-of-range index) counts
/// as unanswered.
#[derive(Deserialize, ToSchema)]
pub struct AttemptRequest {
    pub answers: Vec<i32>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: Uuid,
    pub correct: bool,
    pub selected: i32,
    pub correct_answer: i32,
    pub explanation: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    pub attempt_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub results: Vec<QuestionResult>,
}

#[derive(Deserialize, ToSchema)]
pub struct SubmitAttemptRequest {
    pub score: i32,
}

/// The progression outcome of a reward submission, as exposed on the wire.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwardResponse {
    pub xp_earned: i64,
    pub new_xp: i64,
    pub new_level: i32,
    pub level_up: bool,
    pub badge: Option<String>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttemptResponse {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub completed_at: DateTime<Utc>,
}

impl From<QuizAttempt> for QuizAttemptResponse {
    fn from(attempt: QuizAttempt) -> Self {
        Self {
            id: attempt.id,
            quiz_id: attempt.quiz_id,
            score: attempt.score,
            total_questions: attempt.total_questions,
            completed_at: attempt.completed_at,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/quizzes - All available quizzes.
#[utoipa::path(
    get,
    path = "/api/quizzes",
    responses(
        (status = 200, description = "All quizzes", body = [QuizResponse])
    )
)]
pub async fn list_quizzes_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quizzes = state.db.list_quizzes().await.map_err(port_error)?;
    let quizzes: Vec<QuizResponse> = quizzes.into_iter().map(QuizResponse::from).collect();
    Ok(Json(quizzes))
}

/// GET /api/quizzes/{id} - A quiz with its questions, answers stripped.
#[utoipa::path(
    get,
    path = "/api/quizzes/{id}",
    params(("id" = Uuid, Path, description = "The quiz's id")),
    responses(
        (status = 200, description = "The quiz and its questions", body = QuizDetailResponse),
        (status = 404, description = "Quiz not found")
    )
)]
pub async fn get_quiz_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = state.db.get_quiz(id).await.map_err(port_error)?;
    let questions = state.db.get_quiz_questions(id).await.map_err(port_error)?;

    Ok(Json(QuizDetailResponse {
        quiz: QuizResponse::from(quiz),
        questions: questions.into_iter().map(QuestionResponse::from).collect(),
    }))
}

/// POST /api/quizzes/{id}/attempt - Grade a set of answers and persist the
/// attempt.
#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/attempt",
    params(("id" = Uuid, Path, description = "The quiz's id")),
    request_body = AttemptRequest,
    responses(
        (status = 200, description = "Graded attempt", body = AttemptResponse),
        (status = 400, description = "Wrong number of answers"),
        (status = 404, description = "Quiz not found")
    )
)]
pub async fn attempt_quiz_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttemptRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = state.db.get_quiz(id).await.map_err(port_error)?;
    let questions = state.db.get_quiz_questions(id).await.map_err(port_error)?;

    if req.answers.len() != questions.len() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Expected {} answers, got {}",
                questions.len(),
                req.answers.len()
            ),
        ));
    }

    let mut results = Vec::with_capacity(questions.len());
    let mut score = 0;
    for (question, &selected) in questions.iter().zip(&req.answers) {
        let correct = selected == question.correct_answer;
        if correct {
            score += 1;
        }
        results.push(QuestionResult {
            question_id: question.id,
            correct,
            selected,
            correct_answer: question.correct_answer,
            explanation: question.explanation.clone(),
        });
    }

    let answers = serde_json::to_value(&req.answers)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let attempt_id = state
        .db
        .insert_quiz_attempt(NewQuizAttempt {
            user_id,
            quiz_id: quiz.id,
            score,
            total_questions: questions.len() as i32,
            answers,
            completed_at: Utc::now(),
        })
        .await
        .map_err(port_error)?;

    Ok(Json(AttemptResponse {
        attempt_id,
        score,
        total_questions: questions.len() as i32,
        results,
    }))
}

/// POST /api/quizzes/{id}/attempt/submit - Claim the rewards for a graded
/// attempt: ten XP per correct answer.
#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/attempt/submit",
    params(("id" = Uuid, Path, description = "The quiz's id")),
    request_body = SubmitAttemptRequest,
    responses(
        (status = 200, description = "The progression outcome", body = AwardResponse),
        (status = 400, description = "Negative score"),
        (status = 404, description = "Quiz or user not found")
    )
)]
pub async fn submit_attempt_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // The quiz must still exist; rewards for deleted quizzes are not payable.
    state.db.get_quiz(id).await.map_err(port_error)?;

    let outcome = state
        .progression
        .award_xp(user_id, i64::from(req.score) * XP_PER_CORRECT_ANSWER)
        .await
        .map_err(port_error)?;

    Ok(Json(AwardResponse {
        xp_earned: outcome.xp_earned,
        new_xp: outcome.new_xp,
        new_level: outcome.new_level,
        level_up: outcome.level_up,
        badge: outcome.badge_awarded,
    }))
}

/// GET /api/quizzes/user/{id}/attempts - A user's attempt history, newest
/// first.
#[utoipa::path(
    get,
    path = "/api/quizzes/user/{id}/attempts",
    params(("id" = Uuid, Path, description = "The user's id")),
    responses(
        (status = 200, description = "The user's attempts", body = [QuizAttemptResponse])
    )
)]
pub async fn user_attempts_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let attempts = state.db.get_attempts_for_user(id).await.map_err(port_error)?;
    let attempts: Vec<QuizAttemptResponse> = attempts
        .into_iter()
        .map(QuizAttemptResponse::from)
        .collect();
    Ok(Json(attempts))
}
