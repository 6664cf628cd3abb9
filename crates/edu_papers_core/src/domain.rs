//! crates/edu_papers_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or web framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a registered user, including the mutable progression state
/// (XP, level, badges) that the gamification engine operates on.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub level: i32,
    pub current_xp: i64,
    pub badges: Vec<Badge>,
    pub settings: serde_json::Value,
    pub offline_mode: bool,
    pub join_date: DateTime<Utc>,
}

/// Fields required to create a new user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

// Only used internally for login - contains sensitive data.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// A named, one-time-earnable achievement tied to a level threshold.
///
/// Badges are keyed by `name`: a user holds at most one badge per name no
/// matter how often the qualifying level is re-evaluated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Badge {
    pub name: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub earned_at: DateTime<Utc>,
}

/// One rung of the level ladder: the XP threshold for a level and the badge
/// granted on reaching it. Reference data, owned by the `user_levels` table.
#[derive(Debug, Clone)]
pub struct LevelDefinition {
    pub level: i32,
    pub required_xp: i64,
    pub badge_name: String,
    pub badge_icon: Option<String>,
    pub badge_description: Option<String>,
}

/// The persisted result of an XP award: the full new progression snapshot
/// for a user row.
#[derive(Debug, Clone)]
pub struct ProgressionUpdate {
    pub current_xp: i64,
    pub level: i32,
    pub badges: Vec<Badge>,
}

/// Review state of an uploaded paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaperStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaperStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperStatus::Pending => "pending",
            PaperStatus::Approved => "approved",
            PaperStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaperStatus::Pending),
            "approved" => Some(PaperStatus::Approved),
            "rejected" => Some(PaperStatus::Rejected),
            _ => None,
        }
    }
}

/// An uploaded resource (past exam, notes, answer sheet).
#[derive(Debug, Clone)]
pub struct Paper {
    pub id: Uuid,
    pub title: String,
    pub subject: String,
    pub level: String,
    pub year: String,
    pub uploader_id: Uuid,
    pub uploader_name: String,
    pub content_type: String,
    pub status: PaperStatus,
    pub file_type: String,
    pub upload_date: DateTime<Utc>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub download_count: i64,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewPaper {
    pub title: String,
    pub subject: String,
    pub level: String,
    pub year: String,
    pub uploader_id: Uuid,
    pub uploader_name: String,
    pub content_type: String,
    pub status: PaperStatus,
    pub file_type: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct QuizQuestion {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: i32,
    pub explanation: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QuizAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub answers: serde_json::Value,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewQuizAttempt {
    pub user_id: Uuid,
    pub quiz_id: Uuid,
    pub score: i32,
    pub total_questions: i32,
    pub answers: serde_json::Value,
    pub completed_at: DateTime<Utc>,
}

/// Kind tag of a queued offline action. Drives the replay dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    QuizAttempt,
    PaperUpload,
    XpUpdate,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::QuizAttempt => "quiz_attempt",
            ActionType::PaperUpload => "paper_upload",
            ActionType::XpUpdate => "xp_update",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quiz_attempt" => Some(ActionType::QuizAttempt),
            "paper_upload" => Some(ActionType::PaperUpload),
            "xp_update" => Some(ActionType::XpUpdate),
            _ => None,
        }
    }
}

/// An action queued on the client while offline, as submitted in a sync
/// batch. The `action_id` is generated client-side and serves as the
/// idempotency key: a resubmitted batch never reapplies an id the audit
/// store has already seen.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedAction {
    pub action_id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub data: serde_json::Value,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// The audit-log record of a replayed offline action.
#[derive(Debug, Clone)]
pub struct OfflineAction {
    pub action_id: Uuid,
    pub user_id: Uuid,
    pub kind: ActionType,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub synced: bool,
    pub synced_at: Option<DateTime<Utc>>,
}

/// A single line of the AI assistant transcript.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub content: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub user_id: Option<Uuid>,
    pub content: String,
    pub is_user: bool,
}
