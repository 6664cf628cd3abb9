//! crates/edu_papers_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of the concrete storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    LevelDefinition, Message, NewMessage, NewPaper, NewQuizAttempt, NewUser, OfflineAction, Paper,
    PaperStatus, ProgressionUpdate, Quiz, QuizAttempt, QuizQuestion, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
///
/// `NotFound` on the target user aborts an award or a whole replay batch.
/// `Storage` failures inside a single offline action are recovered locally
/// into the batch report; everywhere else they propagate.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    /// A uniqueness rule was violated, e.g. a taken username or email.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Port
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- User Management ---
    async fn create_user(&self, user: NewUser) -> PortResult<User>;

    async fn get_user(&self, id: Uuid) -> PortResult<User>;

    async fn get_all_users(&self) -> PortResult<Vec<User>>;

    /// Looks up login credentials by username or email.
    async fn find_credentials(&self, identifier: &str) -> PortResult<UserCredentials>;

    async fn update_settings(&self, id: Uuid, settings: serde_json::Value) -> PortResult<()>;

    async fn set_offline_mode(&self, id: Uuid, enabled: bool) -> PortResult<()>;

    /// Persists the progression snapshot produced by an XP award.
    async fn apply_progression(&self, id: Uuid, update: &ProgressionUpdate) -> PortResult<()>;

    // --- Auth Sessions & Audit Logs ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    async fn log_login_attempt(
        &self,
        user_id: Option<Uuid>,
        identifier: &str,
        success: bool,
    ) -> PortResult<()>;

    async fn log_account_creation(&self, username: &str, email: &str) -> PortResult<()>;

    // --- Level Definitions ---
    /// Returns the full level ladder, ascending by level.
    async fn get_level_definitions(&self) -> PortResult<Vec<LevelDefinition>>;

    // --- Papers ---
    async fn create_paper(&self, paper: NewPaper) -> PortResult<Paper>;

    async fn get_paper(&self, id: Uuid) -> PortResult<Paper>;

    async fn list_papers(&self, status: Option<PaperStatus>) -> PortResult<Vec<Paper>>;

    async fn list_papers_by_uploader(&self, user_id: Uuid) -> PortResult<Vec<Paper>>;

    async fn set_paper_status(
        &self,
        id: Uuid,
        status: PaperStatus,
        rejection_reason: Option<&str>,
    ) -> PortResult<()>;

    /// Bumps the download counter and returns the new count.
    async fn increment_download_count(&self, id: Uuid) -> PortResult<i64>;

    // --- Quizzes ---
    async fn list_quizzes(&self) -> PortResult<Vec<Quiz>>;

    async fn get_quiz(&self, id: Uuid) -> PortResult<Quiz>;

    async fn get_quiz_questions(&self, quiz_id: Uuid) -> PortResult<Vec<QuizQuestion>>;

    async fn insert_quiz_attempt(&self, attempt: NewQuizAttempt) -> PortResult<Uuid>;

    async fn get_attempts_for_user(&self, user_id: Uuid) -> PortResult<Vec<QuizAttempt>>;

    // --- Offline Action Audit Store ---
    /// Dedupe check against the audit store, keyed on the client action id.
    async fn offline_action_exists(&self, action_id: Uuid) -> PortResult<bool>;

    /// Records an audit row with no accompanying effect (admin XP grants).
    async fn record_synced_action(&self, action: &OfflineAction) -> PortResult<()>;

    /// Writes the audit row and the quiz-attempt row as one atomic unit.
    async fn sync_quiz_attempt(
        &self,
        action: &OfflineAction,
        attempt: NewQuizAttempt,
    ) -> PortResult<()>;

    /// Writes the audit row and the paper row as one atomic unit.
    async fn sync_paper_upload(&self, action: &OfflineAction, paper: NewPaper) -> PortResult<()>;

    /// Writes the audit row and the progression snapshot as one atomic unit.
    async fn sync_xp_update(
        &self,
        action: &OfflineAction,
        update: &ProgressionUpdate,
    ) -> PortResult<()>;

    async fn list_offline_actions(
        &self,
        user_id: Uuid,
        synced: Option<bool>,
    ) -> PortResult<Vec<OfflineAction>>;

    async fn count_pending_actions(&self, user_id: Uuid) -> PortResult<i64>;

    async fn last_synced_at(&self, user_id: Uuid) -> PortResult<Option<DateTime<Utc>>>;

    // --- AI Chat Transcript ---
    async fn insert_message(&self, message: NewMessage) -> PortResult<Message>;

    async fn list_messages(&self, user_id: Option<Uuid>) -> PortResult<Vec<Message>>;
}
