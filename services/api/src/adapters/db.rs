//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete
//! implementation of the `DatabaseService` port from the `core` crate. It
//! handles all interactions with the PostgreSQL database using `sqlx`,
//! with a connection pool acquired once at startup and shared per call.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edu_papers_core::domain::{
    ActionType, LevelDefinition, Message, NewMessage, NewPaper, NewQuizAttempt, NewUser,
    OfflineAction, Paper, PaperStatus, ProgressionUpdate, Quiz, QuizAttempt, QuizQuestion, User,
    UserCredentials,
};
use edu_papers_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Inserts an offline-action audit row inside an open transaction.
    async fn insert_action_tx(
        tx: &mut Transaction<'_, Postgres>,
        action: &OfflineAction,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO offline_actions (action_id, user_id, action_type, action_data, timestamp, synced, synced_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(action.action_id)
        .bind(action.user_id)
        .bind(action.kind.as_str())
        .bind(&action.data)
        .bind(action.timestamp)
        .bind(action.synced)
        .bind(action.synced_at)
        .execute(&mut **tx)
        .await
        .map_err(storage)?;
        Ok(())
    }
}

fn storage(e: sqlx::Error) -> PortError {
    PortError::Storage(e.to_string())
}

fn not_found(msg: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(msg),
        _ => PortError::Storage(e.to_string()),
    }
}

fn badges_json(update: &ProgressionUpdate) -> PortResult<serde_json::Value> {
    serde_json::to_value(&update.badges)
        .map_err(|e| PortError::Storage(format!("Failed to encode badges: {e}")))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    username: String,
    email: String,
    is_admin: bool,
    level: i32,
    current_xp: i64,
    badges: serde_json::Value,
    settings: serde_json::Value,
    offline_mode: bool,
    join_date: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            is_admin: self.is_admin,
            level: self.level,
            current_xp: self.current_xp,
            badges: serde_json::from_value(self.badges).unwrap_or_default(),
            settings: self.settings,
            offline_mode: self.offline_mode,
            join_date: self.join_date,
        }
    }
}

const USER_COLUMNS: &str =
    "id, username, email, is_admin, level, current_xp, badges, settings, offline_mode, join_date";

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    username: String,
    email: String,
    password_hash: String,
    is_admin: bool,
}

impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.id,
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_admin: self.is_admin,
        }
    }
}

#[derive(FromRow)]
struct LevelRecord {
    level: i32,
    required_xp: i64,
    badge_name: String,
    badge_icon: Option<String>,
    badge_description: Option<String>,
}

impl LevelRecord {
    fn to_domain(self) -> LevelDefinition {
        LevelDefinition {
            level: self.level,
            required_xp: self.required_xp,
            badge_name: self.badge_name,
            badge_icon: self.badge_icon,
            badge_description: self.badge_description,
        }
    }
}

#[derive(FromRow)]
struct PaperRecord {
    id: Uuid,
    title: String,
    subject: String,
    level: String,
    year: String,
    uploader_id: Uuid,
    uploader_name: String,
    content_type: String,
    status: String,
    file_type: String,
    upload_date: DateTime<Utc>,
    description: Option<String>,
    tags: serde_json::Value,
    download_count: i64,
    rejection_reason: Option<String>,
}

impl PaperRecord {
    fn to_domain(self) -> Paper {
        Paper {
            id: self.id,
            title: self.title,
            subject: self.subject,
            level: self.level,
            year: self.year,
            uploader_id: self.uploader_id,
            uploader_name: self.uploader_name,
            content_type: self.content_type,
            status: PaperStatus::parse(&self.status).unwrap_or(PaperStatus::Pending),
            file_type: self.file_type,
            upload_date: self.upload_date,
            description: self.description,
            tags: serde_json::from_value(self.tags).unwrap_or_default(),
            download_count: self.download_count,
            rejection_reason: self.rejection_reason,
        }
    }
}

const PAPER_COLUMNS: &str = "id, title, subject, level, year, uploader_id, uploader_name, \
     content_type, status, file_type, upload_date, description, tags, download_count, rejection_reason";

#[derive(FromRow)]
struct QuizRecord {
    id: Uuid,
    title: String,
    description: Option<String>,
    difficulty: String,
    created_at: DateTime<Utc>,
}

impl QuizRecord {
    fn to_domain(self) -> Quiz {
        Quiz {
            id: self.id,
            title: self.title,
            description: self.description,
            difficulty: self.difficulty,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct QuestionRecord {
    id: Uuid,
    quiz_id: Uuid,
    question: String,
    options: serde_json::Value,
    correct_answer: i32,
    explanation: Option<String>,
    topic: Option<String>,
}

impl QuestionRecord {
    fn to_domain(self) -> QuizQuestion {
        QuizQuestion {
            id: self.id,
            quiz_id: self.quiz_id,
            question: self.question,
            options: serde_json::from_value(self.options).unwrap_or_default(),
            correct_answer: self.correct_answer,
            explanation: self.explanation,
            topic: self.topic,
        }
    }
}

#[derive(FromRow)]
struct AttemptRecord {
    id: Uuid,
    user_id: Uuid,
    quiz_id: Uuid,
    score: i32,
    total_questions: i32,
    answers: serde_json::Value,
    completed_at: DateTime<Utc>,
}

impl AttemptRecord {
    fn to_domain(self) -> QuizAttempt {
        QuizAttempt {
            id: self.id,
            user_id: self.user_id,
            quiz_id: self.quiz_id,
            score: self.score,
            total_questions: self.total_questions,
            answers: self.answers,
            completed_at: self.completed_at,
        }
    }
}

#[derive(FromRow)]
struct ActionRecord {
    action_id: Uuid,
    user_id: Uuid,
    action_type: String,
    action_data: serde_json::Value,
    timestamp: DateTime<Utc>,
    synced: bool,
    synced_at: Option<DateTime<Utc>>,
}

impl ActionRecord {
    fn to_domain(self) -> OfflineAction {
        OfflineAction {
            action_id: self.action_id,
            user_id: self.user_id,
            kind: ActionType::parse(&self.action_type).unwrap_or(ActionType::XpUpdate),
            data: self.action_data,
            timestamp: self.timestamp,
            synced: self.synced,
            synced_at: self.synced_at,
        }
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    user_id: Option<Uuid>,
    content: String,
    is_user: bool,
    timestamp: DateTime<Utc>,
}

impl MessageRecord {
    fn to_domain(self) -> Message {
        Message {
            id: self.id,
            user_id: self.user_id,
            content: self.content,
            is_user: self.is_user,
            timestamp: self.timestamp,
        }
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user(&self, user: NewUser) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "INSERT INTO users (id, username, email, password_hash, is_admin) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .fetch_one(&self.pool)
        .await
        // Concurrent registrations can slip past any pre-check; the unique
        // constraint is the authority on taken names.
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                PortError::Conflict("Username or email already taken".to_string())
            }
            _ => storage(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {id} not found")))?;
        Ok(record.to_domain())
    }

    async fn get_all_users(&self) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY join_date ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn find_credentials(&self, identifier: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, username, email, password_hash, is_admin FROM users \
             WHERE username = $1 OR email = $1",
        )
        .bind(identifier)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User {identifier} not found")))?;
        Ok(record.to_domain())
    }

    async fn update_settings(&self, id: Uuid, settings: serde_json::Value) -> PortResult<()> {
        sqlx::query("UPDATE users SET settings = $1 WHERE id = $2")
            .bind(settings)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn set_offline_mode(&self, id: Uuid, enabled: bool) -> PortResult<()> {
        sqlx::query("UPDATE users SET offline_mode = $1 WHERE id = $2")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn apply_progression(&self, id: Uuid, update: &ProgressionUpdate) -> PortResult<()> {
        sqlx::query("UPDATE users SET current_xp = $1, level = $2, badges = $3 WHERE id = $4")
            .bind(update.current_xp)
            .bind(update.level)
            .bind(badges_json(update)?)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Session {session_id} not found or expired")))?;
        Ok(user_id)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn log_login_attempt(
        &self,
        user_id: Option<Uuid>,
        identifier: &str,
        success: bool,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO login_logs (user_id, username_or_email, success) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(identifier)
        .bind(success)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn log_account_creation(&self, username: &str, email: &str) -> PortResult<()> {
        sqlx::query("INSERT INTO account_creation_logs (username, email) VALUES ($1, $2)")
            .bind(username)
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn get_level_definitions(&self) -> PortResult<Vec<LevelDefinition>> {
        let records = sqlx::query_as::<_, LevelRecord>(
            "SELECT level, required_xp, badge_name, badge_icon, badge_description \
             FROM user_levels ORDER BY level ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create_paper(&self, paper: NewPaper) -> PortResult<Paper> {
        let tags = serde_json::to_value(&paper.tags)
            .map_err(|e| PortError::Storage(format!("Failed to encode tags: {e}")))?;
        let record = sqlx::query_as::<_, PaperRecord>(&format!(
            "INSERT INTO papers (id, title, subject, level, year, uploader_id, uploader_name, \
             content_type, status, file_type, description, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {PAPER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&paper.title)
        .bind(&paper.subject)
        .bind(&paper.level)
        .bind(&paper.year)
        .bind(paper.uploader_id)
        .bind(&paper.uploader_name)
        .bind(&paper.content_type)
        .bind(paper.status.as_str())
        .bind(&paper.file_type)
        .bind(&paper.description)
        .bind(tags)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(record.to_domain())
    }

    async fn get_paper(&self, id: Uuid) -> PortResult<Paper> {
        let record = sqlx::query_as::<_, PaperRecord>(&format!(
            "SELECT {PAPER_COLUMNS} FROM papers WHERE id = $1"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Paper {id} not found")))?;
        Ok(record.to_domain())
    }

    async fn list_papers(&self, status: Option<PaperStatus>) -> PortResult<Vec<Paper>> {
        let records = match status {
            Some(status) => {
                sqlx::query_as::<_, PaperRecord>(&format!(
                    "SELECT {PAPER_COLUMNS} FROM papers WHERE status = $1 ORDER BY upload_date DESC"
                ))
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, PaperRecord>(&format!(
                    "SELECT {PAPER_COLUMNS} FROM papers ORDER BY upload_date DESC"
                ))
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_papers_by_uploader(&self, user_id: Uuid) -> PortResult<Vec<Paper>> {
        let records = sqlx::query_as::<_, PaperRecord>(&format!(
            "SELECT {PAPER_COLUMNS} FROM papers WHERE uploader_id = $1 ORDER BY upload_date DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn set_paper_status(
        &self,
        id: Uuid,
        status: PaperStatus,
        rejection_reason: Option<&str>,
    ) -> PortResult<()> {
        sqlx::query("UPDATE papers SET status = $1, rejection_reason = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(rejection_reason)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(())
    }

    async fn increment_download_count(&self, id: Uuid) -> PortResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "UPDATE papers SET download_count = download_count + 1 WHERE id = $1 \
             RETURNING download_count",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Paper {id} not found")))?;
        Ok(count)
    }

    async fn list_quizzes(&self) -> PortResult<Vec<Quiz>> {
        let records = sqlx::query_as::<_, QuizRecord>(
            "SELECT id, title, description, difficulty, created_at FROM quizzes \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_quiz(&self, id: Uuid) -> PortResult<Quiz> {
        let record = sqlx::query_as::<_, QuizRecord>(
            "SELECT id, title, description, difficulty, created_at FROM quizzes WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Quiz {id} not found")))?;
        Ok(record.to_domain())
    }

    async fn get_quiz_questions(&self, quiz_id: Uuid) -> PortResult<Vec<QuizQuestion>> {
        let records = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, quiz_id, question, options, correct_answer, explanation, topic \
             FROM quiz_questions WHERE quiz_id = $1 ORDER BY id ASC",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn insert_quiz_attempt(&self, attempt: NewQuizAttempt) -> PortResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO quiz_attempts (id, user_id, quiz_id, score, total_questions, answers, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(id)
        .bind(attempt.user_id)
        .bind(attempt.quiz_id)
        .bind(attempt.score)
        .bind(attempt.total_questions)
        .bind(&attempt.answers)
        .bind(attempt.completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(id)
    }

    async fn get_attempts_for_user(&self, user_id: Uuid) -> PortResult<Vec<QuizAttempt>> {
        let records = sqlx::query_as::<_, AttemptRecord>(
            "SELECT id, user_id, quiz_id, score, total_questions, answers, completed_at \
             FROM quiz_attempts WHERE user_id = $1 ORDER BY completed_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn offline_action_exists(&self, action_id: Uuid) -> PortResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM offline_actions WHERE action_id = $1)",
        )
        .bind(action_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(exists)
    }

    async fn record_synced_action(&self, action: &OfflineAction) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        Self::insert_action_tx(&mut tx, action).await?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn sync_quiz_attempt(
        &self,
        action: &OfflineAction,
        attempt: NewQuizAttempt,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        Self::insert_action_tx(&mut tx, action).await?;
        sqlx::query(
            "INSERT INTO quiz_attempts (id, user_id, quiz_id, score, total_questions, answers, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(attempt.user_id)
        .bind(attempt.quiz_id)
        .bind(attempt.score)
        .bind(attempt.total_questions)
        .bind(&attempt.answers)
        .bind(attempt.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn sync_paper_upload(&self, action: &OfflineAction, paper: NewPaper) -> PortResult<()> {
        let tags = serde_json::to_value(&paper.tags)
            .map_err(|e| PortError::Storage(format!("Failed to encode tags: {e}")))?;
        let mut tx = self.pool.begin().await.map_err(storage)?;
        Self::insert_action_tx(&mut tx, action).await?;
        sqlx::query(
            "INSERT INTO papers (id, title, subject, level, year, uploader_id, uploader_name, \
             content_type, status, file_type, description, tags) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(Uuid::new_v4())
        .bind(&paper.title)
        .bind(&paper.subject)
        .bind(&paper.level)
        .bind(&paper.year)
        .bind(paper.uploader_id)
        .bind(&paper.uploader_name)
        .bind(&paper.content_type)
        .bind(paper.status.as_str())
        .bind(&paper.file_type)
        .bind(&paper.description)
        .bind(tags)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn sync_xp_update(
        &self,
        action: &OfflineAction,
        update: &ProgressionUpdate,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;
        Self::insert_action_tx(&mut tx, action).await?;
        sqlx::query("UPDATE users SET current_xp = $1, level = $2, badges = $3 WHERE id = $4")
            .bind(update.current_xp)
            .bind(update.level)
            .bind(badges_json(update)?)
            .bind(action.user_id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn list_offline_actions(
        &self,
        user_id: Uuid,
        synced: Option<bool>,
    ) -> PortResult<Vec<OfflineAction>> {
        const ACTION_COLUMNS: &str =
            "action_id, user_id, action_type, action_data, timestamp, synced, synced_at";
        let records = match synced {
            Some(synced) => {
                sqlx::query_as::<_, ActionRecord>(&format!(
                    "SELECT {ACTION_COLUMNS} FROM offline_actions \
                     WHERE user_id = $1 AND synced = $2 ORDER BY timestamp DESC"
                ))
                .bind(user_id)
                .bind(synced)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, ActionRecord>(&format!(
                    "SELECT {ACTION_COLUMNS} FROM offline_actions \
                     WHERE user_id = $1 ORDER BY timestamp DESC"
                ))
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn count_pending_actions(&self, user_id: Uuid) -> PortResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM offline_actions WHERE user_id = $1 AND synced = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(count)
    }

    async fn last_synced_at(&self, user_id: Uuid) -> PortResult<Option<DateTime<Utc>>> {
        let last = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT MAX(synced_at) FROM offline_actions WHERE user_id = $1 AND synced = TRUE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(last)
    }

    async fn insert_message(&self, message: NewMessage) -> PortResult<Message> {
        let record = sqlx::query_as::<_, MessageRecord>(
            "INSERT INTO messages (id, user_id, content, is_user) VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, content, is_user, timestamp",
        )
        .bind(Uuid::new_v4())
        .bind(message.user_id)
        .bind(&message.content)
        .bind(message.is_user)
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;
        Ok(record.to_domain())
    }

    async fn list_messages(&self, user_id: Option<Uuid>) -> PortResult<Vec<Message>> {
        let records = match user_id {
            Some(user_id) => {
                sqlx::query_as::<_, MessageRecord>(
                    "SELECT id, user_id, content, is_user, timestamp FROM messages \
                     WHERE user_id = $1 ORDER BY timestamp ASC",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, MessageRecord>(
                    "SELECT id, user_id, content, is_user, timestamp FROM messages \
                     ORDER BY timestamp ASC",
                )
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(storage)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}
