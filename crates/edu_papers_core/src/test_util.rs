//! crates/edu_papers_core/src/test_util.rs
//!
//! An in-memory `DatabaseService` used by the progression and sync tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Badge, LevelDefinition, Message, NewMessage, NewPaper, NewQuizAttempt, NewUser, OfflineAction,
    Paper, PaperStatus, ProgressionUpdate, Quiz, QuizAttempt, QuizQuestion, User, UserCredentials,
};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Default)]
struct MockState {
    users: HashMap<Uuid, User>,
    attempts: Vec<NewQuizAttempt>,
    papers: Vec<NewPaper>,
    actions: Vec<OfflineAction>,
    fail_quiz_sync: HashSet<Uuid>,
    fail_progression: HashSet<Uuid>,
}

pub struct MockDb {
    levels: Vec<LevelDefinition>,
    state: Mutex<MockState>,
}

impl MockDb {
    pub fn new(levels: Vec<LevelDefinition>) -> Self {
        Self {
            levels,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn add_student(&self, username: &str, level: i32, xp: i64, badges: Vec<Badge>) -> Uuid {
        self.add_user(username, false, level, xp, badges)
    }

    pub fn add_admin(&self, username: &str) -> Uuid {
        self.add_user(username, true, 1, 0, Vec::new())
    }

    fn add_user(
        &self,
        username: &str,
        is_admin: bool,
        level: i32,
        xp: i64,
        badges: Vec<Badge>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        let user = User {
            id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            is_admin,
            level,
            current_xp: xp,
            badges,
            settings: serde_json::json!({}),
            offline_mode: false,
            join_date: Utc::now(),
        };
        self.state.lock().unwrap().users.insert(id, user);
        id
    }

    /// Makes `sync_quiz_attempt` fail with a storage error for this quiz id.
    pub fn fail_quiz_sync_for(&self, quiz_id: Uuid) {
        self.state.lock().unwrap().fail_quiz_sync.insert(quiz_id);
    }

    /// Makes `apply_progression` fail with a storage error for this user.
    pub fn fail_progression_for(&self, user_id: Uuid) {
        self.state.lock().unwrap().fail_progression.insert(user_id);
    }

    pub fn user(&self, id: Uuid) -> User {
        self.state.lock().unwrap().users[&id].clone()
    }

    pub fn recorded_actions(&self) -> Vec<OfflineAction> {
        self.state.lock().unwrap().actions.clone()
    }

    pub fn papers(&self) -> Vec<NewPaper> {
        self.state.lock().unwrap().papers.clone()
    }

    pub fn attempts(&self) -> Vec<NewQuizAttempt> {
        self.state.lock().unwrap().attempts.clone()
    }
}

#[async_trait]
impl DatabaseService for MockDb {
    async fn create_user(&self, _user: NewUser) -> PortResult<User> {
        unimplemented!("not exercised by core tests")
    }

    async fn get_user(&self, id: Uuid) -> PortResult<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {id} not found")))
    }

    async fn get_all_users(&self) -> PortResult<Vec<User>> {
        Ok(self.state.lock().unwrap().users.values().cloned().collect())
    }

    async fn find_credentials(&self, _identifier: &str) -> PortResult<UserCredentials> {
        unimplemented!("not exercised by core tests")
    }

    async fn update_settings(&self, _id: Uuid, _settings: serde_json::Value) -> PortResult<()> {
        unimplemented!("not exercised by core tests")
    }

    async fn set_offline_mode(&self, id: Uuid, enabled: bool) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound(format!("User {id} not found")))?;
        user.offline_mode = enabled;
        Ok(())
    }

    async fn apply_progression(&self, id: Uuid, update: &ProgressionUpdate) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_progression.contains(&id) {
            return Err(PortError::Storage(
                "Lost connection during progression write".to_string(),
            ));
        }
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| PortError::NotFound(format!("User {id} not found")))?;
        user.current_xp = update.current_xp;
        user.level = update.level;
        user.badges = update.badges.clone();
        Ok(())
    }

    async fn create_auth_session(
        &self,
        _session_id: &str,
        _user_id: Uuid,
        _expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        unimplemented!("not exercised by core tests")
    }

    async fn validate_auth_session(&self, _session_id: &str) -> PortResult<Uuid> {
        unimplemented!("not exercised by core tests")
    }

    async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
        unimplemented!("not exercised by core tests")
    }

    async fn log_login_attempt(
        &self,
        _user_id: Option<Uuid>,
        _identifier: &str,
        _success: bool,
    ) -> PortResult<()> {
        Ok(())
    }

    async fn log_account_creation(&self, _username: &str, _email: &str) -> PortResult<()> {
        Ok(())
    }

    async fn get_level_definitions(&self) -> PortResult<Vec<LevelDefinition>> {
        Ok(self.levels.clone())
    }

    async fn create_paper(&self, _paper: NewPaper) -> PortResult<Paper> {
        unimplemented!("not exercised by core tests")
    }

    async fn get_paper(&self, _id: Uuid) -> PortResult<Paper> {
        unimplemented!("not exercised by core tests")
    }

    async fn list_papers(&self, _status: Option<PaperStatus>) -> PortResult<Vec<Paper>> {
        unimplemented!("not exercised by core tests")
    }

    async fn list_papers_by_uploader(&self, _user_id: Uuid) -> PortResult<Vec<Paper>> {
        unimplemented!("not exercised by core tests")
    }

    async fn set_paper_status(
        &self,
        _id: Uuid,
        _status: PaperStatus,
        _rejection_reason: Option<&str>,
    ) -> PortResult<()> {
        unimplemented!("not exercised by core tests")
    }

    async fn increment_download_count(&self, _id: Uuid) -> PortResult<i64> {
        unimplemented!("not exercised by core tests")
    }

    async fn list_quizzes(&self) -> PortResult<Vec<Quiz>> {
        unimplemented!("not exercised by core tests")
    }

    async fn get_quiz(&self, _id: Uuid) -> PortResult<Quiz> {
        unimplemented!("not exercised by core tests")
    }

    async fn get_quiz_questions(&self, _quiz_id: Uuid) -> PortResult<Vec<QuizQuestion>> {
        unimplemented!("not exercised by core tests")
    }

    async fn insert_quiz_attempt(&self, attempt: NewQuizAttempt) -> PortResult<Uuid> {
        self.state.lock().unwrap().attempts.push(attempt);
        Ok(Uuid::new_v4())
    }

    async fn get_attempts_for_user(&self, _user_id: Uuid) -> PortResult<Vec<QuizAttempt>> {
        unimplemented!("not exercised by core tests")
    }

    async fn offline_action_exists(&self, action_id: Uuid) -> PortResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .actions
            .iter()
            .any(|a| a.action_id == action_id))
    }

    async fn record_synced_action(&self, action: &OfflineAction) -> PortResult<()> {
        self.state.lock().unwrap().actions.push(action.clone());
        Ok(())
    }

    async fn sync_quiz_attempt(
        &self,
        action: &OfflineAction,
        attempt: NewQuizAttempt,
    ) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_quiz_sync.contains(&attempt.quiz_id) {
            return Err(PortError::Storage(format!(
                "Quiz {} does not exist",
                attempt.quiz_id
            )));
        }
        state.actions.push(action.clone());
        state.attempts.push(attempt);
        Ok(())
    }

    async fn sync_paper_upload(&self, action: &OfflineAction, paper: NewPaper) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        state.actions.push(action.clone());
        state.papers.push(paper);
        Ok(())
    }

    async fn sync_xp_update(
        &self,
        action: &OfflineAction,
        update: &ProgressionUpdate,
    ) -> PortResult<()> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&action.user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", action.user_id)))?;
        user.current_xp = update.current_xp;
        user.level = update.level;
        user.badges = update.badges.clone();
        state.actions.push(action.clone());
        Ok(())
    }

    async fn list_offline_actions(
        &self,
        user_id: Uuid,
        synced: Option<bool>,
    ) -> PortResult<Vec<OfflineAction>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .actions
            .iter()
            .filter(|a| a.user_id == user_id && synced.map_or(true, |s| a.synced == s))
            .cloned()
            .collect())
    }

    async fn count_pending_actions(&self, user_id: Uuid) -> PortResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .actions
            .iter()
            .filter(|a| a.user_id == user_id && !a.synced)
            .count() as i64)
    }

    async fn last_synced_at(&self, user_id: Uuid) -> PortResult<Option<DateTime<Utc>>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .actions
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| a.synced_at)
            .max())
    }

    async fn insert_message(&self, _message: NewMessage) -> PortResult<Message> {
        unimplemented!("not exercised by core tests")
    }

    async fn list_messages(&self, _user_id: Option<Uuid>) -> PortResult<Vec<Message>> {
        unimplemented!("not exercised by core tests")
    }
}
