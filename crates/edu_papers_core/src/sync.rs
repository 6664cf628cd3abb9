//! crates/edu_papers_core/src/sync.rs
//!
//! The offline action replayer. A client submits the ordered batch of
//! actions it queued while disconnected; each is replayed strictly
//! sequentially against storage and reported as synced or failed
//! independently, so one bad action never aborts the batch. XP grants route
//! through the progression engine, and the client-generated action id is
//! checked against the audit store so a retried batch is never reapplied.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    ActionType, NewPaper, NewQuizAttempt, OfflineAction, PaperStatus, SubmittedAction, User,
};
use crate::ports::{DatabaseService, PortError, PortResult};
use crate::progression::ProgressionService;

//=========================================================================================
// Report Types
//=========================================================================================

/// Terminal state of one replayed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    /// The action id was already in the audit store; nothing was reapplied.
    AlreadySynced,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedAction {
    pub action_id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub status: SyncStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedAction {
    pub action_id: Uuid,
    #[serde(rename = "type")]
    pub kind: ActionType,
    pub error: String,
}

/// Per-batch report: every submitted action lands in exactly one list.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub synced_count: usize,
    pub failed_count: usize,
    pub synced_actions: Vec<SyncedAction>,
    pub failed_actions: Vec<FailedAction>,
}

//=========================================================================================
// Action Payloads
//=========================================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuizAttemptPayload {
    quiz_id: Uuid,
    score: i32,
    total_questions: i32,
    answers: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaperUploadPayload {
    title: String,
    subject: String,
    level: String,
    year: String,
    content_type: String,
    file_type: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct XpUpdatePayload {
    xp_earned: i64,
}

//=========================================================================================
// The Replayer
//=========================================================================================

pub struct SyncReplayer {
    db: Arc<dyn DatabaseService>,
    progression: Arc<ProgressionService>,
}

impl SyncReplayer {
    pub fn new(db: Arc<dyn DatabaseService>, progression: Arc<ProgressionService>) -> Self {
        Self { db, progression }
    }

    /// Replays a batch of offline actions for one user.
    ///
    /// Fails with `NotFound` before touching anything when the user does not
    /// exist. Actions are applied in submission order, never concurrently:
    /// later actions may depend on state changed by earlier ones (two
    /// `xp_update` grants in one batch must compound).
    pub async fn replay(
        &self,
        user_id: Uuid,
        actions: &[SubmittedAction],
    ) -> PortResult<SyncReport> {
        let user = self.db.get_user(user_id).await?;

        let mut synced_actions = Vec::new();
        let mut failed_actions = Vec::new();

        for action in actions {
            match self.apply_action(&user, action).await {
                Ok(status) => synced_actions.push(SyncedAction {
                    action_id: action.action_id,
                    kind: action.kind,
                    status,
                }),
                Err(e) => failed_actions.push(FailedAction {
                    action_id: action.action_id,
                    kind: action.kind,
                    error: e.to_string(),
                }),
            }
        }

        Ok(SyncReport {
            synced_count: synced_actions.len(),
            failed_count: failed_actions.len(),
            synced_actions,
            failed_actions,
        })
    }

    /// Applies one action: dedupe check, audit record, dispatched effect.
    /// The audit row and the effect are committed as one storage unit by the
    /// adapter, so a failed effect leaves no orphan audit entry.
    async fn apply_action(
        &self,
        user: &User,
        action: &SubmittedAction,
    ) -> PortResult<SyncStatus> {
        if self.db.offline_action_exists(action.action_id).await? {
            return Ok(SyncStatus::AlreadySynced);
        }

        let now = Utc::now();
        let record = OfflineAction {
            action_id: action.action_id,
            user_id: user.id,
            kind: action.kind,
            data: action.data.clone(),
            timestamp: action.timestamp.unwrap_or(now),
            synced: true,
            synced_at: Some(now),
        };

        match action.kind {
            ActionType::QuizAttempt => {
                let payload: QuizAttemptPayload = parse_payload(&action.data)?;
                let attempt = NewQuizAttempt {
                    user_id: user.id,
                    quiz_id: payload.quiz_id,
                    score: payload.score,
                    total_questions: payload.total_questions,
                    answers: payload.answers,
                    // The action's own timestamp is audit-only; the recorded
                    // completion time is the server's.
                    completed_at: now,
                };
                self.db.sync_quiz_attempt(&record, attempt).await?;
            }
            ActionType::PaperUpload => {
                let payload: PaperUploadPayload = parse_payload(&action.data)?;
                let paper = NewPaper {
                    title: payload.title,
                    subject: payload.subject,
                    level: payload.level,
                    year: payload.year,
                    uploader_id: user.id,
                    uploader_name: user.username.clone(),
                    content_type: payload.content_type,
                    // Offline uploads always land in review, whatever the
                    // payload claims.
                    status: PaperStatus::Pending,
                    file_type: payload.file_type,
                    description: payload.description,
                    tags: payload.tags,
                };
                self.db.sync_paper_upload(&record, paper).await?;
            }
            ActionType::XpUpdate => {
                let payload: XpUpdatePayload = parse_payload(&action.data)?;
                self.progression
                    .award_xp_recorded(user.id, payload.xp_earned, &record)
                    .await?;
            }
        }

        Ok(SyncStatus::Synced)
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(data: &serde_json::Value) -> PortResult<T> {
    serde_json::from_value(data.clone())
        .map_err(|e| PortError::Validation(format!("Malformed action payload: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Badge, LevelDefinition};
    use crate::test_util::MockDb;
    use serde_json::json;

    fn ladder() -> Vec<LevelDefinition> {
        vec![
            LevelDefinition {
                level: 2,
                required_xp: 100,
                badge_name: "Bronze".to_string(),
                badge_icon: None,
                badge_description: None,
            },
            LevelDefinition {
                level: 3,
                required_xp: 250,
                badge_name: "Silver".to_string(),
                badge_icon: None,
                badge_description: None,
            },
        ]
    }

    fn replayer_with(db: Arc<MockDb>) -> SyncReplayer {
        let progression = Arc::new(ProgressionService::new(db.clone()));
        SyncReplayer::new(db, progression)
    }

    fn quiz_action(quiz_id: Uuid) -> SubmittedAction {
        SubmittedAction {
            action_id: Uuid::new_v4(),
            kind: ActionType::QuizAttempt,
            data: json!({
                "quizId": quiz_id,
                "score": 7,
                "totalQuestions": 10,
                "answers": [0, 1, 2],
            }),
            timestamp: None,
        }
    }

    fn paper_action() -> SubmittedAction {
        SubmittedAction {
            action_id: Uuid::new_v4(),
            kind: ActionType::PaperUpload,
            data: json!({
                "title": "Linear Algebra Midterm 2024",
                "subject": "Mathematics",
                "level": "level2",
                "year": "2024",
                "contentType": "pastPaper",
                "fileType": "PDF",
                "status": "approved",
            }),
            timestamp: None,
        }
    }

    fn xp_action(xp: i64) -> SubmittedAction {
        SubmittedAction {
            action_id: Uuid::new_v4(),
            kind: ActionType::XpUpdate,
            data: json!({ "xpEarned": xp }),
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn unknown_user_aborts_the_whole_batch() {
        let db = Arc::new(MockDb::new(ladder()));
        let replayer = replayer_with(db.clone());

        let result = replayer
            .replay(Uuid::new_v4(), &[xp_action(50)])
            .await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
        assert!(db.recorded_actions().is_empty());
    }

    #[tokio::test]
    async fn failed_action_does_not_abort_the_batch() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 0, vec![]);
        let replayer = replayer_with(db.clone());

        let bad_xp = SubmittedAction {
            action_id: Uuid::new_v4(),
            kind: ActionType::XpUpdate,
            // No xpEarned field: payload parse fails.
            data: json!({ "quizId": null }),
            timestamp: None,
        };
        let actions = [quiz_action(Uuid::new_v4()), bad_xp, paper_action()];

        let report = replayer.replay(user_id, &actions).await.unwrap();
        assert_eq!(report.synced_count, 2);
        assert_eq!(report.failed_count, 1);
        assert_eq!(report.synced_actions[0].action_id, actions[0].action_id);
        assert_eq!(report.synced_actions[1].action_id, actions[2].action_id);
        assert_eq!(report.failed_actions[0].action_id, actions[1].action_id);
        assert_eq!(report.failed_actions[0].kind, ActionType::XpUpdate);
    }

    #[tokio::test]
    async fn storage_failure_is_reported_and_leaves_no_audit_row() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 0, vec![]);
        let poisoned_quiz = Uuid::new_v4();
        db.fail_quiz_sync_for(poisoned_quiz);
        let replayer = replayer_with(db.clone());

        let actions = [quiz_action(poisoned_quiz), paper_action()];
        let report = replayer.replay(user_id, &actions).await.unwrap();

        assert_eq!(report.failed_count, 1);
        assert_eq!(report.synced_count, 1);
        // Audit row and effect commit together: the failed quiz action must
        // not appear in the audit store.
        let recorded = db.recorded_actions();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].action_id, actions[1].action_id);
    }

    #[tokio::test]
    async fn sequential_xp_updates_compound() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 0, vec![]);
        let replayer = replayer_with(db.clone());

        let report = replayer
            .replay(user_id, &[xp_action(50), xp_action(50)])
            .await
            .unwrap();
        assert_eq!(report.synced_count, 2);

        let user = db.user(user_id);
        assert_eq!(user.current_xp, 100);
        // 100 XP crosses the level-2 threshold on the second grant.
        assert_eq!(user.level, 2);
        assert_eq!(user.badges.len(), 1);
        assert_eq!(user.badges[0].name, "Bronze");
    }

    #[tokio::test]
    async fn offline_xp_grants_run_through_the_level_ladder() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 90, vec![]);
        let replayer = replayer_with(db.clone());

        let report = replayer.replay(user_id, &[xp_action(20)]).await.unwrap();
        assert_eq!(report.synced_count, 1);

        let user = db.user(user_id);
        assert_eq!(user.current_xp, 110);
        assert_eq!(user.level, 2);
        assert_eq!(user.badges[0].name, "Bronze");
    }

    #[tokio::test]
    async fn duplicate_action_ids_are_not_reapplied() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 0, vec![]);
        let replayer = replayer_with(db.clone());

        let grant = xp_action(50);
        let first = replayer.replay(user_id, &[grant.clone()]).await.unwrap();
        assert_eq!(first.synced_actions[0].status, SyncStatus::Synced);

        // Client retry after a network blip: same batch again.
        let second = replayer.replay(user_id, &[grant]).await.unwrap();
        assert_eq!(second.synced_count, 1);
        assert_eq!(second.synced_actions[0].status, SyncStatus::AlreadySynced);

        assert_eq!(db.user(user_id).current_xp, 50);
        assert_eq!(db.recorded_actions().len(), 1);
    }

    #[tokio::test]
    async fn offline_paper_uploads_are_forced_to_pending() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 0, vec![]);
        let replayer = replayer_with(db.clone());

        let report = replayer.replay(user_id, &[paper_action()]).await.unwrap();
        assert_eq!(report.synced_count, 1);

        let papers = db.papers();
        assert_eq!(papers.len(), 1);
        // The payload claimed "approved"; the replayer ignores that.
        assert_eq!(papers[0].status, PaperStatus::Pending);
        assert_eq!(papers[0].uploader_name, "amina");
    }

    #[tokio::test]
    async fn admin_xp_actions_sync_without_mutating_progression() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_admin("prof");
        let replayer = replayer_with(db.clone());

        let report = replayer.replay(user_id, &[xp_action(500)]).await.unwrap();
        assert_eq!(report.synced_count, 1);

        let user = db.user(user_id);
        assert_eq!(user.current_xp, 0);
        assert_eq!(user.level, 1);
        // The action is still audited.
        assert_eq!(db.recorded_actions().len(), 1);
    }

    #[tokio::test]
    async fn award_service_persists_engine_outcome() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 0, vec![]);
        let progression = ProgressionService::new(db.clone());

        let outcome = progression.award_xp(user_id, 300).await.unwrap();
        assert_eq!(outcome.new_level, 2);
        assert_eq!(outcome.badge_awarded.as_deref(), Some("Bronze"));

        let user = db.user(user_id);
        assert_eq!(user.current_xp, 300);
        assert_eq!(user.level, 2);

        // Zero-delta follow-up picks up the Silver threshold.
        let second = progression.award_xp(user_id, 0).await.unwrap();
        assert_eq!(second.new_level, 3);
        assert_eq!(second.badge_awarded.as_deref(), Some("Silver"));
        assert_eq!(db.user(user_id).level, 3);
    }

    #[tokio::test]
    async fn award_storage_failure_surfaces_to_the_caller() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 0, vec![]);
        db.fail_progression_for(user_id);
        let progression = ProgressionService::new(db.clone());

        // A grant whose persistence fails must propagate, not vanish into
        // the logs while the caller sees success.
        let result = progression.award_xp(user_id, 100).await;
        assert!(matches!(result, Err(PortError::Storage(_))));
        assert_eq!(db.user(user_id).current_xp, 0);
    }

    #[tokio::test]
    async fn award_service_rejects_negative_deltas() {
        let db = Arc::new(MockDb::new(ladder()));
        let user_id = db.add_student("amina", 1, 0, vec![]);
        let progression = ProgressionService::new(db.clone());

        let result = progression.award_xp(user_id, -10).await;
        assert!(matches!(result, Err(PortError::Validation(_))));
        assert_eq!(db.user(user_id).current_xp, 0);
    }

    #[tokio::test]
    async fn held_badges_survive_further_awards() {
        let db = Arc::new(MockDb::new(ladder()));
        let bronze = Badge {
            name: "Bronze".to_string(),
            icon: None,
            description: None,
            earned_at: Utc::now(),
        };
        let user_id = db.add_student("amina", 2, 120, vec![bronze]);
        let progression = ProgressionService::new(db.clone());

        let outcome = progression.award_xp(user_id, 200).await.unwrap();
        assert_eq!(outcome.new_level, 3);
        let user = db.user(user_id);
        let names: Vec<&str> = user.badges.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["Bronze", "Silver"]);
    }
}
