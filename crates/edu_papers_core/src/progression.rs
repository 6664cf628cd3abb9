//! crates/edu_papers_core/src/progression.rs
//!
//! The gamification progression engine: XP accrual, level-up detection and
//! badge issuance. `award_xp` is a pure function over a progression snapshot;
//! `ProgressionService` wraps it with storage access and a per-user
//! serialization point so concurrent awards for the same user cannot lose an
//! update. Both XP call sites (quiz submission, paper approval) and offline
//! `xp_update` replay route through here.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Badge, LevelDefinition, OfflineAction, ProgressionUpdate, User};
use crate::ports::{DatabaseService, PortError, PortResult};

/// The outcome of a single XP award.
#[derive(Debug, Clone)]
pub struct AwardOutcome {
    pub new_xp: i64,
    pub new_level: i32,
    pub level_up: bool,
    /// Name of a badge earned by this award, if one was newly granted.
    pub badge_awarded: Option<String>,
    /// Delta actually applied; zero for admins regardless of input.
    pub xp_earned: i64,
    /// The full badge set after the award, for persistence.
    pub badges: Vec<Badge>,
}

/// Applies a non-negative XP delta to a user's progression snapshot.
///
/// Admins never accrue XP, levels or badges; their snapshot is returned
/// unchanged with `xp_earned = 0`.
///
/// The level scan walks the ladder in ascending level order and stops at the
/// first definition whose level is above the user's current level and whose
/// threshold the new XP total meets. A single award therefore advances at
/// most one level, even when the delta crosses several thresholds; the next
/// threshold is picked up on the next evaluation. The badge named on the
/// selected rung is granted only if no badge with that name is already held.
pub fn award_xp(user: &User, levels: &[LevelDefinition], delta: i64) -> AwardOutcome {
    if user.is_admin {
        return AwardOutcome {
            new_xp: user.current_xp,
            new_level: user.level,
            level_up: false,
            badge_awarded: None,
            xp_earned: 0,
            badges: user.badges.clone(),
        };
    }

    let new_xp = user.current_xp + delta;

    // Deterministic regardless of the caller's ordering.
    let mut ladder: Vec<&LevelDefinition> = levels.iter().collect();
    ladder.sort_by_key(|def| def.level);

    for def in ladder {
        if def.level > user.level && def.required_xp <= new_xp {
            let mut badges = user.badges.clone();
            let mut badge_awarded = None;
            if !badges.iter().any(|b| b.name == def.badge_name) {
                badges.push(Badge {
                    name: def.badge_name.clone(),
                    icon: def.badge_icon.clone(),
                    description: def.badge_description.clone(),
                    earned_at: Utc::now(),
                });
                badge_awarded = Some(def.badge_name.clone());
            }
            return AwardOutcome {
                new_xp,
                new_level: def.level,
                level_up: true,
                badge_awarded,
                xp_earned: delta,
                badges,
            };
        }
    }

    AwardOutcome {
        new_xp,
        new_level: user.level,
        level_up: false,
        badge_awarded: None,
        xp_earned: delta,
        badges: user.badges.clone(),
    }
}

/// Storage-backed award service shared by every XP call site.
pub struct ProgressionService {
    db: Arc<dyn DatabaseService>,
    user_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ProgressionService {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self {
            db,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the serialization point for one user's read-modify-write.
    ///
    /// Entries with no in-flight award are evicted first; the map holds
    /// locks for awards currently running, not for every user ever awarded.
    async fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Awards `delta` XP to a user and persists the resulting snapshot.
    ///
    /// Fails with `NotFound` before any mutation when the user does not
    /// exist. Admin awards are a complete no-op on storage.
    pub async fn award_xp(&self, user_id: Uuid, delta: i64) -> PortResult<AwardOutcome> {
        if delta < 0 {
            return Err(PortError::Validation(format!(
                "XP delta must be non-negative, got {delta}"
            )));
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let user = self.db.get_user(user_id).await?;
        let levels = self.db.get_level_definitions().await?;
        let outcome = award_xp(&user, &levels, delta);

        if !user.is_admin {
            let update = ProgressionUpdate {
                current_xp: outcome.new_xp,
                level: outcome.new_level,
                badges: outcome.badges.clone(),
            };
            self.db.apply_progression(user_id, &update).await?;
        }

        Ok(outcome)
    }

    /// Same as [`award_xp`](Self::award_xp), but persists the snapshot
    /// together with an offline-action audit row in one atomic storage unit.
    /// Used by the sync replayer for `xp_update` actions.
    pub async fn award_xp_recorded(
        &self,
        user_id: Uuid,
        delta: i64,
        action: &OfflineAction,
    ) -> PortResult<AwardOutcome> {
        if delta < 0 {
            return Err(PortError::Validation(format!(
                "XP delta must be non-negative, got {delta}"
            )));
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let user = self.db.get_user(user_id).await?;
        let levels = self.db.get_level_definitions().await?;
        let outcome = award_xp(&user, &levels, delta);

        if user.is_admin {
            // Nothing to apply; still record the action for the audit trail.
            self.db.record_synced_action(action).await?;
        } else {
            let update = ProgressionUpdate {
                current_xp: outcome.new_xp,
                level: outcome.new_level,
                badges: outcome.badges.clone(),
            };
            self.db.sync_xp_update(action, &update).await?;
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn student(level: i32, xp: i64, badges: Vec<Badge>) -> User {
        User {
            id: Uuid::new_v4(),
            username: "student".to_string(),
            email: "student@example.com".to_string(),
            is_admin: false,
            level,
            current_xp: xp,
            badges,
            settings: serde_json::json!({}),
            offline_mode: false,
            join_date: Utc::now(),
        }
    }

    fn ladder() -> Vec<LevelDefinition> {
        vec![
            LevelDefinition {
                level: 2,
                required_xp: 100,
                badge_name: "Bronze".to_string(),
                badge_icon: Some("bronze.png".to_string()),
                badge_description: Some("Reached level 2".to_string()),
            },
            LevelDefinition {
                level: 3,
                required_xp: 250,
                badge_name: "Silver".to_string(),
                badge_icon: Some("silver.png".to_string()),
                badge_description: Some("Reached level 3".to_string()),
            },
        ]
    }

    #[test]
    fn xp_is_additive() {
        let user = student(1, 40, vec![]);
        let outcome = award_xp(&user, &ladder(), 35);
        assert_eq!(outcome.new_xp, 75);
        assert_eq!(outcome.xp_earned, 35);
        assert!(!outcome.level_up);
        assert_eq!(outcome.new_level, 1);
    }

    #[test]
    fn zero_delta_is_a_no_op_below_threshold() {
        let user = student(1, 40, vec![]);
        let outcome = award_xp(&user, &ladder(), 0);
        assert_eq!(outcome.new_xp, 40);
        assert!(!outcome.level_up);
    }

    #[test]
    fn admin_awards_are_inert() {
        let mut user = student(5, 900, vec![]);
        user.is_admin = true;
        let outcome = award_xp(&user, &ladder(), 1000);
        assert_eq!(outcome.new_xp, 900);
        assert_eq!(outcome.new_level, 5);
        assert_eq!(outcome.xp_earned, 0);
        assert!(!outcome.level_up);
        assert!(outcome.badge_awarded.is_none());
    }

    #[test]
    fn large_award_advances_a_single_level() {
        let user = student(1, 0, vec![]);
        let outcome = award_xp(&user, &ladder(), 300);
        assert_eq!(outcome.new_xp, 300);
        assert_eq!(outcome.new_level, 2);
        assert!(outcome.level_up);
        assert_eq!(outcome.badge_awarded.as_deref(), Some("Bronze"));
    }

    #[test]
    fn next_evaluation_picks_up_the_second_threshold() {
        let user = student(1, 0, vec![]);
        let first = award_xp(&user, &ladder(), 300);

        let advanced = student(first.new_level, first.new_xp, first.badges);
        let second = award_xp(&advanced, &ladder(), 0);
        assert_eq!(second.new_level, 3);
        assert!(second.level_up);
        assert_eq!(second.badge_awarded.as_deref(), Some("Silver"));
        assert_eq!(second.new_xp, 300);
    }

    #[test]
    fn badge_names_stay_unique() {
        let bronze = Badge {
            name: "Bronze".to_string(),
            icon: None,
            description: None,
            earned_at: Utc::now(),
        };
        // Already holds Bronze but is still level 1, so the level-2 rung
        // matches again.
        let user = student(1, 0, vec![bronze]);
        let outcome = award_xp(&user, &ladder(), 150);
        assert_eq!(outcome.new_level, 2);
        assert!(outcome.level_up);
        assert!(outcome.badge_awarded.is_none());
        assert_eq!(
            outcome.badges.iter().filter(|b| b.name == "Bronze").count(),
            1
        );
    }

    #[test]
    fn scan_order_is_independent_of_input_order() {
        let user = student(1, 0, vec![]);
        let mut reversed = ladder();
        reversed.reverse();
        let outcome = award_xp(&user, &reversed, 300);
        assert_eq!(outcome.new_level, 2);
        assert_eq!(outcome.badge_awarded.as_deref(), Some("Bronze"));
    }

    #[test]
    fn new_xp_is_monotone_in_delta() {
        let user = student(1, 10, vec![]);
        let mut last = -1;
        for delta in [0, 1, 5, 50, 500] {
            let outcome = award_xp(&user, &ladder(), delta);
            assert!(outcome.new_xp > last);
            last = outcome.new_xp;
        }
    }

    #[tokio::test]
    async fn completed_awards_do_not_accumulate_user_locks() {
        let db = Arc::new(crate::test_util::MockDb::new(ladder()));
        let service = ProgressionService::new(db.clone());

        for i in 0..16 {
            let user_id = db.add_student(&format!("student{i}"), 1, 0, vec![]);
            service.award_xp(user_id, 10).await.unwrap();
        }

        // Only the most recent acquisition can still be resident; every
        // earlier user's entry has no in-flight award and must be gone.
        let locks = service.user_locks.lock().await;
        assert!(locks.len() <= 1);
    }
}
