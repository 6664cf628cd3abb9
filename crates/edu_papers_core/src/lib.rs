pub mod domain;
pub mod ports;
pub mod progression;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_util;

pub use domain::{
    ActionType, Badge, LevelDefinition, OfflineAction, Paper, PaperStatus, Quiz, QuizAttempt,
    QuizQuestion, SubmittedAction, User, UserCredentials,
};
pub use ports::{DatabaseService, PortError, PortResult};
pub use progression::{award_xp, AwardOutcome, ProgressionService};
pub use sync::{SyncReplayer, SyncReport};
