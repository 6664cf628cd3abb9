//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use edu_papers_core::ports::DatabaseService;
use edu_papers_core::progression::ProgressionService;
use edu_papers_core::sync::SyncReplayer;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    /// The single shared call path for XP awards. Both online call sites
    /// (quiz submission, paper approval) and offline replay go through it.
    pub progression: Arc<ProgressionService>,
    pub replayer: Arc<SyncReplayer>,
}
