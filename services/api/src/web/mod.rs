pub mod ai;
pub mod auth;
pub mod middleware;
pub mod offline;
pub mod papers;
pub mod quizzes;
pub mod rest;
pub mod state;
pub mod users;

pub use middleware::require_auth;
pub use rest::ApiDoc;
