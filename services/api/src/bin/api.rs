//! services/api/src/bin/api.rs

use api_lib::{
    adapters::DbAdapter,
    config::Config,
    error::ApiError,
    web::{
        ai::{chat_handler, chat_history_handler},
        auth::{login_handler, logout_handler, register_handler},
        middleware::require_auth,
        offline::{
            disable_offline_handler, enable_offline_handler, list_actions_handler,
            sync_offline_data_handler, sync_status_handler,
        },
        papers::{
            approve_paper_handler, create_paper_handler, download_paper_handler,
            get_paper_handler, list_papers_handler, papers_by_user_handler,
            pending_papers_handler, reject_paper_handler,
        },
        quizzes::{
            attempt_quiz_handler, get_quiz_handler, list_quizzes_handler, submit_attempt_handler,
            user_attempts_handler,
        },
        rest::{health_handler, ApiDoc},
        state::AppState,
        users::{profile_handler, registered_users_handler, update_settings_handler},
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use edu_papers_core::progression::ProgressionService;
use edu_papers_core::sync::SyncReplayer;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            config.log_level.to_string(),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Build the Core Services ---
    let db: Arc<dyn edu_papers_core::ports::DatabaseService> = db_adapter;
    let progression = Arc::new(ProgressionService::new(db.clone()));
    let replayer = Arc::new(SyncReplayer::new(db.clone(), progression.clone()));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db,
        config: config.clone(),
        progression,
        replayer,
    });

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/logout", post(logout_handler))
        .route("/api/papers", get(list_papers_handler))
        .route("/api/papers/{id}", get(get_paper_handler))
        .route("/api/quizzes", get(list_quizzes_handler))
        .route("/api/quizzes/{id}", get(get_quiz_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/api/users/profile/{id}", get(profile_handler))
        .route("/api/users/registered", get(registered_users_handler))
        .route("/api/users/settings", put(update_settings_handler))
        .route("/api/papers", post(create_paper_handler))
        .route("/api/papers/pending", get(pending_papers_handler))
        .route("/api/papers/user/{id}", get(papers_by_user_handler))
        .route("/api/papers/{id}/download", post(download_paper_handler))
        .route("/api/papers/{id}/approve", post(approve_paper_handler))
        .route("/api/papers/{id}/reject", post(reject_paper_handler))
        .route("/api/quizzes/{id}/attempt", post(attempt_quiz_handler))
        .route(
            "/api/quizzes/{id}/attempt/submit",
            post(submit_attempt_handler),
        )
        .route("/api/quizzes/user/{id}/attempts", get(user_attempts_handler))
        .route("/api/offline/enable", post(enable_offline_handler))
        .route("/api/offline/disable", post(disable_offline_handler))
        .route("/api/offline/actions/{id}", get(list_actions_handler))
        .route("/api/sync/offline-data", post(sync_offline_data_handler))
        .route("/api/sync/status/{id}", get(sync_status_handler))
        .route("/api/ai/chat", post(chat_handler))
        .route("/api/ai/history", get(chat_history_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
