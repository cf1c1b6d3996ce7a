//! Newsboard - a small image + caption posting service
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Layer (Axum)                        │
//! │  - /api/posts JSON + multipart endpoints                    │
//! │  - Static front-end (public/) and uploads (/uploads)        │
//! │  - CORS, tracing, metrics                                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                            │
//! │  - Caption/image validation, create orchestration           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Data & Storage Layers                        │
//! │  - SQLite (sqlx) post records                               │
//! │  - Local upload directory                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: HTTP handlers and middleware
//! - `service`: Business logic layer
//! - `data`: Database layer
//! - `storage`: Upload store
//! - `config`: Configuration management
//! - `error`: Error types
//! - `metrics`: Prometheus instruments

pub mod api;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod service;
pub mod storage;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request; holds the shared database pool and upload store.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Database connection pool
    pub db: Arc<data::Database>,

    /// Local image store
    pub uploads: Arc<storage::UploadStore>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Create the upload directory
    /// 2. Connect to the database and run migrations
    /// 3. Ping the database
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        // 1. Upload store
        let uploads = storage::UploadStore::open(&config.storage.uploads_dir)?;
        tracing::info!(dir = %uploads.root().display(), "Upload store ready");

        // 2. Database
        let db = data::Database::connect(
            &config.database.url,
            config.database.max_connections,
            config.database.query_timeout(),
        )
        .await?;

        // 3. Connectivity check
        db.ping().await?;
        tracing::info!("Database reachable");

        Ok(Self {
            config: Arc::new(config),
            db: Arc::new(db),
            uploads: Arc::new(uploads),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::{Router, middleware};
    use tower_http::{services::ServeDir, trace::TraceLayer};

    let uploads = ServeDir::new(state.uploads.root());
    let public = ServeDir::new(&state.config.storage.public_dir);

    Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(api::posts_router())
        .merge(api::metrics_router())
        .nest_service("/uploads", uploads)
        .fallback_service(public)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(api::allow_any_origin))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
