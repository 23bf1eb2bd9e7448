//! Router configuration for the governance service.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Worker RPC
        .route("/rpc/register_group", post(handlers::register_group))
        .route("/rpc/should_crawl", post(handlers::should_crawl))
        .route("/rpc/report_result", post(handlers::report_result))
        // Monitoring
        .route("/api/dashboard", get(handlers::dashboard))
        .route("/api/logs", get(handlers::logs))
        .route("/api/stats", get(handlers::stats))
        .route("/api/snapshot/:url_hash", get(handlers::get_snapshot))
        // Flow control
        .route("/api/control", get(handlers::get_control))
        .route("/api/control/pause", post(handlers::pause))
        .route("/api/control/resume", post(handlers::resume))
        .route("/api/control/immediate", post(handlers::immediate))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
