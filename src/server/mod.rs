//! HTTP service for out-of-process workers and operators.
//!
//! Exposes the governance manager over JSON:
//! - `/rpc/*` for workers (register group, should crawl, report result)
//! - `/api/*` for monitoring (dashboard, logs, stats, snapshots) and flow control

mod handlers;
mod routes;

pub use handlers::{ApiError, RegisterGroupRequest, ShouldCrawlRequest};
pub use routes::create_router;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::governance::GovernanceManager;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub governor: Arc<GovernanceManager>,
    /// Root the snapshot endpoint is allowed to serve from.
    pub files_dir: PathBuf,
}

impl AppState {
    pub fn new(governor: Arc<GovernanceManager>) -> Self {
        let files_dir = governor.storage().base_path().to_path_buf();
        Self {
            governor,
            files_dir,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let governor = GovernanceManager::from_settings(settings)?;
        Ok(Self::new(Arc::new(governor)))
    }
}

/// Start the web server and run until Ctrl-C.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::from_settings(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
