//! Admin-side HTTP server.
//!
//! One axum router over shared state: the single-slot sync queue, the
//! content manifest store, and the content root for file delivery. Kiosks
//! drive everything; the server never initiates a connection.

mod handlers;
mod manifest;

pub use manifest::ManifestStore;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tracing::info;

use kiosksync_coordinator::SyncQueue;

/// Errors produced by the server crate.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("inventory error: {0}")]
    Inventory(#[from] kiosksync_inventory::InventoryError),
}

/// Server configuration, filled from CLI flags.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// Directory whose contents are distributed to kiosks.
    pub content_root: PathBuf,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// State shared by all request handlers.
pub struct AppState {
    pub queue: SyncQueue,
    pub manifest: ManifestStore,
    pub content_root: PathBuf,
}

impl AppState {
    pub fn new(content_root: PathBuf) -> Self {
        Self {
            queue: SyncQueue::new(),
            manifest: ManifestStore::new(content_root.clone()),
            content_root,
        }
    }
}

/// Builds the admin server router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/request_sync", post(handlers::request_sync))
        .route("/sync_status", get(handlers::sync_status))
        .route("/finish_sync", post(handlers::finish_sync))
        .route("/sync_info", get(handlers::sync_info))
        .route("/request_files", post(handlers::request_files))
        .route("/download_file", post(handlers::download_file))
        .with_state(state)
}

/// Binds and serves until `shutdown` fires.
pub async fn run(config: ServerConfig, shutdown: CancellationToken) -> Result<(), ServerError> {
    let state = Arc::new(AppState::new(config.content_root.clone()));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(
        addr = %listener.local_addr()?,
        content_root = %config.content_root.display(),
        "admin server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("admin server stopped");
    Ok(())
}
