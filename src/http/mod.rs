//! HTTP API over the chunk store.

mod dto;
mod error;
mod handlers;

pub use dto::{
    ChunkQuery, ChunkRequest, ChunkResponse, DEFAULT_SEARCH_LIMIT, MAX_SEARCH_LIMIT,
    SearchRequest,
};
pub use error::ApiError;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::storage::ChunkRepository;

/// Shared state of every handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn ChunkRepository>,

    /// Embedding dimension accepted on writes and searches
    pub dimension: usize,
}

impl AppState {
    pub fn new(repo: Arc<dyn ChunkRepository>, dimension: usize) -> Self {
        Self { repo, dimension }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/chunks", post(handlers::create_chunk))
        .route("/chunks/search", post(handlers::search_chunks))
        .route("/chunks/{id}", get(handlers::get_chunk))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API on `bind` until `shutdown` is cancelled.
pub async fn serve(bind: &str, state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "http server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    tracing::info!("http server stopped");
    Ok(())
}
