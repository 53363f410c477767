//! Text-to-image retrieval HTTP API server (Axum).
//!
//! Provides endpoints for text-to-image search, visual question answering,
//! library maintenance, and health monitoring.

pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use mm_library::RetrievalService;
use state::AppState;

/// Build the application router over `service`.
pub fn app(service: Arc<RetrievalService>) -> Router {
    app_with_state(AppState::new(service))
}

/// Build the application router with a custom state.
pub fn app_with_state(state: AppState) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::search_routes())
        .merge(routes::vqa_routes())
        .merge(routes::library_routes())
        .with_state(state)
}
