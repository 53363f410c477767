//! Application state shared across all handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mm_library::RetrievalService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RetrievalService>,
    /// Used when a request omits `top_k`.
    pub default_top_k: usize,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: Arc<RetrievalService>) -> Self {
        let default_top_k = service.config().default_top_k;
        Self {
            service,
            default_top_k,
            started_at: Utc::now(),
        }
    }
}
