//! Embedding and answer provider implementations.

mod hash;
mod http;

pub use hash::HashEmbeddingProvider;
pub use http::{HttpAnswerProvider, HttpEmbeddingProvider};

use std::sync::Arc;
use std::time::Duration;

use mm_core::{AnswerProvider, EmbeddingProvider, ProviderKind, Result, ServiceConfig};

/// Construct the embedding provider selected by `config`.
pub fn embedding_from_config(config: &ServiceConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let cfg = &config.embedding;
    Ok(match cfg.provider {
        ProviderKind::Http => Arc::new(HttpEmbeddingProvider::new(
            cfg.base_url.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )?),
        ProviderKind::Hash => Arc::new(HashEmbeddingProvider::new(cfg.dimension)),
    })
}

/// Construct the answer provider, if one is configured.
pub fn answer_from_config(config: &ServiceConfig) -> Result<Option<Arc<dyn AnswerProvider>>> {
    let Some(url) = config.answer.base_url.as_ref() else {
        return Ok(None);
    };
    let provider = HttpAnswerProvider::new(url.clone(), Duration::from_secs(config.answer.timeout_secs))?;
    Ok(Some(Arc::new(provider)))
}
