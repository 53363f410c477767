//! Seams to the ML runtimes. The service never loads a model itself; it asks
//! these traits for raw vectors and answers.

use crate::error::Result;
use async_trait::async_trait;

/// Produces embeddings for text and encoded images.
///
/// Vectors must share one fixed dimensionality across calls. They do not have
/// to be normalized; callers normalize right after encoding.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short name reported by `/health`.
    fn name(&self) -> &str;

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// `image` is the encoded file content (JPEG, PNG, ...).
    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>>;
}

/// Answers a free-form question about an image.
#[async_trait]
pub trait AnswerProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn answer(&self, image: &[u8], question: &str) -> Result<String>;
}
