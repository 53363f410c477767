//! Deterministic embedder for local development and tests.
//!
//! Text is feature-hashed token by token; images are decoded, shrunk to a
//! 4x4 RGB thumbnail, and the 48 centered channel values are feature-hashed
//! into the same dimension. Similar images land near each other, but text and
//! image spaces are not aligned the way a trained model's are.

use async_trait::async_trait;
use mm_core::{EmbeddingProvider, MmError, Result};

const THUMB_SIDE: u32 = 4;

#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimension: usize,
}

impl HashEmbeddingProvider {
    pub fn new(dimension: usize) -> Self {
        Self { dimension: dimension.max(1) }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn bucket(&self, feature: &[u8]) -> (usize, f32) {
        let digest = md5::compute(feature);
        let idx = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]) % self.dimension as u64;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        (idx as usize, sign)
    }

    fn embed_tokens(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            let (idx, sign) = self.bucket(token.as_bytes());
            out[idx] += sign;
        }
        out
    }

    fn embed_pixels(&self, image: &[u8]) -> Result<Vec<f32>> {
        let decoded = image::load_from_memory(image)
            .map_err(|e| MmError::Embedding(format!("cannot decode image: {e}")))?;
        let thumb = image::imageops::thumbnail(&decoded.to_rgb8(), THUMB_SIDE, THUMB_SIDE);
        let mut out = vec![0f32; self.dimension];
        for (i, channel) in thumb.as_raw().iter().enumerate() {
            let (idx, sign) = self.bucket(&(i as u32).to_le_bytes());
            out[idx] += sign * (f32::from(*channel) / 255.0 - 0.5);
        }
        Ok(out)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let v = self.embed_tokens(text);
        if v.iter().all(|x| *x == 0.0) {
            return Err(MmError::Embedding("text has no indexable tokens".into()));
        }
        Ok(v)
    }

    async fn embed_image(&self, image: &[u8]) -> Result<Vec<f32>> {
        let this = self.clone();
        let bytes = image.to_vec();
        tokio::task::spawn_blocking(move || this.embed_pixels(&bytes))
            .await
            .map_err(|e| MmError::Other(anyhow::anyhow!("image embedding task failed: {e}")))?
    }
}
