//! Loads the original file bytes for ranked hits.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use mm_vectordb::RankedHit;

use crate::error::MaterializeError;
use crate::scan::is_plain_file_name;

/// A ranked hit with its payload, or the reason the payload is unavailable.
#[derive(Debug)]
pub struct MaterializedHit {
    pub identifier: String,
    pub score: f32,
    pub payload: Result<Vec<u8>, MaterializeError>,
}

/// Reads image bytes from the corpus root, unmodified.
#[derive(Debug, Clone)]
pub struct Materializer {
    root: PathBuf,
}

impl Materializer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One output per input, same order. Failures stay per item.
    pub async fn materialize(&self, ranked: Vec<RankedHit>) -> Vec<MaterializedHit> {
        let mut out = Vec::with_capacity(ranked.len());
        for hit in ranked {
            let payload = self.load(&hit.identifier).await;
            out.push(MaterializedHit {
                identifier: hit.identifier,
                score: hit.score,
                payload,
            });
        }
        out
    }

    async fn load(&self, identifier: &str) -> Result<Vec<u8>, MaterializeError> {
        if !is_plain_file_name(identifier) {
            return Err(MaterializeError::InvalidIdentifier(identifier.to_string()));
        }
        let path = self.root.join(identifier);
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => MaterializeError::Missing {
                identifier: identifier.to_string(),
                path,
            },
            _ => MaterializeError::Unreadable {
                identifier: identifier.to_string(),
                source: e,
            },
        })
    }
}

/// Convenience wrapper over [`Materializer::materialize`].
pub async fn materialize(ranked: Vec<RankedHit>, corpus_root: &Path) -> Vec<MaterializedHit> {
    Materializer::new(corpus_root).materialize(ranked).await
}
