//! Corpus construction: scan, decode, embed, normalize, insert.
//!
//! A file that cannot be read, decoded, or embedded is logged and skipped; it
//! never aborts the build.

use std::path::Path;
use std::sync::Arc;

use mm_core::{EmbeddingProvider, LibraryConfig};
use mm_vectordb::corpus::{load_cache, save_cache};
use mm_vectordb::{CorpusIndex, EmbeddingVector, ImageRecord};

use crate::error::{BuildFailure, CorpusBuildError, Result};
use crate::scan::{scan_library, LibraryFile};

/// Result of one build pass.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub index: CorpusIndex,
    /// Files embedded through the provider.
    pub embedded: usize,
    /// Files whose cached vector was reused.
    pub reused: usize,
    pub skipped: Vec<CorpusBuildError>,
}

pub struct CorpusBuilder {
    config: LibraryConfig,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl CorpusBuilder {
    pub fn new(config: LibraryConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { config, embedder }
    }

    /// Build a fresh index over the library directory.
    ///
    /// Records in `previous` (or, when `None`, in the configured cache file)
    /// whose file fingerprint is unchanged are reused without re-embedding.
    pub async fn build(&self, previous: Option<&CorpusIndex>) -> Result<BuildReport> {
        let files = scan_library(&self.config).await?;
        tracing::info!(dir = %self.config.path.display(), files = files.len(), "building image library index");

        let loaded;
        let reusable = match previous {
            Some(p) => Some(p),
            None => {
                loaded = self.load_cache();
                loaded.as_ref()
            }
        };

        let mut report = BuildReport {
            index: CorpusIndex::with_capacity(files.len()),
            ..BuildReport::default()
        };
        for file in &files {
            if let Some(record) = reusable.and_then(|idx| reusable_record(idx, file)) {
                if report.index.insert(record.clone()).is_ok() {
                    report.reused += 1;
                    continue;
                }
            }
            let outcome = match self.embed_file(file).await {
                Ok(record) => report.index.insert(record).map(|_| ()).map_err(BuildFailure::from),
                Err(reason) => Err(reason),
            };
            match outcome {
                Ok(()) => report.embedded += 1,
                Err(reason) => {
                    tracing::warn!(file = %file.identifier, error = %reason, "skipping library image");
                    report.skipped.push(CorpusBuildError {
                        identifier: file.identifier.clone(),
                        path: file.path.clone(),
                        reason,
                    });
                }
            }
        }

        if report.index.is_empty() {
            tracing::warn!(dir = %self.config.path.display(), "image library is empty");
        }
        tracing::info!(
            size = report.index.size(),
            embedded = report.embedded,
            reused = report.reused,
            skipped = report.skipped.len(),
            "image library index built"
        );
        self.store_cache(&report.index).await;
        Ok(report)
    }

    /// Read, decode-check, embed, and normalize one file.
    pub async fn embed_file(&self, file: &LibraryFile) -> std::result::Result<ImageRecord, BuildFailure> {
        let bytes = tokio::fs::read(&file.path).await?;
        let record = self.embed_bytes(&file.identifier, &file.path, bytes).await?;
        Ok(record.with_fingerprint(file.fingerprint))
    }

    /// Decode-check and embed in-memory image bytes.
    pub async fn embed_bytes(
        &self,
        identifier: &str,
        path: &Path,
        bytes: Vec<u8>,
    ) -> std::result::Result<ImageRecord, BuildFailure> {
        let bytes = ensure_decodable(bytes).await?;
        let raw = self.embedder.embed_image(&bytes).await?;
        let vector = EmbeddingVector::normalize(raw)?;
        Ok(ImageRecord::new(identifier, vector, path))
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    fn load_cache(&self) -> Option<CorpusIndex> {
        let path = self.config.cache_path.as_ref()?;
        if !path.exists() {
            return None;
        }
        match load_cache(path) {
            Ok(index) => {
                tracing::info!(path = %path.display(), records = index.size(), "loaded embedding cache");
                Some(index)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable embedding cache");
                None
            }
        }
    }

    /// Persist `index` to the configured cache file. Failures are logged only.
    pub async fn store_cache(&self, index: &CorpusIndex) {
        let Some(path) = self.config.cache_path.clone() else {
            return;
        };
        let snapshot = index.clone();
        let res = tokio::task::spawn_blocking(move || save_cache(&snapshot, &path).map(|_| path)).await;
        match res {
            Ok(Ok(path)) => tracing::debug!(path = %path.display(), "embedding cache updated"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to write embedding cache"),
            Err(e) => tracing::warn!(error = %e, "embedding cache writer panicked"),
        }
    }
}

/// Build an index over `directory`, keeping only files with `valid_extensions`.
pub async fn build_index(
    directory: &Path,
    valid_extensions: &[&str],
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<BuildReport> {
    let config = LibraryConfig {
        path: directory.to_path_buf(),
        extensions: valid_extensions.iter().map(|s| s.to_string()).collect(),
        cache_path: None,
        ..LibraryConfig::default()
    };
    CorpusBuilder::new(config, embedder).build(None).await
}

fn reusable_record<'a>(index: &'a CorpusIndex, file: &LibraryFile) -> Option<&'a ImageRecord> {
    index
        .get(&file.identifier)
        .filter(|r| r.fingerprint == file.fingerprint && r.source_path == file.path)
}

/// Full decode on the blocking pool; hands the bytes back on success.
pub(crate) async fn ensure_decodable(bytes: Vec<u8>) -> std::result::Result<Vec<u8>, BuildFailure> {
    tokio::task::spawn_blocking(move || match image::load_from_memory(&bytes) {
        Ok(_) => Ok(bytes),
        Err(e) => Err(BuildFailure::Decode(e.to_string())),
    })
    .await
    .map_err(|e| BuildFailure::Decode(format!("decoder task failed: {e}")))?
}
