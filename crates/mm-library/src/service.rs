//! The retrieval service: owns the providers and the shared corpus, and is
//! handed to request handlers by reference.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use mm_core::{AnswerProvider, EmbeddingProvider, LibraryConfig};
use mm_vectordb::{EmbeddingVector, FileFingerprint, RetrievalEngine, SharedCorpus};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::builder::CorpusBuilder;
use crate::error::{BuildFailure, LibraryError, Result};
use crate::materialize::Materializer;
use crate::scan::is_plain_file_name;

/// One search result with the image's original bytes.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub identifier: String,
    pub score: f32,
    pub payload: Vec<u8>,
}

#[derive(Debug)]
pub enum SearchOutcome {
    /// The library has no images. Not an error; callers decide how to report it.
    EmptyCorpus,
    Hits(Vec<SearchHit>),
}

/// Counts from the latest rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub image_library_size: usize,
    pub embedded: usize,
    pub reused: usize,
    pub skipped: usize,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub image_library_size: usize,
    pub dimension: Option<usize>,
    pub embedding_provider: String,
    pub answer_provider: Option<String>,
    pub last_build: Option<BuildSummary>,
}

pub struct RetrievalService {
    builder: CorpusBuilder,
    embedder: Arc<dyn EmbeddingProvider>,
    answerer: Option<Arc<dyn AnswerProvider>>,
    engine: RetrievalEngine,
    materializer: Materializer,
    /// Serializes rebuilds and uploads; readers never take it.
    write_lock: Mutex<()>,
    last_build: RwLock<Option<BuildSummary>>,
}

impl RetrievalService {
    /// A service over an empty corpus. Call [`rebuild`](Self::rebuild) to index the library.
    pub fn new(config: LibraryConfig, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        let materializer = Materializer::new(config.path.clone());
        Self {
            builder: CorpusBuilder::new(config, Arc::clone(&embedder)),
            embedder,
            answerer: None,
            engine: RetrievalEngine::new(SharedCorpus::default()),
            materializer,
            write_lock: Mutex::new(()),
            last_build: RwLock::new(None),
        }
    }

    pub fn with_answerer(mut self, answerer: Arc<dyn AnswerProvider>) -> Self {
        self.answerer = Some(answerer);
        self
    }

    pub fn config(&self) -> &LibraryConfig {
        self.builder.config()
    }

    pub fn corpus(&self) -> &SharedCorpus {
        self.engine.corpus()
    }

    pub fn size(&self) -> usize {
        self.corpus().size()
    }

    /// Re-index the library and publish the new index in one swap. Unchanged
    /// files reuse their current vectors.
    pub async fn rebuild(&self) -> Result<BuildSummary> {
        let _guard = self.write_lock.lock().await;
        let current = self.corpus().snapshot();
        let previous = if current.is_empty() { None } else { Some(current.as_ref()) };
        let report = self.builder.build(previous).await?;

        let summary = BuildSummary {
            image_library_size: report.index.size(),
            embedded: report.embedded,
            reused: report.reused,
            skipped: report.skipped.len(),
            finished_at: Utc::now(),
        };
        self.corpus().replace(report.index);
        *self.last_build.write() = Some(summary.clone());
        Ok(summary)
    }

    /// Rank the library against `text_query` and load the top `top_k` images.
    ///
    /// Hits whose file disappeared since indexing are dropped with a warning.
    pub async fn search(&self, text_query: &str, top_k: usize) -> Result<SearchOutcome> {
        let query = text_query.trim();
        let k = self.validate_query(query, top_k)?;
        if self.size() == 0 {
            return Ok(SearchOutcome::EmptyCorpus);
        }

        let request_id = Uuid::new_v4();
        let started = Instant::now();
        let raw = self.embedder.embed_text(query).await?;
        let vector = EmbeddingVector::normalize(raw).map_err(|e| {
            LibraryError::Provider(mm_core::MmError::InvalidResponse(format!("query embedding: {e}")))
        })?;
        let ranked = self.engine.search(&vector, k)?;

        let mut hits = Vec::with_capacity(ranked.len());
        for item in self.materializer.materialize(ranked).await {
            match item.payload {
                Ok(payload) => hits.push(SearchHit {
                    identifier: item.identifier,
                    score: item.score,
                    payload,
                }),
                Err(e) => tracing::warn!(%request_id, error = %e, "dropping search hit"),
            }
        }
        tracing::info!(
            %request_id,
            query_chars = query.chars().count(),
            top_k,
            hits = hits.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "text-to-image search"
        );
        Ok(SearchOutcome::Hits(hits))
    }

    /// Answer `question` about `image`. Pure delegation to the answer provider.
    pub async fn describe_image(&self, image: &[u8], question: &str) -> Result<String> {
        let question = question.trim();
        if image.is_empty() {
            return Err(LibraryError::InvalidQuery("image is empty".into()));
        }
        if question.is_empty() {
            return Err(LibraryError::InvalidQuery("question is empty".into()));
        }
        let answerer = self
            .answerer
            .as_ref()
            .ok_or_else(|| LibraryError::Unavailable("no answer provider configured".into()))?;
        tracing::info!(question_chars = question.chars().count(), "image question");
        Ok(answerer.answer(image, question).await?)
    }

    /// Store an uploaded image in the library directory and index it.
    ///
    /// The file is written only after it decodes and embeds successfully. An
    /// existing file with the same name is replaced.
    pub async fn add_image(&self, file_name: &str, bytes: Vec<u8>) -> Result<usize> {
        if !is_plain_file_name(file_name) {
            return Err(LibraryError::InvalidUpload(format!("bad file name: {file_name:?}")));
        }
        let path = self.config().path.join(file_name);
        if !self.config().accepts(&path) {
            return Err(LibraryError::InvalidUpload(format!(
                "extension not allowed, expected one of {:?}",
                self.config().extensions
            )));
        }
        if bytes.is_empty() {
            return Err(LibraryError::InvalidUpload("file is empty".into()));
        }

        let _guard = self.write_lock.lock().await;
        let record = self
            .builder
            .embed_bytes(file_name, &path, bytes.clone())
            .await
            .map_err(|reason| match reason {
                BuildFailure::Embed(e) => LibraryError::Provider(e),
                other => LibraryError::InvalidUpload(other.to_string()),
            })?;
        if let Some(expected) = self.corpus().snapshot().dimension() {
            if record.vector.dimension() != expected {
                return Err(LibraryError::Index(mm_vectordb::VectorDbError::DimensionMismatch {
                    expected,
                    got: record.vector.dimension(),
                }));
            }
        }

        tokio::fs::create_dir_all(&self.config().path).await?;
        tokio::fs::write(&path, &bytes).await?;
        let meta = tokio::fs::metadata(&path).await?;
        let record = record.with_fingerprint(FileFingerprint::from_metadata(&meta));

        let size = self.corpus().update(|idx| {
            idx.insert(record)?;
            Ok(idx.size())
        })?;
        tracing::info!(file = %file_name, size, "added image to library");
        self.builder.store_cache(&self.corpus().snapshot()).await;
        Ok(size)
    }

    pub fn stats(&self) -> LibraryStats {
        let snapshot = self.corpus().snapshot();
        LibraryStats {
            image_library_size: snapshot.size(),
            dimension: snapshot.dimension(),
            embedding_provider: self.embedder.name().to_string(),
            answer_provider: self.answerer.as_ref().map(|a| a.name().to_string()),
            last_build: self.last_build.read().clone(),
        }
    }

    fn validate_query(&self, query: &str, top_k: usize) -> Result<NonZeroUsize> {
        let config = self.config();
        if query.is_empty() {
            return Err(LibraryError::InvalidQuery("text_query must not be empty".into()));
        }
        if !query.chars().any(char::is_alphanumeric) {
            return Err(LibraryError::InvalidQuery(
                "text_query must contain at least one letter or digit".into(),
            ));
        }
        if query.chars().count() > config.max_query_chars {
            return Err(LibraryError::InvalidQuery(format!(
                "text_query is longer than {} characters",
                config.max_query_chars
            )));
        }
        match NonZeroUsize::new(top_k) {
            Some(k) if top_k <= config.max_top_k => Ok(k),
            _ => Err(LibraryError::InvalidQuery(format!(
                "top_k must be between 1 and {}",
                config.max_top_k
            ))),
        }
    }
}
