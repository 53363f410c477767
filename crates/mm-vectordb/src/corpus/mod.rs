//! The image corpus: identifier -> normalized embedding, plus a shared
//! handle that publishes whole snapshots to concurrent readers.

mod cache;

pub use cache::{load_cache, save_cache};

use std::collections::HashMap;
use std::fs::Metadata;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use parking_lot::{Mutex, RwLock};

use crate::error::{Result, VectorDbError};
use crate::vector::EmbeddingVector;

/// Size and modification time of a source file, used to detect unchanged
/// files when reusing cached embeddings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileFingerprint {
    pub size_bytes: u64,
    pub modified_unix_ms: i64,
}

impl FileFingerprint {
    pub fn from_metadata(meta: &Metadata) -> Self {
        let modified_unix_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self {
            size_bytes: meta.len(),
            modified_unix_ms,
        }
    }
}

/// One indexed image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRecord {
    /// Unique key, the file name inside the library directory.
    pub identifier: String,
    pub vector: EmbeddingVector,
    pub source_path: PathBuf,
    pub fingerprint: FileFingerprint,
}

impl ImageRecord {
    pub fn new(identifier: impl Into<String>, vector: EmbeddingVector, source_path: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            vector,
            source_path: source_path.into(),
            fingerprint: FileFingerprint::default(),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: FileFingerprint) -> Self {
        self.fingerprint = fingerprint;
        self
    }
}

/// Records in enumeration order with an identifier lookup table.
///
/// Every vector has the same dimensionality, fixed by the first insert.
#[derive(Debug, Clone, Default)]
pub struct CorpusIndex {
    records: Vec<ImageRecord>,
    by_id: HashMap<String, usize>,
    dimension: Option<usize>,
}

impl CorpusIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            by_id: HashMap::with_capacity(capacity),
            dimension: None,
        }
    }

    /// Insert a record. A known identifier is replaced in place and keeps its
    /// position; the previous record is returned.
    pub fn insert(&mut self, record: ImageRecord) -> Result<Option<ImageRecord>> {
        let got = record.vector.dimension();
        match self.dimension {
            Some(expected) if expected != got => {
                return Err(VectorDbError::DimensionMismatch { expected, got });
            }
            Some(_) => {}
            None => self.dimension = Some(got),
        }
        if let Some(&idx) = self.by_id.get(&record.identifier) {
            return Ok(Some(std::mem::replace(&mut self.records[idx], record)));
        }
        self.by_id.insert(record.identifier.clone(), self.records.len());
        self.records.push(record);
        Ok(None)
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in enumeration order.
    pub fn all(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn get(&self, identifier: &str) -> Option<&ImageRecord> {
        self.by_id.get(identifier).map(|&idx| &self.records[idx])
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.by_id.contains_key(identifier)
    }

    /// `None` until the first record is inserted.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.identifier.as_str())
    }
}

/// Shared, swappable corpus.
///
/// Readers grab an `Arc` snapshot and scan it lock-free. Writers build a new
/// `CorpusIndex` and publish it in one pointer swap, so a reader never sees a
/// half-built index.
#[derive(Debug, Clone, Default)]
pub struct SharedCorpus {
    current: Arc<RwLock<Arc<CorpusIndex>>>,
    writer: Arc<Mutex<()>>,
}

impl SharedCorpus {
    pub fn new(index: CorpusIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
            writer: Arc::new(Mutex::new(())),
        }
    }

    /// Current snapshot. Stays valid even if a writer swaps in a new index.
    pub fn snapshot(&self) -> Arc<CorpusIndex> {
        self.current.read().clone()
    }

    pub fn size(&self) -> usize {
        self.current.read().size()
    }

    /// Publish `index`, returning the snapshot it replaced.
    pub fn replace(&self, index: CorpusIndex) -> Arc<CorpusIndex> {
        let _guard = self.writer.lock();
        std::mem::replace(&mut *self.current.write(), Arc::new(index))
    }

    /// Copy-on-write update. `f` edits a private copy; the copy is published
    /// only if `f` succeeds.
    pub fn update<T>(&self, f: impl FnOnce(&mut CorpusIndex) -> Result<T>) -> Result<T> {
        let _guard = self.writer.lock();
        let mut next = (*self.snapshot()).clone();
        let out = f(&mut next)?;
        *self.current.write() = Arc::new(next);
        Ok(out)
    }
}
