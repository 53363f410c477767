//! In-memory image embedding index.
//!
//! Provides normalized embedding vectors, the corpus index with snapshot
//! publication and an on-disk embedding cache, and exact top-k retrieval.

pub mod corpus;
pub mod distance;
pub mod error;
pub mod search;
pub mod vector;

pub use corpus::{CorpusIndex, FileFingerprint, ImageRecord, SharedCorpus};
pub use error::{Result, VectorDbError};
pub use search::{rank, RankedHit, RetrievalEngine};
pub use vector::EmbeddingVector;
