use std::path::PathBuf;

use mm_core::MmError;
use mm_vectordb::VectorDbError;
use thiserror::Error;

/// Why a single library file was left out of the index. Never fatal to a build.
#[derive(Error, Debug)]
#[error("skipped {identifier}: {reason}")]
pub struct CorpusBuildError {
    pub identifier: String,
    pub path: PathBuf,
    #[source]
    pub reason: BuildFailure,
}

#[derive(Error, Debug)]
pub enum BuildFailure {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),
    #[error("not a decodable image: {0}")]
    Decode(String),
    #[error("embedding failed: {0}")]
    Embed(#[from] MmError),
    #[error("unusable embedding: {0}")]
    Vector(#[from] VectorDbError),
}

/// Per-item failure while loading result payloads.
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("image {identifier} is indexed but missing at {}", path.display())]
    Missing { identifier: String, path: PathBuf },
    #[error("image {identifier} could not be read: {source}")]
    Unreadable {
        identifier: String,
        #[source]
        source: std::io::Error,
    },
    #[error("identifier is not a plain file name: {0}")]
    InvalidIdentifier(String),
}

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),
    #[error("Provider failure: {0}")]
    Provider(#[from] MmError),
    #[error("Not available: {0}")]
    Unavailable(String),
    #[error("Index error: {0}")]
    Index(#[from] VectorDbError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
