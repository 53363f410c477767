use thiserror::Error;

#[derive(Error, Debug)]
pub enum VectorDbError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("Embedding vector is empty")]
    EmptyVector,
    #[error("Embedding vector has zero norm")]
    ZeroNorm,
    #[error("Embedding vector is not unit length (norm {0})")]
    NotNormalized(f64),
    #[error("Embedding vector contains a non-finite value")]
    NonFinite,
    #[error("Corrupt embedding cache: {0}")]
    Cache(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VectorDbError>;
