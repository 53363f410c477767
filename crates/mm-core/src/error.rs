use thiserror::Error;

#[derive(Error, Debug)]
pub enum MmError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Answer provider error: {0}")]
    Answer(String),
    #[error("Provider returned an unusable response: {0}")]
    InvalidResponse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MmError>;
