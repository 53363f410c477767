//! Shared configuration, errors, and provider traits for the multimodal
//! retrieval service.

pub mod config;
pub mod error;
pub mod provider;

pub use config::{
    AnswerConfig, EmbeddingConfig, LibraryConfig, LogConfig, ProviderKind, ServerConfig,
    ServiceConfig,
};
pub use error::{MmError, Result};
pub use provider::{AnswerProvider, EmbeddingProvider};
