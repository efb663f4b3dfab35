//! Error taxonomy shared by every pipeline stage.
//!
//! Stage-local validation problems surface as [`TopicError::Configuration`]
//! and never touch state computed by earlier operations. External failures
//! are split by collaborator: embedding, generation, and deadlines.

use std::time::Duration;

use crate::axis::explain::ExplainError;
use crate::config::ConfigError;
use crate::generate::GenerationError;
use crate::semantic::embeddings::EmbeddingError;
use crate::semantic::storage::CacheError;

#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("{operation} timed out after {}ms", after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("generation degraded: {0}")]
    GenerationDegraded(#[from] GenerationError),

    #[error("reduction failed: {0}")]
    Reduction(String),

    #[error("embedding cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("explanation failed: {0}")]
    Explain(#[from] ExplainError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl TopicError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TopicError>;
