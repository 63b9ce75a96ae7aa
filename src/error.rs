//! Error types for Memoir.

use std::time::Duration;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Interview error: {0}")]
    Interview(#[from] InterviewError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Text-generation failures.
///
/// Every variant means generation is unavailable for this call. Callers in
/// the interview path recover locally with fixed fallback text.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("No text-generation provider is configured")]
    NotConfigured,

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flow-controller errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterviewError {
    /// No flow state under this key. Re-initialize or recover from the transcript.
    #[error("Interview session {key} not found")]
    SessionNotFound { key: String },

    #[error("Topic index {index} is out of range (catalog has {len} topics)")]
    InvalidTopicIndex { index: usize, len: usize },

    #[error(
        "Not enough material to compose: {completed_topics} of {} topics completed, {conversations} of {} turns recorded",
        crate::autobiography::MIN_COMPLETED_TOPICS,
        crate::autobiography::MIN_CONVERSATIONS
    )]
    NotReadyToCompose {
        completed_topics: usize,
        conversations: usize,
    },
}

/// Curriculum catalog errors.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Failed to load catalog: {0}")]
    Load(String),
}

/// Result type alias for Memoir.
pub type Result<T> = std::result::Result<T, Error>;
