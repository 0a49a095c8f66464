//! Shared error classification.
//!
//! Every crate-local error type (`DbError`, `KbError`, `EmbedError`, `LlmError`,
//! ...) maps into one of these kinds via a `kind()` method, so the scheduler's
//! retry policy and the RAG pipeline's propagation policy can make decisions
//! without matching on crate-specific variants.

use serde::{Deserialize, Serialize};

/// The error taxonomy from the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InputRejected,
    ContentExtraction,
    EmbeddingUpstreamUnavailable,
    EmbeddingUpstreamTimeout,
    EmbeddingRateLimited,
    ChatUpstreamUnavailable,
    ChatUpstreamTimeout,
    ChatRateLimited,
    Storage,
    RetrievalEmpty,
    Internal,
}

impl ErrorKind {
    /// Transient classes are retried locally with backoff; everything else
    /// either surfaces immediately or aborts the current operation.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::EmbeddingRateLimited
                | ErrorKind::EmbeddingUpstreamUnavailable
                | ErrorKind::EmbeddingUpstreamTimeout
                | ErrorKind::ChatRateLimited
                | ErrorKind::ChatUpstreamUnavailable
                | ErrorKind::ChatUpstreamTimeout
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InputRejected => "INPUT_REJECTED",
            ErrorKind::ContentExtraction => "CONTENT_EXTRACTION",
            ErrorKind::EmbeddingUpstreamUnavailable => "EMBEDDING_UPSTREAM_UNAVAILABLE",
            ErrorKind::EmbeddingUpstreamTimeout => "EMBEDDING_UPSTREAM_TIMEOUT",
            ErrorKind::EmbeddingRateLimited => "EMBEDDING_RATE_LIMITED",
            ErrorKind::ChatUpstreamUnavailable => "CHAT_UPSTREAM_UNAVAILABLE",
            ErrorKind::ChatUpstreamTimeout => "CHAT_UPSTREAM_TIMEOUT",
            ErrorKind::ChatRateLimited => "CHAT_RATE_LIMITED",
            ErrorKind::Storage => "STORAGE",
            ErrorKind::RetrievalEmpty => "RETRIEVAL_EMPTY",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
