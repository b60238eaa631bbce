//! Search backend abstraction.
//!
//! The tool handlers only talk to [`SearchBackend`]. Two implementations ship
//! with the crate: [`AzureSearchBackend`] for the Azure AI Search REST API and
//! [`MemoryBackend`] for tests and offline runs.

mod azure;
mod memory;
mod types;

pub use azure::{AzureSearchBackend, AzureSearchConfig, DEFAULT_API_VERSION};
pub use memory::{MemoryBackend, MemoryIndex};
pub use types::{
    Document, FieldDescriptor, IndexSchema, IndexSummary, ScoredDocument, SearchRequest,
    SemanticSearchRequest,
};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("unexpected response: {message}")]
    Decode { message: String },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl BackendError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Status { status: 404, .. }
        )
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Data operations wrapped by the tool catalog.
///
/// Implementations must be safe for concurrent use; the server never assumes
/// exclusive access.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Index used when a tool call does not name one.
    fn default_index(&self) -> Option<String> {
        None
    }

    async fn search(&self, request: SearchRequest) -> BackendResult<Vec<ScoredDocument>>;

    async fn vector_search(
        &self,
        request: SemanticSearchRequest,
    ) -> BackendResult<Vec<ScoredDocument>>;

    async fn list_indexes(&self) -> BackendResult<Vec<IndexSummary>>;

    async fn get_schema(&self, index: &str) -> BackendResult<IndexSchema>;

    /// Returns `Ok(None)` when the index exists but the key does not.
    async fn get_document(
        &self,
        index: &str,
        key: &str,
        select: &[String],
    ) -> BackendResult<Option<Document>>;

    async fn count(&self, index: &str) -> BackendResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_not_found() {
        assert!(BackendError::not_found("index 'x'").is_not_found());
        assert!(
            BackendError::Status {
                status: 404,
                message: "gone".into()
            }
            .is_not_found()
        );
        assert!(!BackendError::decode("bad json").is_not_found());
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Status {
            status: 403,
            message: "Forbidden".into(),
        };
        assert_eq!(err.to_string(), "service returned HTTP 403: Forbidden");
    }
}
