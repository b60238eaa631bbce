//! Tool handler trait.

use async_trait::async_trait;
use serde_json::Value;

use super::schema::ToolArguments;
use crate::backend::{BackendError, SearchBackend};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ToolError {
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// Executes one tool against the search backend.
///
/// Arguments have already been validated against the tool's parameter list,
/// so required parameters are present and typed.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, args: ToolArguments, backend: &dyn SearchBackend) -> ToolResult<Value>;
}
