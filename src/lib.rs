//! # azure-search-mcp
//!
//! Model Context Protocol server exposing Azure AI Search as a set of tools.
//!
//! Clients reach the same [`McpService`] over three transports: an SSE
//! session (`GET /sse` + `POST /messages?session_id=`), single-shot streamable
//! HTTP (`POST /mcp`) and newline-delimited JSON on stdio.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use azure_search_mcp::backend::{MemoryBackend, MemoryIndex};
//! use azure_search_mcp::dispatch::RequestDispatcher;
//! use azure_search_mcp::protocol::McpService;
//! use azure_search_mcp::session::ConnectionManager;
//! use azure_search_mcp::tools::ToolRegistry;
//! use azure_search_mcp::transport::{AppState, serve_http};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), azure_search_mcp::Error> {
//!     let backend = MemoryBackend::new().with_index(MemoryIndex::new("hotels"));
//!     let registry = Arc::new(ToolRegistry::search_tools()?);
//!     let service = Arc::new(McpService::new(RequestDispatcher::new(
//!         registry,
//!         Arc::new(backend),
//!     )));
//!
//!     let state = AppState::new(service.clone(), ConnectionManager::new(service));
//!     serve_http("127.0.0.1:9000".parse().unwrap(), state, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod observability;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transport;

pub use backend::{AzureSearchBackend, AzureSearchConfig, BackendError, MemoryBackend, SearchBackend};
pub use config::{ConfigError, ConfigProvider, ServerConfig};
pub use dispatch::{Failure, FailureCode, RequestDispatcher, ToolCall, ToolResponse};
pub use protocol::{JsonRpcResponse, McpService, ServerInfo};
pub use session::{ConnectionManager, Session, SessionError, SessionId};
pub use tools::{RegistryError, ToolDescriptor, ToolError, ToolHandler, ToolRegistry};
pub use transport::{AppState, TransportError};

/// Error type for server setup and operation.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Search backend request failed.
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// A tool handler failed outside the dispatcher.
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Tool catalog could not be assembled.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Session lookup or submission failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Listener or stream failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Standard I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let err: Error = BackendError::not_found("index 'x'").into();
        assert!(err.to_string().starts_with("Backend error"));

        let err: Error = ConfigError::NotFound {
            key: "azure.search.endpoint".into(),
        }
        .into();
        assert!(err.to_string().contains("azure.search.endpoint"));

        let err: Error = SessionError::NotFound { id: "abc".into() }.into();
        assert!(matches!(err, Error::Session(_)));
    }
}
