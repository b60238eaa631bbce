//! Transport bindings over a shared [`McpService`].
//!
//! - `GET /sse` + `POST /messages?session_id=` (event-stream sessions)
//! - `POST /mcp` (single-shot streamable HTTP)
//! - newline-delimited JSON over stdio

pub mod http;
pub mod sse;
pub mod stdio;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::protocol::{JsonRpcResponse, McpService};
use crate::session::ConnectionManager;

pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(15);
pub const DEFAULT_FLUSH_DEADLINE: Duration = Duration::from_secs(5);

pub const SESSION_ID_HEADER: &str = "mcp-session-id";

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = std::result::Result<T, TransportError>;

/// Shared state of the HTTP server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<McpService>,
    pub sessions: ConnectionManager,
    pub keep_alive: Duration,
    pub flush_deadline: Duration,
}

impl AppState {
    pub fn new(service: Arc<McpService>, sessions: ConnectionManager) -> Self {
        Self {
            service,
            sessions,
            keep_alive: DEFAULT_KEEP_ALIVE,
            flush_deadline: DEFAULT_FLUSH_DEADLINE,
        }
    }

    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    pub fn flush_deadline(mut self, deadline: Duration) -> Self {
        self.flush_deadline = deadline;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/sse", get(sse::connect))
        .route("/messages", post(sse::post_message))
        .route("/messages/", post(sse::post_message))
        .route("/mcp", post(http::handle))
        .route("/health", get(health))
        .layer(cors())
        .with_state(state)
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([HeaderName::from_static(SESSION_ID_HEADER)])
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "sessions": state.sessions.len(),
    }))
}

/// Serves the HTTP transports on `addr` until `shutdown` fires, then closes
/// every session and waits for their streams to drain.
pub async fn serve_http(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> TransportResult<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Bind { addr, source })?;
    tracing::info!(addr = %listener.local_addr()?, "Listening (SSE at /sse, streamable HTTP at /mcp)");

    let sessions = state.sessions.clone();
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            let closed = sessions.close_all();
            tracing::info!(closed, "Shutting down; draining sessions");
        })
        .await?;
    Ok(())
}

/// Error reply of the HTTP bindings.
#[derive(Debug)]
pub(crate) enum HttpError {
    /// A malformed JSON-RPC frame, answered with a JSON-RPC error body.
    Malformed(JsonRpcResponse),
    Status {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl HttpError {
    pub(crate) fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }

    pub(crate) fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::NOT_FOUND,
            code,
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            Self::Malformed(response) => (StatusCode::BAD_REQUEST, Json(response)).into_response(),
            Self::Status {
                status,
                code,
                message,
            } => (
                status,
                Json(ErrorBody {
                    error: code.into(),
                    message,
                }),
            )
                .into_response(),
        }
    }
}
