//! Single-shot streamable HTTP binding (`POST /mcp`).
//!
//! One JSON-RPC message per request body, answered inline. No state is kept
//! between requests.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

use super::{AppState, HttpError};
use crate::protocol::{Inbound, decode};

pub async fn handle(State(state): State<AppState>, body: Bytes) -> Response {
    match decode(&body) {
        Ok(Inbound::Request(request)) => {
            Json(state.service.handle_request(request).await).into_response()
        }
        Ok(inbound) => {
            let _ = state.service.handle(inbound).await;
            StatusCode::ACCEPTED.into_response()
        }
        Err(malformed) => {
            tracing::debug!(reason = %malformed.reason, "Rejecting malformed request body");
            HttpError::Malformed(malformed.to_response()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::backend::{FieldDescriptor, MemoryBackend, MemoryIndex};
    use crate::dispatch::RequestDispatcher;
    use crate::protocol::McpService;
    use crate::session::ConnectionManager;
    use crate::tools::ToolRegistry;
    use crate::transport::router;

    fn app() -> axum::Router {
        let backend = MemoryBackend::new()
            .with_index(
                MemoryIndex::new("hotels")
                    .field(FieldDescriptor::new("id", "Edm.String").key())
                    .document(json!({"id": "1"})),
            )
            .with_default_index("hotels");
        let service = Arc::new(McpService::new(RequestDispatcher::new(
            Arc::new(ToolRegistry::search_tools().unwrap()),
            Arc::new(backend),
        )));
        let sessions = ConnectionManager::new(Arc::clone(&service));
        router(AppState::new(service, sessions))
    }

    async fn post(body: &str) -> (StatusCode, Option<Value>) {
        let response = app()
            .oneshot(
                Request::post("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).ok())
    }

    #[tokio::test]
    async fn test_tool_call_ok() {
        let (status, body) = post(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{"name":"get_document_count"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body = body.unwrap();
        assert_eq!(body["id"], 1);
        assert_eq!(
            body["result"]["structuredContent"],
            json!({"index": "hotels", "document_count": 1})
        );
    }

    #[tokio::test]
    async fn test_tool_failure_is_still_200() {
        let (status, body) = post(
            r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"search","arguments":{}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.unwrap()["error"]["data"]["code"], "invalid_arguments");
    }

    #[tokio::test]
    async fn test_notification_accepted() {
        let (status, body) =
            post(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.is_none());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (status, body) = post("{oops").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = body.unwrap();
        assert_eq!(body["error"]["code"], -32700);
        assert_eq!(body["id"], Value::Null);

        let (status, body) = post(r#"{"jsonrpc":"2.0","id":4}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body = body.unwrap();
        assert_eq!(body["error"]["code"], -32600);
        assert_eq!(body["id"], 4);
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
