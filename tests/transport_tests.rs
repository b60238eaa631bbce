//! Transport tests
//!
//! End-to-end runs of the stdio binding and the axum router (streamable
//! HTTP, SSE handshake, status mapping) over an in-memory backend.
//!
//! Run: cargo nextest run --test transport_tests

use std::sync::Arc;

use azure_search_mcp::backend::{FieldDescriptor, MemoryBackend, MemoryIndex};
use azure_search_mcp::dispatch::RequestDispatcher;
use azure_search_mcp::protocol::McpService;
use azure_search_mcp::session::ConnectionManager;
use azure_search_mcp::tools::ToolRegistry;
use azure_search_mcp::transport::{AppState, router};
use serde_json::{Value, json};

fn service() -> Arc<McpService> {
    let backend = MemoryBackend::new()
        .with_index(
            MemoryIndex::new("products")
                .field(FieldDescriptor::new("id", "Edm.String").key())
                .field(FieldDescriptor::new("title", "Edm.String").searchable())
                .document(json!({"id": "p1", "title": "Red kettle"}))
                .document(json!({"id": "p2", "title": "Blue kettle"})),
        )
        .with_default_index("products");

    Arc::new(McpService::new(RequestDispatcher::new(
        Arc::new(ToolRegistry::search_tools().unwrap()),
        Arc::new(backend),
    )))
}

// =============================================================================
// stdio
// =============================================================================

mod stdio_tests {
    use azure_search_mcp::transport::stdio::{StdioOptions, serve};
    use tokio::io::AsyncReadExt;

    use super::*;

    #[tokio::test]
    async fn test_stdio_session_end_to_end() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"test"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"get_document_count","arguments":{}}}"#,
            "\n",
            "not json\n",
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"nope"}}"#,
            "\n",
        );

        let (writer, mut output) = tokio::io::duplex(64 * 1024);
        serve(input.as_bytes(), writer, service(), StdioOptions::default())
            .await
            .unwrap();

        let mut text = String::new();
        output.read_to_string(&mut text).await.unwrap();
        let responses: Vec<Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(responses.len(), 4);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["protocolVersion"], "2024-11-05");

        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 6);

        assert_eq!(responses[2]["id"], 3);
        assert_eq!(
            responses[2]["result"]["structuredContent"],
            json!({"index": "products", "document_count": 2})
        );
        assert_eq!(responses[2]["result"]["isError"], false);

        assert_eq!(responses[3]["id"], 4);
        assert_eq!(responses[3]["error"]["code"], -32601);
        assert_eq!(responses[3]["error"]["data"]["code"], "unknown_tool");
    }
}

// =============================================================================
// HTTP
// =============================================================================

mod http_tests {
    use axum::Router;
    use axum::body::{Body, Bytes};
    use axum::http::{Request, StatusCode};
    use azure_search_mcp::session::SessionId;
    use futures::StreamExt;
    use tower::ServiceExt;

    use super::*;

    fn app() -> (Router, ConnectionManager) {
        let service = service();
        let sessions = ConnectionManager::new(Arc::clone(&service));
        (router(AppState::new(service, sessions.clone())), sessions)
    }

    async fn post(app: &Router, uri: &str, body: &str) -> (StatusCode, Bytes) {
        let response = app
            .clone()
            .oneshot(
                Request::post(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn test_streamable_http_status_mapping() {
        let (app, _) = app();

        let (status, body) = post(
            &app,
            "/mcp",
            r#"{"jsonrpc":"2.0","id":"a","method":"tools/call","params":{"name":"search","arguments":{"query":"kettle","top":1}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["id"], "a");
        assert_eq!(body["result"]["structuredContent"]["count"], 1);

        let (status, body) = post(
            &app,
            "/mcp",
            r#"{"jsonrpc":"2.0","id":"b","method":"tools/call","params":{"name":"search","arguments":{}}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], -32602);
        assert_eq!(body["error"]["data"]["code"], "invalid_arguments");

        let (status, _) = post(&app, "/mcp", r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#).await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, body) = post(&app, "/mcp", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_messages_status_mapping() {
        let (app, _) = app();
        let ping = r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#;

        let (status, _) = post(&app, "/messages", ping).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = post(&app, "/messages?session_id=not-a-session", ping).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = format!("/messages?session_id={}", SessionId::new());
        let (status, _) = post(&app, &unknown, ping).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sse_handshake_and_response() {
        let (app, sessions) = app();

        let response = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sessions.len(), 1);

        let mut events = response.into_body().into_data_stream();
        let first = events.next().await.unwrap().unwrap();
        let first = String::from_utf8(first.to_vec()).unwrap();
        assert!(first.starts_with("event: endpoint\n"), "{first}");
        let endpoint = first
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap()
            .to_string();
        assert!(endpoint.starts_with("/messages?session_id="));

        let (status, body) = post(
            &app,
            &endpoint,
            r#"{"jsonrpc":"2.0","id":9,"method":"tools/call","params":{"name":"list_indexes"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert!(body.is_empty());

        let second = events.next().await.unwrap().unwrap();
        let second = String::from_utf8(second.to_vec()).unwrap();
        assert!(second.starts_with("event: message\n"), "{second}");
        let data = second
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap();
        let message: Value = serde_json::from_str(data).unwrap();
        assert_eq!(message["id"], 9);
        assert_eq!(
            message["result"]["structuredContent"]["indexes"][0]["name"],
            "products"
        );

        drop(events);
        assert!(sessions.is_empty());

        let (status, _) = post(&app, &endpoint, r#"{"jsonrpc":"2.0","id":10,"method":"ping"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
