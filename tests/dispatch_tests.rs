//! Tool dispatch tests
//!
//! Drives the search catalog and custom tools through `RequestDispatcher`
//! against in-memory and stub backends.
//!
//! Run: cargo nextest run --test dispatch_tests

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use azure_search_mcp::backend::{
    BackendResult, Document, FieldDescriptor, IndexSchema, IndexSummary, MemoryBackend,
    MemoryIndex, ScoredDocument, SearchBackend, SearchRequest, SemanticSearchRequest,
};
use azure_search_mcp::dispatch::{FailureCode, Outcome, RequestDispatcher, ToolCall};
use azure_search_mcp::protocol::RequestId;
use azure_search_mcp::tools::{
    ParamSpec, ParamType, ToolArguments, ToolDescriptor, ToolHandler, ToolRegistry, ToolResult,
};
use serde_json::{Map, Value, json};

fn hotels() -> MemoryBackend {
    MemoryBackend::new()
        .with_index(
            MemoryIndex::new("hotels")
                .field(FieldDescriptor::new("HotelId", "Edm.String").key())
                .field(FieldDescriptor::new("Name", "Edm.String").searchable())
                .field(FieldDescriptor::new("Category", "Edm.String").filterable())
                .semantic_configuration("default")
                .document(json!({"HotelId": "1", "Name": "Beach Resort", "Category": "Resort"}))
                .document(json!({"HotelId": "2", "Name": "City Inn", "Category": "Budget"}))
                .document(json!({"HotelId": "3", "Name": "Beach Motel", "Category": "Budget"})),
        )
        .with_default_index("hotels")
}

fn args(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Returns empty results and a fixed document count, counting every call.
struct CountOnlyBackend {
    count: u64,
    calls: AtomicUsize,
}

impl CountOnlyBackend {
    fn new(count: u64) -> Self {
        Self {
            count,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SearchBackend for CountOnlyBackend {
    async fn search(&self, _request: SearchRequest) -> BackendResult<Vec<ScoredDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn vector_search(
        &self,
        _request: SemanticSearchRequest,
    ) -> BackendResult<Vec<ScoredDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn list_indexes(&self) -> BackendResult<Vec<IndexSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    async fn get_schema(&self, index: &str) -> BackendResult<IndexSchema> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(IndexSchema {
            name: index.to_string(),
            ..Default::default()
        })
    }

    async fn get_document(
        &self,
        _index: &str,
        _key: &str,
        _select: &[String],
    ) -> BackendResult<Option<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }

    async fn count(&self, _index: &str) -> BackendResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.count)
    }
}

// =============================================================================
// Search catalog
// =============================================================================

mod catalog_tests {
    use super::*;

    fn dispatcher(backend: Arc<dyn SearchBackend>) -> RequestDispatcher {
        RequestDispatcher::new(Arc::new(ToolRegistry::search_tools().unwrap()), backend)
    }

    #[tokio::test]
    async fn test_every_tool_succeeds_with_minimal_arguments() {
        let dispatcher = dispatcher(Arc::new(hotels()));
        let calls = [
            ("search", json!({"query": "beach"})),
            ("vector_search", json!({"query": "beach"})),
            ("list_indexes", json!({})),
            ("get_index_schema", json!({"index_name": "hotels"})),
            ("get_document", json!({"key": "1"})),
            ("get_document_count", json!({})),
        ];

        for (i, (tool, arguments)) in calls.into_iter().enumerate() {
            let id = i as i64 + 100;
            let response = dispatcher
                .dispatch(ToolCall::new(id, tool, args(arguments)))
                .await;
            assert!(response.is_success(), "{tool} failed: {:?}", response.outcome);
            assert_eq!(response.id, RequestId::from(id), "{tool} changed the request id");
        }
    }

    #[tokio::test]
    async fn test_search_payload_shape() {
        let dispatcher = dispatcher(Arc::new(hotels()));
        let response = dispatcher
            .dispatch(ToolCall::new(
                1,
                "search",
                args(json!({"query": "beach", "filter": "Category eq 'Budget'", "select": "Name"})),
            ))
            .await;

        let Outcome::Success(payload) = response.outcome else {
            panic!("search failed: {:?}", response.outcome);
        };
        assert_eq!(payload["count"], 1);
        assert_eq!(payload["results"][0]["Name"], "Beach Motel");
        assert!(payload["results"][0].get("_score").is_some());
        assert!(payload["results"][0].get("Category").is_none());
    }

    #[tokio::test]
    async fn test_missing_document_is_backend_error() {
        let dispatcher = dispatcher(Arc::new(hotels()));
        let response = dispatcher
            .dispatch(ToolCall::new(1, "get_document", args(json!({"key": "404"}))))
            .await;
        assert_eq!(response.failure_code(), Some(FailureCode::BackendError));
    }

    #[tokio::test]
    async fn test_search_without_query_never_reaches_backend() {
        let backend = Arc::new(CountOnlyBackend::new(0));
        let dispatcher = dispatcher(backend.clone());

        let response = dispatcher
            .dispatch(ToolCall::new(7, "search", args(json!({"index_name": "hotels"}))))
            .await;

        assert_eq!(response.failure_code(), Some(FailureCode::InvalidArguments));
        assert_eq!(response.id, RequestId::from(7));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_argument_rejected() {
        let backend = Arc::new(CountOnlyBackend::new(0));
        let dispatcher = dispatcher(backend.clone());

        let response = dispatcher
            .dispatch(ToolCall::new(
                1,
                "list_indexes",
                args(json!({"verbose": true})),
            ))
            .await;

        assert_eq!(response.failure_code(), Some(FailureCode::InvalidArguments));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_index_without_default() {
        let dispatcher = dispatcher(Arc::new(CountOnlyBackend::new(3)));
        let response = dispatcher
            .dispatch(ToolCall::new(1, "get_document_count", Map::new()))
            .await;
        assert_eq!(response.failure_code(), Some(FailureCode::InvalidArguments));
    }
}

// =============================================================================
// Custom tools
// =============================================================================

mod custom_tool_tests {
    use super::*;

    struct IndexCountTool;

    #[async_trait]
    impl ToolHandler for IndexCountTool {
        async fn call(&self, args: ToolArguments, backend: &dyn SearchBackend) -> ToolResult<Value> {
            let index = args.str("indexName").unwrap_or_default().to_string();
            let count = backend.count(&index).await?;
            Ok(json!({ "count": count }))
        }
    }

    struct CountingHandler(Arc<AtomicUsize>);

    #[async_trait]
    impl ToolHandler for CountingHandler {
        async fn call(&self, _args: ToolArguments, _backend: &dyn SearchBackend) -> ToolResult<Value> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(json!({}))
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl ToolHandler for PanickingHandler {
        async fn call(&self, _args: ToolArguments, _backend: &dyn SearchBackend) -> ToolResult<Value> {
            panic!("index exploded");
        }
    }

    #[tokio::test]
    async fn test_registered_count_tool() {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDescriptor::new("get_document_count", "Count documents", IndexCountTool)
                    .param(ParamSpec::required("indexName", ParamType::String, "Index")),
            )
            .unwrap();

        let dispatcher =
            RequestDispatcher::new(Arc::new(registry), Arc::new(CountOnlyBackend::new(42)));
        let response = dispatcher
            .dispatch(ToolCall::new(
                "req-1",
                "get_document_count",
                args(json!({"indexName": "products"})),
            ))
            .await;

        assert_eq!(response.id, RequestId::from("req-1"));
        assert_eq!(response.outcome, Outcome::Success(json!({"count": 42})));
    }

    #[tokio::test]
    async fn test_unknown_tool_runs_no_handler() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("known", "Counts", CountingHandler(runs.clone())))
            .unwrap();
        let dispatcher = RequestDispatcher::new(Arc::new(registry), Arc::new(MemoryBackend::new()));

        let response = dispatcher
            .dispatch(ToolCall::new(3, "unknown", Map::new()))
            .await;

        assert_eq!(response.failure_code(), Some(FailureCode::UnknownTool));
        assert_eq!(response.id, RequestId::from(3));
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        let response = dispatcher.dispatch(ToolCall::new(4, "known", Map::new())).await;
        assert!(response.is_success());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panic_is_internal_and_dispatcher_survives() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolDescriptor::new("explode", "Panics", PanickingHandler))
            .unwrap();
        registry
            .register(ToolDescriptor::new("known", "Counts", CountingHandler(runs.clone())))
            .unwrap();
        let dispatcher = RequestDispatcher::new(Arc::new(registry), Arc::new(MemoryBackend::new()));

        let response = dispatcher.dispatch(ToolCall::new(1, "explode", Map::new())).await;
        assert_eq!(response.failure_code(), Some(FailureCode::Internal));
        let Outcome::Failure(failure) = &response.outcome else {
            unreachable!()
        };
        assert!(!failure.message.contains("exploded"));

        let response = dispatcher.dispatch(ToolCall::new(2, "known", Map::new())).await;
        assert!(response.is_success());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = ToolRegistry::search_tools().unwrap();
        let err = registry
            .register(ToolDescriptor::new("search", "Again", PanickingHandler))
            .unwrap_err();
        assert!(err.to_string().contains("search"));
        assert_eq!(registry.len(), 6);
    }
}
