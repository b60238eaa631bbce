//! Built-in search tool handlers.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::registry::ToolDescriptor;
use super::schema::{ParamSpec, ParamType, ToolArguments};
use super::traits::{ToolError, ToolHandler, ToolResult};
use crate::backend::{
    BackendError, ScoredDocument, SearchBackend, SearchRequest, SemanticSearchRequest,
};

const INDEX_NAME_HELP: &str = "Name of the search index (uses default if not specified)";
const SELECT_HELP: &str = "Comma-separated list of fields to return";
const TOP_HELP: &str = "Number of results to return (default: 10)";

/// The six tools served by default, in catalog order.
pub fn catalog() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new(
            "search",
            "Search for documents in Azure AI Search index using full-text search",
            SearchTool,
        )
        .param(ParamSpec::required("query", ParamType::String, "The search query text"))
        .param(index_name_param())
        .param(top_param())
        .param(select_param())
        .param(ParamSpec::optional("filter", ParamType::String, "OData filter expression")),
        ToolDescriptor::new(
            "vector_search",
            "Perform vector/semantic search on Azure AI Search index",
            VectorSearchTool,
        )
        .param(ParamSpec::required(
            "query",
            ParamType::String,
            "The search query text for semantic search",
        ))
        .param(index_name_param())
        .param(top_param())
        .param(select_param())
        .param(
            ParamSpec::optional(
                "semantic_configuration",
                ParamType::String,
                "Name of the semantic configuration to use",
            )
            .default_value("default"),
        ),
        ToolDescriptor::new(
            "list_indexes",
            "List all available search indexes in the Azure AI Search service",
            ListIndexesTool,
        ),
        ToolDescriptor::new(
            "get_index_schema",
            "Get the schema/fields of a specific search index",
            IndexSchemaTool,
        )
        .param(ParamSpec::required(
            "index_name",
            ParamType::String,
            "Name of the search index",
        )),
        ToolDescriptor::new(
            "get_document",
            "Retrieve a specific document by its key",
            GetDocumentTool,
        )
        .param(ParamSpec::required("key", ParamType::String, "The document key/ID"))
        .param(index_name_param())
        .param(select_param()),
        ToolDescriptor::new(
            "get_document_count",
            "Get the total number of documents in a search index",
            DocumentCountTool,
        )
        .param(index_name_param()),
    ]
}

fn index_name_param() -> ParamSpec {
    ParamSpec::optional("index_name", ParamType::String, INDEX_NAME_HELP)
}

fn top_param() -> ParamSpec {
    ParamSpec::optional("top", ParamType::Integer, TOP_HELP).default_value(10)
}

fn select_param() -> ParamSpec {
    ParamSpec::optional("select", ParamType::String, SELECT_HELP)
}

/// The named index, or the backend's default when the call names none.
fn resolve_index(args: &ToolArguments, backend: &dyn SearchBackend) -> ToolResult<String> {
    args.str("index_name")
        .filter(|name| !name.trim().is_empty())
        .map(str::to_string)
        .or_else(|| backend.default_index())
        .ok_or_else(|| {
            ToolError::invalid_arguments("index_name is required when no default index is configured")
        })
}

fn required_str<'a>(args: &'a ToolArguments, name: &str) -> ToolResult<&'a str> {
    args.str(name)
        .ok_or_else(|| ToolError::invalid_arguments(format!("missing required parameter '{}'", name)))
}

fn top(args: &ToolArguments) -> ToolResult<u32> {
    let top = args.i64("top").unwrap_or(10);
    u32::try_from(top)
        .map_err(|_| ToolError::invalid_arguments(format!("top must be a non-negative integer, got {}", top)))
}

fn hits_payload(hits: Vec<ScoredDocument>, with_reranker: bool) -> Value {
    let results: Vec<Value> = hits
        .into_iter()
        .map(|hit| {
            let mut doc = hit.document;
            doc.insert("_score".into(), json!(hit.score));
            if with_reranker {
                doc.insert("_reranker_score".into(), json!(hit.reranker_score));
            }
            Value::Object(doc)
        })
        .collect();
    json!({ "count": results.len(), "results": results })
}

pub struct SearchTool;

#[async_trait]
impl ToolHandler for SearchTool {
    async fn call(&self, args: ToolArguments, backend: &dyn SearchBackend) -> ToolResult<Value> {
        let index = resolve_index(&args, backend)?;
        let mut request = SearchRequest::new(index, required_str(&args, "query")?)
            .top(top(&args)?)
            .select(args.csv("select"));
        if let Some(filter) = args.str("filter").filter(|f| !f.trim().is_empty()) {
            request = request.filter(filter);
        }

        let hits = backend.search(request).await?;
        Ok(hits_payload(hits, false))
    }
}

pub struct VectorSearchTool;

#[async_trait]
impl ToolHandler for VectorSearchTool {
    async fn call(&self, args: ToolArguments, backend: &dyn SearchBackend) -> ToolResult<Value> {
        let index = resolve_index(&args, backend)?;
        let request = SemanticSearchRequest::new(index, required_str(&args, "query")?)
            .top(top(&args)?)
            .select(args.csv("select"))
            .semantic_configuration(args.str("semantic_configuration").unwrap_or("default"));

        let hits = backend.vector_search(request).await?;
        Ok(hits_payload(hits, true))
    }
}

pub struct ListIndexesTool;

#[async_trait]
impl ToolHandler for ListIndexesTool {
    async fn call(&self, _args: ToolArguments, backend: &dyn SearchBackend) -> ToolResult<Value> {
        let indexes = backend.list_indexes().await?;
        Ok(json!({ "indexes": indexes }))
    }
}

pub struct IndexSchemaTool;

#[async_trait]
impl ToolHandler for IndexSchemaTool {
    async fn call(&self, args: ToolArguments, backend: &dyn SearchBackend) -> ToolResult<Value> {
        let schema = backend.get_schema(required_str(&args, "index_name")?).await?;
        Ok(json!({
            "index_name": schema.name,
            "fields": schema.fields,
            "semantic_configurations": schema.semantic_configurations,
        }))
    }
}

pub struct GetDocumentTool;

#[async_trait]
impl ToolHandler for GetDocumentTool {
    async fn call(&self, args: ToolArguments, backend: &dyn SearchBackend) -> ToolResult<Value> {
        let index = resolve_index(&args, backend)?;
        let key = required_str(&args, "key")?;

        match backend.get_document(&index, key, &args.csv("select")).await? {
            Some(document) => Ok(Value::Object(document)),
            None => Err(BackendError::not_found(format!(
                "document '{}' in index '{}'",
                key, index
            ))
            .into()),
        }
    }
}

pub struct DocumentCountTool;

#[async_trait]
impl ToolHandler for DocumentCountTool {
    async fn call(&self, args: ToolArguments, backend: &dyn SearchBackend) -> ToolResult<Value> {
        let index = resolve_index(&args, backend)?;
        let count = backend.count(&index).await?;
        Ok(json!({ "index": index, "document_count": count }))
    }
}
