//! Azure AI Search REST backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::types::{
    Document, FieldDescriptor, IndexSchema, IndexSummary, ScoredDocument, SearchRequest,
    SemanticSearchRequest,
};
use super::{BackendError, BackendResult, SearchBackend};

pub const DEFAULT_API_VERSION: &str = "2024-07-01";

const API_KEY_HEADER: &str = "api-key";
const SCORE_FIELD: &str = "@search.score";
const RERANKER_SCORE_FIELD: &str = "@search.rerankerScore";

/// Connection settings for one Azure AI Search service.
#[derive(Clone, Debug)]
pub struct AzureSearchConfig {
    /// e.g. `https://<service>.search.windows.net`
    pub endpoint: Url,
    pub api_key: SecretString,
    pub default_index: Option<String>,
    pub api_version: String,
    pub timeout: Duration,
}

impl AzureSearchConfig {
    pub fn new(endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: SecretString::from(api_key.into()),
            default_index: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn default_index(mut self, index: impl Into<String>) -> Self {
        self.default_index = Some(index.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct AzureSearchBackend {
    client: reqwest::Client,
    config: AzureSearchConfig,
}

impl AzureSearchBackend {
    pub fn new(config: AzureSearchConfig) -> BackendResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &AzureSearchConfig {
        &self.config
    }

    fn url(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.config.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BackendError::invalid_request(format!(
                    "endpoint '{}' cannot carry a path",
                    self.config.endpoint
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut()
            .append_pair("api-version", &self.config.api_version);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> BackendResult<reqwest::Response> {
        let response = request
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "Search service rejected request");
        Err(BackendError::Status {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason()),
        })
    }

    async fn run_search(&self, index: &str, body: Value) -> BackendResult<Vec<ScoredDocument>> {
        let url = self.url(&["indexes", index, "docs", "search"])?;
        let response: SearchResponse = self
            .send(self.client.post(url).json(&body))
            .await?
            .json()
            .await?;

        Ok(response.value.into_iter().map(into_scored).collect())
    }
}

#[async_trait]
impl SearchBackend for AzureSearchBackend {
    fn default_index(&self) -> Option<String> {
        self.config.default_index.clone()
    }

    async fn search(&self, request: SearchRequest) -> BackendResult<Vec<ScoredDocument>> {
        let mut body = json!({
            "search": request.query,
            "top": request.top,
        });
        if !request.select.is_empty() {
            body["select"] = json!(request.select.join(","));
        }
        if let Some(filter) = &request.filter {
            body["filter"] = json!(filter);
        }
        self.run_search(&request.index, body).await
    }

    async fn vector_search(
        &self,
        request: SemanticSearchRequest,
    ) -> BackendResult<Vec<ScoredDocument>> {
        let mut body = json!({
            "search": request.query,
            "top": request.top,
            "queryType": "semantic",
            "semanticConfiguration": request.semantic_configuration,
        });
        if !request.select.is_empty() {
            body["select"] = json!(request.select.join(","));
        }
        self.run_search(&request.index, body).await
    }

    async fn list_indexes(&self) -> BackendResult<Vec<IndexSummary>> {
        let url = self.url(&["indexes"])?;
        let response: IndexListResponse = self.send(self.client.get(url)).await?.json().await?;

        Ok(response
            .value
            .into_iter()
            .map(|index| IndexSummary {
                name: index.name,
                fields_count: index.fields.len(),
            })
            .collect())
    }

    async fn get_schema(&self, index: &str) -> BackendResult<IndexSchema> {
        let url = self.url(&["indexes", index])?;
        let definition: IndexDefinition = self.send(self.client.get(url)).await?.json().await?;
        Ok(definition.into())
    }

    async fn get_document(
        &self,
        index: &str,
        key: &str,
        select: &[String],
    ) -> BackendResult<Option<Document>> {
        let mut url = self.url(&["indexes", index, "docs", key])?;
        if !select.is_empty() {
            url.query_pairs_mut()
                .append_pair("$select", &select.join(","));
        }

        match self.send(self.client.get(url)).await {
            Ok(response) => {
                let mut document: Document = response.json().await?;
                document.retain(|name, _| !name.starts_with('@'));
                Ok(Some(document))
            }
            Err(BackendError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn count(&self, index: &str) -> BackendResult<u64> {
        let url = self.url(&["indexes", index, "docs", "$count"])?;
        let text = self.send(self.client.get(url)).await?.text().await?;
        parse_count(&text)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<Document>,
}

#[derive(Deserialize)]
struct IndexListResponse {
    #[serde(default)]
    value: Vec<IndexDefinition>,
}

#[derive(Deserialize)]
struct IndexDefinition {
    name: String,
    #[serde(default)]
    fields: Vec<RawField>,
    #[serde(default)]
    semantic: Option<SemanticSettings>,
}

#[derive(Deserialize)]
struct SemanticSettings {
    #[serde(default)]
    configurations: Vec<NamedEntry>,
}

#[derive(Deserialize)]
struct NamedEntry {
    name: String,
}

/// The service reports `null` for attributes that do not apply to a field.
#[derive(Deserialize)]
struct RawField {
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    searchable: Option<bool>,
    filterable: Option<bool>,
    sortable: Option<bool>,
    facetable: Option<bool>,
    key: Option<bool>,
}

impl From<RawField> for FieldDescriptor {
    fn from(raw: RawField) -> Self {
        Self {
            name: raw.name,
            field_type: raw.field_type,
            searchable: raw.searchable.unwrap_or(false),
            filterable: raw.filterable.unwrap_or(false),
            sortable: raw.sortable.unwrap_or(false),
            facetable: raw.facetable.unwrap_or(false),
            key: raw.key.unwrap_or(false),
        }
    }
}

impl From<IndexDefinition> for IndexSchema {
    fn from(definition: IndexDefinition) -> Self {
        Self {
            name: definition.name,
            fields: definition.fields.into_iter().map(Into::into).collect(),
            semantic_configurations: definition
                .semantic
                .map(|s| s.configurations.into_iter().map(|c| c.name).collect())
                .unwrap_or_default(),
        }
    }
}

fn into_scored(mut document: Document) -> ScoredDocument {
    let score = document.get(SCORE_FIELD).and_then(Value::as_f64);
    let reranker = document.get(RERANKER_SCORE_FIELD).and_then(Value::as_f64);
    document.retain(|name, _| !name.starts_with('@'));
    ScoredDocument::new(document, score).with_reranker_score(reranker)
}

fn parse_count(text: &str) -> BackendResult<u64> {
    let trimmed = text.trim_start_matches('\u{feff}').trim();
    trimmed
        .parse()
        .map_err(|_| BackendError::decode(format!("document count is not an integer: '{}'", trimmed)))
}

fn error_message(body: &str, reason: Option<&str>) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().chars().take(200).collect()))
        .unwrap_or_else(|| reason.unwrap_or("request failed").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend(server: &MockServer) -> AzureSearchBackend {
        let endpoint = Url::parse(&server.uri()).unwrap();
        AzureSearchBackend::new(AzureSearchConfig::new(endpoint, "secret").default_index("hotels"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_search_strips_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/hotels/docs/search"))
            .and(query_param("api-version", DEFAULT_API_VERSION))
            .and(header("api-key", "secret"))
            .and(body_partial_json(json!({"search": "harbor", "top": 5, "select": "id,name"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"@search.score": 2.5, "@search.highlights": {}, "id": "1", "name": "Harbor View"}
                ]
            })))
            .mount(&server)
            .await;

        let hits = backend(&server)
            .await
            .search(
                SearchRequest::new("hotels", "harbor")
                    .top(5)
                    .select(vec!["id".into(), "name".into()]),
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].score, Some(2.5));
        assert_eq!(hits[0].document.len(), 2);
        assert!(hits[0].reranker_score.is_none());
    }

    #[tokio::test]
    async fn test_semantic_search_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/indexes/hotels/docs/search"))
            .and(body_partial_json(json!({
                "queryType": "semantic",
                "semanticConfiguration": "my-config"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"@search.score": 1.0, "@search.rerankerScore": 3.2, "id": "7"}]
            })))
            .mount(&server)
            .await;

        let hits = backend(&server)
            .await
            .vector_search(
                SemanticSearchRequest::new("hotels", "quiet").semantic_configuration("my-config"),
            )
            .await
            .unwrap();
        assert_eq!(hits[0].reranker_score, Some(3.2));
    }

    #[tokio::test]
    async fn test_count_parses_plain_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/hotels/docs/$count"))
            .respond_with(ResponseTemplate::new(200).set_body_string("\u{feff}42"))
            .mount(&server)
            .await;

        assert_eq!(backend(&server).await.count("hotels").await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_get_document_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/hotels/docs/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let doc = backend(&server)
            .await
            .get_document("hotels", "missing", &[])
            .await
            .unwrap();
        assert!(doc.is_none());
    }

    #[tokio::test]
    async fn test_schema_maps_null_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes/hotels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "hotels",
                "fields": [
                    {"name": "id", "type": "Edm.String", "key": true, "searchable": false, "filterable": true, "sortable": null, "facetable": null},
                    {"name": "address", "type": "Edm.ComplexType", "searchable": null, "filterable": null, "sortable": null, "facetable": null, "key": null}
                ],
                "semantic": {"configurations": [{"name": "default", "prioritizedFields": {}}]}
            })))
            .mount(&server)
            .await;

        let schema = backend(&server).await.get_schema("hotels").await.unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert!(schema.fields[0].key);
        assert!(!schema.fields[1].searchable);
        assert_eq!(schema.semantic_configurations, vec!["default"]);
    }

    #[tokio::test]
    async fn test_service_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/indexes"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": {"code": "", "message": "Authorization failed."}
            })))
            .mount(&server)
            .await;

        let err = backend(&server).await.list_indexes().await.unwrap_err();
        match err {
            BackendError::Status { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Authorization failed.");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_count_rejects_garbage() {
        assert!(parse_count("forty-two").is_err());
        assert_eq!(parse_count(" 7\n").unwrap(), 7);
    }
}
