//! In-memory search backend.
//!
//! Keeps whole indexes in memory and scores documents by the number of query
//! terms they contain. Filters accept the `field eq value` subset of OData
//! joined with `and`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::types::{
    Document, FieldDescriptor, IndexSchema, IndexSummary, ScoredDocument, SearchRequest,
    SemanticSearchRequest,
};
use super::{BackendError, BackendResult, SearchBackend};

/// A named index with its schema and documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryIndex {
    schema: IndexSchema,
    documents: Vec<Document>,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: IndexSchema {
                name: name.into(),
                ..Default::default()
            },
            documents: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.schema.fields.push(field);
        self
    }

    pub fn semantic_configuration(mut self, name: impl Into<String>) -> Self {
        self.schema.semantic_configurations.push(name.into());
        self
    }

    /// Adds a document. Non-object values are ignored.
    pub fn document(mut self, document: Value) -> Self {
        if let Value::Object(map) = document {
            self.documents.push(map);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn searchable_text(&self, document: &Document) -> String {
        let searchable: Vec<&str> = self
            .schema
            .fields
            .iter()
            .filter(|f| f.searchable)
            .map(|f| f.name.as_str())
            .collect();

        document
            .iter()
            .filter(|(name, _)| searchable.is_empty() || searchable.contains(&name.as_str()))
            .filter_map(|(_, value)| value.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    fn rank(
        &self,
        query: &str,
        filter: Option<&[Clause]>,
        top: u32,
        select: &[String],
    ) -> Vec<ScoredDocument> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        let match_all = terms.is_empty() || terms.iter().all(|t| t == "*");

        let mut hits: Vec<(f64, &Document)> = self
            .documents
            .iter()
            .filter(|doc| filter.is_none_or(|clauses| clauses.iter().all(|c| c.matches(doc))))
            .filter_map(|doc| {
                if match_all {
                    return Some((1.0, doc));
                }
                let text = self.searchable_text(doc);
                let score = terms.iter().filter(|t| text.contains(t.as_str())).count();
                (score > 0).then_some((score as f64, doc))
            })
            .collect();

        hits.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top as usize);

        hits.into_iter()
            .map(|(score, doc)| ScoredDocument::new(project(doc, select), Some(score)))
            .collect()
    }
}

/// Search backend over in-memory indexes.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    indexes: RwLock<BTreeMap<String, MemoryIndex>>,
    default_index: Option<String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_index(mut self, index: MemoryIndex) -> Self {
        self.indexes
            .get_mut()
            .insert(index.name().to_string(), index);
        self
    }

    pub fn with_default_index(mut self, name: impl Into<String>) -> Self {
        self.default_index = Some(name.into());
        self
    }

    pub async fn insert_index(&self, index: MemoryIndex) {
        self.indexes
            .write()
            .await
            .insert(index.name().to_string(), index);
    }

    async fn with_named<T>(
        &self,
        name: &str,
        f: impl FnOnce(&MemoryIndex) -> BackendResult<T>,
    ) -> BackendResult<T> {
        let indexes = self.indexes.read().await;
        let index = indexes
            .get(name)
            .ok_or_else(|| BackendError::not_found(format!("index '{}'", name)))?;
        f(index)
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    fn default_index(&self) -> Option<String> {
        self.default_index.clone()
    }

    async fn search(&self, request: SearchRequest) -> BackendResult<Vec<ScoredDocument>> {
        let clauses = request.filter.as_deref().map(parse_filter).transpose()?;
        self.with_named(&request.index, |index| {
            Ok(index.rank(
                &request.query,
                clauses.as_deref(),
                request.top,
                &request.select,
            ))
        })
        .await
    }

    async fn vector_search(
        &self,
        request: SemanticSearchRequest,
    ) -> BackendResult<Vec<ScoredDocument>> {
        self.with_named(&request.index, |index| {
            if !index
                .schema
                .semantic_configurations
                .contains(&request.semantic_configuration)
            {
                return Err(BackendError::invalid_request(format!(
                    "semantic configuration '{}' is not defined on index '{}'",
                    request.semantic_configuration,
                    index.name()
                )));
            }
            Ok(index
                .rank(&request.query, None, request.top, &request.select)
                .into_iter()
                .map(|hit| {
                    let reranker = hit.score;
                    hit.with_reranker_score(reranker)
                })
                .collect())
        })
        .await
    }

    async fn list_indexes(&self) -> BackendResult<Vec<IndexSummary>> {
        let indexes = self.indexes.read().await;
        Ok(indexes
            .values()
            .map(|index| IndexSummary {
                name: index.name().to_string(),
                fields_count: index.schema.fields.len(),
            })
            .collect())
    }

    async fn get_schema(&self, index: &str) -> BackendResult<IndexSchema> {
        self.with_named(index, |index| Ok(index.schema.clone()))
            .await
    }

    async fn get_document(
        &self,
        index: &str,
        key: &str,
        select: &[String],
    ) -> BackendResult<Option<Document>> {
        self.with_named(index, |index| {
            let key_field = index.schema.key_field().ok_or_else(|| {
                BackendError::invalid_request(format!("index '{}' has no key field", index.name()))
            })?;
            Ok(index
                .documents
                .iter()
                .find(|doc| doc.get(&key_field.name).is_some_and(|v| value_eq_str(v, key)))
                .map(|doc| project(doc, select)))
        })
        .await
    }

    async fn count(&self, index: &str) -> BackendResult<u64> {
        self.with_named(index, |index| Ok(index.len() as u64))
            .await
    }
}

fn project(document: &Document, select: &[String]) -> Document {
    if select.is_empty() {
        return document.clone();
    }
    document
        .iter()
        .filter(|(name, _)| select.iter().any(|s| s == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

fn value_eq_str(value: &Value, expected: &str) -> bool {
    match value {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Clause {
    field: String,
    value: Value,
}

impl Clause {
    fn matches(&self, document: &Document) -> bool {
        document.get(&self.field) == Some(&self.value)
    }
}

fn parse_filter(filter: &str) -> BackendResult<Vec<Clause>> {
    filter
        .split(" and ")
        .map(|clause| {
            let mut parts = clause.trim().splitn(3, ' ');
            let (Some(field), Some("eq"), Some(raw)) = (parts.next(), parts.next(), parts.next())
            else {
                return Err(BackendError::invalid_request(format!(
                    "unsupported filter clause: '{}'",
                    clause.trim()
                )));
            };
            let raw = raw.trim();
            let value = if let Some(s) = raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\''))
            {
                Value::String(s.replace("''", "'"))
            } else {
                serde_json::from_str(raw).map_err(|_| {
                    BackendError::invalid_request(format!("unsupported filter value: '{}'", raw))
                })?
            };
            Ok(Clause {
                field: field.to_string(),
                value,
            })
        })
        .collect()
}
