//! Request and result types exchanged with a search backend.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A search document as returned by the backend, minus service metadata.
pub type Document = Map<String, Value>;

/// Full-text search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub index: String,
    pub query: String,
    pub top: u32,
    /// Fields to return; empty means all retrievable fields.
    pub select: Vec<String>,
    /// OData filter expression.
    pub filter: Option<String>,
}

impl SearchRequest {
    pub fn new(index: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            query: query.into(),
            top: 10,
            select: Vec::new(),
            filter: None,
        }
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.select = fields;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Semantic (vector-ranked) search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SemanticSearchRequest {
    pub index: String,
    pub query: String,
    pub top: u32,
    pub select: Vec<String>,
    pub semantic_configuration: String,
}

impl SemanticSearchRequest {
    pub fn new(index: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            query: query.into(),
            top: 10,
            select: Vec::new(),
            semantic_configuration: "default".to_string(),
        }
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = top;
        self
    }

    pub fn select(mut self, fields: Vec<String>) -> Self {
        self.select = fields;
        self
    }

    pub fn semantic_configuration(mut self, name: impl Into<String>) -> Self {
        self.semantic_configuration = name.into();
        self
    }
}

/// A document together with its ranking scores.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: Option<f64>,
    pub reranker_score: Option<f64>,
}

impl ScoredDocument {
    pub fn new(document: Document, score: Option<f64>) -> Self {
        Self {
            document,
            score,
            reranker_score: None,
        }
    }

    pub fn with_reranker_score(mut self, score: Option<f64>) -> Self {
        self.reranker_score = score;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub name: String,
    pub fields_count: usize,
}

/// Field attributes of an index definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub filterable: bool,
    #[serde(default)]
    pub sortable: bool,
    #[serde(default)]
    pub facetable: bool,
    #[serde(default)]
    pub key: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            ..Default::default()
        }
    }

    pub fn key(mut self) -> Self {
        self.key = true;
        self
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn facetable(mut self) -> Self {
        self.facetable = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
    pub semantic_configurations: Vec<String>,
}

impl IndexSchema {
    pub fn key_field(&self) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key)
    }
}
