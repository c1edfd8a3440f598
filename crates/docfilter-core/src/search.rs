use crate::errors::Result;
use crate::model::SearchResponse;
use crate::paginate::Window;
use crate::query::Query;
use crate::sort::SortClause;
use serde_json::{json, Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

/// The document store, as seen by the query compiler.
pub trait SearchBackend: Send + Sync + 'static {
    /// Number of documents matching the request's query; sort and window are
    /// ignored.
    fn count(&self, index: &str, request: &SearchRequest) -> Result<u64>;
    fn execute(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse>;
}

/// A searchable document type.
pub trait Document: Send + Sync {
    fn search(&self) -> Search;
}

/// A document type backed by one index of a [`SearchBackend`].
#[derive(Clone)]
pub struct IndexDocument {
    index: String,
    backend: Arc<dyn SearchBackend>,
}

impl IndexDocument {
    pub fn new(index: impl Into<String>, backend: Arc<dyn SearchBackend>) -> Self {
        Self {
            index: index.into(),
            backend,
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }
}

impl Document for IndexDocument {
    fn search(&self) -> Search {
        Search::new(self.index.clone(), self.backend.clone())
    }
}

impl fmt::Debug for IndexDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDocument")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// Declarative request body: scored query, non-scoring filters, sort keys
/// and an optional result window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub query: Option<Query>,
    pub filter: Vec<Query>,
    pub sort: Vec<SortClause>,
    pub window: Option<Window>,
}

impl SearchRequest {
    /// Query and filters combined into the single tree the store evaluates.
    pub fn effective_query(&self) -> Query {
        let query = self.query.clone().unwrap_or(Query::MatchAll);
        if self.filter.is_empty() {
            return query;
        }
        let must = if query.is_match_all() {
            Vec::new()
        } else {
            vec![query]
        };
        Query::Bool {
            must,
            filter: self.filter.clone(),
        }
    }

    pub fn to_json(&self) -> JsonValue {
        let mut body = Map::new();
        body.insert("query".into(), self.effective_query().to_json());
        if !self.sort.is_empty() {
            body.insert(
                "sort".into(),
                JsonValue::Array(self.sort.iter().map(SortClause::to_json).collect()),
            );
        }
        if let Some(w) = self.window {
            body.insert("from".into(), json!(w.start));
            body.insert("size".into(), json!(w.size()));
        }
        JsonValue::Object(body)
    }
}

/// Chainable, not-yet-executed search against one index.
#[derive(Clone)]
pub struct Search {
    index: String,
    backend: Arc<dyn SearchBackend>,
    request: SearchRequest,
}

impl Search {
    pub fn new(index: impl Into<String>, backend: Arc<dyn SearchBackend>) -> Self {
        Search {
            index: index.into(),
            backend,
            request: SearchRequest::default(),
        }
    }

    /// Adds a scoring clause, ANDed with any existing one.
    pub fn query(mut self, clause: Query) -> Self {
        self.request.query = Some(match self.request.query.take() {
            Some(existing) => existing.and(clause),
            None => clause,
        });
        self
    }

    /// Adds a non-scoring filter clause.
    pub fn filter(mut self, clause: Query) -> Self {
        self.request.filter.push(clause);
        self
    }

    /// Appends a sort key; earlier keys take precedence.
    pub fn sort(mut self, clause: SortClause) -> Self {
        self.request.sort.push(clause);
        self
    }

    pub fn slice(mut self, window: Window) -> Self {
        self.request.window = Some(window);
        self
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn request(&self) -> &SearchRequest {
        &self.request
    }

    pub fn to_json(&self) -> JsonValue {
        self.request.to_json()
    }

    pub fn count(&self) -> Result<u64> {
        self.backend.count(&self.index, &self.request)
    }

    pub fn execute(&self) -> Result<SearchResponse> {
        self.backend.execute(&self.index, &self.request)
    }
}

impl fmt::Debug for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Search")
            .field("index", &self.index)
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}
