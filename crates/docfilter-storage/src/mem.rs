use crate::eval::{sort_sources, Compiled};
use docfilter_core::{FilterError, Hit, Result, SearchBackend, SearchRequest, SearchResponse};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus::{register_histogram_vec, HistogramVec};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

static SEARCH_QUERY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "docfilter_store_query_seconds",
        "In-memory store evaluation latency",
        &["index", "op"]
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDoc {
    pub id: String,
    pub source: JsonValue,
}

/// Document store held entirely in memory. Cheap to clone; clones share
/// the same indices.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    // index name -> documents in insertion order
    indices: HashMap<String, Vec<StoredDoc>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `index` if it does not exist yet.
    pub fn create_index(&self, index: &str) {
        self.inner
            .write()
            .indices
            .entry(index.to_string())
            .or_default();
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.inner.read().indices.contains_key(index)
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().indices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Stores `source` under `id` (a fresh ULID when `None`), replacing any
    /// document with the same id in place. Returns the id.
    pub fn index(&self, index: &str, id: Option<String>, source: JsonValue) -> Result<String> {
        if !source.is_object() {
            return Err(FilterError::Invalid(format!(
                "document source must be an object, got {source}"
            )));
        }
        let id = id.unwrap_or_else(|| ulid::Ulid::new().to_string());
        let mut inner = self.inner.write();
        let docs = inner.indices.entry(index.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.source = source,
            None => docs.push(StoredDoc {
                id: id.clone(),
                source,
            }),
        }
        Ok(id)
    }

    /// Indexes every `(id, source)` pair; stops at the first invalid
    /// document. Returns the number stored.
    pub fn bulk<I>(&self, index: &str, docs: I) -> Result<usize>
    where
        I: IntoIterator<Item = (Option<String>, JsonValue)>,
    {
        let mut stored = 0;
        for (id, source) in docs {
            self.index(index, id, source)?;
            stored += 1;
        }
        debug!(index, stored, "bulk indexed");
        Ok(stored)
    }

    pub fn get(&self, index: &str, id: &str) -> Option<StoredDoc> {
        let inner = self.inner.read();
        inner.indices.get(index)?.iter().find(|d| d.id == id).cloned()
    }

    /// Removes a document. `Ok(false)` when the id was not present.
    pub fn delete(&self, index: &str, id: &str) -> Result<bool> {
        let mut inner = self.inner.write();
        let docs = inner
            .indices
            .get_mut(index)
            .ok_or_else(|| FilterError::IndexNotFound(index.to_string()))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }

    pub fn len(&self, index: &str) -> usize {
        self.inner
            .read()
            .indices
            .get(index)
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self, index: &str) -> bool {
        self.len(index) == 0
    }

    fn matching(&self, index: &str, request: &SearchRequest) -> Result<Vec<StoredDoc>> {
        let compiled = Compiled::new(&request.effective_query())?;
        let inner = self.inner.read();
        let docs = inner
            .indices
            .get(index)
            .ok_or_else(|| FilterError::IndexNotFound(index.to_string()))?;
        Ok(docs
            .iter()
            .filter(|d| compiled.matches(&d.source))
            .cloned()
            .collect())
    }
}

impl SearchBackend for InMemoryStore {
    fn count(&self, index: &str, request: &SearchRequest) -> Result<u64> {
        let _timer = SEARCH_QUERY_SECONDS
            .with_label_values(&[index, "count"])
            .start_timer();
        Ok(self.matching(index, request)?.len() as u64)
    }

    fn execute(&self, index: &str, request: &SearchRequest) -> Result<SearchResponse> {
        let _timer = SEARCH_QUERY_SECONDS
            .with_label_values(&[index, "search"])
            .start_timer();
        let mut docs = self.matching(index, request)?;
        let total = docs.len() as u64;
        sort_sources(&mut docs, &request.sort, |d| &d.source);
        let (start, end) = match request.window {
            Some(w) => (w.start, w.end),
            None => (0, total),
        };
        let start = usize::try_from(start.min(total)).unwrap_or(usize::MAX);
        let end = usize::try_from(end.clamp(start as u64, total)).unwrap_or(usize::MAX);
        // Relevance is not modelled; unsorted hits all score 1.0.
        let score = request.sort.is_empty().then_some(1.0);
        let hits = docs
            .drain(start..end)
            .map(|d| Hit {
                id: d.id,
                score,
                source: d.source,
            })
            .collect();
        debug!(index, total, start, end, "executed search");
        Ok(SearchResponse { total, hits })
    }
}
