use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value as JsonValue};

/// A clause in the document store's query DSL.
///
/// Serializes to the OpenSearch/Elasticsearch JSON shape, e.g.
/// `{"match": {"title": "Django"}}` or
/// `{"range": {"price": {"gte": 30.0, "lte": 50.0}}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    Match {
        field: String,
        value: JsonValue,
    },
    Term {
        field: String,
        value: JsonValue,
    },
    Wildcard {
        field: String,
        value: String,
    },
    Range {
        field: String,
        gte: Option<JsonValue>,
        lte: Option<JsonValue>,
    },
    Bool {
        must: Vec<Query>,
        filter: Vec<Query>,
    },
}

impl Query {
    pub fn matches(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Query::Match {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Query::Term {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn wildcard(field: impl Into<String>, value: impl Into<String>) -> Self {
        Query::Wildcard {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn range(
        field: impl Into<String>,
        gte: Option<JsonValue>,
        lte: Option<JsonValue>,
    ) -> Self {
        Query::Range {
            field: field.into(),
            gte,
            lte,
        }
    }

    /// Logical AND of `clauses`. No clauses means match everything; a single
    /// clause is returned unwrapped.
    pub fn all_of(mut clauses: Vec<Query>) -> Self {
        match clauses.len() {
            0 => Query::MatchAll,
            1 => clauses.remove(0),
            _ => Query::Bool {
                must: clauses,
                filter: Vec::new(),
            },
        }
    }

    /// ANDs `other` onto this query, flattening into an existing bool.
    pub fn and(self, other: Query) -> Self {
        match (self, other) {
            (Query::MatchAll, q) | (q, Query::MatchAll) => q,
            (Query::Bool { mut must, filter }, q) => {
                must.push(q);
                Query::Bool { must, filter }
            }
            (q, other) => Query::Bool {
                must: vec![q, other],
                filter: Vec::new(),
            },
        }
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Query::MatchAll)
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::Match { field, value } => json!({ "match": { field.as_str(): value } }),
            Query::Term { field, value } => json!({ "term": { field.as_str(): value } }),
            Query::Wildcard { field, value } => {
                json!({ "wildcard": { field.as_str(): { "value": value } } })
            }
            Query::Range { field, gte, lte } => {
                let mut bounds = Map::new();
                if let Some(v) = gte {
                    bounds.insert("gte".into(), v.clone());
                }
                if let Some(v) = lte {
                    bounds.insert("lte".into(), v.clone());
                }
                json!({ "range": { field.as_str(): bounds } })
            }
            Query::Bool { must, filter } => {
                let mut body = Map::new();
                if !must.is_empty() {
                    body.insert(
                        "must".into(),
                        JsonValue::Array(must.iter().map(Query::to_json).collect()),
                    );
                }
                if !filter.is_empty() {
                    body.insert(
                        "filter".into(),
                        JsonValue::Array(filter.iter().map(Query::to_json).collect()),
                    );
                }
                json!({ "bool": body })
            }
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
