use crate::util::lookup_path;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Raw, untyped input as it arrives from an HTTP form or query string.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FormData(pub BTreeMap<String, String>);

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The trimmed value for `key`, or `None` when absent or blank. Blank
    /// inputs mean "no constraint".
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).map(str::trim).filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A validated, typed input value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Bool(bool),
    Range { min: Option<f64>, max: Option<f64> },
}

impl FieldValue {
    /// Scalar representation used inside query clauses. Ranges have none.
    pub fn to_json(&self) -> Option<JsonValue> {
        match self {
            FieldValue::Text(s) => Some(JsonValue::String(s.clone())),
            FieldValue::Number(n) => serde_json::Number::from_f64(*n).map(JsonValue::Number),
            FieldValue::Date(d) => Some(JsonValue::String(d.format("%Y-%m-%d").to_string())),
            FieldValue::Bool(b) => Some(JsonValue::Bool(*b)),
            FieldValue::Range { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Hit {
    pub id: String,
    #[serde(default)]
    pub score: Option<f64>,
    pub source: JsonValue,
}

impl Hit {
    /// First value at a dotted path in the hit's source.
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        lookup_path(&self.source, path).into_iter().next()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchResponse {
    /// Total matches for the query, independent of the result window.
    pub total: u64,
    pub hits: Vec<Hit>,
}

impl SearchResponse {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }
}
