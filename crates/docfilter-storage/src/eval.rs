//! Query and sort evaluation over JSON sources.
//!
//! Follows the store's semantics closely enough for fixtures and tests:
//! `match` is a lower-cased token OR, `term` is exact, `wildcard` is a
//! case-sensitive glob and `range` compares numbers or ISO strings.

use docfilter_core::sort::{Direction, SortClause, SortMode};
use docfilter_core::util::lookup_path;
use docfilter_core::{FilterError, Query, Result};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::cmp::Ordering;

/// Keyword sub-fields that are indexed from their parent field.
const MULTI_FIELD_SUFFIXES: &[&str] = &["raw", "keyword"];

/// Scalar values at `path`, with leaf arrays flattened. A missing
/// multi-field (`title.raw`) resolves to its parent.
pub fn values_at<'a>(source: &'a JsonValue, path: &str) -> Vec<&'a JsonValue> {
    let mut found = lookup_path(source, path);
    if found.is_empty() {
        if let Some((parent, suffix)) = path.rsplit_once('.') {
            if MULTI_FIELD_SUFFIXES.contains(&suffix) {
                found = lookup_path(source, parent);
            }
        }
    }
    let mut out = Vec::with_capacity(found.len());
    for v in found {
        flatten_into(v, &mut out);
    }
    out
}

fn flatten_into<'a>(value: &'a JsonValue, out: &mut Vec<&'a JsonValue>) {
    match value {
        JsonValue::Array(items) => items.iter().for_each(|i| flatten_into(i, out)),
        JsonValue::Null => {}
        other => out.push(other),
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn scalar_eq(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn scalar_cmp(a: &JsonValue, b: &JsonValue) -> Option<Ordering> {
    match (a, b) {
        (JsonValue::Number(x), JsonValue::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (JsonValue::String(x), JsonValue::String(y)) => Some(x.cmp(y)),
        (JsonValue::Bool(x), JsonValue::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Converts a shell-style glob to an anchored regex.
fn glob_to_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 2);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| FilterError::Invalid(format!("wildcard '{glob}': {e}")))
}

/// A query prepared for repeated evaluation.
#[derive(Debug)]
pub enum Compiled {
    All,
    Match { field: String, terms: Vec<String> },
    MatchValue { field: String, value: JsonValue },
    Term { field: String, value: JsonValue },
    Wildcard { field: String, pattern: Regex },
    Range {
        field: String,
        gte: Option<JsonValue>,
        lte: Option<JsonValue>,
    },
    And(Vec<Compiled>),
}

impl Compiled {
    pub fn new(query: &Query) -> Result<Self> {
        Ok(match query {
            Query::MatchAll => Compiled::All,
            Query::Match { field, value } => match value {
                JsonValue::String(text) => Compiled::Match {
                    field: field.clone(),
                    terms: tokens(text).collect(),
                },
                other => Compiled::MatchValue {
                    field: field.clone(),
                    value: other.clone(),
                },
            },
            Query::Term { field, value } => Compiled::Term {
                field: field.clone(),
                value: value.clone(),
            },
            Query::Wildcard { field, value } => Compiled::Wildcard {
                field: field.clone(),
                pattern: glob_to_regex(value)?,
            },
            Query::Range { field, gte, lte } => Compiled::Range {
                field: field.clone(),
                gte: gte.clone(),
                lte: lte.clone(),
            },
            Query::Bool { must, filter } => Compiled::And(
                must.iter()
                    .chain(filter)
                    .map(Compiled::new)
                    .collect::<Result<_>>()?,
            ),
        })
    }

    pub fn matches(&self, source: &JsonValue) -> bool {
        match self {
            Compiled::All => true,
            Compiled::Match { field, terms } => {
                // A query with no tokens matches nothing, as an analyzed
                // empty match does.
                values_at(source, field).into_iter().any(|v| match v {
                    JsonValue::String(text) => tokens(text).any(|t| terms.contains(&t)),
                    other => terms.iter().any(|t| *t == other.to_string().to_lowercase()),
                })
            }
            Compiled::MatchValue { field, value } | Compiled::Term { field, value } => {
                values_at(source, field)
                    .into_iter()
                    .any(|v| scalar_eq(v, value))
            }
            Compiled::Wildcard { field, pattern } => {
                values_at(source, field).into_iter().any(|v| match v {
                    JsonValue::String(s) => pattern.is_match(s),
                    other => pattern.is_match(&other.to_string()),
                })
            }
            Compiled::Range { field, gte, lte } => {
                values_at(source, field).into_iter().any(|v| {
                    let lower = gte.as_ref().map_or(true, |b| {
                        matches!(scalar_cmp(v, b), Some(Ordering::Greater | Ordering::Equal))
                    });
                    let upper = lte.as_ref().map_or(true, |b| {
                        matches!(scalar_cmp(v, b), Some(Ordering::Less | Ordering::Equal))
                    });
                    lower && upper
                })
            }
            Compiled::And(clauses) => clauses.iter().all(|c| c.matches(source)),
        }
    }
}

/// Collapsed sort key of one document for one clause.
#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl SortKey {
    fn from_json(v: &JsonValue) -> Option<Self> {
        match v {
            JsonValue::Number(n) => n.as_f64().map(SortKey::Num),
            JsonValue::String(s) => Some(SortKey::Str(s.clone())),
            JsonValue::Bool(b) => Some(SortKey::Bool(*b)),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Bool(_) => 0,
            SortKey::Num(_) => 1,
            SortKey::Str(_) => 2,
        }
    }

    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Num(a), SortKey::Num(b)) => a.total_cmp(b),
            (SortKey::Str(a), SortKey::Str(b)) => a.cmp(b),
            (SortKey::Bool(a), SortKey::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

fn pick(mut keys: Vec<SortKey>, want: Ordering) -> Option<SortKey> {
    let first = keys.pop()?;
    Some(keys.into_iter().fold(first, |best, k| {
        if k.cmp(&best) == want {
            k
        } else {
            best
        }
    }))
}

fn numeric(keys: &[SortKey]) -> Option<Vec<f64>> {
    keys.iter()
        .map(|k| match k {
            SortKey::Num(n) => Some(*n),
            _ => None,
        })
        .collect()
}

fn aggregate(keys: Vec<SortKey>, mode: SortMode) -> Option<SortKey> {
    if keys.is_empty() {
        return None;
    }
    match mode {
        SortMode::Min => pick(keys, Ordering::Less),
        SortMode::Max => pick(keys, Ordering::Greater),
        SortMode::Sum => numeric(&keys).map(|ns| SortKey::Num(ns.iter().sum())),
        SortMode::Avg => {
            numeric(&keys).map(|ns| SortKey::Num(ns.iter().sum::<f64>() / ns.len() as f64))
        }
        SortMode::Median => numeric(&keys).map(|mut ns| {
            ns.sort_by(f64::total_cmp);
            let mid = ns.len() / 2;
            SortKey::Num(if ns.len() % 2 == 0 {
                (ns[mid - 1] + ns[mid]) / 2.0
            } else {
                ns[mid]
            })
        }),
    }
}

/// Sort key for `source` under `clause`. Multi-valued flat fields use their
/// smallest value ascending and largest descending.
fn sort_key(source: &JsonValue, clause: &SortClause) -> Option<SortKey> {
    let keys: Vec<SortKey> = values_at(source, clause.field())
        .into_iter()
        .filter_map(SortKey::from_json)
        .collect();
    let mode = match clause {
        SortClause::Nested { mode, .. } => *mode,
        SortClause::Field { direction, .. } => match direction {
            Direction::Asc => SortMode::Min,
            Direction::Desc => SortMode::Max,
        },
    };
    aggregate(keys, mode)
}

/// Stable multi-key sort. Documents missing a key sort last in either
/// direction.
pub fn sort_sources<T>(
    items: &mut Vec<T>,
    clauses: &[SortClause],
    source: impl Fn(&T) -> &JsonValue,
) {
    if clauses.is_empty() {
        return;
    }
    let mut keyed: Vec<(Vec<Option<SortKey>>, T)> = items
        .drain(..)
        .map(|item| {
            let keys = clauses.iter().map(|c| sort_key(source(&item), c)).collect();
            (keys, item)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare_keys(a, b, clauses));
    items.extend(keyed.into_iter().map(|(_, item)| item));
}

fn compare_keys(a: &[Option<SortKey>], b: &[Option<SortKey>], clauses: &[SortClause]) -> Ordering {
    for ((ka, kb), clause) in a.iter().zip(b).zip(clauses) {
        let ord = match (ka, kb) {
            (Some(x), Some(y)) => match clause.direction() {
                Direction::Asc => x.cmp(y),
                Direction::Desc => y.cmp(x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
