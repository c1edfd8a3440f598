use crate::errors::{FilterError, Result};
use crate::util::field_path;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;

const DESC_MARKER: char = '-';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How several nested values collapse into one sort key per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    Min,
    Max,
    Sum,
    #[default]
    Avg,
    Median,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Min => "min",
            SortMode::Max => "max",
            SortMode::Sum => "sum",
            SortMode::Avg => "avg",
            SortMode::Median => "median",
        }
    }
}

/// Sort on a field inside an array of nested objects.
///
/// `nested_path` is optional here so declarations stay plain data; a
/// missing path is reported when the sort is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedSort {
    pub field: String,
    #[serde(default)]
    pub nested_path: Option<String>,
    #[serde(default)]
    pub mode: Option<SortMode>,
}

impl NestedSort {
    pub fn new(field: impl Into<String>, nested_path: impl Into<String>) -> Self {
        NestedSort {
            field: field.into(),
            nested_path: Some(nested_path.into()),
            mode: None,
        }
    }

    pub fn mode(mut self, mode: SortMode) -> Self {
        self.mode = Some(mode);
        self
    }
}

/// One legal sort choice as offered to the user: `("-price", "Price (High to Low)")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortChoice(pub String, pub String);

impl SortChoice {
    pub fn new(token: impl Into<String>, label: impl Into<String>) -> Self {
        SortChoice(token.into(), label.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    pub fn label(&self) -> &str {
        &self.1
    }
}

/// Resolved sort clause in the store's native format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortClause {
    /// Plain field sort, written as a signed field reference (`"-title"`).
    Field { field: String, direction: Direction },
    Nested {
        field: String,
        direction: Direction,
        mode: SortMode,
        nested_path: String,
    },
}

impl SortClause {
    pub fn field(&self) -> &str {
        match self {
            SortClause::Field { field, .. } | SortClause::Nested { field, .. } => field,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            SortClause::Field { direction, .. } | SortClause::Nested { direction, .. } => {
                *direction
            }
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            SortClause::Field { field, direction } => match direction {
                Direction::Asc => JsonValue::String(field.clone()),
                Direction::Desc => JsonValue::String(format!("{DESC_MARKER}{field}")),
            },
            SortClause::Nested {
                field,
                direction,
                mode,
                nested_path,
            } => json!({
                field.as_str(): {
                    "order": direction.as_str(),
                    "mode": mode.as_str(),
                    "nested": { "path": nested_path },
                }
            }),
        }
    }
}

impl Serialize for SortClause {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Splits a sort token into its base key and direction.
pub fn split_token(token: &str) -> (&str, Direction) {
    let token = token.trim();
    match token.strip_prefix(DESC_MARKER) {
        Some(base) => (base, Direction::Desc),
        None => (token, Direction::Asc),
    }
}

/// Declared sort configuration for one filter set.
///
/// A key is sortable when it is the base key of a declared choice, has an
/// explicit field mapping, or has a nested descriptor. Nested descriptors
/// win over flat ones for the same key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    #[serde(default, rename = "sort_choices")]
    pub choices: Vec<SortChoice>,
    /// Flat sort keys whose field path differs from the key itself.
    #[serde(default, rename = "sort_fields")]
    pub fields: BTreeMap<String, String>,
    #[serde(default, rename = "nested_sort")]
    pub nested: BTreeMap<String, NestedSort>,
}

impl SortSpec {
    pub fn is_empty(&self) -> bool {
        self.choices.is_empty() && self.fields.is_empty() && self.nested.is_empty()
    }

    fn flat_field<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if let Some(path) = self.fields.get(key) {
            return Some(path);
        }
        self.choices
            .iter()
            .any(|c| split_token(c.token()).0 == key)
            .then_some(key)
    }

    /// Whether `token` may be submitted as the `sort` input. Without declared
    /// choices any token is accepted and unknown keys simply resolve to no
    /// sort.
    pub fn accepts(&self, token: &str) -> bool {
        if self.choices.is_empty() {
            return true;
        }
        let token = token.trim();
        token.is_empty()
            || self.choices.iter().any(|c| c.token() == token)
            || self.nested.contains_key(split_token(token).0)
    }

    /// Resolves a requested sort token. `Ok(None)` means the store's
    /// default relevance order applies.
    pub fn resolve(&self, token: &str) -> Result<Option<SortClause>> {
        let (key, direction) = split_token(token);
        if key.is_empty() {
            return Ok(None);
        }
        if let Some(nested) = self.nested.get(key) {
            let nested_path = nested
                .nested_path
                .as_deref()
                .map(field_path)
                .ok_or_else(|| FilterError::MissingNestedPath(key.to_string()))?;
            return Ok(Some(SortClause::Nested {
                field: field_path(&nested.field),
                direction,
                mode: nested.mode.unwrap_or_default(),
                nested_path,
            }));
        }
        Ok(self.flat_field(key).map(|field| SortClause::Field {
            field: field_path(field),
            direction,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_spec() -> SortSpec {
        SortSpec {
            choices: vec![
                SortChoice::new("", "Default"),
                SortChoice::new("title", "Title (A-Z)"),
                SortChoice::new("-title", "Title (Z-A)"),
            ],
            ..Default::default()
        }
    }

    fn employees_spec(nested: NestedSort) -> SortSpec {
        SortSpec {
            nested: BTreeMap::from([("number_of_employees".to_string(), nested)]),
            ..Default::default()
        }
    }

    #[test]
    fn split_marker() {
        assert_eq!(split_token("title"), ("title", Direction::Asc));
        assert_eq!(split_token("-title"), ("title", Direction::Desc));
        assert_eq!(split_token(""), ("", Direction::Asc));
        assert_eq!(split_token("-"), ("", Direction::Desc));
    }

    #[test]
    fn flat_ascending() {
        let clause = title_spec().resolve("title").unwrap().unwrap();
        assert_eq!(clause.to_json(), json!("title"));
        assert_eq!(clause.direction(), Direction::Asc);
    }

    #[test]
    fn flat_descending() {
        let clause = title_spec().resolve("-title").unwrap().unwrap();
        assert_eq!(clause.to_json(), json!("-title"));
        assert_eq!(clause.direction(), Direction::Desc);
    }

    #[test]
    fn flat_field_mapping() {
        let mut spec = title_spec();
        spec.fields.insert("title".into(), "title.raw".into());
        assert_eq!(
            spec.resolve("-title").unwrap().unwrap().to_json(),
            json!("-title.raw")
        );
    }

    #[test]
    fn unknown_or_empty_key_has_no_sort() {
        let spec = title_spec();
        assert_eq!(spec.resolve("").unwrap(), None);
        assert_eq!(spec.resolve("-").unwrap(), None);
        assert_eq!(spec.resolve("price").unwrap(), None);
        assert_eq!(SortSpec::default().resolve("title").unwrap(), None);
    }

    #[test]
    fn nested_descending_with_mode() {
        let spec = employees_spec(
            NestedSort::new("primary_accounts.Number_of_Employees", "primary_accounts")
                .mode(SortMode::Max),
        );
        let clause = spec.resolve("-number_of_employees").unwrap().unwrap();
        assert_eq!(
            clause.to_json(),
            json!({
                "primary_accounts.Number_of_Employees": {
                    "order": "desc",
                    "mode": "max",
                    "nested": {"path": "primary_accounts"},
                }
            })
        );
    }

    #[test]
    fn double_underscore_paths_are_dotted() {
        let mut spec = employees_spec(
            NestedSort::new(
                "primary_accounts__Number_of_Employees",
                "primary_accounts",
            )
            .mode(SortMode::Sum),
        );
        spec.fields
            .insert("company_name".into(), "company_name__raw_search_field".into());
        match spec.resolve("number_of_employees").unwrap().unwrap() {
            SortClause::Nested {
                field, nested_path, ..
            } => {
                assert_eq!(field, "primary_accounts.Number_of_Employees");
                assert_eq!(nested_path, "primary_accounts");
            }
            other => panic!("expected nested clause, got {other:?}"),
        }
        assert_eq!(
            spec.resolve("-company_name").unwrap().unwrap().to_json(),
            json!("-company_name.raw_search_field")
        );
    }

    #[test]
    fn nested_default_mode_is_avg() {
        let spec = employees_spec(NestedSort::new("employees.salary", "employees"));
        match spec.resolve("number_of_employees").unwrap().unwrap() {
            SortClause::Nested {
                mode, direction, ..
            } => {
                assert_eq!(mode, SortMode::Avg);
                assert_eq!(direction, Direction::Asc);
            }
            other => panic!("expected nested clause, got {other:?}"),
        }
    }

    #[test]
    fn nested_missing_path_is_error() {
        let spec = employees_spec(NestedSort {
            field: "departments.employee_count".into(),
            nested_path: None,
            mode: None,
        });
        let err = spec.resolve("number_of_employees").unwrap_err();
        assert!(err.is_configuration());
        let msg = err.to_string();
        assert!(msg.contains("nested_path is required"));
        assert!(msg.contains("number_of_employees"));
        // Other keys still resolve.
        assert_eq!(spec.resolve("title").unwrap(), None);
    }

    #[test]
    fn accepts_declared_tokens_only() {
        let mut spec = title_spec();
        spec.nested.insert(
            "employee_count".into(),
            NestedSort::new("departments.employee_count", "departments"),
        );
        assert!(spec.accepts("title"));
        assert!(spec.accepts("-title"));
        assert!(spec.accepts(""));
        assert!(spec.accepts("-employee_count"));
        assert!(!spec.accepts("price"));
        assert!(SortSpec::default().accepts("anything"));
    }

    #[test]
    fn nested_declaration_from_json() {
        let spec: SortSpec = serde_json::from_value(json!({
            "sort_choices": [["", "Default"], ["salary", "Salary"]],
            "nested_sort": {
                "salary": {"field": "employees.salary", "nested_path": "employees"}
            }
        }))
        .unwrap();
        assert_eq!(spec.choices[1].label(), "Salary");
        assert_eq!(spec.nested["salary"].mode, None);
    }
}
