//! Declarative field filters.
//!
//! A [`FieldFilter`] maps one logical input to one clause shape against one
//! document field. Filters are immutable configuration: all per-request
//! state lives in the bound form.

use crate::form::{BoundForm, FieldParser, ValueKind, Widget, WidgetKind};
use crate::model::{FieldValue, FormData};
use crate::query::Query;
use crate::util::{field_path, humanize};
use serde::{Deserialize, Serialize};

pub const MIN_SUFFIX: &str = "_min_value";
pub const MAX_SUFFIX: &str = "_max_value";

/// Clause shape produced by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookup {
    #[serde(alias = "term")]
    Equals,
    #[serde(alias = "wildcard")]
    Pattern,
    #[serde(alias = "match")]
    FullText,
    Gte,
    Lte,
    Range,
}

impl Lookup {
    pub fn as_str(self) -> &'static str {
        match self {
            Lookup::Equals => "term",
            Lookup::Pattern => "wildcard",
            Lookup::FullText => "match",
            Lookup::Gte => "gte",
            Lookup::Lte => "lte",
            Lookup::Range => "range",
        }
    }
}

/// One declared filter. Range filters are numeric: their bounds always
/// parse as numbers, and a declaration pairing `range` with another kind
/// is rejected when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FieldFilterDecl")]
pub struct FieldFilter {
    field_name: String,
    kind: ValueKind,
    lookup: Lookup,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_label: Option<String>,
}

#[derive(Deserialize)]
struct FieldFilterDecl {
    field_name: String,
    kind: ValueKind,
    lookup: Lookup,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    min_label: Option<String>,
    #[serde(default)]
    max_label: Option<String>,
}

impl TryFrom<FieldFilterDecl> for FieldFilter {
    type Error = String;

    fn try_from(decl: FieldFilterDecl) -> Result<Self, Self::Error> {
        if decl.lookup == Lookup::Range && decl.kind != ValueKind::Number {
            return Err(format!(
                "range filter on '{}' must be of kind number, got {}",
                decl.field_name,
                decl.kind.as_str()
            ));
        }
        Ok(FieldFilter {
            field_name: decl.field_name,
            kind: decl.kind,
            lookup: decl.lookup,
            label: decl.label,
            min_label: decl.min_label,
            max_label: decl.max_label,
        })
    }
}

impl FieldFilter {
    pub fn new(field_name: impl Into<String>, kind: ValueKind, lookup: Lookup) -> Self {
        FieldFilter {
            field_name: field_name.into(),
            kind,
            lookup,
            label: None,
            min_label: None,
            max_label: None,
        }
    }

    /// Short text input, full-text match by default.
    pub fn char(field_name: impl Into<String>) -> Self {
        Self::new(field_name, ValueKind::Text, Lookup::FullText)
    }

    pub fn numeric(field_name: impl Into<String>) -> Self {
        Self::new(field_name, ValueKind::Number, Lookup::Equals)
    }

    pub fn date(field_name: impl Into<String>) -> Self {
        Self::new(field_name, ValueKind::Date, Lookup::Equals)
    }

    pub fn boolean(field_name: impl Into<String>) -> Self {
        Self::new(field_name, ValueKind::Boolean, Lookup::Equals)
    }

    /// Paired numeric bounds bound from `<name>_min_value` and
    /// `<name>_max_value`.
    pub fn range(field_name: impl Into<String>) -> Self {
        Self::new(field_name, ValueKind::Number, Lookup::Range)
    }

    /// Switching to [`Lookup::Range`] also makes the filter numeric.
    pub fn lookup(mut self, lookup: Lookup) -> Self {
        if lookup == Lookup::Range {
            self.kind = ValueKind::Number;
        }
        self.lookup = lookup;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn min_label(mut self, label: impl Into<String>) -> Self {
        self.min_label = Some(label.into());
        self
    }

    pub fn max_label(mut self, label: impl Into<String>) -> Self {
        self.max_label = Some(label.into());
        self
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn lookup_kind(&self) -> Lookup {
        self.lookup
    }

    pub fn display_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| humanize(&self.field_name))
    }

    pub fn display_min_label(&self) -> String {
        self.min_label
            .clone()
            .unwrap_or_else(|| format!("Min {}", self.display_label()))
    }

    pub fn display_max_label(&self) -> String {
        self.max_label
            .clone()
            .unwrap_or_else(|| format!("Max {}", self.display_label()))
    }

    pub fn is_range(&self) -> bool {
        self.lookup == Lookup::Range
    }

    /// Input keys this filter reads when declared under `name`.
    pub fn input_keys(&self, name: &str) -> Vec<String> {
        if self.is_range() {
            vec![format!("{name}{MIN_SUFFIX}"), format!("{name}{MAX_SUFFIX}")]
        } else {
            vec![name.to_string()]
        }
    }

    /// Widgets for this filter. Range filters yield one number widget per
    /// bound; every widget is optional.
    pub fn widgets(&self, name: &str) -> Vec<Widget> {
        if self.is_range() {
            vec![
                Widget::optional(
                    format!("{name}{MIN_SUFFIX}"),
                    WidgetKind::Number,
                    self.display_min_label(),
                ),
                Widget::optional(
                    format!("{name}{MAX_SUFFIX}"),
                    WidgetKind::Number,
                    self.display_max_label(),
                ),
            ]
        } else {
            vec![Widget::optional(
                name,
                WidgetKind::from(self.kind),
                self.display_label(),
            )]
        }
    }

    /// Reads and validates this filter's input(s) from `data`, recording
    /// parse failures on `form`. Returns `None` when nothing usable was
    /// supplied.
    pub fn bind(
        &self,
        name: &str,
        data: &FormData,
        parser: &dyn FieldParser,
        form: &mut BoundForm,
    ) -> Option<FieldValue> {
        if self.is_range() {
            let mut bound = |key: String| {
                let raw = data.get_non_empty(&key)?;
                match parser.parse_number(raw) {
                    Ok(n) => Some(n),
                    Err(e) => {
                        form.add_error(&key, e);
                        None
                    }
                }
            };
            let min = bound(format!("{name}{MIN_SUFFIX}"));
            let max = bound(format!("{name}{MAX_SUFFIX}"));
            if min.is_none() && max.is_none() {
                return None;
            }
            return Some(FieldValue::Range { min, max });
        }
        let raw = data.get_non_empty(name)?;
        match parser.parse(self.kind, raw) {
            Ok(value) => Some(value),
            Err(e) => {
                form.add_error(name, e);
                None
            }
        }
    }

    /// Clause for a bound value, or `None` when the value constrains
    /// nothing (a range without bounds, or a value of the wrong shape).
    pub fn build_clause(&self, value: &FieldValue) -> Option<Query> {
        let field = field_path(&self.field_name);
        match (self.lookup, value) {
            (Lookup::Range, FieldValue::Range { min, max }) => {
                let gte = min.and_then(number);
                let lte = max.and_then(number);
                if gte.is_none() && lte.is_none() {
                    return None;
                }
                Some(Query::range(field, gte, lte))
            }
            (Lookup::Range, _) | (_, FieldValue::Range { .. }) => None,
            (Lookup::Equals, v) => Some(Query::term(field, v.to_json()?)),
            (Lookup::FullText, v) => Some(Query::matches(field, v.to_json()?)),
            (Lookup::Pattern, v) => {
                let pattern = match v {
                    FieldValue::Text(s) => s.clone(),
                    other => other.to_json()?.to_string(),
                };
                Some(Query::wildcard(field, pattern))
            }
            (Lookup::Gte, v) => Some(Query::range(field, Some(v.to_json()?), None)),
            (Lookup::Lte, v) => Some(Query::range(field, None, Some(v.to_json()?))),
        }
    }
}

fn number(n: f64) -> Option<serde_json::Value> {
    serde_json::Number::from_f64(n).map(serde_json::Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::StandardParser;
    use serde_json::json;

    #[test]
    fn char_defaults() {
        let f = FieldFilter::char("title");
        assert_eq!(f.field_name(), "title");
        assert_eq!(f.display_label(), "Title");
        assert_eq!(f.lookup_kind(), Lookup::FullText);
    }

    #[test]
    fn custom_lookup_and_label() {
        let f = FieldFilter::char("author")
            .lookup(Lookup::Equals)
            .label("Book Author");
        assert_eq!(f.display_label(), "Book Author");
        assert_eq!(f.lookup_kind(), Lookup::Equals);
    }

    #[test]
    fn family_defaults() {
        assert_eq!(FieldFilter::numeric("price").lookup_kind(), Lookup::Equals);
        assert_eq!(
            FieldFilter::date("publication_date").display_label(),
            "Publication Date"
        );
        assert_eq!(FieldFilter::boolean("in_stock").display_label(), "In Stock");
    }

    #[test]
    fn widgets_per_kind() {
        let w = FieldFilter::char("title").label("Book Title").widgets("title");
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].kind, WidgetKind::Text);
        assert_eq!(w[0].label, "Book Title");
        assert!(!w[0].required);

        assert_eq!(
            FieldFilter::numeric("price").widgets("price")[0].kind,
            WidgetKind::Number
        );
        assert_eq!(
            FieldFilter::date("d").widgets("d")[0].kind,
            WidgetKind::Date
        );
        assert_eq!(
            FieldFilter::boolean("b").widgets("b")[0].kind,
            WidgetKind::Boolean
        );
    }

    #[test]
    fn range_labels_and_widgets() {
        let f = FieldFilter::range("price");
        assert_eq!(f.display_label(), "Price");
        assert_eq!(f.display_min_label(), "Min Price");
        assert_eq!(f.display_max_label(), "Max Price");

        let custom = FieldFilter::range("price")
            .label("Book Price")
            .min_label("From")
            .max_label("To");
        let widgets = custom.widgets("price_range");
        assert_eq!(widgets.len(), 2);
        assert_eq!(widgets[0].name, "price_range_min_value");
        assert_eq!(widgets[0].label, "From");
        assert_eq!(widgets[1].name, "price_range_max_value");
        assert_eq!(widgets[1].label, "To");
        assert!(widgets.iter().all(|w| w.kind == WidgetKind::Number && !w.required));
    }

    #[test]
    fn scalar_clauses() {
        let text = FieldValue::Text("Django".into());
        assert_eq!(
            FieldFilter::char("title").build_clause(&text).unwrap().to_json(),
            json!({"match": {"title": "Django"}})
        );
        assert_eq!(
            FieldFilter::char("isbn")
                .lookup(Lookup::Equals)
                .build_clause(&FieldValue::Text("9781735467207".into()))
                .unwrap()
                .to_json(),
            json!({"term": {"isbn": "9781735467207"}})
        );
        assert_eq!(
            FieldFilter::char("company_number")
                .lookup(Lookup::Pattern)
                .build_clause(&FieldValue::Text("SC*".into()))
                .unwrap()
                .to_json(),
            json!({"wildcard": {"company_number": {"value": "SC*"}}})
        );
        assert_eq!(
            FieldFilter::numeric("price")
                .lookup(Lookup::Gte)
                .build_clause(&FieldValue::Number(50.0))
                .unwrap()
                .to_json(),
            json!({"range": {"price": {"gte": 50.0}}})
        );
        assert_eq!(
            FieldFilter::numeric("price")
                .lookup(Lookup::Lte)
                .build_clause(&FieldValue::Number(40.0))
                .unwrap()
                .to_json(),
            json!({"range": {"price": {"lte": 40.0}}})
        );
        assert_eq!(
            FieldFilter::boolean("in_stock")
                .build_clause(&FieldValue::Bool(false))
                .unwrap()
                .to_json(),
            json!({"term": {"in_stock": false}})
        );
    }

    #[test]
    fn range_bound_combinations() {
        let f = FieldFilter::range("price");
        let clause = |min, max| f.build_clause(&FieldValue::Range { min, max });

        assert_eq!(
            clause(Some(40.0), None).unwrap().to_json(),
            json!({"range": {"price": {"gte": 40.0}}})
        );
        assert_eq!(
            clause(None, Some(40.0)).unwrap().to_json(),
            json!({"range": {"price": {"lte": 40.0}}})
        );
        assert_eq!(
            clause(Some(30.0), Some(50.0)).unwrap().to_json(),
            json!({"range": {"price": {"gte": 30.0, "lte": 50.0}}})
        );
        assert_eq!(clause(None, None), None);
    }

    #[test]
    fn double_underscore_paths_are_dotted() {
        let f = FieldFilter::range("primary_accounts__Number_of_Employees");
        let clause = f
            .build_clause(&FieldValue::Range {
                min: Some(3.0),
                max: None,
            })
            .unwrap();
        assert_eq!(
            clause.to_json(),
            json!({"range": {"primary_accounts.Number_of_Employees": {"gte": 3.0}}})
        );
        let f = FieldFilter::char("title__raw").lookup(Lookup::Equals);
        assert_eq!(
            f.build_clause(&FieldValue::Text("Django".into()))
                .unwrap()
                .to_json(),
            json!({"term": {"title.raw": "Django"}})
        );
        assert_eq!(f.display_label(), "Title Raw");
    }

    #[test]
    fn range_ignores_scalar_values() {
        assert_eq!(
            FieldFilter::range("price").build_clause(&FieldValue::Number(1.0)),
            None
        );
        assert_eq!(
            FieldFilter::numeric("price").build_clause(&FieldValue::Range {
                min: Some(1.0),
                max: None
            }),
            None
        );
    }

    #[test]
    fn bind_range_companion_keys() {
        let f = FieldFilter::range("price");
        let mut form = BoundForm::default();
        let data: FormData = [("price_range_min_value", "40"), ("price_range_max_value", "")]
            .into_iter()
            .collect();
        let value = f.bind("price_range", &data, &StandardParser, &mut form);
        assert_eq!(
            value,
            Some(FieldValue::Range {
                min: Some(40.0),
                max: None
            })
        );
        assert!(form.is_valid());

        let empty = FormData::new();
        assert_eq!(f.bind("price_range", &empty, &StandardParser, &mut form), None);
    }

    #[test]
    fn bind_records_errors_and_skips() {
        let f = FieldFilter::numeric("price");
        let mut form = BoundForm::default();
        let data: FormData = [("price", "cheap")].into_iter().collect();
        assert_eq!(f.bind("price", &data, &StandardParser, &mut form), None);
        assert_eq!(form.errors()["price"].len(), 1);

        let r = FieldFilter::range("price");
        let data: FormData = [("p_min_value", "x"), ("p_max_value", "50")]
            .into_iter()
            .collect();
        let value = r.bind("p", &data, &StandardParser, &mut form);
        assert_eq!(
            value,
            Some(FieldValue::Range {
                min: None,
                max: Some(50.0)
            })
        );
        assert!(form.errors().contains_key("p_min_value"));
    }

    #[test]
    fn declaration_from_json() {
        let f: FieldFilter = serde_json::from_value(json!({
            "field_name": "price",
            "kind": "number",
            "lookup": "gte",
            "label": "Min Price"
        }))
        .unwrap();
        assert_eq!(f.lookup_kind(), Lookup::Gte);
        assert_eq!(f.display_label(), "Min Price");

        let legacy: FieldFilter = serde_json::from_value(json!({
            "field_name": "isbn",
            "kind": "text",
            "lookup": "term"
        }))
        .unwrap();
        assert_eq!(legacy.lookup_kind(), Lookup::Equals);
    }

    #[test]
    fn range_declarations_must_be_numeric() {
        let err = serde_json::from_value::<FieldFilter>(json!({
            "field_name": "publication_date",
            "kind": "date",
            "lookup": "range"
        }))
        .unwrap_err();
        assert!(err
            .to_string()
            .contains("range filter on 'publication_date' must be of kind number"));

        let f: FieldFilter = serde_json::from_value(json!({
            "field_name": "price",
            "kind": "number",
            "lookup": "range",
            "min_label": "From"
        }))
        .unwrap();
        assert!(f.is_range());
        assert_eq!(f.display_min_label(), "From");

        let f = FieldFilter::date("publication_date").lookup(Lookup::Range);
        assert_eq!(f.kind(), ValueKind::Number);
    }
}
