use crate::errors::FieldError;
use crate::model::FieldValue;
use crate::sort::SortChoice;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y"];

/// Kind of value a filter accepts. Selects both the widget and the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Text,
    Number,
    Date,
    Boolean,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::Number => "number",
            ValueKind::Date => "date",
            ValueKind::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Text,
    Number,
    Date,
    Boolean,
    Integer,
    Choice,
}

impl From<ValueKind> for WidgetKind {
    fn from(kind: ValueKind) -> Self {
        match kind {
            ValueKind::Text => WidgetKind::Text,
            ValueKind::Number => WidgetKind::Number,
            ValueKind::Date => WidgetKind::Date,
            ValueKind::Boolean => WidgetKind::Boolean,
        }
    }
}

/// Describes one input for external renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Widget {
    pub name: String,
    pub kind: WidgetKind,
    pub label: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<SortChoice>,
}

impl Widget {
    pub fn optional(name: impl Into<String>, kind: WidgetKind, label: impl Into<String>) -> Self {
        Widget {
            name: name.into(),
            kind,
            label: label.into(),
            required: false,
            choices: Vec::new(),
        }
    }
}

/// Widget registry of a filter set, in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormSpec {
    pub widgets: Vec<Widget>,
}

impl FormSpec {
    pub fn get(&self, name: &str) -> Option<&Widget> {
        self.widgets.iter().find(|w| w.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.widgets.iter().map(|w| w.name.as_str())
    }
}

/// Parse-and-validate contract for raw input, one method per widget kind.
pub trait FieldParser: Send + Sync {
    fn parse_text(&self, raw: &str) -> Result<String, FieldError>;
    fn parse_number(&self, raw: &str) -> Result<f64, FieldError>;
    fn parse_date(&self, raw: &str) -> Result<NaiveDate, FieldError>;
    fn parse_bool(&self, raw: &str) -> Result<bool, FieldError>;

    fn parse(&self, kind: ValueKind, raw: &str) -> Result<FieldValue, FieldError> {
        match kind {
            ValueKind::Text => self.parse_text(raw).map(FieldValue::Text),
            ValueKind::Number => self.parse_number(raw).map(FieldValue::Number),
            ValueKind::Date => self.parse_date(raw).map(FieldValue::Date),
            ValueKind::Boolean => self.parse_bool(raw).map(FieldValue::Bool),
        }
    }
}

/// Parser matching common HTML form conventions.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardParser;

impl FieldParser for StandardParser {
    fn parse_text(&self, raw: &str) -> Result<String, FieldError> {
        Ok(raw.trim().to_string())
    }

    fn parse_number(&self, raw: &str) -> Result<f64, FieldError> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| FieldError::InvalidNumber(raw.to_string()))
    }

    fn parse_date(&self, raw: &str) -> Result<NaiveDate, FieldError> {
        let raw_trimmed = raw.trim();
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(raw_trimmed, fmt).ok())
            .ok_or_else(|| FieldError::InvalidDate(raw.to_string()))
    }

    fn parse_bool(&self, raw: &str) -> Result<bool, FieldError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" | "yes" => Ok(true),
            "false" | "0" | "off" | "no" => Ok(false),
            _ => Err(FieldError::InvalidBoolean(raw.to_string())),
        }
    }
}

/// Typed values and per-key errors produced by binding raw input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoundForm {
    values: BTreeMap<String, FieldValue>,
    errors: BTreeMap<String, Vec<FieldError>>,
}

impl BoundForm {
    pub fn value(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn values(&self) -> &BTreeMap<String, FieldValue> {
        &self.values
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<FieldError>> {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub(crate) fn set_value(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
    }

    pub(crate) fn add_error(&mut self, key: &str, error: FieldError) {
        self.errors.entry(key.to_string()).or_default().push(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        let p = StandardParser;
        assert_eq!(p.parse_number("39.99"), Ok(39.99));
        assert_eq!(p.parse_number(" 40 "), Ok(40.0));
        assert_eq!(
            p.parse_number("cheap"),
            Err(FieldError::InvalidNumber("cheap".into()))
        );
        assert!(p.parse_number("NaN").is_err());
        assert!(p.parse_number("inf").is_err());
    }

    #[test]
    fn dates() {
        let p = StandardParser;
        let expected = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        assert_eq!(p.parse_date("2022-01-01"), Ok(expected));
        assert_eq!(p.parse_date("01/01/2022"), Ok(expected));
        assert!(p.parse_date("2022-13-01").is_err());
        assert!(p.parse_date("yesterday").is_err());
    }

    #[test]
    fn booleans() {
        let p = StandardParser;
        for raw in ["true", "True", "1", "on", "yes"] {
            assert_eq!(p.parse_bool(raw), Ok(true), "{raw}");
        }
        for raw in ["false", "FALSE", "0", "off", "no"] {
            assert_eq!(p.parse_bool(raw), Ok(false), "{raw}");
        }
        assert!(p.parse_bool("maybe").is_err());
    }

    #[test]
    fn dispatch_by_kind() {
        let p = StandardParser;
        assert_eq!(
            p.parse(ValueKind::Text, " Django "),
            Ok(FieldValue::Text("Django".into()))
        );
        assert_eq!(p.parse(ValueKind::Boolean, "1"), Ok(FieldValue::Bool(true)));
        assert!(p.parse(ValueKind::Number, "x").is_err());
    }

    #[test]
    fn bound_form_errors_accumulate() {
        let mut form = BoundForm::default();
        assert!(form.is_valid());
        form.add_error("price", FieldError::InvalidNumber("x".into()));
        form.set_value("title", FieldValue::Text("Django".into()));
        assert!(!form.is_valid());
        assert_eq!(form.errors()["price"].len(), 1);
        assert!(form.value("title").is_some());
        assert!(form.value("price").is_none());
    }
}
