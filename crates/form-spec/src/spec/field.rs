use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coerce::parse_number;

/// Supported field kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    Select,
    Multiselect,
    Radio,
    Checkbox,
    Date,
    File,
    Info,
    Divider,
    Hidden,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Textarea => "textarea",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Number => "number",
            FieldType::Select => "select",
            FieldType::Multiselect => "multiselect",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::File => "file",
            FieldType::Info => "info",
            FieldType::Divider => "divider",
            FieldType::Hidden => "hidden",
        }
    }

    /// Presentation-only kinds carry no data.
    pub fn is_presentational(&self) -> bool {
        matches!(self, FieldType::Info | FieldType::Divider)
    }

    /// Whether the user fills this field in; drives validation and progress.
    pub fn collects_input(&self) -> bool {
        !matches!(
            self,
            FieldType::Hidden | FieldType::Info | FieldType::Divider
        )
    }

    pub fn needs_options(&self) -> bool {
        matches!(
            self,
            FieldType::Select | FieldType::Multiselect | FieldType::Radio
        )
    }
}

/// `min`/`max` hint: numeric for numbers and lengths, text for dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Bound {
    Number(f64),
    Text(String),
}

impl Bound {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Bound::Number(value) => Some(*value),
            Bound::Text(_) => None,
        }
    }

    /// Numeric value, accepting numeric text such as `"18"`.
    pub fn coerce_number(&self) -> Option<f64> {
        let value = match self {
            Bound::Number(value) => *value,
            Bound::Text(text) => parse_number(text),
        };
        (!value.is_nan()).then_some(value)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Bound::Text(text) => Some(text),
            Bound::Number(_) => None,
        }
    }
}

/// A selectable `{value, label}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldOption {
    pub value: String,
    pub label: String,
}

impl FieldOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }
}

/// One input definition inside a form schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<Bound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_when: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Field {
    pub fn new(id: impl Into<String>, kind: FieldType) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
            placeholder: None,
            hint: None,
            required: false,
            options: Vec::new(),
            regex: None,
            min: None,
            max: None,
            show_when: None,
            default_value: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<'a>(mut self, options: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        self.options = options
            .into_iter()
            .map(|(value, label)| FieldOption::new(value, label))
            .collect();
        self
    }

    pub fn with_regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    pub fn with_bounds(mut self, min: Option<Bound>, max: Option<Bound>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn show_when(mut self, expression: impl Into<String>) -> Self {
        self.show_when = Some(expression.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Label when present, otherwise the id.
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_reads_camel_case_keys() {
        let field: Field = serde_json::from_value(json!({
            "id": "age",
            "type": "number",
            "min": 18,
            "max": "99",
            "showWhen": "adult == true",
            "defaultValue": 21
        }))
        .expect("deserialize");
        assert_eq!(field.kind, FieldType::Number);
        assert_eq!(field.min, Some(Bound::Number(18.0)));
        assert_eq!(field.max.as_ref().and_then(Bound::coerce_number), Some(99.0));
        assert_eq!(field.show_when.as_deref(), Some("adult == true"));
        assert!(!field.required);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = serde_json::from_value::<Field>(json!({ "id": "x", "type": "slider" }));
        assert!(result.is_err());
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let field = Field::new("nickname", FieldType::Text);
        assert_eq!(field.display_name(), "nickname");
        assert_eq!(field.with_label("Nick").display_name(), "Nick");
    }
}
