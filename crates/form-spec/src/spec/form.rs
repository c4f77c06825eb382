use std::collections::BTreeSet;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::expr::Expr;
use crate::spec::action::Action;
use crate::spec::field::Field;

/// Field names filled from caller-supplied hidden values at submit time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct HiddenFields {
    #[serde(default)]
    pub inject: Vec<String>,
}

/// Rendering hint; only `1` and `2` columns are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Layout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct AfterSubmit {
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Top-level form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FormSchema {
    pub version: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<HiddenFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Layout>,
    pub fields: Vec<Field>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_submit: Option<AfterSubmit>,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON for a form: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("field id '{0}' is declared more than once")]
    DuplicateField(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A finding reported by [`FormSchema::check`] for schema authors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl SchemaIssue {
    fn error(field_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            field_id: field_id.map(str::to_string),
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn warning(field_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            field_id: field_id.map(str::to_string),
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl FormSchema {
    /// Parses a schema document and enforces unique field ids.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: FormSchema = serde_json::from_str(json)?;
        schema.ensure_unique_ids()?;
        Ok(schema)
    }

    pub fn from_value(value: Value) -> Result<Self, SchemaError> {
        let schema: FormSchema = serde_json::from_value(value)?;
        schema.ensure_unique_ids()?;
        Ok(schema)
    }

    pub fn to_json_pretty(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn ensure_unique_ids(&self) -> Result<(), SchemaError> {
        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if !seen.insert(field.id.as_str()) {
                return Err(SchemaError::DuplicateField(field.id.clone()));
            }
        }
        Ok(())
    }

    pub fn field(&self, id: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.id == id)
    }

    pub fn injected_fields(&self) -> &[String] {
        self.hidden
            .as_ref()
            .map(|hidden| hidden.inject.as_slice())
            .unwrap_or_default()
    }

    pub fn actions(&self) -> &[Action] {
        self.after_submit
            .as_ref()
            .map(|after| after.actions.as_slice())
            .unwrap_or_default()
    }

    pub fn columns(&self) -> u8 {
        match self.layout.and_then(|layout| layout.columns) {
            Some(2) => 2,
            _ => 1,
        }
    }

    /// Authoring checks beyond what deserialization enforces.
    pub fn check(&self) -> Vec<SchemaIssue> {
        let mut issues = Vec::new();
        let mut seen = BTreeSet::new();
        let ids: BTreeSet<&str> = self.fields.iter().map(|field| field.id.as_str()).collect();

        for field in &self.fields {
            let id = Some(field.id.as_str());
            if field.id.trim().is_empty() {
                issues.push(SchemaIssue::error(None, "field id cannot be empty"));
            }
            if !seen.insert(field.id.as_str()) {
                issues.push(SchemaIssue::error(id, "duplicate field id"));
            }
            if field.kind.needs_options() && field.options.is_empty() {
                issues.push(SchemaIssue::error(
                    id,
                    format!("{} fields need at least one option", field.kind.as_str()),
                ));
            }
            if let Some(pattern) = &field.regex
                && let Err(err) = Regex::new(pattern)
            {
                issues.push(SchemaIssue::warning(
                    id,
                    format!("regex is ignored because it does not compile: {}", err),
                ));
            }
            if let Some(expression) = &field.show_when {
                let expr = Expr::parse(expression);
                let check = expr.check();
                if let Some(error) = check.error {
                    issues.push(SchemaIssue::warning(
                        id,
                        format!("showWhen falls back to visible: {}", error),
                    ));
                }
                for dependency in expr.dependencies() {
                    if !ids.contains(dependency.as_str()) {
                        issues.push(SchemaIssue::warning(
                            id,
                            format!("showWhen references unknown field '{}'", dependency),
                        ));
                    }
                }
            }
        }

        if let Some(columns) = self.layout.and_then(|layout| layout.columns)
            && !matches!(columns, 1 | 2)
        {
            issues.push(SchemaIssue::warning(
                None,
                format!("layout.columns {} is rendered as a single column", columns),
            ));
        }

        for action in self.actions() {
            let problem = match action {
                Action::Navigate { to } if to.trim().is_empty() => Some("navigate needs a target"),
                Action::LocalStore { key } if key.trim().is_empty() => {
                    Some("localStore needs a key")
                }
                Action::Webhook { url, .. } if url.trim().is_empty() => {
                    Some("webhook needs a url")
                }
                Action::WhatsApp { to, .. } if !to.chars().any(|ch| ch.is_ascii_digit()) => {
                    Some("whatsapp needs a recipient number")
                }
                _ => None,
            };
            if let Some(message) = problem {
                issues.push(SchemaIssue::error(None, message));
            }
        }

        issues
    }

    /// True when [`FormSchema::check`] finds no errors (warnings allowed).
    pub fn is_publishable(&self) -> bool {
        self.check()
            .iter()
            .all(|issue| issue.severity != Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal(fields: Value) -> Value {
        json!({ "version": "1", "title": "T", "fields": fields })
    }

    #[test]
    fn duplicate_ids_fail_to_parse() {
        let err = FormSchema::from_value(minimal(json!([
            { "id": "a", "type": "text" },
            { "id": "a", "type": "email" }
        ])))
        .expect_err("duplicate");
        assert!(matches!(err, SchemaError::DuplicateField(id) if id == "a"));
    }

    #[test]
    fn optional_sections_default_to_empty() {
        let schema = FormSchema::from_value(minimal(json!([]))).expect("schema");
        assert!(schema.injected_fields().is_empty());
        assert!(schema.actions().is_empty());
        assert_eq!(schema.columns(), 1);
    }

    #[test]
    fn check_reports_authoring_problems() {
        let schema = FormSchema::from_value(json!({
            "version": "1",
            "title": "T",
            "layout": { "columns": 3 },
            "fields": [
                { "id": "pick", "type": "select" },
                { "id": "code", "type": "text", "regex": "([a-z" },
                { "id": "extra", "type": "text", "showWhen": "ghost == 1 && ???" }
            ],
            "afterSubmit": { "actions": [ { "type": "navigate", "to": "" } ] }
        }))
        .expect("schema");

        let issues = schema.check();
        let messages: Vec<_> = issues.iter().map(|issue| issue.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("need at least one option")));
        assert!(messages.iter().any(|m| m.contains("does not compile")));
        assert!(messages.iter().any(|m| m.contains("Invalid condition")));
        assert!(messages.iter().any(|m| m.contains("unknown field 'ghost'")));
        assert!(messages.iter().any(|m| m.contains("single column")));
        assert!(messages.iter().any(|m| m.contains("navigate needs a target")));
        assert!(!schema.is_publishable());
    }
}
