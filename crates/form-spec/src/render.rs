use serde_json::{Map, Value, json};

use crate::coerce::{is_answered, to_primitive_string};
use crate::progress::{Progress, compute_progress};
use crate::spec::field::{FieldOption, FieldType};
use crate::spec::form::FormSchema;
use crate::validate::ValidationErrors;
use crate::visibility::ShowWhenIndex;

/// Status labels returned by the renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// A visible required field is still empty.
    NeedInput,
    /// Every visible required field holds a value.
    Complete,
    /// At least one field carries a validation error.
    Error,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::NeedInput => "need_input",
            RenderStatus::Complete => "complete",
            RenderStatus::Error => "error",
        }
    }
}

/// Describes a single field for render outputs.
#[derive(Debug, Clone)]
pub struct RenderField {
    pub id: String,
    pub label: String,
    pub kind: FieldType,
    pub required: bool,
    pub visible: bool,
    pub hint: Option<String>,
    pub placeholder: Option<String>,
    pub options: Vec<FieldOption>,
    pub current_value: Option<Value>,
    pub error: Option<String>,
}

/// Collected payload used by both text and JSON renderers.
#[derive(Debug, Clone)]
pub struct RenderPayload {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
    pub columns: u8,
    pub status: RenderStatus,
    pub next_field_id: Option<String>,
    pub progress: Progress,
    pub fields: Vec<RenderField>,
}

/// Build the renderer payload from the schema, current values and errors.
pub fn build_render_payload(
    schema: &FormSchema,
    values: &Map<String, Value>,
    errors: &ValidationErrors,
) -> RenderPayload {
    let conditions = ShowWhenIndex::compile(&schema.fields);
    build_render_payload_with(schema, &conditions, values, errors)
}

/// Same as [`build_render_payload`] with conditions already compiled for
/// `schema`, so the caller's expression policy decides visibility.
pub fn build_render_payload_with(
    schema: &FormSchema,
    conditions: &ShowWhenIndex,
    values: &Map<String, Value>,
    errors: &ValidationErrors,
) -> RenderPayload {
    let visible = conditions.visible_fields(&schema.fields, values);
    let progress = compute_progress(visible.iter().copied(), values);

    let next_field_id = visible
        .iter()
        .find(|field| {
            field.required && field.kind.collects_input() && !is_answered(values.get(&field.id))
        })
        .map(|field| field.id.clone());

    let fields = schema
        .fields
        .iter()
        .map(|field| RenderField {
            id: field.id.clone(),
            label: field.display_name().to_string(),
            kind: field.kind,
            required: field.required,
            visible: visible.iter().any(|shown| shown.id == field.id),
            hint: field.hint.clone(),
            placeholder: field.placeholder.clone(),
            options: field.options.clone(),
            current_value: values.get(&field.id).cloned(),
            error: errors.get(&field.id).cloned(),
        })
        .collect::<Vec<_>>();

    let status = if !errors.is_empty() {
        RenderStatus::Error
    } else if next_field_id.is_some() {
        RenderStatus::NeedInput
    } else {
        RenderStatus::Complete
    };

    RenderPayload {
        title: schema.title.clone(),
        version: schema.version.clone(),
        description: schema.description.clone(),
        columns: schema.columns(),
        status,
        next_field_id,
        progress,
        fields,
    }
}

/// Render the payload as a structured JSON-friendly value.
pub fn render_json_ui(payload: &RenderPayload) -> Value {
    let fields = payload
        .fields
        .iter()
        .map(|field| {
            let mut map = Map::new();
            map.insert("id".into(), Value::String(field.id.clone()));
            map.insert("label".into(), Value::String(field.label.clone()));
            map.insert("type".into(), Value::String(field.kind.as_str().to_string()));
            map.insert("required".into(), Value::Bool(field.required));
            map.insert("visible".into(), Value::Bool(field.visible));
            if let Some(hint) = &field.hint {
                map.insert("hint".into(), Value::String(hint.clone()));
            }
            if let Some(placeholder) = &field.placeholder {
                map.insert("placeholder".into(), Value::String(placeholder.clone()));
            }
            if !field.options.is_empty() {
                map.insert(
                    "options".into(),
                    Value::Array(
                        field
                            .options
                            .iter()
                            .map(|option| json!({ "value": option.value, "label": option.label }))
                            .collect(),
                    ),
                );
            }
            if let Some(current_value) = &field.current_value {
                map.insert("current_value".into(), current_value.clone());
            }
            if let Some(error) = &field.error {
                map.insert("error".into(), Value::String(error.clone()));
            }
            Value::Object(map)
        })
        .collect::<Vec<_>>();

    json!({
        "title": payload.title,
        "version": payload.version,
        "description": payload.description,
        "columns": payload.columns,
        "status": payload.status.as_str(),
        "next_field_id": payload.next_field_id,
        "progress": {
            "answered": payload.progress.answered,
            "total": payload.progress.total,
            "percent": payload.progress.rounded(),
        },
        "fields": fields,
    })
}

/// Render the payload as human-friendly text.
pub fn render_text(payload: &RenderPayload) -> String {
    let mut lines = Vec::new();
    lines.push(format!("Form: {} (v{})", payload.title, payload.version));
    if let Some(description) = &payload.description {
        lines.push(description.clone());
    }
    lines.push(format!(
        "Status: {} ({}/{}, {}%)",
        payload.status.as_str(),
        payload.progress.answered,
        payload.progress.total,
        payload.progress.rounded()
    ));

    match &payload.next_field_id {
        Some(next) => lines.push(format!("Next field: {}", next)),
        None => lines.push("All required fields are filled.".to_string()),
    }

    lines.push("Visible fields:".to_string());
    for field in payload.fields.iter().filter(|field| field.visible) {
        if field.kind.is_presentational() {
            match field.kind {
                FieldType::Divider => lines.push(" ----".to_string()),
                _ => lines.push(format!(" * {}", field.label)),
            }
            continue;
        }
        let mut entry = format!(" - {} ({}, {})", field.id, field.label, field.kind.as_str());
        if field.required {
            entry.push_str(" [required]");
        }
        if let Some(current_value) = &field.current_value {
            entry.push_str(&format!(" = {}", to_primitive_string(current_value)));
        }
        lines.push(entry);
        if let Some(hint) = &field.hint {
            lines.push(format!("     {}", hint));
        }
        if let Some(error) = &field.error {
            lines.push(format!("     ! {}", error));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::OnExpressionError;
    use crate::spec::field::Field;

    #[test]
    fn status_labels() {
        assert_eq!(RenderStatus::NeedInput.as_str(), "need_input");
        assert_eq!(RenderStatus::Complete.as_str(), "complete");
        assert_eq!(RenderStatus::Error.as_str(), "error");
    }

    #[test]
    fn errors_take_precedence_over_missing_input() {
        let schema = FormSchema::default_schema();
        let mut errors = ValidationErrors::new();
        errors.insert("email".into(), "Invalid email".into());
        let payload = build_render_payload(&schema, &Map::new(), &errors);
        assert_eq!(payload.status, RenderStatus::Error);
        let email = payload
            .fields
            .iter()
            .find(|field| field.id == "email")
            .expect("email field");
        assert_eq!(email.error.as_deref(), Some("Invalid email"));
    }

    #[test]
    fn text_shows_notes_without_values() {
        let schema = FormSchema {
            fields: vec![
                Field::new("intro", FieldType::Info).with_label("Read this first"),
                Field::new("rule", FieldType::Divider),
                Field::new("name", FieldType::Text).required(),
            ],
            ..FormSchema::default_schema()
        };
        let text = render_text(&build_render_payload(&schema, &Map::new(), &ValidationErrors::new()));
        assert!(text.contains(" * Read this first"));
        assert!(text.contains(" ----"));
        assert!(!text.contains("intro (Read this first, info)"));
        assert!(text.contains(" - name (name, text) [required]"));
    }

    #[test]
    fn precompiled_conditions_decide_visibility() {
        let schema = FormSchema {
            fields: vec![
                Field::new("name", FieldType::Text).required(),
                Field::new("typo", FieldType::Text).required().show_when("???"),
            ],
            ..FormSchema::default_schema()
        };
        let hide = ShowWhenIndex::compile_with_policy(&schema.fields, OnExpressionError::HideField);
        let payload =
            build_render_payload_with(&schema, &hide, &Map::new(), &ValidationErrors::new());
        assert!(!payload.fields[1].visible);
        assert_eq!(payload.progress.total, 1);

        let shown = build_render_payload(&schema, &Map::new(), &ValidationErrors::new());
        assert!(shown.fields[1].visible);
        assert_eq!(shown.progress.total, 2);
    }
}
