use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

use form_spec::{
    ActionPipeline, FormSchema, FormSession, MemoryStore, RenderPayload, SchemaError,
    SessionError, ShowWhenIndex, Storage, SubmissionResult, ValidationErrors, Validator,
    build_render_payload, coerce::is_blank, compute_progress,
    render_json_ui as form_render_json_ui, render_text as form_render_text,
    store::DEFAULT_NAMESPACE,
};

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),
    #[error("failed to parse values: {0}")]
    ValuesParse(#[source] serde_json::Error),
    #[error("values must be a JSON object")]
    ValuesShape,
    #[error("invalid timestamp '{0}'")]
    Timestamp(String),
    #[error("submission rejected: {0}")]
    Session(#[from] SessionError),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    schema_json: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
}

/// Host-provided context for a submission.
#[derive(Debug, Deserialize, Default)]
struct SubmitContext {
    #[serde(default)]
    hidden: Map<String, Value>,
    #[serde(default)]
    storage: BTreeMap<String, String>,
    #[serde(default)]
    now: Option<String>,
}

fn parse_config(config_json: &str) -> Result<ComponentConfig, ComponentError> {
    if config_json.trim().is_empty() {
        Ok(ComponentConfig::default())
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)
    }
}

fn load_schema(config: &ComponentConfig) -> Result<FormSchema, ComponentError> {
    match config.schema_json.as_deref() {
        Some(schema_json) => Ok(FormSchema::from_json(schema_json)?),
        None => Ok(FormSchema::default_schema()),
    }
}

fn load_schema_from(config_json: &str) -> Result<FormSchema, ComponentError> {
    load_schema(&parse_config(config_json)?)
}

/// Lenient: anything that is not a JSON object reads as no values.
fn parse_values(values_json: &str) -> Map<String, Value> {
    match serde_json::from_str(values_json) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn parse_values_strict(values_json: &str) -> Result<Map<String, Value>, ComponentError> {
    match serde_json::from_str(values_json).map_err(ComponentError::ValuesParse)? {
        Value::Object(map) => Ok(map),
        _ => Err(ComponentError::ValuesShape),
    }
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

fn respond_string(result: Result<String, ComponentError>) -> String {
    match result {
        Ok(value) => value,
        Err(err) => json!({ "error": err.to_string() }).to_string(),
    }
}

/// Errors for the fields currently shown.
fn visible_errors(schema: &FormSchema, values: &Map<String, Value>) -> ValidationErrors {
    let conditions = ShowWhenIndex::compile(&schema.fields);
    Validator::build(&schema.fields).check_where(values, |id| conditions.is_shown(id, values))
}

pub fn describe(config_json: &str) -> String {
    respond(
        load_schema_from(config_json)
            .and_then(|schema| serde_json::to_value(schema).map_err(ComponentError::JsonEncode)),
    )
}

pub fn check_schema(config_json: &str) -> String {
    respond(load_schema_from(config_json).and_then(|schema| {
        let issues = schema.check();
        Ok(json!({
            "publishable": schema.is_publishable(),
            "issues": serde_json::to_value(issues).map_err(ComponentError::JsonEncode)?,
        }))
    }))
}

pub fn evaluate_expression(expression: &str, values_json: &str) -> String {
    let values = parse_values(values_json);
    let check = form_spec::check(expression);
    respond(Ok(json!({
        "result": form_spec::evaluate(expression, &values),
        "valid": check.valid,
        "error": check.error,
        "dependencies": form_spec::dependencies(expression),
    })))
}

pub fn visibility(config_json: &str, values_json: &str) -> String {
    respond(load_schema_from(config_json).map(|schema| {
        let values = parse_values(values_json);
        let visible = form_spec::render_list(&schema, &values)
            .into_iter()
            .map(|field| field.id.clone())
            .collect::<Vec<_>>();
        json!({ "visible": visible })
    }))
}

pub fn validate_values(config_json: &str, values_json: &str) -> String {
    respond(load_schema_from(config_json).and_then(|schema| {
        let values = parse_values_strict(values_json)?;
        let errors = visible_errors(&schema, &values);
        Ok(json!({ "valid": errors.is_empty(), "errors": errors }))
    }))
}

pub fn progress(config_json: &str, values_json: &str) -> String {
    respond(load_schema_from(config_json).map(|schema| {
        let values = parse_values(values_json);
        let progress = compute_progress(form_spec::render_list(&schema, &values), &values);
        json!({
            "answered": progress.answered,
            "total": progress.total,
            "percent": progress.rounded(),
        })
    }))
}

/// Errors for shown fields that hold a value. Empty required fields are
/// reported through the `need_input` status instead.
fn answered_errors(schema: &FormSchema, values: &Map<String, Value>) -> ValidationErrors {
    let conditions = ShowWhenIndex::compile(&schema.fields);
    Validator::build(&schema.fields).check_where(values, |id| {
        !is_blank(values.get(id)) && conditions.is_shown(id, values)
    })
}

fn render_payload(config_json: &str, values_json: &str) -> Result<RenderPayload, ComponentError> {
    let schema = load_schema_from(config_json)?;
    let values = parse_values(values_json);
    let errors = answered_errors(&schema, &values);
    Ok(build_render_payload(&schema, &values, &errors))
}

pub fn render_text(config_json: &str, values_json: &str) -> String {
    respond_string(render_payload(config_json, values_json).map(|payload| form_render_text(&payload)))
}

pub fn render_json_ui(config_json: &str, values_json: &str) -> String {
    respond(render_payload(config_json, values_json).map(|payload| form_render_json_ui(&payload)))
}

/// Runs a full submission against the storage snapshot in `ctx_json` and
/// returns the outcomes together with the updated snapshot.
pub fn submit(config_json: &str, ctx_json: &str, values_json: &str) -> String {
    respond(submit_inner(config_json, ctx_json, values_json))
}

fn submit_inner(
    config_json: &str,
    ctx_json: &str,
    values_json: &str,
) -> Result<Value, ComponentError> {
    let config = parse_config(config_json)?;
    let schema = load_schema(&config)?;
    let ctx: SubmitContext = if ctx_json.trim().is_empty() {
        SubmitContext::default()
    } else {
        serde_json::from_str(ctx_json).map_err(ComponentError::ConfigParse)?
    };
    let now = match ctx.now.as_deref() {
        Some(text) => Some(
            DateTime::parse_from_rfc3339(text)
                .map_err(|_| ComponentError::Timestamp(text.to_string()))?
                .with_timezone(&Utc),
        ),
        None => None,
    };

    let mut session = FormSession::new(schema);
    for (field_id, value) in parse_values_strict(values_json)? {
        session.set_value(&field_id, value)?;
    }

    let namespace = config.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);
    let mut storage = Storage::with_namespace(MemoryStore::from_entries(ctx.storage), namespace);
    let result = {
        let mut pipeline = ActionPipeline::new(&mut storage);
        if let Some(now) = now {
            pipeline = pipeline.with_clock(move || now);
        }
        session.submit(&ctx.hidden, &mut pipeline)?
    };

    let mut response = serde_json::to_value(&result).map_err(ComponentError::JsonEncode)?;
    if let (SubmissionResult::Submitted(_), Value::Object(map)) = (&result, &mut response) {
        map.insert("state".into(), json!(session.state().as_str()));
        map.insert(
            "storage".into(),
            serde_json::to_value(storage.into_backend().into_entries())
                .map_err(ComponentError::JsonEncode)?,
        );
    }
    Ok(response)
}
