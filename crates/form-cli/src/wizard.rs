use form_spec::{ActionOutcome, SubmissionReport, ValidationErrors};
use serde_json::{Number, Value};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: status, visible fields, outcomes as JSON.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts and results while the fill loop walks the form.
pub struct WizardPresenter {
    verbosity: Verbosity,
    header_printed: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            header_printed: false,
        }
    }

    pub fn show_header(&mut self, payload: &WizardPayload) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", payload.title);
        if let Some(description) = &payload.description {
            println!("{}", description);
        }
        self.header_printed = true;
    }

    pub fn show_status(&self, payload: &WizardPayload) {
        if !self.verbosity.is_verbose() {
            return;
        }
        println!(
            "Status: {} ({}/{})",
            payload.status,
            payload.progress.answered,
            payload.progress.total
        );
        println!("Visible fields:");
        for field in payload.fields.iter().filter(|field| field.visible) {
            let mut entry = format!(" - {} ({})", field.id, field.label);
            if field.required {
                entry.push_str(" [required]");
            }
            println!("{}", entry);
        }
    }

    pub fn show_note(&self, field: &WizardField) {
        match field.kind {
            FieldKind::Divider => println!("----"),
            _ => {
                println!("{}", field.label);
                if let Some(hint) = &field.hint {
                    println!("  {}", hint);
                }
            }
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = if prompt.total > 0 {
            format!("{}/{} {}", prompt.index, prompt.total, prompt.label)
        } else {
            format!("{} {}", prompt.index, prompt.label)
        };
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(kind_hint) = &prompt.kind_hint {
            line.push(' ');
            line.push_str(kind_hint);
        }
        println!("{}", line);
        if let Some(hint) = &prompt.hint {
            println!("{}", hint);
        }
        if prompt.clearable {
            println!("(press Enter to keep the current answer, '{}' to clear it)", CLEAR_ANSWER);
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if let Some(debug) = &error.debug_message {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_validation_errors(&self, errors: &ValidationErrors) {
        eprintln!("Please fix the following:");
        for (field_id, message) in errors {
            eprintln!(" - {}: {}", field_id, message);
        }
    }

    pub fn show_completion(&self, report: &SubmissionReport) {
        if report.is_success() {
            println!("Done ✅");
        } else {
            println!("Submitted with errors");
        }
        for outcome in &report.outcomes {
            match outcome {
                ActionOutcome::Stored { key, total } => {
                    println!("Saved entry under '{}' ({} stored)", key, total)
                }
                ActionOutcome::Navigate { to } => println!("Next page: {}", to),
                ActionOutcome::OpenLink { url } => println!("Open: {}", url),
                ActionOutcome::NotImplemented { action, detail } => {
                    println!("Skipped {}: {}", action.as_str(), detail)
                }
                ActionOutcome::Failed { action, message } => {
                    eprintln!("{} failed: {}", action.as_str(), message)
                }
            }
        }
        if self.verbosity.is_verbose() {
            match serde_json::to_string_pretty(&report.data) {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize submission to JSON: {}", err),
            }
        }
    }
}

/// Render payload extracted from the JSON UI output.
pub struct WizardPayload {
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub progress: WizardProgress,
    pub fields: Vec<WizardField>,
}

impl WizardPayload {
    pub fn from_json(json: &Value) -> Result<Self, String> {
        let title = json
            .get("title")
            .and_then(Value::as_str)
            .ok_or_else(|| "payload missing title".to_string())?
            .to_string();
        let description = json
            .get("description")
            .and_then(Value::as_str)
            .map(|value| value.to_string());
        let status = json
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("need_input")
            .to_string();
        let progress = json
            .get("progress")
            .and_then(Value::as_object)
            .ok_or_else(|| "payload missing progress".to_string())?;
        let answered = progress
            .get("answered")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize;
        let total = progress.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
        let fields = json
            .get("fields")
            .and_then(Value::as_array)
            .ok_or_else(|| "payload missing fields".to_string())?
            .iter()
            .map(WizardField::from_json)
            .collect::<Result<_, _>>()?;
        Ok(Self {
            title,
            description,
            status,
            progress: WizardProgress { answered, total },
            fields,
        })
    }
}

pub struct WizardProgress {
    pub answered: usize,
    pub total: usize,
}

/// Minimal view of a field used for rendering prompts.
pub struct WizardField {
    pub id: String,
    pub label: String,
    pub hint: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub visible: bool,
    pub options: Vec<(String, String)>,
    pub current_value: Option<Value>,
}

impl WizardField {
    fn from_json(value: &Value) -> Result<Self, String> {
        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| "field missing id".to_string())?
            .to_string();
        let label = value
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or(id.as_str())
            .to_string();
        let hint = value
            .get("hint")
            .and_then(Value::as_str)
            .map(|value| value.to_string());
        let kind = FieldKind::from_label(value.get("type").and_then(Value::as_str).unwrap_or("text"));
        let required = value
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let visible = value
            .get("visible")
            .and_then(Value::as_bool)
            .unwrap_or(true);
        let options = value
            .get("options")
            .and_then(Value::as_array)
            .map(|options| {
                options
                    .iter()
                    .filter_map(|option| {
                        let value = option.get("value").and_then(Value::as_str)?;
                        let label = option.get("label").and_then(Value::as_str).unwrap_or(value);
                        Some((value.to_string(), label.to_string()))
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let current_value = value.get("current_value").cloned();
        Ok(Self {
            id,
            label,
            hint,
            kind,
            required,
            visible,
            options,
            current_value,
        })
    }

    /// Fields that show text but take no answer.
    pub fn is_note(&self) -> bool {
        matches!(self.kind, FieldKind::Info | FieldKind::Divider)
    }
}

/// Context used to format a single prompt.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub label: String,
    pub hint: Option<String>,
    pub required: bool,
    pub kind_hint: Option<String>,
    /// Optional field that already holds a value.
    pub clearable: bool,
}

impl PromptContext {
    pub fn new(field: &WizardField, progress: &WizardProgress) -> Self {
        Self {
            index: (progress.answered + 1).max(1),
            total: progress.total,
            label: field.label.clone(),
            hint: field.hint.clone(),
            required: field.required,
            kind_hint: field.kind.hint(&field.options),
            clearable: !field.required && field.current_value.is_some(),
        }
    }
}

/// Prompt-relevant field kinds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Phone,
    Number,
    Date,
    File,
    Checkbox,
    Choice,
    MultiChoice,
    Info,
    Divider,
}

impl FieldKind {
    fn from_label(label: &str) -> Self {
        match label {
            "email" => FieldKind::Email,
            "phone" => FieldKind::Phone,
            "number" => FieldKind::Number,
            "date" => FieldKind::Date,
            "file" => FieldKind::File,
            "checkbox" => FieldKind::Checkbox,
            "select" | "radio" => FieldKind::Choice,
            "multiselect" => FieldKind::MultiChoice,
            "info" => FieldKind::Info,
            "divider" => FieldKind::Divider,
            _ => FieldKind::Text,
        }
    }

    fn hint(&self, options: &[(String, String)]) -> Option<String> {
        let values = || {
            options
                .iter()
                .map(|(value, _)| value.as_str())
                .collect::<Vec<_>>()
                .join("/")
        };
        match self {
            FieldKind::Checkbox => Some("(yes/no)".to_string()),
            FieldKind::Number => Some("(number)".to_string()),
            FieldKind::Date => Some("(YYYY-MM-DD)".to_string()),
            FieldKind::File => Some("(file path)".to_string()),
            FieldKind::Choice if !options.is_empty() => Some(format!("({})", values())),
            FieldKind::MultiChoice if !options.is_empty() => {
                Some(format!("(comma separated: {})", values()))
            }
            _ => None,
        }
    }
}

/// Error produced when parsing answers from the user.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Answer that removes the current value of an optional field.
pub const CLEAR_ANSWER: &str = "-";

/// Converts a typed line into a field value; `None` clears the field.
pub fn parse_answer(field: &WizardField, raw: &str) -> Result<Option<Value>, AnswerParseError> {
    let raw = raw.trim();
    if raw == CLEAR_ANSWER {
        if field.required {
            return Err(AnswerParseError::new("This field requires an answer.", None));
        }
        return Ok(None);
    }
    if raw.is_empty() {
        if let Some(current) = &field.current_value {
            return Ok(Some(current.clone()));
        }
        if field.required {
            return Err(AnswerParseError::new("This field requires an answer.", None));
        }
        return Ok(None);
    }

    let value = match field.kind {
        FieldKind::Checkbox => parse_boolean(raw)?,
        FieldKind::Number => parse_number(raw)?,
        FieldKind::Choice => Value::String(match_option(field, raw)?),
        FieldKind::MultiChoice => Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| match_option(field, part).map(Value::String))
                .collect::<Result<_, _>>()?,
        ),
        _ => Value::String(raw.to_string()),
    };
    Ok(Some(value))
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "y" | "yes" | "true" | "1" => Ok(Value::Bool(true)),
        "n" | "no" | "false" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please answer yes or no.",
            Some("yes/no, y/n, true/false".to_string()),
        )),
    }
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(Value::Number(Number::from(integer)));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| AnswerParseError::new("Please enter a number.", Some("e.g. 42 or 3.5".into())))
}

fn match_option(field: &WizardField, raw: &str) -> Result<String, AnswerParseError> {
    field
        .options
        .iter()
        .find(|(value, label)| value == raw || label.eq_ignore_ascii_case(raw))
        .map(|(value, _)| value.clone())
        .ok_or_else(|| {
            let values = field
                .options
                .iter()
                .map(|(value, _)| value.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            AnswerParseError::new(format!("'{}' is not one of the options.", raw), Some(values))
        })
}
