use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use crate::coerce::{Operand, format_number, is_blank, type_name};
use crate::spec::field::{Bound, Field, FieldType};

/// Field id to message; empty means valid.
pub type ValidationErrors = BTreeMap<String, String>;

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{0,15}$").expect("phone pattern compiles"));

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%a, %d %B %Y",
];
const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Value rule derived from a field's type and constraints.
#[derive(Debug, Clone)]
enum Rule {
    Email,
    Phone,
    Number {
        min: Option<f64>,
        max: Option<f64>,
    },
    Date {
        min: Option<NaiveDate>,
        max: Option<NaiveDate>,
    },
    StringList,
    Boolean,
    File,
    Text {
        pattern: Option<Regex>,
        min_len: Option<f64>,
        max_len: Option<f64>,
    },
}

impl Rule {
    /// One constructor per field type; `None` for kinds that carry no input.
    fn for_field(field: &Field) -> Option<Rule> {
        let rule = match field.kind {
            FieldType::Hidden | FieldType::Info | FieldType::Divider => return None,
            FieldType::Email => Rule::Email,
            FieldType::Phone => Rule::Phone,
            FieldType::Number => Rule::Number {
                min: field.min.as_ref().and_then(Bound::coerce_number),
                max: field.max.as_ref().and_then(Bound::coerce_number),
            },
            FieldType::Date => Rule::Date {
                min: date_bound(field, field.min.as_ref()),
                max: date_bound(field, field.max.as_ref()),
            },
            FieldType::Multiselect => Rule::StringList,
            FieldType::Checkbox => Rule::Boolean,
            FieldType::File => Rule::File,
            FieldType::Text | FieldType::Textarea | FieldType::Select | FieldType::Radio => {
                Rule::Text {
                    pattern: compile_pattern(field),
                    min_len: field.min.as_ref().and_then(Bound::as_number),
                    max_len: field.max.as_ref().and_then(Bound::as_number),
                }
            }
        };
        Some(rule)
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Rule::Email => {
                let text = expect_string(value)?;
                let valid = EMAIL.is_match(text) && !text.starts_with('.') && !text.contains("..");
                if valid {
                    Ok(())
                } else {
                    Err("Invalid email address".into())
                }
            }
            Rule::Phone => {
                let text = expect_string(value)?;
                if PHONE.is_match(text) {
                    Ok(())
                } else {
                    Err("Invalid phone number".into())
                }
            }
            Rule::Number { min, max } => {
                let number = Operand::from_value(Some(value)).to_number();
                if !number.is_finite() {
                    return Err(format!("Expected number, received {}", type_name(value)));
                }
                if let Some(min) = min
                    && number < *min
                {
                    return Err(format!(
                        "Number must be greater than or equal to {}",
                        format_number(*min)
                    ));
                }
                if let Some(max) = max
                    && number > *max
                {
                    return Err(format!(
                        "Number must be less than or equal to {}",
                        format_number(*max)
                    ));
                }
                Ok(())
            }
            Rule::Date { min, max } => {
                let text = expect_string(value)?;
                let date = parse_date(text).ok_or_else(|| "Invalid date".to_string())?;
                if let Some(min) = min
                    && date < *min
                {
                    return Err(format!("Date must be on or after {}", min));
                }
                if let Some(max) = max
                    && date > *max
                {
                    return Err(format!("Date must be on or before {}", max));
                }
                Ok(())
            }
            Rule::StringList => match value {
                Value::Array(items) if items.iter().all(Value::is_string) => Ok(()),
                Value::Array(_) => Err("Expected array of strings".into()),
                other => Err(format!("Expected array, received {}", type_name(other))),
            },
            Rule::Boolean => match value {
                Value::Bool(_) => Ok(()),
                other => Err(format!("Expected boolean, received {}", type_name(other))),
            },
            Rule::File => match value {
                Value::Object(_) => Ok(()),
                Value::String(text) if !text.is_empty() => Ok(()),
                _ => Err("File is required".into()),
            },
            Rule::Text {
                pattern,
                min_len,
                max_len,
            } => {
                let text = expect_string(value)?;
                if let Some(pattern) = pattern
                    && !pattern.is_match(text)
                {
                    return Err("Invalid".into());
                }
                let length = text.chars().count() as f64;
                if let Some(min_len) = min_len
                    && length < *min_len
                {
                    return Err(format!(
                        "String must contain at least {} character(s)",
                        format_number(*min_len)
                    ));
                }
                if let Some(max_len) = max_len
                    && length > *max_len
                {
                    return Err(format!(
                        "String must contain at most {} character(s)",
                        format_number(*max_len)
                    ));
                }
                Ok(())
            }
        }
    }
}

fn expect_string(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("Expected string, received {}", type_name(value)))
}

fn compile_pattern(field: &Field) -> Option<Regex> {
    let pattern = field.regex.as_deref()?;
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(err) => {
            warn!(field = %field.id, %err, "ignoring regex that does not compile");
            None
        }
    }
}

fn date_bound(field: &Field, bound: Option<&Bound>) -> Option<NaiveDate> {
    let text = bound?.as_text()?;
    let date = parse_date(text);
    if date.is_none() {
        warn!(field = %field.id, bound = text, "ignoring date bound that does not parse");
    }
    date
}

/// Calendar date of a date or date-time string.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(text) {
        return Some(datetime.date_naive());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DATE_TIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|datetime| datetime.date())
        })
}

#[derive(Debug, Clone)]
struct FieldRule {
    id: String,
    name: String,
    required: bool,
    rule: Rule,
}

impl FieldRule {
    fn check(&self, values: &Map<String, Value>) -> Option<String> {
        let value = values.get(&self.id);
        if is_blank(value) {
            return self.required.then(|| format!("{} is required", self.name));
        }
        value.and_then(|value| self.rule.check(value).err())
    }
}

/// Structural validator derived from a field list.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: Vec<FieldRule>,
}

impl Validator {
    pub fn build<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Self {
        let rules = fields
            .into_iter()
            .filter_map(|field| {
                Some(FieldRule {
                    id: field.id.clone(),
                    name: field.display_name().to_string(),
                    required: field.required,
                    rule: Rule::for_field(field)?,
                })
            })
            .collect();
        Self { rules }
    }

    /// Validates every rule; at most one message per field.
    pub fn check(&self, values: &Map<String, Value>) -> ValidationErrors {
        self.check_where(values, |_| true)
    }

    /// Validates only the fields accepted by `include`.
    pub fn check_where(
        &self,
        values: &Map<String, Value>,
        include: impl Fn(&str) -> bool,
    ) -> ValidationErrors {
        self.rules
            .iter()
            .filter(|rule| include(rule.id.as_str()))
            .filter_map(|rule| Some((rule.id.clone(), rule.check(values)?)))
            .collect()
    }

    pub fn check_field(&self, field_id: &str, values: &Map<String, Value>) -> Option<String> {
        self.rules
            .iter()
            .find(|rule| rule.id == field_id)
            .and_then(|rule| rule.check(values))
    }

    pub fn field_ids(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.id.as_str())
    }
}
