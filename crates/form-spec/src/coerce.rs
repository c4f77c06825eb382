//! Loose value semantics shared by `showWhen` comparisons and number rules.
//!
//! Form values arrive from a browser host, so comparisons follow the host's
//! loose equality and `Number()` conversion instead of strict JSON equality.

use std::borrow::Cow;

use serde_json::Value;

/// A primitive operand after object-to-primitive conversion.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<'a> {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Cow<'a, str>),
}

impl<'a> Operand<'a> {
    /// Converts a looked-up form value; `None` is an absent key.
    pub fn from_value(value: Option<&'a Value>) -> Self {
        match value {
            None => Operand::Undefined,
            Some(Value::Null) => Operand::Null,
            Some(Value::Bool(flag)) => Operand::Bool(*flag),
            Some(Value::Number(num)) => Operand::Number(num.as_f64().unwrap_or(f64::NAN)),
            Some(Value::String(text)) => Operand::Str(Cow::Borrowed(text.as_str())),
            Some(other) => Operand::Str(Cow::Owned(to_primitive_string(other))),
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Operand::Undefined => f64::NAN,
            Operand::Null => 0.0,
            Operand::Bool(flag) => f64::from(u8::from(*flag)),
            Operand::Number(num) => *num,
            Operand::Str(text) => parse_number(text),
        }
    }

    fn is_nullish(&self) -> bool {
        matches!(self, Operand::Undefined | Operand::Null)
    }
}

/// Loose equality: `"5" == 5`, `null == undefined`, `true == 1`.
pub fn loose_eq(left: &Operand<'_>, right: &Operand<'_>) -> bool {
    match (left, right) {
        (l, r) if l.is_nullish() || r.is_nullish() => l.is_nullish() && r.is_nullish(),
        (Operand::Number(l), Operand::Number(r)) => l == r,
        (Operand::Str(l), Operand::Str(r)) => l == r,
        (Operand::Bool(l), Operand::Bool(r)) => l == r,
        (l, r) => l.to_number() == r.to_number(),
    }
}

/// Parses text the way `Number(text)` does. Returns NaN when it is not numeric.
pub fn parse_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
        if let Some(digits) = trimmed
            .strip_prefix(prefix)
            .or_else(|| trimmed.strip_prefix(&prefix.to_ascii_uppercase()))
        {
            return parse_radix(digits, radix);
        }
    }

    let plain = trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '+' | '-' | '.' | 'e' | 'E'));
    if !plain {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_radix(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    let mut total = 0.0_f64;
    for ch in digits.chars() {
        match ch.to_digit(radix) {
            Some(digit) => total = total * f64::from(radix) + f64::from(digit),
            None => return f64::NAN,
        }
    }
    total
}

/// `String(value)` for arrays and objects.
pub fn to_primitive_string(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => format_number(num.as_f64().unwrap_or(f64::NAN)),
        Value::String(text) => text.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_primitive_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".into(),
    }
}

pub fn format_number(num: f64) -> String {
    if num.is_nan() {
        "NaN".into()
    } else if num.is_infinite() {
        String::from(if num > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        num.to_string()
    }
}

/// Absent, null, empty string or empty list.
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Present, non-null and not the empty string. Used for progress counting.
pub fn is_answered(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}

/// Type name used in validation messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_number_follows_host_rules() {
        assert_eq!(parse_number("42"), 42.0);
        assert_eq!(parse_number(" 1.5e2 "), 150.0);
        assert_eq!(parse_number(""), 0.0);
        assert_eq!(parse_number("0x1F"), 31.0);
        assert_eq!(parse_number("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_number("inf").is_nan());
        assert!(parse_number("12abc").is_nan());
        assert!(parse_number("1e").is_nan());
    }

    #[test]
    fn loose_equality_coerces_across_types() {
        let five = json!(5);
        let text_five = json!("5");
        let yes = json!(true);
        assert!(loose_eq(
            &Operand::from_value(Some(&text_five)),
            &Operand::Number(5.0)
        ));
        assert!(loose_eq(
            &Operand::from_value(Some(&five)),
            &Operand::Str("5".into())
        ));
        assert!(loose_eq(&Operand::from_value(Some(&yes)), &Operand::Number(1.0)));
        assert!(loose_eq(&Operand::Undefined, &Operand::Null));
        assert!(!loose_eq(&Operand::Null, &Operand::Number(0.0)));
        assert!(!loose_eq(&Operand::Undefined, &Operand::Str("".into())));
    }

    #[test]
    fn arrays_compare_as_joined_text() {
        let picks = json!(["a", "b"]);
        assert!(loose_eq(
            &Operand::from_value(Some(&picks)),
            &Operand::Str("a,b".into())
        ));
        let single = json!([3]);
        assert_eq!(Operand::from_value(Some(&single)).to_number(), 3.0);
    }

    #[test]
    fn blank_and_answered_differ_on_empty_lists() {
        let empty = json!([]);
        assert!(is_blank(Some(&empty)));
        assert!(is_answered(Some(&empty)));
        assert!(!is_answered(Some(&json!(""))));
        assert!(is_answered(Some(&json!(false))));
    }
}
