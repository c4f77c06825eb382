//! `showWhen` expressions.
//!
//! The grammar is one or more `<field> <op> <literal>` conditions joined by
//! `&&`. Expressions are parsed once into an [`Expr`] and evaluated against
//! form values on every change.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::coerce::{Operand, loose_eq, parse_number};

static CONDITION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_]+)\s*(==|!=|>=|<=|>|<)\s*(.+?)\s*$")
        .expect("condition pattern compiles")
});

/// What a malformed condition evaluates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnExpressionError {
    /// Fail open: a typo in a schema never hides a field.
    #[default]
    ShowField,
    HideField,
}

impl OnExpressionError {
    pub fn outcome(self) -> bool {
        matches!(self, OnExpressionError::ShowField)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
}

impl Operator {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            ">=" => Some(Operator::Ge),
            "<=" => Some(Operator::Le),
            ">" => Some(Operator::Gt),
            "<" => Some(Operator::Lt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Lt => "<",
        }
    }
}

/// Right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Str(String),
    Number(f64),
    Bool(bool),
    Null,
    Undefined,
}

impl Literal {
    /// Quoted text first, then numbers, then keywords, then raw text.
    pub fn parse(raw: &str) -> Self {
        for quote in ['"', '\''] {
            if raw.starts_with(quote) && raw.ends_with(quote) {
                let inner = if raw.len() >= 2 {
                    &raw[1..raw.len() - 1]
                } else {
                    ""
                };
                return Literal::Str(inner.to_string());
            }
        }

        let number = parse_number(raw);
        if !number.is_nan() {
            return Literal::Number(number);
        }

        match raw {
            "true" => Literal::Bool(true),
            "false" => Literal::Bool(false),
            "null" => Literal::Null,
            "undefined" => Literal::Undefined,
            other => Literal::Str(other.to_string()),
        }
    }

    fn operand(&self) -> Operand<'_> {
        match self {
            Literal::Str(text) => Operand::Str(text.as_str().into()),
            Literal::Number(num) => Operand::Number(*num),
            Literal::Bool(flag) => Operand::Bool(*flag),
            Literal::Null => Operand::Null,
            Literal::Undefined => Operand::Undefined,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("Invalid condition: \"{0}\"")]
    InvalidCondition(String),
}

/// A single `<field> <op> <literal>` comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Condition {
    pub field: String,
    pub op: Operator,
    pub literal: Literal,
}

impl Condition {
    pub fn parse(text: &str) -> Result<Self, ExprError> {
        let captures = CONDITION
            .captures(text)
            .ok_or_else(|| ExprError::InvalidCondition(text.trim().to_string()))?;
        let op = Operator::from_token(&captures[2])
            .ok_or_else(|| ExprError::InvalidCondition(text.trim().to_string()))?;
        Ok(Condition {
            field: captures[1].to_string(),
            op,
            literal: Literal::parse(&captures[3]),
        })
    }

    pub fn evaluate(&self, values: &Map<String, Value>) -> bool {
        let left = Operand::from_value(values.get(&self.field));
        let right = self.literal.operand();
        match self.op {
            Operator::Eq => loose_eq(&left, &right),
            Operator::Ne => !loose_eq(&left, &right),
            Operator::Gt => left.to_number() > right.to_number(),
            Operator::Lt => left.to_number() < right.to_number(),
            Operator::Ge => left.to_number() >= right.to_number(),
            Operator::Le => left.to_number() <= right.to_number(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Compare(Condition),
    /// Empty text between `&&` separators; always satisfied.
    Blank,
    Malformed(ExprError),
}

/// A parsed `showWhen` expression: the AND of its clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    source: String,
    clauses: Vec<Clause>,
}

/// Result of a static syntax check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExprCheck {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Expr {
    pub fn parse(source: &str) -> Self {
        let clauses = if source.trim().is_empty() {
            Vec::new()
        } else if source.contains("&&") {
            source.split("&&").map(parse_clause).collect()
        } else {
            vec![parse_clause(source)]
        };
        Expr {
            source: source.to_string(),
            clauses,
        }
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// True when the expression places no constraint.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn evaluate(&self, values: &Map<String, Value>) -> bool {
        self.evaluate_with_policy(values, OnExpressionError::default())
    }

    pub fn evaluate_with_policy(
        &self,
        values: &Map<String, Value>,
        policy: OnExpressionError,
    ) -> bool {
        self.clauses.iter().all(|clause| match clause {
            Clause::Compare(condition) => condition.evaluate(values),
            Clause::Blank => true,
            Clause::Malformed(error) => {
                warn!(expression = %self.source, %error, "invalid showWhen expression");
                policy.outcome()
            }
        })
    }

    /// Field ids read by the well-formed conditions.
    pub fn dependencies(&self) -> BTreeSet<String> {
        self.clauses
            .iter()
            .filter_map(|clause| match clause {
                Clause::Compare(condition) => Some(condition.field.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn check(&self) -> ExprCheck {
        let error = self.clauses.iter().find_map(|clause| match clause {
            Clause::Compare(_) => None,
            Clause::Blank => Some(ExprError::InvalidCondition(String::new()).to_string()),
            Clause::Malformed(error) => Some(error.to_string()),
        });
        ExprCheck {
            valid: error.is_none(),
            error,
        }
    }
}

fn parse_clause(text: &str) -> Clause {
    if text.trim().is_empty() {
        return Clause::Blank;
    }
    match Condition::parse(text) {
        Ok(condition) => Clause::Compare(condition),
        Err(error) => Clause::Malformed(error),
    }
}

/// Parses and evaluates in one step with the fail-open policy.
pub fn evaluate(expression: &str, values: &Map<String, Value>) -> bool {
    Expr::parse(expression).evaluate(values)
}

pub fn dependencies(expression: &str) -> BTreeSet<String> {
    Expr::parse(expression).dependencies()
}

pub fn check(expression: &str) -> ExprCheck {
    Expr::parse(expression).check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn empty_expression_is_always_true() {
        assert!(evaluate("", &values(json!({}))));
        assert!(evaluate("   ", &values(json!({ "a": 1 }))));
    }

    #[test]
    fn numeric_comparisons() {
        assert!(evaluate("age > 18", &values(json!({ "age": 20 }))));
        assert!(!evaluate("age > 18", &values(json!({ "age": 10 }))));
        assert!(evaluate("age >= 18", &values(json!({ "age": "18" }))));
        assert!(evaluate("age<=18", &values(json!({ "age": 18 }))));
    }

    #[test]
    fn missing_value_in_numeric_comparison_hides() {
        assert!(!evaluate("age > 18", &values(json!({}))));
        assert!(!evaluate("age <= 18", &values(json!({}))));
    }

    #[test]
    fn string_equality_with_quotes() {
        assert!(evaluate("city == 'mumbai'", &values(json!({ "city": "mumbai" }))));
        assert!(evaluate("city == \"mumbai\"", &values(json!({ "city": "mumbai" }))));
        assert!(!evaluate("city == 'mumbai'", &values(json!({ "city": "delhi" }))));
        assert!(evaluate("city != 'other'", &values(json!({ "city": "delhi" }))));
    }

    #[test]
    fn loose_equality_matches_numbers_and_text() {
        assert!(evaluate("count == 5", &values(json!({ "count": "5" }))));
        assert!(evaluate("agree == true", &values(json!({ "agree": true }))));
        assert!(evaluate("agree == 1", &values(json!({ "agree": true }))));
        assert!(evaluate("missing == undefined", &values(json!({}))));
        assert!(evaluate("missing == null", &values(json!({}))));
        assert!(evaluate("missing != 'x'", &values(json!({}))));
    }

    #[test]
    fn malformed_expression_fails_open() {
        assert!(evaluate("???", &values(json!({}))));
        assert!(evaluate("age = 18", &values(json!({ "age": 1 }))));
        let expr = Expr::parse("???");
        assert!(!expr.evaluate_with_policy(&values(json!({})), OnExpressionError::HideField));
    }

    #[test]
    fn and_chain_requires_every_condition() {
        let expr = "a > 1 && b == 'x'";
        assert!(evaluate(expr, &values(json!({ "a": 2, "b": "x" }))));
        assert!(!evaluate(expr, &values(json!({ "a": 0, "b": "x" }))));
        assert!(!evaluate(expr, &values(json!({ "a": 2, "b": "y" }))));
    }

    #[test]
    fn malformed_clause_in_chain_only_skips_itself() {
        let expr = Expr::parse("a > 1 && ??? && b == 'x'");
        assert!(expr.evaluate(&values(json!({ "a": 2, "b": "x" }))));
        assert!(!expr.evaluate(&values(json!({ "a": 2, "b": "y" }))));
    }

    #[test]
    fn literal_parsing() {
        assert_eq!(Literal::parse("'42'"), Literal::Str("42".into()));
        assert_eq!(Literal::parse("42"), Literal::Number(42.0));
        assert_eq!(Literal::parse("0x10"), Literal::Number(16.0));
        assert_eq!(Literal::parse("true"), Literal::Bool(true));
        assert_eq!(Literal::parse("null"), Literal::Null);
        assert_eq!(Literal::parse("undefined"), Literal::Undefined);
        assert_eq!(Literal::parse("other"), Literal::Str("other".into()));
        assert_eq!(Literal::parse("\""), Literal::Str(String::new()));
    }

    #[test]
    fn operator_prefers_two_character_tokens() {
        let condition = Condition::parse("score >= 10").expect("condition");
        assert_eq!(condition.op, Operator::Ge);
        assert_eq!(condition.literal, Literal::Number(10.0));

        let condition = Condition::parse("flag ===1").expect("condition");
        assert_eq!(condition.op, Operator::Eq);
        assert_eq!(condition.literal, Literal::Str("=1".into()));
    }

    #[test]
    fn dependencies_collect_left_hand_fields() {
        let deps = dependencies("age > 18 && city == 'pune' && age < 60");
        assert_eq!(
            deps.into_iter().collect::<Vec<_>>(),
            vec!["age".to_string(), "city".to_string()]
        );
        assert!(dependencies("").is_empty());
        assert!(dependencies("???").is_empty());
    }

    #[test]
    fn check_reports_first_bad_clause() {
        assert_eq!(
            check(""),
            ExprCheck {
                valid: true,
                error: None
            }
        );
        assert!(check("age > 18 && agree == true").valid);
        let result = check("age > 18 && oops");
        assert!(!result.valid);
        assert_eq!(result.error.as_deref(), Some("Invalid condition: \"oops\""));
        assert!(!check("age > 18 &&").valid);
    }
}
