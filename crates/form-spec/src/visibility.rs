use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::expr::{Expr, OnExpressionError};
use crate::spec::field::{Field, FieldType};
use crate::spec::form::FormSchema;

pub type VisibilityMap = BTreeMap<String, bool>;

/// Compiled `showWhen` expressions for one field list.
#[derive(Debug, Clone, Default)]
pub struct ShowWhenIndex {
    conditions: BTreeMap<String, Expr>,
    policy: OnExpressionError,
}

impl ShowWhenIndex {
    pub fn compile(fields: &[Field]) -> Self {
        Self::compile_with_policy(fields, OnExpressionError::default())
    }

    pub fn compile_with_policy(fields: &[Field], policy: OnExpressionError) -> Self {
        let conditions = fields
            .iter()
            .filter_map(|field| {
                let expr = Expr::parse(field.show_when.as_deref()?);
                (!expr.is_empty()).then(|| (field.id.clone(), expr))
            })
            .collect();
        Self { conditions, policy }
    }

    /// Whether the field's `showWhen` holds; fields without one always do.
    pub fn is_shown(&self, field_id: &str, values: &Map<String, Value>) -> bool {
        self.conditions
            .get(field_id)
            .map(|expr| expr.evaluate_with_policy(values, self.policy))
            .unwrap_or(true)
    }

    /// Fields to render, in declared order. `hidden` fields never render.
    pub fn visible_fields<'a>(
        &self,
        fields: &'a [Field],
        values: &Map<String, Value>,
    ) -> Vec<&'a Field> {
        fields
            .iter()
            .filter(|field| field.kind != FieldType::Hidden && self.is_shown(&field.id, values))
            .collect()
    }

    pub fn resolve(&self, fields: &[Field], values: &Map<String, Value>) -> VisibilityMap {
        fields
            .iter()
            .map(|field| {
                let visible = field.kind != FieldType::Hidden && self.is_shown(&field.id, values);
                (field.id.clone(), visible)
            })
            .collect()
    }
}

/// Visible fields of `schema` under `values`, in declared order.
pub fn render_list<'a>(schema: &'a FormSchema, values: &Map<String, Value>) -> Vec<&'a Field> {
    ShowWhenIndex::compile(&schema.fields).visible_fields(&schema.fields, values)
}

pub fn resolve_visibility(
    schema: &FormSchema,
    values: &Map<String, Value>,
    policy: OnExpressionError,
) -> VisibilityMap {
    ShowWhenIndex::compile_with_policy(&schema.fields, policy).resolve(&schema.fields, values)
}
