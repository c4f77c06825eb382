use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::FormValues;
use crate::actions::{ActionOutcome, ActionPipeline};
use crate::expr::OnExpressionError;
use crate::progress::{Progress, compute_progress};
use crate::render::{RenderPayload, build_render_payload_with};
use crate::spec::field::Field;
use crate::spec::form::FormSchema;
use crate::store::KeyValueStore;
use crate::validate::{ValidationErrors, Validator};
use crate::visibility::ShowWhenIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Editing,
    Submitting,
    Completed,
    Failed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Editing => "editing",
            SessionState::Submitting => "submitting",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("form was already submitted")]
    Completed,
    #[error("a submission is already in progress")]
    Submitting,
    #[error("form has no field '{0}'")]
    UnknownField(String),
}

/// Data handed to the pipeline and what each action reported.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReport {
    pub data: FormValues,
    pub outcomes: Vec<ActionOutcome>,
}

impl SubmissionReport {
    pub fn is_success(&self) -> bool {
        !self.outcomes.iter().any(ActionOutcome::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.is_failure())
    }

    /// First navigate target, if any action asked for one.
    pub fn navigation(&self) -> Option<&str> {
        self.outcomes.iter().find_map(|outcome| match outcome {
            ActionOutcome::Navigate { to } => Some(to.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionResult {
    /// Validation failed; no action ran.
    Invalid { errors: ValidationErrors },
    Submitted(SubmissionReport),
}

/// One user's pass through a form: values, live errors and lifecycle state.
#[derive(Debug, Clone)]
pub struct FormSession {
    schema: FormSchema,
    conditions: ShowWhenIndex,
    validator: Validator,
    policy: OnExpressionError,
    values: FormValues,
    touched: BTreeSet<String>,
    errors: ValidationErrors,
    state: SessionState,
}

impl FormSession {
    pub fn new(schema: FormSchema) -> Self {
        Self::with_policy(schema, OnExpressionError::default())
    }

    pub fn with_policy(schema: FormSchema, policy: OnExpressionError) -> Self {
        let conditions = ShowWhenIndex::compile_with_policy(&schema.fields, policy);
        let validator = Validator::build(&schema.fields);
        let mut session = Self {
            schema,
            conditions,
            validator,
            policy,
            values: FormValues::new(),
            touched: BTreeSet::new(),
            errors: ValidationErrors::new(),
            state: SessionState::Idle,
        };
        session.apply_defaults();
        session
    }

    fn apply_defaults(&mut self) {
        for field in &self.schema.fields {
            if let Some(default) = &field.default_value {
                self.values.insert(field.id.clone(), default.clone());
            }
        }
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn value(&self, field_id: &str) -> Option<&Value> {
        self.values.get(field_id)
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Completed => Err(SessionError::Completed),
            SessionState::Submitting => Err(SessionError::Submitting),
            _ => Ok(()),
        }
    }

    fn ensure_field(&self, field_id: &str) -> Result<(), SessionError> {
        match self.schema.field(field_id) {
            Some(_) => Ok(()),
            None => Err(SessionError::UnknownField(field_id.to_string())),
        }
    }

    pub fn set_value(&mut self, field_id: &str, value: Value) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.ensure_field(field_id)?;
        self.values.insert(field_id.to_string(), value);
        self.touch(field_id);
        Ok(())
    }

    pub fn clear_value(&mut self, field_id: &str) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.ensure_field(field_id)?;
        self.values.remove(field_id);
        self.touch(field_id);
        Ok(())
    }

    fn touch(&mut self, field_id: &str) {
        self.touched.insert(field_id.to_string());
        self.state = SessionState::Editing;
        self.revalidate();
    }

    /// Live errors for touched fields that are currently shown.
    fn revalidate(&mut self) {
        self.errors = self.validator.check_where(&self.values, |id| {
            self.touched.contains(id) && self.conditions.is_shown(id, &self.values)
        });
    }

    pub fn visible_fields(&self) -> Vec<&Field> {
        self.conditions
            .visible_fields(&self.schema.fields, &self.values)
    }

    pub fn is_visible(&self, field_id: &str) -> bool {
        self.visible_fields().iter().any(|field| field.id == field_id)
    }

    pub fn progress(&self) -> Progress {
        compute_progress(self.visible_fields(), &self.values)
    }

    pub fn field_errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Errors a submit would report right now, touched or not.
    pub fn validate(&self) -> ValidationErrors {
        self.validator
            .check_where(&self.values, |id| self.conditions.is_shown(id, &self.values))
    }

    /// Swaps in an edited schema, keeping values for fields that still exist.
    pub fn replace_schema(&mut self, schema: FormSchema) {
        self.conditions = ShowWhenIndex::compile_with_policy(&schema.fields, self.policy);
        self.validator = Validator::build(&schema.fields);
        self.values.retain(|id, _| schema.field(id).is_some());
        self.touched.retain(|id| schema.field(id).is_some());
        self.schema = schema;
        self.revalidate();
    }

    pub fn render(&self) -> RenderPayload {
        build_render_payload_with(&self.schema, &self.conditions, &self.values, &self.errors)
    }

    /// Starts a fresh entry on the same schema.
    pub fn reset(&mut self) {
        self.values.clear();
        self.touched.clear();
        self.errors.clear();
        self.state = SessionState::Idle;
        self.apply_defaults();
    }

    /// Validates visible fields, then runs the schema's actions on the
    /// values merged with any provided `hidden.inject` values.
    pub fn submit<S: KeyValueStore>(
        &mut self,
        hidden: &FormValues,
        pipeline: &mut ActionPipeline<'_, S>,
    ) -> Result<SubmissionResult, SessionError> {
        self.ensure_editable()?;

        let errors = self.validate();
        if !errors.is_empty() {
            debug!(count = errors.len(), "submission rejected by validation");
            self.touched
                .extend(self.validator.field_ids().map(str::to_string));
            self.errors = errors.clone();
            self.state = SessionState::Editing;
            return Ok(SubmissionResult::Invalid { errors });
        }

        self.state = SessionState::Submitting;
        let mut data = self.values.clone();
        for id in self.schema.injected_fields() {
            if let Some(value) = hidden.get(id)
                && !value.is_null()
            {
                data.insert(id.clone(), value.clone());
            }
        }

        let outcomes = pipeline.run(self.schema.actions(), &data);
        let report = SubmissionReport { data, outcomes };
        if report.is_success() {
            self.state = SessionState::Completed;
            self.values.clear();
            self.touched.clear();
            self.errors.clear();
        } else {
            self.state = SessionState::Failed;
        }
        Ok(SubmissionResult::Submitted(report))
    }
}
