#![allow(missing_docs)]

pub mod actions;
pub mod coerce;
pub mod expr;
pub mod progress;
pub mod render;
pub mod session;
pub mod source;
pub mod spec;
pub mod store;
pub mod validate;
pub mod visibility;

pub use actions::{ActionOutcome, ActionPipeline, stamp_submission};
pub use expr::{
    Clause, Condition, Expr, ExprCheck, Literal, OnExpressionError, Operator, check, dependencies,
    evaluate,
};
pub use progress::{Progress, compute_progress};
pub use render::{
    RenderField, RenderPayload, RenderStatus, build_render_payload, build_render_payload_with,
    render_json_ui, render_text,
};
pub use session::{FormSession, SessionError, SessionState, SubmissionReport, SubmissionResult};
pub use source::{
    FetchError, RemoteSource, ResolvedSchema, SchemaFetcher, SchemaOrigin, resolve_draft_schema,
    resolve_published_schema,
};
pub use spec::{
    Action, ActionKind, Bound, Field, FieldOption, FieldType, FormSchema, SchemaError, SchemaIssue,
    Severity,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, Storage, StorageStatus, StoreError};
pub use validate::{ValidationErrors, Validator};
pub use visibility::{ShowWhenIndex, VisibilityMap, render_list, resolve_visibility};

/// Current values of a form session, keyed by field id.
pub type FormValues = serde_json::Map<String, serde_json::Value>;
