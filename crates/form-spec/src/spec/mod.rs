pub mod action;
pub mod default;
pub mod field;
pub mod form;

pub use action::{Action, ActionKind, WebhookMethod};
pub use field::{Bound, Field, FieldOption, FieldType};
pub use form::{AfterSubmit, FormSchema, HiddenFields, Layout, SchemaError, SchemaIssue, Severity};
