use chrono::{DateTime, SecondsFormat, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::FormValues;
use crate::spec::action::{Action, ActionKind, WebhookMethod};
use crate::store::{KeyValueStore, Storage};

const DEFAULT_WHATSAPP_TEMPLATE: &str =
    "New entry received\n{{#each this}}{{@key}}: {{this}}\n{{/each}}";

/// Result of running one action. Each outcome is independent of the others.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// Record appended; `total` is the list length after the append.
    Stored { key: String, total: usize },
    Navigate { to: String },
    OpenLink { url: String },
    NotImplemented { action: ActionKind, detail: String },
    Failed { action: ActionKind, message: String },
}

impl ActionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ActionOutcome::Failed { .. })
    }

    fn failed(action: ActionKind, message: impl Into<String>) -> Self {
        ActionOutcome::Failed {
            action,
            message: message.into(),
        }
    }
}

/// Copy of `data` with a `submittedAt` timestamp (UTC, millisecond precision).
pub fn stamp_submission(data: &FormValues, at: DateTime<Utc>) -> Value {
    let mut record = data.clone();
    record.insert(
        "submittedAt".into(),
        Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    Value::Object(record)
}

/// Runs post-submit actions in declared order against one storage handle.
pub struct ActionPipeline<'a, S> {
    storage: &'a mut Storage<S>,
    templates: Handlebars<'static>,
    clock: Box<dyn Fn() -> DateTime<Utc> + 'a>,
}

impl<'a, S: KeyValueStore> ActionPipeline<'a, S> {
    pub fn new(storage: &'a mut Storage<S>) -> Self {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(handlebars::no_escape);
        Self {
            storage,
            templates,
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Every action runs even when an earlier one failed; nothing is rolled back.
    #[tracing::instrument(skip(self, actions, data), fields(count = actions.len()))]
    pub fn run(&mut self, actions: &[Action], data: &FormValues) -> Vec<ActionOutcome> {
        actions
            .iter()
            .map(|action| {
                let outcome = self.run_one(action, data);
                if let ActionOutcome::Failed { action, message } = &outcome {
                    warn!(action = action.as_str(), %message, "action failed");
                }
                outcome
            })
            .collect()
    }

    fn run_one(&mut self, action: &Action, data: &FormValues) -> ActionOutcome {
        match action {
            Action::LocalStore { key } => {
                let record = stamp_submission(data, (self.clock)());
                match self.storage.append_submission(key, record) {
                    Ok(total) => ActionOutcome::Stored {
                        key: key.clone(),
                        total,
                    },
                    Err(err) => ActionOutcome::failed(ActionKind::LocalStore, err.to_string()),
                }
            }
            Action::Navigate { to } => ActionOutcome::Navigate { to: to.clone() },
            Action::Webhook { url, method } => {
                info!(%url, method = method_label(*method), "webhook action is not implemented");
                ActionOutcome::NotImplemented {
                    action: ActionKind::Webhook,
                    detail: format!("{} {}", method_label(*method), url),
                }
            }
            Action::WhatsApp { to, template, .. } => self.whatsapp_link(to, template.as_deref(), data),
        }
    }

    fn whatsapp_link(&self, to: &str, template: Option<&str>, data: &FormValues) -> ActionOutcome {
        let number: String = to.chars().filter(char::is_ascii_digit).collect();
        if number.is_empty() {
            return ActionOutcome::failed(
                ActionKind::WhatsApp,
                format!("'{}' is not a phone number", to),
            );
        }
        let template = template.unwrap_or(DEFAULT_WHATSAPP_TEMPLATE);
        match self.templates.render_template(template, data) {
            Ok(message) => {
                let url = format!(
                    "https://wa.me/{}?text={}",
                    number,
                    urlencoding::encode(&message)
                );
                info!(%number, "prepared whatsapp confirmation link");
                ActionOutcome::OpenLink { url }
            }
            Err(err) => ActionOutcome::failed(ActionKind::WhatsApp, err.to_string()),
        }
    }
}

fn method_label(method: WebhookMethod) -> &'static str {
    match method {
        WebhookMethod::Get => "GET",
        WebhookMethod::Post => "POST",
        WebhookMethod::Put => "PUT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    fn data(value: Value) -> FormValues {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn stamp_uses_millisecond_utc() {
        let stamped = stamp_submission(&data(json!({ "x": 1 })), fixed_clock());
        assert_eq!(stamped, json!({ "x": 1, "submittedAt": "2024-05-01T12:30:00.000Z" }));
    }

    #[test]
    fn runs_in_declared_order_without_short_circuit() {
        let mut storage = Storage::new(MemoryStore::with_quota(8));
        let actions: Vec<Action> = serde_json::from_value(json!([
            { "type": "localStore", "key": "k" },
            { "type": "navigate", "to": "/done" },
            { "type": "webhook", "url": "https://example.com/hook", "method": "PUT" }
        ]))
        .expect("actions");
        let outcomes = ActionPipeline::new(&mut storage)
            .with_clock(fixed_clock)
            .run(&actions, &data(json!({ "x": 1 })));

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_failure());
        assert_eq!(outcomes[1], ActionOutcome::Navigate { to: "/done".into() });
        assert_eq!(
            outcomes[2],
            ActionOutcome::NotImplemented {
                action: ActionKind::Webhook,
                detail: "PUT https://example.com/hook".into()
            }
        );
    }

    #[test]
    fn whatsapp_builds_encoded_link() {
        let mut storage = Storage::new(MemoryStore::new());
        let actions = vec![Action::WhatsApp {
            to: "+91 99582-12050".into(),
            from: None,
            template: Some("Hi {{full_name}} & co".into()),
        }];
        let outcomes = ActionPipeline::new(&mut storage)
            .run(&actions, &data(json!({ "full_name": "Asha" })));
        assert_eq!(
            outcomes,
            vec![ActionOutcome::OpenLink {
                url: "https://wa.me/919958212050?text=Hi%20Asha%20%26%20co".into()
            }]
        );
    }

    #[test]
    fn whatsapp_reports_bad_number_and_template() {
        let mut storage = Storage::new(MemoryStore::new());
        let actions = vec![
            Action::WhatsApp {
                to: "n/a".into(),
                from: None,
                template: None,
            },
            Action::WhatsApp {
                to: "12345".into(),
                from: None,
                template: Some("{{#if}}".into()),
            },
        ];
        let outcomes = ActionPipeline::new(&mut storage).run(&actions, &FormValues::new());
        assert!(outcomes.iter().all(ActionOutcome::is_failure));
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let value = serde_json::to_value(ActionOutcome::Stored {
            key: "k".into(),
            total: 2,
        })
        .expect("serialize");
        assert_eq!(value, json!({ "outcome": "stored", "key": "k", "total": 2 }));
    }
}
