use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// HTTP verb declared on a webhook action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebhookMethod {
    Get,
    #[default]
    Post,
    Put,
}

/// One post-submit side effect, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Navigate {
        to: String,
    },
    LocalStore {
        key: String,
    },
    Webhook {
        url: String,
        #[serde(default)]
        method: WebhookMethod,
    },
    /// Builds a `wa.me` confirmation link from a message template.
    #[serde(rename = "whatsapp")]
    WhatsApp {
        #[serde(rename = "whatsappTo")]
        to: String,
        #[serde(
            rename = "whatsappFrom",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        from: Option<String>,
        #[serde(
            rename = "whatsappTemplate",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        template: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Navigate,
    LocalStore,
    Webhook,
    #[serde(rename = "whatsapp")]
    WhatsApp,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::LocalStore => "localStore",
            ActionKind::Webhook => "webhook",
            ActionKind::WhatsApp => "whatsapp",
        }
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Navigate { .. } => ActionKind::Navigate,
            Action::LocalStore { .. } => ActionKind::LocalStore,
            Action::Webhook { .. } => ActionKind::Webhook,
            Action::WhatsApp { .. } => ActionKind::WhatsApp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn actions_use_type_tag() {
        let actions: Vec<Action> = serde_json::from_value(json!([
            { "type": "localStore", "key": "form_submission" },
            { "type": "navigate", "to": "/ticket-created" },
            { "type": "webhook", "url": "https://example.com/hook" },
            { "type": "whatsapp", "whatsappTo": "+91 99582 12050" }
        ]))
        .expect("deserialize");
        assert_eq!(
            actions.iter().map(Action::kind).collect::<Vec<_>>(),
            vec![
                ActionKind::LocalStore,
                ActionKind::Navigate,
                ActionKind::Webhook,
                ActionKind::WhatsApp
            ]
        );
        assert!(matches!(
            actions[2],
            Action::Webhook {
                method: WebhookMethod::Post,
                ..
            }
        ));
    }

    #[test]
    fn local_store_requires_key() {
        let result = serde_json::from_value::<Action>(json!({ "type": "localStore" }));
        assert!(result.is_err());
    }
}
