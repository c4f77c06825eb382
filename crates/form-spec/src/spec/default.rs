use crate::spec::action::Action;
use crate::spec::field::{Field, FieldType};
use crate::spec::form::{AfterSubmit, FormSchema, HiddenFields, Layout};

/// Storage key used by the built-in schema's `localStore` action.
pub const DEFAULT_SUBMISSION_KEY: &str = "form_submission";

impl FormSchema {
    /// The compiled-in "Lucky Draw Entry" form, used when nothing is published.
    pub fn default_schema() -> Self {
        FormSchema {
            version: "2.0".into(),
            title: "Lucky Draw Entry".into(),
            description: Some("Enter your details for the lucky draw".into()),
            hidden: Some(HiddenFields {
                inject: vec!["user_id".into(), "ticket_seed".into(), "source".into()],
            }),
            layout: Some(Layout { columns: Some(1) }),
            fields: vec![
                Field::new("full_name", FieldType::Text)
                    .with_label("Full Name")
                    .required()
                    .with_placeholder("Enter your full name")
                    .with_hint("Your legal name as it appears on official documents"),
                Field::new("phone", FieldType::Phone)
                    .with_label("Phone Number")
                    .required()
                    .with_placeholder("+91 98765 43210")
                    .with_hint("10-digit mobile number for verification"),
                Field::new("reference_phone", FieldType::Phone)
                    .with_label("Reference Mobile Number")
                    .with_placeholder("+91 98765 43210")
                    .with_hint("Optional - Alternative contact number"),
                Field::new("email", FieldType::Email)
                    .with_label("Email Address")
                    .with_placeholder("your.email@example.com")
                    .with_hint("Optional - We'll send updates if provided"),
                Field::new("selfie", FieldType::File)
                    .with_label("Upload Selfie")
                    .required()
                    .with_hint("Please upload a clear selfie for verification"),
                Field::new("has_car", FieldType::Radio)
                    .with_label("Do you have a car?")
                    .required()
                    .with_options([("yes", "Yes"), ("no", "No")])
                    .with_hint("Select whether you currently own a car"),
                Field::new("page_break_1", FieldType::Divider),
                Field::new("income_info", FieldType::Info)
                    .with_label("Income Information")
                    .with_hint(
                        "This information helps us understand our audience better and is kept confidential.",
                    ),
                Field::new("income_bracket", FieldType::Radio)
                    .with_label("Annual Income Bracket")
                    .required()
                    .with_options([
                        ("below_5", "Below ₹5 LPA"),
                        ("5_to_10", "₹5 LPA - ₹10 LPA"),
                        ("10_to_20", "₹10 LPA - ₹20 LPA"),
                        ("20_to_30", "₹20 LPA - ₹30 LPA"),
                        ("30_to_40", "₹30 LPA - ₹40 LPA"),
                        ("40_to_50", "₹40 LPA - ₹50 LPA"),
                        ("above_50", "₹50 LPA+"),
                    ])
                    .with_hint("Select your current annual income range"),
                Field::new("marketing_consent", FieldType::Checkbox)
                    .with_label("I consent to receive marketing communications")
                    .with_hint("Optional - You can unsubscribe anytime"),
            ],
            after_submit: Some(AfterSubmit {
                actions: vec![
                    Action::LocalStore {
                        key: DEFAULT_SUBMISSION_KEY.into(),
                    },
                    Action::Navigate {
                        to: "/ticket-created".into(),
                    },
                ],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_schema_is_publishable() {
        let schema = FormSchema::default_schema();
        assert!(schema.is_publishable(), "{:?}", schema.check());
        assert_eq!(schema.injected_fields().len(), 3);
    }

    #[test]
    fn default_schema_survives_json() {
        let schema = FormSchema::default_schema();
        let json = schema.to_json_pretty().expect("encode");
        assert!(json.contains("\"afterSubmit\""));
        assert_eq!(FormSchema::from_json(&json).expect("decode"), schema);
    }
}
