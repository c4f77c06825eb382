use serde::Serialize;
use serde_json::{Map, Value};

use crate::coerce::is_answered;
use crate::spec::field::Field;

/// Answered versus eligible field counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Progress {
    pub answered: usize,
    pub total: usize,
}

impl Progress {
    /// Percentage in `0.0..=100.0`; zero when nothing is eligible.
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.answered as f64 / self.total as f64 * 100.0
        }
    }

    pub fn rounded(&self) -> u8 {
        self.percent().round() as u8
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.answered == self.total
    }
}

/// Counts visible input fields and how many of them hold a value.
pub fn compute_progress<'a>(
    visible: impl IntoIterator<Item = &'a Field>,
    values: &Map<String, Value>,
) -> Progress {
    visible
        .into_iter()
        .filter(|field| field.kind.collects_input())
        .fold(Progress::default(), |mut progress, field| {
            progress.total += 1;
            if is_answered(values.get(&field.id)) {
                progress.answered += 1;
            }
            progress
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::field::FieldType;
    use serde_json::json;

    #[test]
    fn half_filled_is_fifty_percent() {
        let fields = vec![
            Field::new("a", FieldType::Text),
            Field::new("b", FieldType::Email),
            Field::new("c", FieldType::Checkbox),
            Field::new("d", FieldType::Number),
            Field::new("note", FieldType::Info),
            Field::new("rule", FieldType::Divider),
            Field::new("uid", FieldType::Hidden),
        ];
        let values = json!({ "a": "x", "c": false, "b": "", "d": null, "uid": "u1" });
        let progress = compute_progress(&fields, values.as_object().expect("object"));
        assert_eq!(progress, Progress { answered: 2, total: 4 });
        assert_eq!(progress.percent(), 50.0);
        assert!(!progress.is_complete());
    }

    #[test]
    fn no_eligible_fields_is_zero_percent() {
        let fields = vec![Field::new("note", FieldType::Info)];
        let progress = compute_progress(&fields, &Map::new());
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percent(), 0.0);
        assert_eq!(progress.rounded(), 0);
    }
}
