//! Validation engine.
//!
//! Turns raw submitted strings into per-widget render state and a typed
//! input mapping. Every widget is checked; one invalid field never hides
//! the messages of the others.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::FormError;
use crate::form::FormDefinition;
use crate::widget::{Widget, WidgetKind, WidgetSpec};

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_INVALID: &str = "Invalid input.";

/// Raw form fields as posted by the browser.
pub type SubmittedValues = BTreeMap<String, String>;

/// A submitted value converted to its widget's declared type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CoercedValue {
    Text(String),
    Bool(bool),
}

impl From<CoercedValue> for serde_json::Value {
    fn from(value: CoercedValue) -> Self {
        match value {
            CoercedValue::Text(s) => serde_json::Value::String(s),
            CoercedValue::Bool(b) => serde_json::Value::Bool(b),
        }
    }
}

/// Columns that passed validation, typed per widget kind.
pub type CoercedInput = BTreeMap<String, CoercedValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionOutcome {
    /// Conjunction over all widgets. Always false in display mode, where it
    /// means "not yet submitted" rather than "failed".
    pub valid: bool,
    /// One entry per widget, in definition order.
    pub widgets: Vec<Widget>,
    pub coerced_input: CoercedInput,
}

/// Validate one widget. Returns the coerced value or the message to show.
fn check_widget(
    spec: &WidgetSpec,
    raw: &str,
) -> Result<Result<CoercedValue, &'static str>, FormError> {
    if let WidgetKind::Other(kind) = &spec.kind {
        return Err(FormError::UnsupportedWidgetKind {
            column: spec.column.clone(),
            kind: kind.clone(),
        });
    }
    if !spec.optional && raw.is_empty() {
        return Ok(Err(MSG_REQUIRED));
    }
    Ok(match (&spec.kind, raw) {
        (WidgetKind::YesNo, "0") => Ok(CoercedValue::Bool(false)),
        (WidgetKind::YesNo, "1") => Ok(CoercedValue::Bool(true)),
        (WidgetKind::YesNo, _) => Err(MSG_INVALID),
        _ => Ok(CoercedValue::Text(raw.to_string())),
    })
}

/// Evaluate `form` against submitted values.
///
/// `None` renders the blank form for display; `Some` validates a POST.
/// An absent optional `yesno` field is left out of the coerced input,
/// while an absent optional `text` field is coerced to an empty string.
pub fn evaluate(
    form: &FormDefinition,
    submitted: Option<&SubmittedValues>,
) -> Result<SubmissionOutcome, FormError> {
    let mut valid = submitted.is_some();
    let mut widgets = Vec::with_capacity(form.widgets.len());
    let mut coerced_input = CoercedInput::new();

    for spec in &form.widgets {
        let mut validation_message = None;
        let mut value = String::new();

        if let Some(values) = submitted {
            let raw = values.get(&spec.column).map(String::as_str).unwrap_or("");
            value = raw.to_string();

            if spec.optional && raw.is_empty() && spec.kind == WidgetKind::YesNo {
                // Nothing chosen on an optional choice: nothing to record.
            } else {
                match check_widget(spec, raw)? {
                    Ok(coerced) => {
                        coerced_input.insert(spec.column.clone(), coerced);
                    }
                    Err(message) => {
                        validation_message = Some(message.to_string());
                        valid = false;
                    }
                }
            }
        }

        widgets.push(Widget {
            id: spec.column.clone(),
            label: spec.display_label(),
            kind: spec.kind.clone(),
            value,
            validation_message,
        });
    }

    Ok(SubmissionOutcome {
        valid,
        widgets,
        coerced_input,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widget::WidgetSpec;

    fn sample_form() -> FormDefinition {
        FormDefinition::new(
            "",
            "Responded_At",
            vec![
                WidgetSpec::new("name", WidgetKind::Text),
                WidgetSpec::new("subscribe", WidgetKind::YesNo).optional(),
            ],
        )
    }

    fn submit(pairs: &[(&str, &str)]) -> SubmittedValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn message<'a>(outcome: &'a SubmissionOutcome, id: &str) -> Option<&'a str> {
        outcome
            .widgets
            .iter()
            .find(|w| w.id == id)
            .and_then(|w| w.validation_message.as_deref())
    }

    #[test]
    fn display_mode_renders_blank_widgets() {
        let outcome = evaluate(&sample_form(), None).unwrap();
        assert!(!outcome.valid);
        assert!(outcome.coerced_input.is_empty());
        assert_eq!(outcome.widgets.len(), 2);
        for widget in &outcome.widgets {
            assert_eq!(widget.value, "");
            assert!(widget.validation_message.is_none());
        }
    }

    #[test]
    fn widgets_keep_definition_order() {
        let outcome = evaluate(&sample_form(), Some(&submit(&[]))).unwrap();
        let ids: Vec<&str> = outcome.widgets.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["name", "subscribe"]);
    }

    #[test]
    fn empty_required_field_with_valid_choice() {
        let outcome =
            evaluate(&sample_form(), Some(&submit(&[("name", ""), ("subscribe", "1")]))).unwrap();
        assert!(!outcome.valid);
        assert_eq!(message(&outcome, "name"), Some(MSG_REQUIRED));
        assert_eq!(message(&outcome, "subscribe"), None);
        assert!(!outcome.coerced_input.contains_key("name"));
        assert_eq!(
            outcome.coerced_input.get("subscribe"),
            Some(&CoercedValue::Bool(true))
        );
    }

    #[test]
    fn invalid_choice_keeps_valid_text() {
        let outcome = evaluate(
            &sample_form(),
            Some(&submit(&[("name", "Ada"), ("subscribe", "2")])),
        )
        .unwrap();
        assert!(!outcome.valid);
        assert_eq!(message(&outcome, "subscribe"), Some(MSG_INVALID));
        let mut expected = CoercedInput::new();
        expected.insert("name".to_string(), CoercedValue::Text("Ada".to_string()));
        assert_eq!(outcome.coerced_input, expected);
    }

    #[test]
    fn omitted_optional_choice_is_valid_and_absent() {
        let outcome = evaluate(&sample_form(), Some(&submit(&[("name", "Ada")]))).unwrap();
        assert!(outcome.valid);
        let mut expected = CoercedInput::new();
        expected.insert("name".to_string(), CoercedValue::Text("Ada".to_string()));
        assert_eq!(outcome.coerced_input, expected);
    }

    #[test]
    fn zero_coerces_to_false() {
        let outcome = evaluate(
            &sample_form(),
            Some(&submit(&[("name", "Ada"), ("subscribe", "0")])),
        )
        .unwrap();
        assert!(outcome.valid);
        assert_eq!(
            outcome.coerced_input.get("subscribe"),
            Some(&CoercedValue::Bool(false))
        );
    }

    #[test]
    fn yesno_rejects_lookalikes() {
        for raw in ["yes", "true", " 1", "01", "1.0"] {
            let outcome = evaluate(
                &sample_form(),
                Some(&submit(&[("name", "Ada"), ("subscribe", raw)])),
            )
            .unwrap();
            assert_eq!(message(&outcome, "subscribe"), Some(MSG_INVALID), "{raw:?}");
        }
    }

    #[test]
    fn required_yesno_reports_required_when_empty() {
        let form = FormDefinition::new(
            "",
            "Done",
            vec![WidgetSpec::new("attend", WidgetKind::YesNo)],
        );
        let outcome = evaluate(&form, Some(&submit(&[]))).unwrap();
        assert_eq!(message(&outcome, "attend"), Some(MSG_REQUIRED));
    }

    #[test]
    fn optional_text_coerces_to_empty_string() {
        let form = FormDefinition::new(
            "",
            "Done",
            vec![WidgetSpec::new("comment", WidgetKind::Text).optional()],
        );
        let outcome = evaluate(&form, Some(&submit(&[]))).unwrap();
        assert!(outcome.valid);
        assert_eq!(
            outcome.coerced_input.get("comment"),
            Some(&CoercedValue::Text(String::new()))
        );
    }

    #[test]
    fn all_invalid_fields_are_reported_at_once() {
        let form = FormDefinition::new(
            "",
            "Done",
            vec![
                WidgetSpec::new("name", WidgetKind::Text),
                WidgetSpec::new("attend", WidgetKind::YesNo),
            ],
        );
        let outcome = evaluate(&form, Some(&submit(&[("attend", "maybe")]))).unwrap();
        assert_eq!(message(&outcome, "name"), Some(MSG_REQUIRED));
        assert_eq!(message(&outcome, "attend"), Some(MSG_INVALID));
        assert!(outcome.coerced_input.is_empty());
    }

    #[test]
    fn raw_values_are_echoed_back() {
        let outcome = evaluate(
            &sample_form(),
            Some(&submit(&[("name", "<b>Ada</b>"), ("subscribe", "maybe")])),
        )
        .unwrap();
        assert_eq!(outcome.widgets[0].value, "<b>Ada</b>");
        assert_eq!(outcome.widgets[1].value, "maybe");
    }

    #[test]
    fn unknown_kind_fails_fast() {
        let form = FormDefinition::new(
            "",
            "Done",
            vec![WidgetSpec::new("when", WidgetKind::Other("date".to_string()))],
        );
        let err = evaluate(&form, Some(&submit(&[("when", "today")]))).unwrap_err();
        assert!(matches!(err, FormError::UnsupportedWidgetKind { .. }));

        // even when the field is empty and would otherwise be "required"
        let err = evaluate(&form, Some(&submit(&[]))).unwrap_err();
        assert!(matches!(err, FormError::UnsupportedWidgetKind { .. }));
    }
}
