//! Submission controller.
//!
//! Sequences the once-only check, validation, column updates and the
//! notification for one form request. Storage is the caller's job: the
//! controller computes what to write and the caller applies it with a
//! conditional update guarded on the response time column, then calls
//! [`complete`].

use fillform_storage::{ColumnUpdates, RecordId, RecordSnapshot};

use crate::clock::Clock;
use crate::error::FormError;
use crate::form::FormDefinition;
use crate::notify::{self, DispatchStatus, MailTransport};
use crate::render::TemplateRenderer;
use crate::validate::{self, SubmittedValues};
use crate::widget::Widget;
use crate::Fields;

pub const MSG_PREVIOUSLY_RECORDED: &str = "Your response has previously been recorded.";
pub const MSG_PREVIOUSLY_SUBMITTED: &str =
    "Your response has previously been submitted. The present response has not been recorded.";
pub const MSG_THANK_YOU: &str = "Thank you for submitting your response.";

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayOutcome {
    /// The record already carries a response time.
    AlreadyAnswered,
    Form {
        widgets: Vec<Widget>,
        was_validated: bool,
    },
}

impl DisplayOutcome {
    pub fn message(&self) -> Option<&'static str> {
        match self {
            DisplayOutcome::AlreadyAnswered => Some(MSG_PREVIOUSLY_RECORDED),
            DisplayOutcome::Form { .. } => None,
        }
    }
}

/// Everything the caller needs to persist and announce a valid response.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedSubmission {
    pub record_id: RecordId,
    /// Response time plus every coerced input column.
    pub column_updates: ColumnUpdates,
    /// Record fields overlaid with the input; present only when a
    /// notification would be delivered.
    pub notification_data: Option<Fields>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitDecision {
    AlreadyAnswered,
    Rejected {
        widgets: Vec<Widget>,
        was_validated: bool,
    },
    Accepted(AcceptedSubmission),
}

impl SubmitDecision {
    /// HTTP status of the page rendered for this decision.
    pub fn status_code(&self) -> u16 {
        match self {
            SubmitDecision::Rejected { .. } => 400,
            _ => 200,
        }
    }

    pub fn message(&self) -> Option<&'static str> {
        match self {
            SubmitDecision::AlreadyAnswered => Some(MSG_PREVIOUSLY_SUBMITTED),
            SubmitDecision::Accepted(_) => Some(MSG_THANK_YOU),
            SubmitDecision::Rejected { .. } => None,
        }
    }
}

/// True when the response time column holds a non-null value.
///
/// A record without that column at all means the form points at the wrong
/// column, which is an error rather than an open record.
pub fn is_answered(form: &FormDefinition, record: &RecordSnapshot) -> Result<bool, FormError> {
    let column = &form.response_time_column;
    if !record.fields.contains_key(column) {
        return Err(FormError::MissingResponseColumn {
            column: column.clone(),
        });
    }
    Ok(record.is_set(column))
}

/// Decide what a GET request shows.
pub fn display(
    form: &FormDefinition,
    record: &RecordSnapshot,
) -> Result<DisplayOutcome, FormError> {
    if is_answered(form, record)? {
        return Ok(DisplayOutcome::AlreadyAnswered);
    }
    let outcome = validate::evaluate(form, None)?;
    Ok(DisplayOutcome::Form {
        widgets: outcome.widgets,
        was_validated: false,
    })
}

/// Decide the fate of a POST request.
pub fn submit(
    form: &FormDefinition,
    record: &RecordSnapshot,
    submitted: &SubmittedValues,
    clock: &dyn Clock,
) -> Result<SubmitDecision, FormError> {
    if is_answered(form, record)? {
        return Ok(SubmitDecision::AlreadyAnswered);
    }

    let outcome = validate::evaluate(form, Some(submitted))?;
    if !outcome.valid {
        return Ok(SubmitDecision::Rejected {
            widgets: outcome.widgets,
            was_validated: true,
        });
    }

    let mut column_updates = ColumnUpdates::new();
    column_updates.insert(
        form.response_time_column.clone(),
        serde_json::Value::from(clock.now()),
    );
    for (column, value) in outcome.coerced_input {
        column_updates.insert(column, value.into());
    }

    let notification_data = form.deliverable_notification().map(|_| {
        let mut merged = record.fields.clone();
        for (column, value) in &column_updates {
            if *column != form.response_time_column {
                merged.insert(column.clone(), value.clone());
            }
        }
        merged
    });

    Ok(SubmitDecision::Accepted(AcceptedSubmission {
        record_id: record.id,
        column_updates,
        notification_data,
    }))
}

/// Send the notification for a submission the caller has persisted.
pub fn complete(
    form: &FormDefinition,
    accepted: &AcceptedSubmission,
    renderer: &dyn TemplateRenderer,
    transport: &dyn MailTransport,
) -> Result<DispatchStatus, FormError> {
    match (form.deliverable_notification(), &accepted.notification_data) {
        (Some(notification), Some(merged)) => {
            notify::dispatch(notification, merged, renderer, transport)
        }
        _ => Ok(DispatchStatus::Skipped),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::form::NotificationSpec;
    use crate::notify::tests::{PlaceholderRenderer, RecordingTransport};
    use crate::validate::MSG_REQUIRED;
    use crate::widget::{WidgetKind, WidgetSpec};
    use serde_json::json;

    const NOW: f64 = 1_700_000_000.25;

    fn form() -> FormDefinition {
        FormDefinition::new(
            "Hello {{ name }}",
            "Responded_At",
            vec![
                WidgetSpec::new("name", WidgetKind::Text),
                WidgetSpec::new("subscribe", WidgetKind::YesNo).optional(),
            ],
        )
    }

    fn notifying_form(predicate: Option<&str>) -> FormDefinition {
        form().with_notification(NotificationSpec {
            from: Some("forms@example.org".to_string()),
            to: Some("team@example.org".to_string()),
            subject_template: Some("{{ name }} responded".to_string()),
            body_template: Some("{{ name }} from {{ team }}".to_string()),
            predicate: predicate.map(str::to_string),
        })
    }

    fn record(answered: Option<serde_json::Value>) -> RecordSnapshot {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!("Old name"));
        fields.insert("team".to_string(), json!("Blue"));
        fields.insert("Responded_At".to_string(), answered.unwrap_or(json!(null)));
        RecordSnapshot::new(RecordId(7), fields)
    }

    fn submitted(pairs: &[(&str, &str)]) -> SubmittedValues {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn accept(decision: SubmitDecision) -> AcceptedSubmission {
        match decision {
            SubmitDecision::Accepted(accepted) => accepted,
            other => panic!("expected Accepted, got {other:?}"),
        }
    }

    #[test]
    fn display_open_record_shows_blank_form() {
        let outcome = display(&form(), &record(None)).unwrap();
        match outcome {
            DisplayOutcome::Form {
                widgets,
                was_validated,
            } => {
                assert!(!was_validated);
                assert_eq!(widgets.len(), 2);
                assert!(widgets.iter().all(|w| w.value.is_empty()));
            }
            other => panic!("expected Form, got {other:?}"),
        }
    }

    #[test]
    fn display_answered_record() {
        let outcome = display(&form(), &record(Some(json!(1_600_000_000.0)))).unwrap();
        assert_eq!(outcome, DisplayOutcome::AlreadyAnswered);
        assert_eq!(outcome.message(), Some(MSG_PREVIOUSLY_RECORDED));
    }

    #[test]
    fn missing_response_column_is_an_error() {
        let mut rec = record(Some(json!(1.0)));
        rec.fields.remove("Responded_At");
        rec.fields.insert("Responded_At_typo".to_string(), json!(1.0));

        let err = display(&form(), &rec).unwrap_err();
        assert!(
            matches!(&err, FormError::MissingResponseColumn { column } if column == "Responded_At"),
            "{err:?}"
        );
        let err = submit(&form(), &rec, &submitted(&[("name", "Ada")]), &FixedClock(NOW))
            .unwrap_err();
        assert!(matches!(err, FormError::MissingResponseColumn { .. }));
    }

    #[test]
    fn null_response_column_is_open() {
        assert!(!is_answered(&form(), &record(None)).unwrap());
        assert!(is_answered(&form(), &record(Some(json!(0)))).unwrap());
    }

    #[test]
    fn submit_on_answered_record_records_nothing() {
        let decision = submit(
            &form(),
            &record(Some(json!(1.0))),
            &submitted(&[("name", "Ada")]),
            &FixedClock(NOW),
        )
        .unwrap();
        assert_eq!(decision, SubmitDecision::AlreadyAnswered);
        assert_eq!(decision.message(), Some(MSG_PREVIOUSLY_SUBMITTED));
        assert_eq!(decision.status_code(), 200);
    }

    #[test]
    fn invalid_submission_is_rejected_with_400() {
        let decision = submit(
            &form(),
            &record(None),
            &submitted(&[("name", ""), ("subscribe", "1")]),
            &FixedClock(NOW),
        )
        .unwrap();
        assert_eq!(decision.status_code(), 400);
        match decision {
            SubmitDecision::Rejected {
                widgets,
                was_validated,
            } => {
                assert!(was_validated);
                assert_eq!(widgets[0].validation_message.as_deref(), Some(MSG_REQUIRED));
                assert_eq!(widgets[1].value, "1");
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
    }

    #[test]
    fn valid_submission_writes_time_and_input() {
        let accepted = accept(
            submit(
                &form(),
                &record(None),
                &submitted(&[("name", "Ada"), ("subscribe", "0")]),
                &FixedClock(NOW),
            )
            .unwrap(),
        );
        assert_eq!(accepted.record_id, RecordId(7));
        let mut expected = ColumnUpdates::new();
        expected.insert("Responded_At".to_string(), json!(NOW));
        expected.insert("name".to_string(), json!("Ada"));
        expected.insert("subscribe".to_string(), json!(false));
        assert_eq!(accepted.column_updates, expected);
        assert!(accepted.notification_data.is_none());
    }

    #[test]
    fn notification_data_merges_input_over_record() {
        let accepted = accept(
            submit(
                &notifying_form(None),
                &record(None),
                &submitted(&[("name", "Ada")]),
                &FixedClock(NOW),
            )
            .unwrap(),
        );
        let merged = accepted.notification_data.expect("deliverable");
        assert_eq!(merged["name"], json!("Ada"));
        assert_eq!(merged["team"], json!("Blue"));
        assert!(!merged.contains_key("subscribe"));
    }

    #[test]
    fn complete_sends_after_acceptance() {
        let form = notifying_form(None);
        let accepted = accept(
            submit(
                &form,
                &record(None),
                &submitted(&[("name", "Ada")]),
                &FixedClock(NOW),
            )
            .unwrap(),
        );
        let transport = RecordingTransport::default();
        let status = complete(&form, &accepted, &PlaceholderRenderer, &transport).unwrap();
        assert_eq!(status, DispatchStatus::Sent);
        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent[0].subject, "Ada responded");
        assert_eq!(sent[0].body, "Ada from Blue");
    }

    #[test]
    fn complete_respects_predicate() {
        let form = notifying_form(Some("subscribe"));
        let accepted = accept(
            submit(
                &form,
                &record(None),
                &submitted(&[("name", "Ada"), ("subscribe", "0")]),
                &FixedClock(NOW),
            )
            .unwrap(),
        );
        let transport = RecordingTransport::default();
        let status = complete(&form, &accepted, &PlaceholderRenderer, &transport).unwrap();
        assert_eq!(status, DispatchStatus::Skipped);
        assert!(transport.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn complete_without_notification_is_skipped() {
        let accepted = accept(
            submit(
                &form(),
                &record(None),
                &submitted(&[("name", "Ada")]),
                &FixedClock(NOW),
            )
            .unwrap(),
        );
        let transport = RecordingTransport::default();
        let status = complete(&form(), &accepted, &PlaceholderRenderer, &transport).unwrap();
        assert_eq!(status, DispatchStatus::Skipped);
    }
}
