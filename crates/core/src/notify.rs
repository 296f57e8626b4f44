//! Notification dispatcher.
//!
//! After a submission has been recorded, decides whether a mail goes out
//! and renders its subject and body from the merged record and input.

use serde::Serialize;

use crate::error::FormError;
use crate::form::NotificationSpec;
use crate::predicate;
use crate::render::TemplateRenderer;
use crate::Fields;

/// A fully rendered message ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// The mail transport refused or failed to deliver a message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("mail transport failed: {message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        TransportError {
            message: message.into(),
        }
    }
}

/// Synchronous mail delivery. Hosts running on an async runtime are
/// expected to call this off the reactor.
pub trait MailTransport: Send + Sync {
    fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Sent,
    /// The predicate evaluated falsy, or no notification is configured.
    Skipped,
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn normalize_subject(subject: &str) -> String {
    subject.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run the notification for one accepted submission.
///
/// `merged` is the record's fields overlaid with the coerced input. The
/// caller only invokes this for a deliverable notification; a
/// non-deliverable one is reported as skipped.
pub fn dispatch(
    notification: &NotificationSpec,
    merged: &Fields,
    renderer: &dyn TemplateRenderer,
    transport: &dyn MailTransport,
) -> Result<DispatchStatus, FormError> {
    let (Some(from), Some(to)) = (&notification.from, &notification.to) else {
        return Ok(DispatchStatus::Skipped);
    };

    if let Some(source) = &notification.predicate {
        let verdict = predicate::evaluate(source, merged)?;
        if !predicate::is_truthy(&verdict) {
            tracing::debug!(to = %to, "notification predicate is falsy, not sending");
            return Ok(DispatchStatus::Skipped);
        }
    }

    let body_template = notification.body_template.as_deref().ok_or_else(|| {
        FormError::InvalidDefinition("notification body template is missing".to_string())
    })?;
    let subject_template = notification.subject_template.as_deref().ok_or_else(|| {
        FormError::InvalidDefinition("notification subject template is missing".to_string())
    })?;

    let body = renderer.render(body_template, merged)?;
    let subject = normalize_subject(&renderer.render(subject_template, merged)?);

    let mail = OutgoingMail {
        from: from.clone(),
        to: to.clone(),
        subject,
        body,
    };
    transport.send(&mail)?;
    tracing::info!(to = %mail.to, subject = %mail.subject, "notification sent");
    Ok(DispatchStatus::Sent)
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
