use crate::notify::TransportError;
use crate::predicate::PredicateError;
use crate::render::RenderError;

/// Fatal errors raised while handling a form request.
///
/// Per-field validation failures are not errors; they are reported through
/// `SubmissionOutcome`. Everything here aborts the current request.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// A widget kind the validation engine does not know how to coerce.
    #[error("widget '{column}' has unsupported kind '{kind}'")]
    UnsupportedWidgetKind { column: String, kind: String },

    /// The form definition violates one of its invariants.
    #[error("invalid form definition: {0}")]
    InvalidDefinition(String),

    /// The record has no column with the configured response time name.
    #[error("record has no column '{column}' to hold the response time")]
    MissingResponseColumn { column: String },

    /// The notification predicate failed to parse or evaluate.
    #[error("notification predicate failed: {0}")]
    Predicate(#[from] PredicateError),

    /// A template referenced an undefined value or failed to render.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// The mail transport refused or failed to deliver a message.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
