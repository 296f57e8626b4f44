//! fillform-core: form submission engine.
//!
//! Renders a form against a backing record, validates submitted values
//! with per-kind coercion, enforces that a record is answered at most once,
//! and decides whether a notification goes out afterwards.
//!
//! # Public API
//!
//! - [`submission::display()`] / [`submission::submit()`] / [`submission::complete()`]
//!   -- the request-level entry points
//! - [`validate::evaluate()`] -- the validation engine
//! - [`predicate::evaluate()`] -- the notification predicate language
//! - [`notify::dispatch()`] -- the notification dispatcher
//! - [`FormDefinition`], [`WidgetSpec`], [`Widget`] -- the data model
//! - [`TemplateRenderer`], [`MarkupRenderer`], [`MailTransport`], [`Clock`]
//!   -- collaborator seams implemented by the host
//!
//! The crate performs no I/O of its own.

pub mod clock;
pub mod error;
pub mod form;
pub mod notify;
pub mod predicate;
pub mod render;
pub mod submission;
pub mod validate;
pub mod widget;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::FormError;
pub use fillform_storage::{ColumnUpdates, Fields, RecordId, RecordSnapshot};
pub use form::{FormDefinition, NotificationSpec};
pub use notify::{DispatchStatus, MailTransport, OutgoingMail, TransportError};
pub use predicate::PredicateError;
pub use render::{MarkupRenderer, RenderError, TemplateRenderer};
pub use submission::{AcceptedSubmission, DisplayOutcome, SubmitDecision};
pub use validate::{CoercedInput, CoercedValue, SubmissionOutcome, SubmittedValues};
pub use widget::{Widget, WidgetKind, WidgetSpec};
