//! Template and markup rendering seams.
//!
//! The core never renders anything itself; it is handed implementations of
//! these traits by the host.

use crate::Fields;

/// A template failed to compile or referenced an undefined value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("template rendering failed: {message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        RenderError {
            message: message.into(),
        }
    }
}

/// Renders template source against a field mapping.
///
/// Implementations must treat undefined names as errors.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, source: &str, bindings: &Fields) -> Result<String, RenderError>;
}

/// Converts lightweight markup (Markdown) to HTML.
pub trait MarkupRenderer: Send + Sync {
    fn to_html(&self, markup: &str) -> String;
}
