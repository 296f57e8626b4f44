//! Widget model: one form field bound to a record column.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Value type discriminator of a widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WidgetKind {
    /// Free text, stored as a string.
    Text,
    /// Two-way choice submitted as `"0"`/`"1"`, stored as a boolean.
    YesNo,
    /// Anything else. Only reachable through a malformed definition; the
    /// validation engine refuses it.
    Other(String),
}

impl WidgetKind {
    pub fn as_str(&self) -> &str {
        match self {
            WidgetKind::Text => "text",
            WidgetKind::YesNo => "yesno",
            WidgetKind::Other(s) => s,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, WidgetKind::Other(_))
    }
}

impl From<String> for WidgetKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "text" => WidgetKind::Text,
            "yesno" => WidgetKind::YesNo,
            _ => WidgetKind::Other(s),
        }
    }
}

impl From<WidgetKind> for String {
    fn from(kind: WidgetKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declaration of one widget in a form definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetSpec {
    pub column: String,
    pub kind: WidgetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub optional: bool,
}

impl WidgetSpec {
    pub fn new(column: &str, kind: WidgetKind) -> Self {
        WidgetSpec {
            column: column.to_string(),
            kind,
            label: None,
            optional: false,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// The configured label, or the column name with `_` turned into spaces.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(label) => label.clone(),
            None => self.column.replace('_', " "),
        }
    }
}

/// Render state of one widget for a single page render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Widget {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    pub value: String,
    pub validation_message: Option<String>,
}

impl Widget {
    pub fn is_valid(&self) -> bool {
        self.validation_message.is_none()
    }
}
