//! Form definitions, loaded once and shared read-only across requests.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::FormError;
use crate::predicate;
use crate::widget::WidgetSpec;

/// Post-submission notification settings.
///
/// Mail is only sent when both `from` and `to` are set; the remaining
/// fields are then required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NotificationSpec {
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject_template: Option<String>,
    pub body_template: Option<String>,
    /// Predicate gating the notification; absent means always send.
    pub predicate: Option<String>,
}

impl NotificationSpec {
    pub fn is_deliverable(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Markdown template rendered above the widgets.
    pub header_template: String,
    /// Column marking the record as answered. Null means open.
    pub response_time_column: String,
    pub widgets: Vec<WidgetSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<NotificationSpec>,
    /// IANA zone name used when formatting timestamps in templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl FormDefinition {
    pub fn new(header_template: &str, response_time_column: &str, widgets: Vec<WidgetSpec>) -> Self {
        FormDefinition {
            header_template: header_template.to_string(),
            response_time_column: response_time_column.to_string(),
            widgets,
            notification: None,
            timezone: None,
        }
    }

    pub fn with_notification(mut self, notification: NotificationSpec) -> Self {
        self.notification = Some(notification);
        self
    }

    /// The notification block, if mail would actually be sent.
    pub fn deliverable_notification(&self) -> Option<&NotificationSpec> {
        self.notification.as_ref().filter(|n| n.is_deliverable())
    }

    /// Check the definition's invariants.
    ///
    /// Run once at load time; every request afterwards assumes a valid
    /// definition.
    pub fn validate(&self) -> Result<(), FormError> {
        if self.response_time_column.is_empty() {
            return Err(FormError::InvalidDefinition(
                "response time column must not be empty".to_string(),
            ));
        }
        if self.widgets.is_empty() {
            return Err(FormError::InvalidDefinition(
                "a form needs at least one widget".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for widget in &self.widgets {
            if widget.column.is_empty() {
                return Err(FormError::InvalidDefinition(
                    "widget column must not be empty".to_string(),
                ));
            }
            if !seen.insert(widget.column.as_str()) {
                return Err(FormError::InvalidDefinition(format!(
                    "column '{}' is bound by more than one widget",
                    widget.column
                )));
            }
            if !widget.kind.is_known() {
                return Err(FormError::UnsupportedWidgetKind {
                    column: widget.column.clone(),
                    kind: widget.kind.to_string(),
                });
            }
            if widget.column == self.response_time_column {
                return Err(FormError::InvalidDefinition(format!(
                    "widget column '{}' is the response time column",
                    widget.column
                )));
            }
        }

        if let Some(notification) = &self.notification {
            if let Some(source) = &notification.predicate {
                predicate::parse(source)?;
            }
            if notification.is_deliverable() {
                if notification.subject_template.is_none() {
                    return Err(FormError::InvalidDefinition(
                        "notification subject is required when from and to are set".to_string(),
                    ));
                }
                if notification.body_template.is_none() {
                    return Err(FormError::InvalidDefinition(
                        "notification body is required when from and to are set".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}
