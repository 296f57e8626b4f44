//! Application state shared across request handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use fillform_core::{Clock, MailTransport, RenderError, SystemClock};
use fillform_storage::{GristStore, RecordStore};

use crate::config::{AppConfig, FormConfig};
use crate::mail::SmtpMailer;
use crate::render::{JinjaRenderer, MarkdownRenderer};

/// A configured form with its store and renderers.
pub struct FormEntry {
    pub config: Arc<FormConfig>,
    pub store: Arc<dyn RecordStore>,
    /// Escaping renderer for the header and the form page.
    pub html: JinjaRenderer,
    /// Non-escaping renderer for notification mail.
    pub plain: Arc<JinjaRenderer>,
}

impl FormEntry {
    pub fn new(config: Arc<FormConfig>, store: Arc<dyn RecordStore>) -> Result<Self, RenderError> {
        let timezone = config.timezone;
        Ok(FormEntry {
            config,
            store,
            html: JinjaRenderer::html(timezone)?,
            plain: Arc::new(JinjaRenderer::plain(timezone)),
        })
    }
}

pub struct AppState {
    pub forms: BTreeMap<String, FormEntry>,
    /// Renders message pages that belong to no particular form.
    pub pages: JinjaRenderer,
    pub markdown: MarkdownRenderer,
    pub mailer: Arc<dyn MailTransport>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Fails when the embedded page templates do not compile.
    pub fn new(mailer: Arc<dyn MailTransport>, clock: Arc<dyn Clock>) -> Result<Self, RenderError> {
        Ok(AppState {
            forms: BTreeMap::new(),
            pages: JinjaRenderer::html(None)?,
            markdown: MarkdownRenderer,
            mailer,
            clock,
        })
    }

    pub fn with_form(
        mut self,
        config: Arc<FormConfig>,
        store: Arc<dyn RecordStore>,
    ) -> Result<Self, RenderError> {
        let entry = FormEntry::new(config, store)?;
        self.forms.insert(entry.config.name.clone(), entry);
        Ok(self)
    }

    /// Production wiring: one Grist client per form, SMTP mail, wall clock.
    pub fn from_config(config: &AppConfig) -> Result<Self, RenderError> {
        let mut state = AppState::new(
            Arc::new(SmtpMailer::new(&config.smtp)),
            Arc::new(SystemClock),
        )?;
        for form in config.forms.values() {
            let store = GristStore::new(
                &form.grist.root_url,
                &form.grist.api_key,
                &form.grist.doc_id,
            );
            state = state.with_form(Arc::clone(form), Arc::new(store))?;
        }
        Ok(state)
    }
}
