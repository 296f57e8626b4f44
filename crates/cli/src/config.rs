//! YAML configuration.
//!
//! One file describes the SMTP relay and every form the server answers
//! for. The whole file is checked at load time so a running server never
//! meets a malformed form definition.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono_tz::Tz;
use fillform_core::{FormDefinition, FormError, NotificationSpec, WidgetKind, WidgetSpec};
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "GRIST_FILLFORM_CONFIG";

pub const DEFAULT_SMTP_HOST: &str = "localhost";
pub const DEFAULT_SMTP_PORT: u16 = 25;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed config file {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("form '{form}': {source}")]
    Form { form: String, source: FormError },

    #[error("form '{form}': unknown timezone '{timezone}'")]
    Timezone { form: String, timezone: String },

    #[error("form '{form}': cannot read API key file {path}: {source}")]
    ApiKey {
        form: String,
        path: PathBuf,
        source: std::io::Error,
    },
}

// ── File format ──────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    smtp_host: Option<String>,
    #[serde(default)]
    smtp_port: Option<u16>,
    forms: BTreeMap<String, RawForm>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawForm {
    grist_root_url: String,
    grist_api_key_file: PathBuf,
    grist_doc_id: String,
    table: String,
    key_column: String,
    response_time_column: String,
    #[serde(default)]
    timezone: Option<String>,
    header_markdown: String,
    #[serde(default)]
    notify_from: Option<String>,
    #[serde(default)]
    notify_to: Option<String>,
    #[serde(default)]
    notify_if: Option<String>,
    #[serde(default)]
    notify_subject: Option<String>,
    #[serde(default)]
    notify_email: Option<String>,
    widgets: Vec<RawWidget>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWidget {
    column: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    optional: bool,
}

// ── Loaded configuration ─────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        SmtpSettings {
            host: DEFAULT_SMTP_HOST.to_string(),
            port: DEFAULT_SMTP_PORT,
        }
    }
}

/// Where a form's records live.
#[derive(Clone)]
pub struct GristSettings {
    pub root_url: String,
    pub api_key: String,
    pub doc_id: String,
}

impl std::fmt::Debug for GristSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GristSettings")
            .field("root_url", &self.root_url)
            .field("api_key", &"<redacted>")
            .field("doc_id", &self.doc_id)
            .finish()
    }
}

/// One validated form.
#[derive(Debug, Clone)]
pub struct FormConfig {
    pub name: String,
    pub table: String,
    pub key_column: String,
    pub timezone: Option<Tz>,
    pub definition: FormDefinition,
    pub grist: GristSettings,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub smtp: SmtpSettings,
    pub forms: BTreeMap<String, Arc<FormConfig>>,
}

impl AppConfig {
    /// Read, parse and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text, path)?;
        tracing::info!(path = %path.display(), forms = config.forms.len(), "configuration loaded");
        Ok(config)
    }

    /// Parse `text`. `origin` is only used in error messages and to
    /// resolve relative API key paths.
    pub fn from_yaml(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
            path: origin.to_path_buf(),
            source,
        })?;

        let base_dir = origin.parent().unwrap_or_else(|| Path::new("."));
        let mut forms = BTreeMap::new();
        for (name, form) in raw.forms {
            let loaded = load_form(&name, form, base_dir)?;
            forms.insert(name, Arc::new(loaded));
        }

        let defaults = SmtpSettings::default();
        Ok(AppConfig {
            smtp: SmtpSettings {
                host: raw.smtp_host.unwrap_or(defaults.host),
                port: raw.smtp_port.unwrap_or(defaults.port),
            },
            forms,
        })
    }
}

fn load_form(name: &str, raw: RawForm, base_dir: &Path) -> Result<FormConfig, ConfigError> {
    let timezone = match &raw.timezone {
        Some(tz) => Some(tz.parse::<Tz>().map_err(|_| ConfigError::Timezone {
            form: name.to_string(),
            timezone: tz.clone(),
        })?),
        None => {
            tracing::warn!(form = %name, "'timezone' not specified, timestamps will be local");
            None
        }
    };

    let widgets = raw
        .widgets
        .into_iter()
        .map(|w| WidgetSpec {
            column: w.column,
            kind: WidgetKind::from(w.kind),
            label: w.label,
            optional: w.optional,
        })
        .collect();

    let mut definition =
        FormDefinition::new(&raw.header_markdown, &raw.response_time_column, widgets);
    definition.timezone = raw.timezone;
    let has_notification = raw.notify_from.is_some()
        || raw.notify_to.is_some()
        || raw.notify_if.is_some()
        || raw.notify_subject.is_some()
        || raw.notify_email.is_some();
    if has_notification {
        definition = definition.with_notification(NotificationSpec {
            from: raw.notify_from,
            to: raw.notify_to,
            subject_template: raw.notify_subject,
            body_template: raw.notify_email,
            predicate: raw.notify_if,
        });
    }
    definition.validate().map_err(|source| ConfigError::Form {
        form: name.to_string(),
        source,
    })?;

    let key_path = if raw.grist_api_key_file.is_absolute() {
        raw.grist_api_key_file
    } else {
        base_dir.join(raw.grist_api_key_file)
    };
    let api_key = std::fs::read_to_string(&key_path)
        .map_err(|source| ConfigError::ApiKey {
            form: name.to_string(),
            path: key_path.clone(),
            source,
        })?
        .trim()
        .to_string();

    Ok(FormConfig {
        name: name.to_string(),
        table: raw.table,
        key_column: raw.key_column,
        timezone,
        definition,
        grist: GristSettings {
            root_url: raw.grist_root_url,
            api_key,
            doc_id: raw.grist_doc_id,
        },
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
