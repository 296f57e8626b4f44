//! Template, Markdown and page rendering.
//!
//! `JinjaRenderer` implements the core's `TemplateRenderer` on top of
//! minijinja with strict undefined handling. One HTML instance (escaping,
//! with the page templates) and one plain-text instance (for mail) are
//! built per form so the timestamp filters see the form's timezone.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use fillform_core::{Fields, MarkupRenderer, RenderError, TemplateRenderer};
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use pulldown_cmark::{html, Options, Parser};
use serde::Serialize;

const BASE_TEMPLATE: &str = include_str!("../templates/base.html");
const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%c";
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

pub struct JinjaRenderer {
    env: Environment<'static>,
}

impl JinjaRenderer {
    /// HTML renderer: auto-escaping on, page templates registered.
    ///
    /// Fails when an embedded page template does not compile.
    pub fn html(timezone: Option<Tz>) -> Result<Self, RenderError> {
        let mut env = base_environment(timezone, AutoEscape::Html);
        env.add_template("base.html", BASE_TEMPLATE)
            .map_err(render_error)?;
        env.add_template("index.html", INDEX_TEMPLATE)
            .map_err(render_error)?;
        Ok(JinjaRenderer { env })
    }

    /// Plain-text renderer for mail subjects and bodies.
    pub fn plain(timezone: Option<Tz>) -> Self {
        JinjaRenderer {
            env: base_environment(timezone, AutoEscape::None),
        }
    }

    /// Render one of the embedded page templates.
    pub fn render_page<S: Serialize>(&self, name: &str, context: S) -> Result<String, RenderError> {
        let template = self.env.get_template(name).map_err(render_error)?;
        template.render(context).map_err(render_error)
    }
}

impl TemplateRenderer for JinjaRenderer {
    fn render(&self, source: &str, bindings: &Fields) -> Result<String, RenderError> {
        self.env.render_str(source, bindings).map_err(render_error)
    }
}

fn base_environment(timezone: Option<Tz>, escape: AutoEscape) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(move |_name| escape.clone());
    env.add_filter(
        "format_timestamp",
        move |ts: f64, format: Option<String>| -> Result<String, minijinja::Error> {
            format_timestamp(
                ts,
                format.as_deref().unwrap_or(DEFAULT_TIMESTAMP_FORMAT),
                timezone,
            )
            .map_err(filter_error)
        },
    );
    env.add_filter(
        "format_date_timestamp",
        |ts: f64, format: Option<String>| -> Result<String, minijinja::Error> {
            format_date_timestamp(ts, format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT))
                .map_err(filter_error)
        },
    );
    env
}

fn render_error(err: minijinja::Error) -> RenderError {
    RenderError::new(format!("{err:#}"))
}

fn filter_error(message: String) -> minijinja::Error {
    minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, message)
}

fn utc_datetime(ts: f64) -> Result<DateTime<Utc>, String> {
    if !ts.is_finite() {
        return Err(format!("timestamp {ts} is not a finite number"));
    }
    let secs = ts.floor();
    let nanos = ((ts - secs) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .ok_or_else(|| format!("timestamp {ts} is out of range"))
}

/// Format seconds since the epoch as a local time in `timezone`, or in the
/// process's local zone when none is configured.
pub fn format_timestamp(ts: f64, format: &str, timezone: Option<Tz>) -> Result<String, String> {
    let utc = utc_datetime(ts)?;
    let mut out = String::new();
    let written = match timezone {
        Some(tz) => write!(out, "{}", utc.with_timezone(&tz).format(format)),
        None => write!(out, "{}", utc.with_timezone(&Local).format(format)),
    };
    written.map_err(|_| format!("invalid timestamp format '{format}'"))?;
    Ok(out)
}

/// Format the UTC calendar date of seconds since the epoch.
pub fn format_date_timestamp(ts: f64, format: &str) -> Result<String, String> {
    let date = utc_datetime(ts)?.date_naive();
    let mut out = String::new();
    write!(out, "{}", date.format(format))
        .map_err(|_| format!("invalid date format '{format}'"))?;
    Ok(out)
}

/// Markdown with tables, footnotes, strikethrough and definition lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl MarkupRenderer for MarkdownRenderer {
    fn to_html(&self, markup: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_FOOTNOTES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_DEFINITION_LIST;
        let mut out = String::with_capacity(markup.len() * 3 / 2);
        html::push_html(&mut out, Parser::new_ext(markup, options));
        out
    }
}
