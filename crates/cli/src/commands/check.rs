use std::path::Path;
use std::process;

use fillform_cli::config::{AppConfig, FormConfig};

use crate::{report_error, OutputFormat};

pub(crate) fn cmd_check(config_path: &Path, output: OutputFormat, quiet: bool) {
    let config = match AppConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            report_error(&format!("configuration error: {e}"), output, quiet);
            process::exit(1);
        }
    };

    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summarize(&config))
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => print!("{}", format_text(&config)),
    }
}

fn summarize_form(form: &FormConfig) -> serde_json::Value {
    let def = &form.definition;
    serde_json::json!({
        "table": form.table,
        "key_column": form.key_column,
        "response_time_column": def.response_time_column,
        "timezone": def.timezone,
        "widgets": def.widgets,
        "notification": def.notification,
    })
}

pub(crate) fn summarize(config: &AppConfig) -> serde_json::Value {
    let forms: serde_json::Map<String, serde_json::Value> = config
        .forms
        .iter()
        .map(|(name, form)| (name.clone(), summarize_form(form)))
        .collect();
    serde_json::json!({
        "smtp": { "host": config.smtp.host, "port": config.smtp.port },
        "forms": forms,
    })
}

pub(crate) fn format_text(config: &AppConfig) -> String {
    let mut out = format!("Configuration OK: {} form(s)\n", config.forms.len());
    for (name, form) in &config.forms {
        let def = &form.definition;
        out.push_str(&format!(
            "\n  {name}: table {}, key {}, response time {}, timezone {}\n",
            form.table,
            form.key_column,
            def.response_time_column,
            def.timezone.as_deref().unwrap_or("(local)"),
        ));
        for widget in &def.widgets {
            let optional = if widget.optional { ", optional" } else { "" };
            out.push_str(&format!(
                "    - {} [{}{}] \"{}\"\n",
                widget.column,
                widget.kind,
                optional,
                widget.display_label()
            ));
        }
        match def.deliverable_notification() {
            Some(n) => {
                let from = n.from.as_deref().unwrap_or_default();
                let to = n.to.as_deref().unwrap_or_default();
                out.push_str(&format!("    notify: {from} -> {to}"));
                if let Some(predicate) = &n.predicate {
                    out.push_str(&format!(" (if: {})", predicate.trim()));
                }
                out.push('\n');
            }
            None => out.push_str("    notify: off\n"),
        }
    }
    out
}
