use std::path::Path;
use std::process;

use fillform_core::{predicate, Fields};

use crate::{report_error, OutputFormat};

/// Evaluate `expr` against the JSON object in `data_path`.
pub(crate) fn evaluate_file(
    expr: &str,
    data_path: &Path,
) -> Result<(serde_json::Value, bool), String> {
    let text = std::fs::read_to_string(data_path)
        .map_err(|e| format!("error reading file '{}': {}", data_path.display(), e))?;
    let bindings: Fields = serde_json::from_str(&text).map_err(|e| {
        format!(
            "'{}' must contain a JSON object: {}",
            data_path.display(),
            e
        )
    })?;
    let value = predicate::evaluate(expr, &bindings).map_err(|e| e.to_string())?;
    let truthy = predicate::is_truthy(&value);
    Ok((value, truthy))
}

pub(crate) fn cmd_predicate(expr: &str, data_path: &Path, output: OutputFormat, quiet: bool) {
    let (value, truthy) = match evaluate_file(expr, data_path) {
        Ok(result) => result,
        Err(msg) => {
            report_error(&msg, output, quiet);
            process::exit(1);
        }
    };
    if quiet {
        return;
    }
    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "value": value, "truthy": truthy }));
        }
        OutputFormat::Text => {
            println!("value:  {}", value);
            println!("truthy: {}", truthy);
        }
    }
}
