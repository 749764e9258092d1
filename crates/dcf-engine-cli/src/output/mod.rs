pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Render `value` in the requested format and write it to stdout.
pub fn format_output(format: &OutputFormat, value: &Value) {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        OutputFormat::Table => Ok(table::render_table(value)),
        OutputFormat::Csv => csv_out::render_csv(value).map_err(|e| e.to_string()),
        OutputFormat::Minimal => Ok(minimal::render_minimal(value)),
    };
    match rendered {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => eprintln!("output error: {e}"),
    }
}

/// The `result` field of an output envelope, or the value itself.
pub(crate) fn result_of(value: &Value) -> &Value {
    value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value)
}

/// Sensitivity grid found either as the result itself or inside a report.
pub(crate) fn sensitivity_of(result: &Value) -> Option<&Value> {
    if result.get("growth_steps").is_some() && result.get("rows").is_some() {
        return Some(result);
    }
    result.get("sensitivity").filter(|s| !s.is_null())
}

pub(crate) fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
