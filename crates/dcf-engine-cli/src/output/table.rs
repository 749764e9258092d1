use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

use super::{result_of, scalar_text, sensitivity_of};

/// Forecast columns in display order.
const FORECAST_COLUMNS: [(&str, &str); 10] = [
    ("year", "Year"),
    ("revenue", "Revenue"),
    ("ebit", "EBIT"),
    ("taxes", "Taxes"),
    ("nopat", "NOPAT"),
    ("d_and_a", "D&A"),
    ("capex", "CapEx"),
    ("nwc", "NWC"),
    ("change_in_nwc", "Chg NWC"),
    ("ufcf", "UFCF"),
];

/// Human-readable tables: the sensitivity grid as a WACC x g matrix, a
/// report as summary + forecast + grid, anything else as field/value pairs.
pub fn render_table(value: &Value) -> String {
    let result = result_of(value);
    let mut sections: Vec<String> = Vec::new();

    match result {
        Value::Object(map) if map.contains_key("forecast") => {
            sections.push(field_table(map, |v| !v.is_object() && !v.is_array()));
            if let Some(Value::Object(wacc)) = map.get("wacc") {
                sections.push(format!("WACC\n{}", field_table(wacc, |_| true)));
            }
            if let Some(Value::Array(rows)) = map.get("forecast") {
                sections.push(format!("Forecast\n{}", forecast_table(rows)));
            }
            if let Some(grid) = sensitivity_of(result) {
                sections.push(format!("Sensitivity\n{}", grid_table(grid)));
            }
        }
        Value::Object(_) if sensitivity_of(result).is_some() => {
            sections.push(grid_table(result));
        }
        Value::Object(map) => sections.push(field_table(map, |_| true)),
        other => sections.push(scalar_text(other)),
    }

    if let Some(Value::Array(warnings)) = value.get("warnings") {
        if !warnings.is_empty() {
            let lines: Vec<String> = warnings
                .iter()
                .filter_map(Value::as_str)
                .map(|w| format!("  - {w}"))
                .collect();
            sections.push(format!("Warnings:\n{}", lines.join("\n")));
        }
    }
    if let Some(Value::String(meth)) = value.get("methodology") {
        sections.push(format!("Methodology: {meth}"));
    }

    sections.join("\n\n")
}

fn field_table(map: &Map<String, Value>, keep: impl Fn(&Value) -> bool) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map.iter().filter(|entry| keep(entry.1)) {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    Table::from(builder).to_string()
}

fn forecast_table(rows: &[Value]) -> String {
    let mut builder = Builder::default();
    builder.push_record(FORECAST_COLUMNS.iter().map(|(_, title)| *title));
    for row in rows {
        builder.push_record(
            FORECAST_COLUMNS
                .iter()
                .map(|(key, _)| row.get(*key).map(format_value).unwrap_or_default()),
        );
    }
    Table::from(builder).to_string()
}

/// Rows are WACC steps, columns are terminal growth steps.
fn grid_table(grid: &Value) -> String {
    let mut builder = Builder::default();

    let mut header = vec!["WACC \\ g".to_string()];
    if let Some(Value::Array(steps)) = grid.get("growth_steps") {
        header.extend(steps.iter().map(scalar_text));
    }
    builder.push_record(header);

    if let Some(Value::Array(rows)) = grid.get("rows") {
        for row in rows {
            let mut record = vec![row.get("wacc").map(scalar_text).unwrap_or_default()];
            if let Some(Value::Array(prices)) = row.get("prices") {
                record.extend(prices.iter().map(format_value));
            }
            builder.push_record(record);
        }
    }

    Table::from(builder).to_string()
}

/// Decimal strings are cut to four places for display.
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => shorten_decimal(s),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Null => "-".to_string(),
        other => scalar_text(other),
    }
}

fn shorten_decimal(s: &str) -> String {
    match s.parse::<rust_decimal::Decimal>() {
        Ok(d) if d.scale() > 4 => d.round_dp(4).normalize().to_string(),
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid() -> Value {
        json!({
            "base_wacc": "0.10",
            "base_growth": "0.025",
            "growth_steps": ["0.015", "0.025"],
            "rows": [
                { "wacc": "0.095", "prices": ["2.8320123456", "3.1356"] },
                { "wacc": "0.10", "prices": ["2.6753", "2.9384"] }
            ],
            "base_position": [1, 1]
        })
    }

    #[test]
    fn test_grid_renders_as_matrix() {
        let out = render_table(&json!({ "result": grid(), "warnings": [] }));
        assert!(out.contains("WACC \\ g"));
        assert!(out.contains("0.025"));
        // long decimals are shortened
        assert!(out.contains("2.832"));
        assert!(!out.contains("2.8320123456"));
    }

    #[test]
    fn test_report_has_all_sections() {
        let value = json!({
            "result": {
                "ticker": "ACME",
                "target_price": "2.94",
                "wacc": { "wacc": "0.10" },
                "forecast": [{ "year": 1, "revenue": "127.05", "ufcf": "17.3304" }],
                "sensitivity": grid()
            },
            "warnings": ["No reported debt; cost of debt defaulted to 5.00%"],
            "methodology": "12-month forward FCFF DCF"
        });
        let out = render_table(&value);
        assert!(out.contains("Forecast"));
        assert!(out.contains("Sensitivity"));
        assert!(out.contains("127.05"));
        assert!(out.contains("  - No reported debt"));
        assert!(out.ends_with("Methodology: 12-month forward FCFF DCF"));
    }

    #[test]
    fn test_plain_result_is_field_value() {
        let out = render_table(&json!({ "result": { "ebit_margin": "0.2" } }));
        assert!(out.contains("Field"));
        assert!(out.contains("ebit_margin"));
    }

    #[test]
    fn test_shorten_decimal() {
        assert_eq!(shorten_decimal("0.123456"), "0.1235");
        assert_eq!(shorten_decimal("2.94"), "2.94");
        assert_eq!(shorten_decimal("ACME"), "ACME");
    }
}
