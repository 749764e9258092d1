use serde_json::Value;

use super::{result_of, scalar_text, sensitivity_of};

/// Headline figures, most specific first.
const PRIORITY_KEYS: [&str; 4] = ["target_price", "price", "wacc", "ebit_margin"];

/// Just the key answer: the target price for a report or what-if, the WACC
/// for a WACC breakdown, the centre cell for a sensitivity grid.
pub fn render_minimal(value: &Value) -> String {
    let result = result_of(value);

    if let Value::Object(map) = result {
        if let Some(val) = PRIORITY_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .find(|val| !val.is_null())
        {
            return scalar_text(val);
        }
        if let Some(price) = sensitivity_of(result).and_then(centre_price) {
            return price;
        }
        if let Some((key, val)) = map.iter().next() {
            return format!("{}: {}", key, scalar_text(val));
        }
    }

    scalar_text(result)
}

fn centre_price(grid: &Value) -> Option<String> {
    let position = grid.get("base_position")?.as_array()?;
    let row = position.first()?.as_u64()? as usize;
    let col = position.get(1)?.as_u64()? as usize;
    let price = grid.get("rows")?.get(row)?.get("prices")?.get(col)?;
    Some(scalar_text(price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_prints_target_price() {
        let value = json!({ "result": { "ticker": "ACME", "target_price": "2.94", "wacc": {} } });
        assert_eq!(render_minimal(&value), "2.94");
    }

    #[test]
    fn test_wacc_breakdown_prints_wacc() {
        let value = json!({ "result": { "cost_of_equity": "0.1", "wacc": "0.0877" } });
        assert_eq!(render_minimal(&value), "0.0877");
    }

    #[test]
    fn test_grid_prints_centre_cell() {
        let value = json!({ "result": {
            "base_wacc": "0.10",
            "growth_steps": ["0.015", "0.025"],
            "rows": [
                { "wacc": "0.10", "prices": ["2.67", "2.93"] },
                { "wacc": "0.11", "prices": ["2.41", "2.61"] }
            ],
            "base_position": [0, 1]
        }});
        assert_eq!(render_minimal(&value), "2.93");
    }

    #[test]
    fn test_fallback_to_first_field() {
        let value = json!({ "result": { "anchor_nwc": "10" } });
        assert_eq!(render_minimal(&value), "anchor_nwc: 10");
    }
}
