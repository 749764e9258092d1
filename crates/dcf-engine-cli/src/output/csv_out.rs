use serde_json::Value;

use super::{result_of, scalar_text, sensitivity_of};

/// CSV rendering. A sensitivity grid becomes one row per WACC step with a
/// column per growth step; a report becomes its forecast rows; anything else
/// becomes `field,value` pairs.
pub fn render_csv(value: &Value) -> Result<String, Box<dyn std::error::Error>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    let result = result_of(value);

    if let Some(Value::Array(rows)) = result.get("forecast") {
        write_rows(&mut wtr, rows)?;
    } else if let Some(grid) = sensitivity_of(result) {
        write_grid(&mut wtr, grid)?;
    } else if let Value::Object(map) = result {
        wtr.write_record(["field", "value"])?;
        for (key, val) in map {
            wtr.write_record([key.as_str(), &scalar_text(val)])?;
        }
    } else {
        wtr.write_record([scalar_text(result)])?;
    }

    let bytes = wtr.into_inner().map_err(|e| e.to_string())?;
    Ok(String::from_utf8(bytes)?)
}

fn write_rows(wtr: &mut csv::Writer<Vec<u8>>, rows: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = rows.first() else {
        return Ok(());
    };
    let headers: Vec<&str> = first.keys().map(String::as_str).collect();
    wtr.write_record(&headers)?;
    for row in rows {
        let record: Vec<String> = headers
            .iter()
            .map(|h| row.get(*h).map(scalar_text).unwrap_or_default())
            .collect();
        wtr.write_record(&record)?;
    }
    Ok(())
}

fn write_grid(wtr: &mut csv::Writer<Vec<u8>>, grid: &Value) -> csv::Result<()> {
    let mut header = vec!["wacc".to_string()];
    if let Some(Value::Array(steps)) = grid.get("growth_steps") {
        header.extend(steps.iter().map(|g| format!("g={}", scalar_text(g))));
    }
    wtr.write_record(&header)?;

    if let Some(Value::Array(rows)) = grid.get("rows") {
        for row in rows {
            let mut record = vec![row.get("wacc").map(scalar_text).unwrap_or_default()];
            if let Some(Value::Array(prices)) = row.get("prices") {
                record.extend(prices.iter().map(scalar_text));
            }
            wtr.write_record(&record)?;
        }
    }
    Ok(())
}
