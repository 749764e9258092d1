use serde_json::Value;
use std::io::{self, Read};

/// JSON piped on stdin, or `None` when stdin is a terminal or empty.
pub fn read_stdin() -> Result<Option<Value>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let value = read_document(io::stdin().lock())?;
    if value.is_some() {
        tracing::debug!("read input document from stdin");
    }
    Ok(value)
}

fn read_document(mut reader: impl Read) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let mut buffer = String::new();
    reader.read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| format!("Failed to parse JSON from stdin: {e}"))?;
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_is_none() {
        assert!(read_document("  \n".as_bytes()).unwrap().is_none());
    }

    #[test]
    fn test_document_parsed() {
        let doc = read_document(r#"{ "ticker": "ACME" }"#.as_bytes())
            .unwrap()
            .unwrap();
        assert_eq!(doc["ticker"], "ACME");
    }

    #[test]
    fn test_bad_json_is_error() {
        assert!(read_document("{ nope".as_bytes()).is_err());
    }
}
