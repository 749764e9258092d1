use thiserror::Error;

#[derive(Debug, Error)]
pub enum DcfError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Division undefined in {context}")]
    DivisionUndefined { context: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Snapshot source unavailable for '{ticker}': {reason}")]
    SourceUnavailable { ticker: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for DcfError {
    fn from(e: serde_json::Error) -> Self {
        DcfError::SerializationError(e.to_string())
    }
}
