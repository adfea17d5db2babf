use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Unsupported value for field '{field}': {detail}")]
    UnsupportedType { field: String, detail: String },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Inconsistent vector dimension in field '{field}' at row {row}: expected {expected}, got {got}")]
    InconsistentVectorDimension {
        field: String,
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("Insert count mismatch: expected {expected}, got {got}")]
    CountMismatch { expected: u64, got: u64 },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("{operation} timed out after {elapsed:?}")]
    TimedOut { operation: String, elapsed: Duration },
    #[error("{0} was cancelled")]
    Cancelled(String),
    #[error("Invalid index configuration: {0}")]
    InvalidIndex(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Connection(#[from] anyhow::Error),
}

impl LoadError {
    pub fn unsupported(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::UnsupportedType { field: field.into(), detail: detail.into() }
    }

    /// Stable label used when tagging error samples.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Schema(_) => "schema",
            Self::UnsupportedType { .. } => "unsupported_type",
            Self::Validation(_) => "validation",
            Self::InconsistentVectorDimension { .. } => "inconsistent_vector_dimension",
            Self::CountMismatch { .. } => "count_mismatch",
            Self::Decode(_) => "decode",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled(_) => "cancelled",
            Self::InvalidIndex(_) => "invalid_index",
            Self::Serialization(_) => "serialization",
            Self::Connection(_) => "connection",
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = LoadError::CountMismatch { expected: 10, got: 7 };
        assert_eq!(e.to_string(), "Insert count mismatch: expected 10, got 7");
        assert_eq!(e.kind(), "count_mismatch");
    }

    #[test]
    fn test_connection_is_transparent() {
        let e = LoadError::from(anyhow::anyhow!("connection refused"));
        assert_eq!(e.to_string(), "connection refused");
        assert_eq!(e.kind(), "connection");
    }
}
