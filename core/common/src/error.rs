//! Common error types for tablegate.

use thiserror::Error;

/// Top-level error type for tablegate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Table, folder or file not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Table already exists and overwrite was not requested.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Credentials missing or invalid, consent denied, or token rejected.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Transport or remote API failure.
    #[error("Network error: {0}")]
    Network(String),

    /// The remote service refused access.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Parquet/Arrow encoding or decoding failed.
    #[error("Codec error: {0}")]
    Codec(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotFound("Table 'sales' not found".to_string());
        assert_eq!(err.to_string(), "Not found: Table 'sales' not found");

        let err = Error::AlreadyExists("sales".to_string());
        assert!(err.to_string().starts_with("Already exists"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
