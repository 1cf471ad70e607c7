//! Common error types for the uptime coordinator.

use std::fmt;

/// A specialized Result type for coordinator operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for coordinator operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Timezone error: {0}")]
    Timezone(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Create a new persistence error.
    pub fn persistence(msg: impl fmt::Display) -> Self {
        Error::Persistence(msg.to_string())
    }

    /// Create a new timezone error.
    pub fn timezone(msg: impl fmt::Display) -> Self {
        Error::Timezone(msg.to_string())
    }

    /// Create a new not-found error.
    pub fn not_found(msg: impl fmt::Display) -> Self {
        Error::NotFound(msg.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_render_message() {
        assert_eq!(
            Error::not_found("maintenance 7").to_string(),
            "Not found: maintenance 7"
        );
        assert_eq!(
            Error::timezone("Mars/Olympus").to_string(),
            "Timezone error: Mars/Olympus"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
