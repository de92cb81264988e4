//! Error types for blockdir.

use std::io;
use thiserror::Error;

/// Result type alias for blockdir operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for directory operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error from the backing store or transport.
    #[error("I/O error: {0}")]
    Io(String),

    /// File (or schema object) not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Data corruption detected, typically a malformed descriptor payload
    /// or a block column shorter than the descriptor claims.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Seek to a position past the end of the file.
    #[error("Seek to {position} past end of file (length {length})")]
    InvalidSeek { position: u64, length: u64 },

    /// The directory has been closed.
    #[error("Directory is closed")]
    DirectoryClosed,
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Corruption(err.to_string())
    }
}

impl Error {
    /// Create a corruption error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create a not-found error for the given file name.
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Error::NotFound(name.into())
    }

    /// Check if this error means the file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("segments_1");
        assert_eq!(format!("{}", err), "Not found: segments_1");

        let err = Error::InvalidSeek {
            position: 10,
            length: 4,
        };
        assert_eq!(
            format!("{}", err),
            "Seek to 10 past end of file (length 4)"
        );
    }

    #[test]
    fn test_error_is_not_found() {
        assert!(Error::not_found("x").is_not_found());
        assert!(!Error::corruption("bad").is_not_found());
    }

    #[test]
    fn test_json_error_maps_to_corruption() {
        let err: Error = serde_json::from_slice::<serde_json::Value>(b"{oops")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Corruption(_)));
    }
}
