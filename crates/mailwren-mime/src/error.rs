//! Error types for message building.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Message-building error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required field was not set on the builder.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A header value contained bytes that cannot appear in a header.
    #[error("invalid header value: {0}")]
    InvalidHeaderValue(String),
}
