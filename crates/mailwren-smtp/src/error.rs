//! Error types for SMTP sessions.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP session error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error during connect or upgrade.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The greeting exchange failed: the server's banner or EHLO
    /// response was not in the accepted class, or was malformed.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    /// The connection closed while requests were still pending, or a
    /// command was submitted after the session shut down.
    #[error("connection closed with requests outstanding")]
    Disconnected,

    /// The server rejected a command.
    #[error("unexpected reply {code}: {message}")]
    Unexpected {
        /// Reply code (e.g. 550).
        code: u16,
        /// Reply text from the server.
        message: String,
    },

    /// Protocol violation (malformed reply, bad hostname, upgrading an
    /// already-encrypted stream).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid envelope address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),
}

impl Error {
    /// Creates an error from a rejecting server reply.
    #[must_use]
    pub fn unexpected(code: u16, message: impl Into<String>) -> Self {
        Self::Unexpected {
            code,
            message: message.into(),
        }
    }

    /// Returns true if this is a permanent server rejection (5xx).
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Unexpected { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a transient server rejection (4xx).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unexpected { code, .. } if *code >= 400 && *code < 500)
    }
}
