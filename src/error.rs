//! Error types for the device query engine
//!
//! Every network fault is classified into a typed variant at the transport
//! boundary; nothing propagates past the session as an unhandled fault. The
//! retry loop branches on these variants rather than on raised errors.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

/// Error taxonomy for device query operations
#[derive(Error, Debug)]
pub enum QueryError {
    /// The attempt exceeded its time budget. Retryable on the fast path.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The device actively refused the connection. Terminal; a refused port
    /// will not spontaneously start accepting.
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// Any other transport-level failure. Retryable with backoff.
    #[error("transport error: {0}")]
    Transport(String),

    /// TLS handshake failure during a dedicated capability probe. On the
    /// query path this is a downgrade, not an error.
    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),

    /// The full retry budget was spent without a successful exchange.
    #[error("no response from {address} after {attempts} attempts (last attempt took {last_elapsed:?})")]
    ExhaustedRetries {
        address: String,
        attempts: u32,
        last_elapsed: Duration,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid input errors
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Generic I/O errors outside the classified transport path
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create a timeout error
    pub fn timeout<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a connection-refused error
    pub fn refused<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionRefused(msg.into())
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a TLS handshake error
    pub fn tls<S: Into<String>>(msg: S) -> Self {
        Self::TlsHandshake(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid-input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Classify an I/O error from a live exchange into the retry taxonomy.
    pub fn from_io(context: &str, err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::ConnectionRefused => Self::ConnectionRefused(format!("{context}: {err}")),
            ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                Self::Timeout(format!("{context}: {err}"))
            }
            _ => Self::Transport(format!("{context}: {err}")),
        }
    }

    /// Whether the retry loop may attempt again after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Transport(_) | Self::TlsHandshake(_)
        )
    }
}
