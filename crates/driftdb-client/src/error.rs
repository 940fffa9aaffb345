//! Client error types.

use std::time::Duration;

use driftdb_codec::CodecError;
use driftdb_pool::PoolError;
use driftdb_protocol::ServerError;
use thiserror::Error;

/// The five failure categories every client operation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A transport-level connect error.
    ConnectionFailure,
    /// A connect or wait deadline was exceeded.
    Timeout,
    /// The server rejected the query, the reply could not be decoded, or the
    /// transport failed mid-exchange.
    QueryFailure,
    /// The server rejected the caller's credentials.
    AuthenticationFailure,
    /// The operation needs a transaction in a different state.
    TransactionNotStarted,
}

/// Errors that can occur during client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The transport connection is not in the connected state.
    #[error("not connected")]
    NotConnected,

    /// The server address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Establishing a connection timed out.
    #[error("connection timed out after {0:?}")]
    ConnectionTimeout(Duration),

    /// No pooled connection became available in time.
    #[error("timed out waiting for a pooled connection after {0:?}")]
    AcquireTimeout(Duration),

    /// Command execution timed out.
    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    /// The server reported an error for the query.
    #[error("query failed: {message}")]
    Server {
        /// Server-supplied message.
        message: String,
        /// SQLSTATE-style code, when supplied.
        code: Option<String>,
    },

    /// The server rejected the caller's credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The response, or a row inside it, could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// The transport failed during an exchange.
    #[error("transport error during query: {0}")]
    Transport(String),

    /// The transaction is not active.
    #[error("transaction not started")]
    TransactionNotStarted,

    /// `begin` was called on a transaction that already left `NotStarted`.
    #[error("transaction already started")]
    TransactionAlreadyStarted,
}

impl Error {
    /// Get the error category.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) | Self::NotConnected | Self::InvalidAddress(_) | Self::Config(_) => {
                ErrorKind::ConnectionFailure
            }
            Self::ConnectionTimeout(_) | Self::AcquireTimeout(_) | Self::CommandTimeout(_) => {
                ErrorKind::Timeout
            }
            Self::Server { .. } | Self::Decode(_) | Self::Transport(_) => ErrorKind::QueryFailure,
            Self::Authentication(_) => ErrorKind::AuthenticationFailure,
            Self::TransactionNotStarted | Self::TransactionAlreadyStarted => {
                ErrorKind::TransactionNotStarted
            }
        }
    }

    /// Check if this error is transient and may succeed on retry.
    ///
    /// The client never retries on its own; this is a hint for callers.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::ConnectionTimeout(_)
                | Self::AcquireTimeout(_)
                | Self::CommandTimeout(_)
                | Self::Transport(_)
        )
    }

    /// Check if this error is a deadline expiring.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Check if the server rejected the caller's credentials.
    #[must_use]
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }

    /// Get the server-supplied code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Server { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<ServerError> for Error {
    fn from(error: ServerError) -> Self {
        if error.is_authentication_failure() {
            return Self::Authentication(error.message);
        }
        Self::Server {
            message: error.message,
            code: error.code,
        }
    }
}

impl From<CodecError> for Error {
    fn from(error: CodecError) -> Self {
        if error.is_decode_error() {
            Self::Decode(error.to_string())
        } else {
            Self::Transport(error.to_string())
        }
    }
}

impl From<PoolError<Error>> for Error {
    fn from(error: PoolError<Error>) -> Self {
        match error {
            PoolError::Connect(e) => e,
            PoolError::ConnectTimeout(d) => Self::ConnectionTimeout(d),
            PoolError::AcquisitionTimeout(d) => Self::AcquireTimeout(d),
            PoolError::Configuration(msg) => Self::Config(msg),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
