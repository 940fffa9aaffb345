//! Pool error types.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during pool operations.
///
/// `E` is the error type of the pool's [`ManageConnection`](crate::ManageConnection).
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// The manager failed to create a connection.
    #[error("failed to create connection: {0}")]
    Connect(#[source] E),

    /// Creating a connection took longer than `connection_timeout`.
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// No connection became available within the caller's deadline.
    #[error("connection acquisition timeout after {0:?}")]
    AcquisitionTimeout(Duration),

    /// Pool configuration error.
    #[error("pool configuration error: {0}")]
    Configuration(String),
}

impl<E> PoolError<E> {
    /// Whether the error is a deadline expiring rather than a hard failure.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout(_) | Self::AcquisitionTimeout(_))
    }
}
