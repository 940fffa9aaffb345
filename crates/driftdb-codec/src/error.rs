//! Codec error types.

use driftdb_protocol::ProtocolError;
use thiserror::Error;

/// Errors raised while framing or exchanging messages.
#[derive(Debug, Error)]
pub enum CodecError {
    /// IO error on the underlying transport.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A line could not be encoded or decoded as a protocol message.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A line exceeded the configured maximum length.
    #[error("line too long: {length} bytes exceeds maximum {max}")]
    LineTooLong {
        /// Bytes buffered without a terminator.
        length: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The peer closed the stream before a response arrived.
    #[error("connection closed by server")]
    ConnectionClosed,
}

impl CodecError {
    /// Whether this error came from message decoding rather than the transport.
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::LineTooLong { .. })
    }
}
