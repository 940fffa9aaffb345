//! Protocol error types.

use thiserror::Error;

/// Errors produced while encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The line was not a valid JSON message.
    #[error("invalid response from server: {0}")]
    Json(#[from] serde_json::Error),

    /// The message decoded but violated the protocol shape.
    #[error("malformed message: {0}")]
    Malformed(String),
}
