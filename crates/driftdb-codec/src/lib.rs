//! # driftdb-codec
//!
//! Async framing layer for the DriftDB line protocol.
//!
//! This crate turns a raw byte stream into a sequence of protocol messages:
//! each message is one JSON document terminated by `\n`. Lines may arrive
//! split across reads or several to a read; the codec reassembles them.
//!
//! ## Architecture
//!
//! ```text
//! TcpStream → LineCodec (framing + JSON) → Connection (one exchange at a time) → Client
//! ```
//!
//! [`Connection`] enforces strict request/reply: it writes one request and
//! reads exactly one response before the next request can be issued. It is
//! generic over the transport so tests can drive it with in-memory pipes.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod connection;
pub mod error;

pub use codec::{DEFAULT_MAX_LINE_LENGTH, LineCodec};
pub use connection::Connection;
pub use error::CodecError;
