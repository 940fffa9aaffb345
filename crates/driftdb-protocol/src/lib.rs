//! # driftdb-protocol
//!
//! Message types for the DriftDB request/response line protocol.
//!
//! Every exchange is one JSON object per line in each direction: the client
//! writes a [`Request`] and reads back exactly one [`Response`]. Transaction
//! control (`BEGIN TRANSACTION`, `COMMIT`, `ROLLBACK`) and time-travel
//! addressing are plain SQL text, so they need no message kinds of their own.
//!
//! ## Design Philosophy
//!
//! This crate is intentionally IO-agnostic. It contains no networking logic and
//! makes no assumptions about the async runtime. The codec and client crates
//! build upon it.
//!
//! ## Example
//!
//! ```rust
//! use driftdb_protocol::{Request, TimeTravel, Value};
//!
//! let sql = TimeTravel::Sequence(42).apply("SELECT * FROM orders");
//! let request = Request::query(sql, vec![Value::from(7)]);
//! assert!(request.query.ends_with("FOR SYSTEM_TIME AS OF @SEQ:42"));
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod message;
pub mod row_object;
pub mod time_travel;
pub mod value;

pub use error::ProtocolError;
pub use message::{QueryResponse, Request, RequestKind, Response, ServerError};
pub use row_object::RowObject;
pub use time_travel::TimeTravel;
pub use value::Value;
