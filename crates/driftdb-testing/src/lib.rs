//! # driftdb-testing
//!
//! Test infrastructure for DriftDB client development.
//!
//! The centrepiece is [`MockServer`], an in-process TCP server speaking the
//! newline-delimited JSON protocol. It answers queries from a table of canned
//! responses, records every request it receives, and can be told to fail,
//! stall or hang up, so client behaviour can be tested without a database.
//!
//! ## Example
//!
//! ```rust,ignore
//! use driftdb_testing::{MockResponse, MockServer};
//!
//! #[tokio::test]
//! async fn test_query() {
//!     let server = MockServer::builder()
//!         .with_response("SELECT 1", MockResponse::scalar_int("n", 1))
//!         .build()
//!         .await
//!         .unwrap();
//!
//!     let addr = server.address();
//!     // Connect your client to addr...
//!     assert_eq!(server.query_count("SELECT 1"), 1);
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod mock_server;

pub use mock_server::{MockResponse, MockServer, MockServerBuilder, MockServerError};
