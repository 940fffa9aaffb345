//! # driftdb-client
//!
//! Async client for DriftDB with a bounded connection pool, transactions and
//! time-travel queries.
//!
//! ## Layers
//!
//! ```text
//! Client ─ query / transaction
//!   └─ Pool<TransportManager>      bounded, fair checkout
//!        └─ TransportConnection    one TCP link, one exchange at a time
//!             └─ driftdb-codec     newline-delimited JSON
//! ```
//!
//! Every query borrows a connection, runs exactly one request/reply exchange
//! and gives the connection back, including when the query fails.
//!
//! ## Time travel
//!
//! Historical reads are plain SQL suffixes: [`Client::query_at_sequence`]
//! appends `FOR SYSTEM_TIME AS OF @SEQ:<n>` and [`Client::query_at_time`]
//! appends `FOR SYSTEM_TIME AS OF '<timestamp>'`. [`TimeTravel`] covers the
//! other forms.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use driftdb_client::{Client, Value};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("localhost:5433", 2, 10, Duration::from_secs(10)).await?;
//!
//!     let result = client
//!         .query("SELECT * FROM users WHERE id = ?", &[Value::Int(1)])
//!         .await?;
//!     for row in &result {
//!         println!("{:?}", row.get("name"));
//!     }
//!
//!     let then = client.query_at_sequence("SELECT * FROM users", 42, &[]).await?;
//!     println!("{} rows at sequence 42", then.row_count());
//!
//!     let mut tx = client.begin().await?;
//!     tx.execute("INSERT INTO users (name) VALUES (?)", &["Alice".into()]).await?;
//!     tx.commit().await?;
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod query;
pub mod result;
pub mod row;
pub mod transaction;

// Re-export commonly used types
pub use client::Client;
pub use config::Config;
pub use connection::{LinkState, TransportConnection, TransportManager};
pub use driftdb_pool::{PoolConfig, PoolStatus};
pub use driftdb_protocol::{TimeTravel, Value};
pub use error::{Error, ErrorKind, Result};
pub use query::{Direction, QueryBuilder};
pub use result::QueryResult;
pub use row::Row;
pub use transaction::{Transaction, TransactionState};
