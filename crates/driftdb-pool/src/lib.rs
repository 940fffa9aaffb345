//! # driftdb-pool
//!
//! Bounded connection pool with fair hand-off under saturation.
//!
//! The pool is generic over a [`ManageConnection`] implementation, so it knows
//! nothing about sockets or the DriftDB protocol. It guarantees:
//!
//! - The number of live connections never exceeds `max_connections`, even
//!   when many tasks race to create "one more".
//! - When every connection is checked out, waiters are served in arrival
//!   order as connections are released.
//! - Released connections are re-enqueued as-is. The pool performs no health
//!   check; callers that know a connection is broken should
//!   [`discard`](Pool::discard) it instead.
//!
//! ## Acquisition
//!
//! [`Pool::acquire`] first waits briefly (`idle_poll_interval`) for an idle
//! connection, then tries to create one if there is capacity, and finally
//! queues for the next released connection.
//!
//! ## Example
//!
//! ```rust,ignore
//! use driftdb_pool::{Pool, PoolConfig};
//!
//! let config = PoolConfig::new()
//!     .min_connections(2)
//!     .max_connections(20);
//!
//! let pool = Pool::new(manager, config)?;
//! pool.initialize().await?;
//!
//! let conn = pool.get().await?;
//! // Use connection...
//! // Connection automatically returned to pool on drop
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod manager;
pub mod pool;

pub use config::PoolConfig;
pub use error::PoolError;
pub use manager::ManageConnection;
pub use pool::{Pool, PoolStatus, PooledConnection};
