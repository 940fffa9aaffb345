//! Connection manager seam.

/// Creates and destroys the connections a [`Pool`](crate::Pool) hands out.
///
/// The pool calls [`connect`](Self::connect) whenever it has spare capacity
/// and no idle connection, and [`close`](Self::close) when a connection is
/// drained or discarded. Neither call is retried by the pool.
#[async_trait::async_trait]
pub trait ManageConnection: Send + Sync + 'static {
    /// The pooled connection type.
    type Connection: Send + 'static;

    /// Error returned by connect and close.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open a new connection.
    async fn connect(&self) -> Result<Self::Connection, Self::Error>;

    /// Close a connection that is leaving the pool.
    async fn close(&self, conn: Self::Connection) -> Result<(), Self::Error>;
}
