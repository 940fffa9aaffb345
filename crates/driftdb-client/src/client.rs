//! The query facade.

use std::time::Duration;

use driftdb_pool::{Pool, PoolStatus};
use driftdb_protocol::{TimeTravel, Value};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::connection::{TransportConnection, TransportManager};
use crate::error::{Error, Result};
use crate::result::QueryResult;
use crate::transaction::Transaction;

/// Query used by [`Client::current_sequence`].
const CURRENT_SEQUENCE_SQL: &str = "SELECT MAX(sequence) FROM __driftdb_metadata__";

/// A pooled DriftDB client.
///
/// Every query checks a connection out of the pool, runs one exchange, and
/// returns the connection whether or not the query succeeded. Cloning a
/// client is cheap; clones share the pool.
#[derive(Clone)]
pub struct Client {
    pool: Pool<TransportManager>,
    config: Config,
}

impl Client {
    /// Connect to `address` (`host:port`) with the given pool bounds.
    ///
    /// Opens `min_connections` connections before returning.
    pub async fn connect(
        address: &str,
        min_connections: u32,
        max_connections: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let config = Config::from_address(address)?
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect_timeout(timeout);
        Self::connect_with(config).await
    }

    /// Connect using a full configuration.
    pub async fn connect_with(config: Config) -> Result<Self> {
        config.validate()?;

        let pool = Pool::new(TransportManager::new(&config), config.pool_config())?;
        if let Err(e) = pool.initialize().await {
            pool.close().await;
            return Err(e.into());
        }

        tracing::info!(
            address = %config.address(),
            min = config.min_connections,
            max = config.max_connections,
            "connected to DriftDB"
        );
        Ok(Self { pool, config })
    }

    /// Run a query with the configured default timeout.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.run(sql, params, self.config.command_timeout).await
    }

    /// Run a query with an explicit deadline.
    ///
    /// The deadline bounds waiting for a pooled connection and, separately,
    /// the exchange itself. A connection whose exchange times out is closed
    /// rather than returned to the pool.
    pub async fn query_with_timeout(
        &self,
        sql: &str,
        params: &[Value],
        timeout: Duration,
    ) -> Result<QueryResult> {
        self.run(sql, params, Some(timeout)).await
    }

    /// Run a query against the database as of a sequence number.
    pub async fn query_at_sequence(
        &self,
        sql: &str,
        sequence: u64,
        params: &[Value],
    ) -> Result<QueryResult> {
        self.query_as_of(sql, &TimeTravel::Sequence(sequence), params)
            .await
    }

    /// Run a query against the database as of an ISO-8601 timestamp.
    ///
    /// The timestamp is interpolated as-is; the server validates it.
    pub async fn query_at_time(
        &self,
        sql: &str,
        timestamp: &str,
        params: &[Value],
    ) -> Result<QueryResult> {
        self.query_as_of(sql, &TimeTravel::Timestamp(timestamp.to_string()), params)
            .await
    }

    /// Run a query with a time-travel clause appended to its text.
    pub async fn query_as_of(
        &self,
        sql: &str,
        time_travel: &TimeTravel,
        params: &[Value],
    ) -> Result<QueryResult> {
        self.query(&time_travel.apply(sql), params).await
    }

    /// Run a statement and return the number of rows in its result.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<usize> {
        Ok(self.query(sql, params).await?.row_count())
    }

    /// Run a query and deserialize every row into `T`.
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>> {
        self.query(sql, params).await?.deserialize_rows()
    }

    /// Create a transaction bound to this client's pool.
    ///
    /// No connection is acquired until [`Transaction::begin`].
    #[must_use]
    pub fn transaction(&self) -> Transaction {
        Transaction::new(self.pool.clone(), self.config.command_timeout)
    }

    /// Create a transaction and begin it.
    pub async fn begin(&self) -> Result<Transaction> {
        let mut tx = self.transaction();
        tx.begin().await?;
        Ok(tx)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits if `f` returns `Ok` and rolls back if it returns `Err`. The
    /// connection goes back to the pool exactly once on either path. If `f`
    /// finishes the transaction itself, nothing further is sent.
    ///
    /// ```rust,ignore
    /// let id = client
    ///     .run_transaction(|tx| Box::pin(async move {
    ///         tx.execute("INSERT INTO users (name) VALUES (?)", &["Alice".into()]).await?;
    ///         Ok::<_, Error>(1)
    ///     }))
    ///     .await?;
    /// ```
    pub async fn run_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T>>,
    {
        let mut tx = self.begin().await?;
        match f(&mut tx).await {
            Ok(value) => {
                if tx.is_active() {
                    tx.commit().await?;
                }
                Ok(value)
            }
            Err(e) => {
                if tx.is_active() {
                    if let Err(rollback_error) = tx.rollback().await {
                        tracing::warn!(error = %rollback_error, "rollback after failed transaction body failed");
                    }
                }
                Err(e)
            }
        }
    }

    /// The highest sequence number the server has recorded, if any.
    pub async fn current_sequence(&self) -> Result<Option<u64>> {
        let result = self.query(CURRENT_SEQUENCE_SQL, &[]).await?;
        Ok(result
            .scalar()
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok()))
    }

    /// Snapshot of the pool's counters.
    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Get the client configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close all idle connections.
    ///
    /// Never fails. Connections checked out by in-flight queries or open
    /// transactions are returned (or closed) by their holders.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run(
        &self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
    ) -> Result<QueryResult> {
        tracing::debug!(sql, params = params.len(), "executing query");

        let mut checkout = Checkout::acquire(&self.pool, timeout).await?;
        let result = checkout.execute(sql, params, timeout).await;
        checkout.finish().await;
        result
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.config.address())
            .field("pool", &self.pool.status())
            .finish()
    }
}

/// A connection checked out of the pool.
///
/// [`finish`](Self::finish) returns it. A connection abandoned mid-exchange
/// (by a timeout or a dropped future) has a stale reply in flight, and one
/// whose link closed is dead, so either is discarded instead; dropping an
/// unfinished checkout does the same from a spawned task.
pub(crate) struct Checkout {
    pool: Pool<TransportManager>,
    conn: Option<TransportConnection>,
    poisoned: bool,
}

impl Checkout {
    pub(crate) async fn acquire(
        pool: &Pool<TransportManager>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let conn = match timeout {
            Some(deadline) => pool.acquire_timeout(deadline).await?,
            None => pool.acquire().await?,
        };
        Ok(Self {
            pool: pool.clone(),
            conn: Some(conn),
            poisoned: false,
        })
    }

    pub(crate) async fn execute(
        &mut self,
        sql: &str,
        params: &[Value],
        timeout: Option<Duration>,
    ) -> Result<QueryResult> {
        if !self.is_reusable() {
            return Err(Error::Transport(
                "connection is out of step with the server".into(),
            ));
        }
        let conn = self.conn.as_mut().ok_or(Error::NotConnected)?;
        match timeout {
            Some(deadline) => tokio::time::timeout(deadline, conn.execute(sql, params))
                .await
                .map_err(|_| Error::CommandTimeout(deadline))?,
            None => conn.execute(sql, params).await,
        }
    }

    /// Mark the connection as unfit for reuse.
    pub(crate) fn poison(&mut self) {
        self.poisoned = true;
    }

    /// Whether the held connection can carry another exchange.
    ///
    /// False once poisoned, after an abandoned exchange, or after the link
    /// closed on a transport fault.
    pub(crate) fn is_reusable(&self) -> bool {
        self.conn
            .as_ref()
            .is_some_and(|conn| !self.must_discard(conn))
    }

    fn must_discard(&self, conn: &TransportConnection) -> bool {
        self.poisoned || conn.is_mid_exchange() || !conn.is_connected()
    }

    pub(crate) async fn finish(mut self) {
        if let Some(conn) = self.conn.take() {
            if self.must_discard(&conn) {
                self.pool.discard(conn).await;
            } else {
                self.pool.release(conn);
            }
        }
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if !self.must_discard(&conn) {
            self.pool.release(conn);
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let pool = self.pool.clone();
                handle.spawn(async move { pool.discard(conn).await });
            }
            Err(_) => {
                tracing::warn!("connection abandoned outside a runtime; its pool slot is lost");
            }
        }
    }
}
