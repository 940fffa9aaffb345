//! Transaction support.
//!
//! A [`Transaction`] moves through `NotStarted → Active → {Committed,
//! RolledBack}`. Transaction control travels as ordinary query text
//! (`BEGIN TRANSACTION`, `COMMIT`, `ROLLBACK`) on one connection that the
//! transaction holds exclusively while active.

use std::time::Duration;

use driftdb_pool::Pool;
use driftdb_protocol::Value;

use crate::client::Checkout;
use crate::connection::TransportManager;
use crate::error::{Error, Result};
use crate::result::QueryResult;

const BEGIN_SQL: &str = "BEGIN TRANSACTION";
const COMMIT_SQL: &str = "COMMIT";
const ROLLBACK_SQL: &str = "ROLLBACK";

/// Lifecycle state of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created; no connection held.
    NotStarted,
    /// `BEGIN` succeeded; a connection is held.
    Active,
    /// `COMMIT` was issued.
    Committed,
    /// `ROLLBACK` was issued.
    RolledBack,
}

impl TransactionState {
    /// Whether the transaction has finished.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::RolledBack)
    }
}

/// A database transaction.
///
/// The bound connection is returned to the pool exactly once, when
/// [`commit`](Self::commit) or [`rollback`](Self::rollback) finishes, even if
/// the `COMMIT`/`ROLLBACK` itself fails. A transaction dropped while active
/// is rolled back from a spawned task.
///
/// If a statement was abandoned before its reply arrived (a command timeout
/// or a dropped future), nothing more is written on the connection: `commit`
/// and `rollback` fail with [`Error::Transport`] and the connection is closed
/// rather than returned.
///
/// # Example
///
/// ```rust,ignore
/// let mut tx = client.begin().await?;
/// tx.execute("UPDATE accounts SET balance = balance - 10 WHERE id = ?", &[1.into()]).await?;
/// tx.execute("UPDATE accounts SET balance = balance + 10 WHERE id = ?", &[2.into()]).await?;
/// tx.commit().await?;
/// ```
pub struct Transaction {
    pool: Pool<TransportManager>,
    checkout: Option<Checkout>,
    state: TransactionState,
    command_timeout: Option<Duration>,
}

impl Transaction {
    pub(crate) fn new(pool: Pool<TransportManager>, command_timeout: Option<Duration>) -> Self {
        Self {
            pool,
            checkout: None,
            state: TransactionState::NotStarted,
            command_timeout,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Whether `BEGIN` succeeded and the transaction has not finished.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Acquire a connection and send `BEGIN TRANSACTION`.
    ///
    /// On failure the transaction stays `NotStarted` and any acquired
    /// connection goes back to the pool.
    pub async fn begin(&mut self) -> Result<()> {
        if self.state != TransactionState::NotStarted {
            return Err(Error::TransactionAlreadyStarted);
        }

        let mut checkout = Checkout::acquire(&self.pool, self.command_timeout).await?;
        if let Err(e) = checkout.execute(BEGIN_SQL, &[], self.command_timeout).await {
            checkout.finish().await;
            return Err(e);
        }

        self.checkout = Some(checkout);
        self.state = TransactionState::Active;
        tracing::debug!("transaction started");
        Ok(())
    }

    /// Run a statement inside the transaction.
    pub async fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let timeout = self.command_timeout;
        let checkout = self.active_checkout()?;
        tracing::debug!(sql, params = params.len(), "executing query in transaction");
        checkout.execute(sql, params, timeout).await
    }

    /// Run a statement and return the number of rows in its result.
    pub async fn execute_count(&mut self, sql: &str, params: &[Value]) -> Result<usize> {
        Ok(self.execute(sql, params).await?.row_count())
    }

    /// Commit and release the connection.
    pub async fn commit(&mut self) -> Result<()> {
        self.finish(COMMIT_SQL, TransactionState::Committed).await
    }

    /// Roll back and release the connection.
    pub async fn rollback(&mut self) -> Result<()> {
        self.finish(ROLLBACK_SQL, TransactionState::RolledBack).await
    }

    async fn finish(&mut self, sql: &str, outcome: TransactionState) -> Result<()> {
        self.active_checkout()?;
        let Some(mut checkout) = self.checkout.take() else {
            return Err(Error::TransactionNotStarted);
        };
        self.state = outcome;

        if !checkout.is_reusable() {
            // A stale reply is in flight or the link is gone.
            checkout.finish().await;
            tracing::warn!(statement = sql, "transaction connection unusable; discarded");
            return Err(Error::Transport(format!(
                "{sql} not sent: transaction connection is out of step with the server"
            )));
        }

        let result = checkout.execute(sql, &[], self.command_timeout).await;
        checkout.finish().await;

        tracing::debug!(outcome = ?outcome, ok = result.is_ok(), "transaction finished");
        result.map(|_| ())
    }

    fn active_checkout(&mut self) -> Result<&mut Checkout> {
        match (self.state, self.checkout.as_mut()) {
            (TransactionState::Active, Some(checkout)) => Ok(checkout),
            _ => Err(Error::TransactionNotStarted),
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        let Some(mut checkout) = self.checkout.take() else {
            return;
        };
        if self.state != TransactionState::Active {
            return;
        }

        if !checkout.is_reusable() {
            // Dropping the checkout discards the connection.
            tracing::warn!("transaction dropped while active on an unusable connection");
            return;
        }

        tracing::warn!("transaction dropped while active; rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = checkout.execute(ROLLBACK_SQL, &[], None).await {
                        tracing::warn!(error = %e, "rollback of dropped transaction failed");
                    }
                    checkout.finish().await;
                });
            }
            // Without a runtime the ROLLBACK cannot be sent; never hand the
            // open transaction to another caller.
            Err(_) => checkout.poison(),
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
