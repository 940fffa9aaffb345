//! Connection pool implementation.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::manager::ManageConnection;

/// A bounded connection pool.
///
/// Cloning a `Pool` is cheap and yields a handle to the same pool.
pub struct Pool<M: ManageConnection> {
    inner: Arc<PoolInner<M>>,
}

/// What a queued waiter is woken with.
enum Handoff<C> {
    /// A released connection, handed over directly.
    Connection(C),
    /// A capacity slot was freed; the waiter should try to create.
    Capacity,
}

struct Slots<C> {
    idle: VecDeque<C>,
    /// Non-empty only while `idle` is empty.
    waiters: VecDeque<oneshot::Sender<Handoff<C>>>,
}

struct PoolInner<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    slots: Mutex<Slots<M::Connection>>,
    /// Serializes the capacity check with every change to `live`.
    create_lock: tokio::sync::Mutex<()>,
    live: AtomicU32,
}

impl<M: ManageConnection> Pool<M> {
    /// Create an empty pool. No connections are opened until
    /// [`initialize`](Self::initialize) or the first acquire.
    pub fn new(manager: M, config: PoolConfig) -> Result<Self, PoolError<M::Error>> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                slots: Mutex::new(Slots {
                    idle: VecDeque::new(),
                    waiters: VecDeque::new(),
                }),
                create_lock: tokio::sync::Mutex::new(()),
                live: AtomicU32::new(0),
            }),
        })
    }

    /// Eagerly open `min_connections` connections and mark them idle.
    ///
    /// Stops at the first failure and returns it. Connections opened before
    /// the failure stay idle; call [`close`](Self::close) to drop them if the
    /// pool is being abandoned.
    pub async fn initialize(&self) -> Result<(), PoolError<M::Error>> {
        let target = self.inner.config.min_connections;
        for _ in 0..target {
            match self.inner.try_create().await? {
                Some(conn) => self.inner.put(conn),
                None => break,
            }
        }

        tracing::info!(
            live = self.inner.live.load(Ordering::Acquire),
            max = self.inner.config.max_connections,
            "connection pool initialized"
        );
        Ok(())
    }

    /// Take a connection out of the pool.
    ///
    /// Waits up to `idle_poll_interval` for an idle connection, then creates
    /// one if the pool is below `max_connections`, and otherwise queues until
    /// another holder releases or discards a connection. Queued callers are
    /// served in arrival order. The wait is unbounded; see
    /// [`acquire_timeout`](Self::acquire_timeout) for a deadline.
    pub async fn acquire(&self) -> Result<M::Connection, PoolError<M::Error>> {
        let poll_interval = self.inner.config.idle_poll_interval;
        if let Ok(Handoff::Connection(conn)) = timeout(poll_interval, self.inner.wait_idle()).await
        {
            tracing::debug!(path = "idle", "acquired connection");
            return Ok(conn);
        }

        loop {
            let waiter = match self.inner.create_or_queue().await? {
                Attempt::Opened(conn) => {
                    tracing::debug!(path = "created", "acquired connection");
                    return Ok(conn);
                }
                Attempt::Idle(conn) => {
                    tracing::debug!(path = "idle", "acquired connection");
                    return Ok(conn);
                }
                Attempt::Queued(waiter) => waiter,
            };

            match waiter.wait().await {
                Handoff::Connection(conn) => {
                    tracing::debug!(path = "waited", "acquired connection");
                    return Ok(conn);
                }
                Handoff::Capacity => continue,
            }
        }
    }

    /// Like [`acquire`](Self::acquire), failing with
    /// [`PoolError::AcquisitionTimeout`] once `deadline` elapses.
    pub async fn acquire_timeout(
        &self,
        deadline: Duration,
    ) -> Result<M::Connection, PoolError<M::Error>> {
        timeout(deadline, self.acquire())
            .await
            .map_err(|_| PoolError::AcquisitionTimeout(deadline))?
    }

    /// Acquire a connection wrapped in a guard that releases it on drop.
    pub async fn get(&self) -> Result<PooledConnection<M>, PoolError<M::Error>> {
        let conn = self.acquire().await?;
        Ok(PooledConnection {
            conn: Some(conn),
            pool: self.clone(),
        })
    }

    /// Return a connection to the idle set.
    ///
    /// The connection is re-enqueued unconditionally; its health is not
    /// checked. If a caller is queued in [`acquire`](Self::acquire) it
    /// receives the connection directly.
    pub fn release(&self, conn: M::Connection) {
        tracing::trace!("returning connection to pool");
        self.inner.put(conn);
    }

    /// Close a connection and free its capacity slot.
    ///
    /// Use this instead of [`release`](Self::release) for connections known
    /// to be unusable. Close errors are logged and swallowed.
    pub async fn discard(&self, conn: M::Connection) {
        if let Err(e) = self.inner.manager.close(conn).await {
            tracing::warn!(error = %e, "failed to close discarded connection");
        }
        self.inner.forget_live(1).await;
        self.inner.signal_capacity();
        tracing::debug!("discarded connection");
    }

    /// Close every idle connection.
    ///
    /// Checked-out connections are untouched; their holders remain
    /// responsible for releasing or discarding them. Close errors are logged
    /// and swallowed. The pool stays usable: a later acquire opens fresh
    /// connections.
    pub async fn close(&self) {
        let drained: Vec<M::Connection> = self.inner.slots.lock().idle.drain(..).collect();
        let count = drained.len();
        self.inner
            .forget_live(u32::try_from(count).unwrap_or(u32::MAX))
            .await;

        for _ in 0..count {
            self.inner.signal_capacity();
        }

        for conn in drained {
            if let Err(e) = self.inner.manager.close(conn).await {
                tracing::warn!(error = %e, "failed to close idle connection");
            }
        }

        tracing::info!(closed = count, "connection pool drained");
    }

    /// Get the current pool status.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let idle = self.inner.slots.lock().idle.len();
        PoolStatus {
            idle: u32::try_from(idle).unwrap_or(u32::MAX),
            live: self.inner.live.load(Ordering::Acquire),
            max: self.inner.config.max_connections,
        }
    }

    /// Get the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Get the connection manager.
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }
}

impl<M: ManageConnection> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ManageConnection> std::fmt::Debug for Pool<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.inner.config)
            .field("status", &self.status())
            .finish()
    }
}

impl<M: ManageConnection> PoolInner<M> {
    /// Hand a connection to the oldest live waiter, or park it as idle.
    fn put(&self, conn: M::Connection) {
        let mut slots = self.slots.lock();
        let mut handoff = Handoff::Connection(conn);
        while let Some(waiter) = slots.waiters.pop_front() {
            match waiter.send(handoff) {
                Ok(()) => return,
                Err(back) => handoff = back,
            }
        }
        if let Handoff::Connection(conn) = handoff {
            slots.idle.push_back(conn);
        }
    }

    /// Wake the oldest live waiter so it retries creation.
    fn signal_capacity(&self) {
        let mut slots = self.slots.lock();
        while let Some(waiter) = slots.waiters.pop_front() {
            if waiter.send(Handoff::Capacity).is_ok() {
                return;
            }
        }
    }

    /// Pop an idle connection, or join the waiter queue.
    fn enqueue(&self) -> Result<M::Connection, Waiter<'_, M>> {
        let mut slots = self.slots.lock();
        if let Some(conn) = slots.idle.pop_front() {
            return Ok(conn);
        }
        let (tx, rx) = oneshot::channel();
        slots.waiters.push_back(tx);
        Err(Waiter { rx, inner: self })
    }

    /// Pop an idle connection, or queue and wait for a hand-off.
    async fn wait_idle(&self) -> Handoff<M::Connection> {
        match self.enqueue() {
            Ok(conn) => Handoff::Connection(conn),
            Err(waiter) => waiter.wait().await,
        }
    }

    /// Open a connection if the pool is below capacity.
    async fn try_create(&self) -> Result<Option<M::Connection>, PoolError<M::Error>> {
        let _guard = self.create_lock.lock().await;
        if self.live.load(Ordering::Acquire) >= self.config.max_connections {
            return Ok(None);
        }
        self.open_locked().await.map(Some)
    }

    /// Open a connection if the pool is below capacity, otherwise take an
    /// idle one or queue.
    ///
    /// The queue is joined before `create_lock` is released, so a slot freed
    /// by `forget_live` is always signalled to a waiter that saw the pool full.
    async fn create_or_queue(&self) -> Result<Attempt<'_, M>, PoolError<M::Error>> {
        let _guard = self.create_lock.lock().await;
        if self.live.load(Ordering::Acquire) < self.config.max_connections {
            return self.open_locked().await.map(Attempt::Opened);
        }
        Ok(match self.enqueue() {
            Ok(conn) => Attempt::Idle(conn),
            Err(waiter) => Attempt::Queued(waiter),
        })
    }

    /// Connect and count the new connection. Caller holds `create_lock`.
    async fn open_locked(&self) -> Result<M::Connection, PoolError<M::Error>> {
        let conn = match timeout(self.config.connection_timeout, self.manager.connect()).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(PoolError::Connect(e)),
            Err(_) => return Err(PoolError::ConnectTimeout(self.config.connection_timeout)),
        };
        self.live.fetch_add(1, Ordering::AcqRel);
        Ok(conn)
    }

    async fn forget_live(&self, count: u32) {
        if count == 0 {
            return;
        }
        let _guard = self.create_lock.lock().await;
        let live = self.live.load(Ordering::Acquire);
        self.live.store(live.saturating_sub(count), Ordering::Release);
    }
}

/// Result of [`PoolInner::create_or_queue`].
enum Attempt<'a, M: ManageConnection> {
    Opened(M::Connection),
    Idle(M::Connection),
    Queued(Waiter<'a, M>),
}

/// A queued acquirer. Dropping it before the hand-off is observed passes
/// whatever it was sent on to the next waiter.
struct Waiter<'a, M: ManageConnection> {
    rx: oneshot::Receiver<Handoff<M::Connection>>,
    inner: &'a PoolInner<M>,
}

impl<M: ManageConnection> Waiter<'_, M> {
    async fn wait(mut self) -> Handoff<M::Connection> {
        // Senders are only dropped after a successful send.
        (&mut self.rx).await.unwrap_or(Handoff::Capacity)
    }
}

impl<M: ManageConnection> Drop for Waiter<'_, M> {
    fn drop(&mut self) {
        self.rx.close();
        match self.rx.try_recv() {
            Ok(Handoff::Connection(conn)) => self.inner.put(conn),
            Ok(Handoff::Capacity) => self.inner.signal_capacity(),
            Err(_) => {}
        }
    }
}

/// Status information about the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Number of idle connections available.
    pub idle: u32,
    /// Number of live connections, idle or checked out.
    pub live: u32,
    /// Maximum allowed connections.
    pub max: u32,
}

impl PoolStatus {
    /// Number of connections currently checked out.
    #[must_use]
    pub fn in_use(&self) -> u32 {
        self.live.saturating_sub(self.idle)
    }
}

/// A connection retrieved from the pool.
///
/// When dropped, the connection is automatically returned to the pool.
pub struct PooledConnection<M: ManageConnection> {
    conn: Option<M::Connection>,
    pool: Pool<M>,
}

impl<M: ManageConnection> PooledConnection<M> {
    /// Detach the connection from the pool.
    ///
    /// The connection will not be returned to the pool when dropped. It still
    /// counts as live; hand it back with [`Pool::release`] or
    /// [`Pool::discard`].
    #[must_use]
    pub fn detach(mut self) -> Option<M::Connection> {
        self.conn.take()
    }

    /// Close the connection and free its slot instead of returning it.
    pub async fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard(conn).await;
        }
    }
}

// `conn` is only taken by `detach` and `discard`, both of which consume the
// guard, so it is always populated while the guard is reachable.
#[allow(clippy::expect_used)]
impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("pooled connection already taken")
    }
}

#[allow(clippy::expect_used)]
impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("pooled connection already taken")
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
