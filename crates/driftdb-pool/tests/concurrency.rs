//! Pool behaviour under concurrent demand.
//!
//! These tests drive the pool with an in-memory manager whose connections are
//! plain ids, so every property can be checked without a server.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use driftdb_pool::{ManageConnection, Pool, PoolConfig, PoolError};
use parking_lot::Mutex;

#[derive(Debug, thiserror::Error)]
#[error("refused")]
struct Refused;

/// Hands out sequential ids after a short delay, tracking the peak number of
/// simultaneously open connections.
#[derive(Default)]
struct MemoryManager {
    next_id: AtomicU32,
    open: AtomicUsize,
    peak: AtomicUsize,
    closed: AtomicUsize,
    refuse: AtomicBool,
    connect_delay: Duration,
}

impl MemoryManager {
    fn with_delay(connect_delay: Duration) -> Self {
        Self {
            connect_delay,
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl ManageConnection for MemoryManager {
    type Connection = u32;
    type Error = Refused;

    async fn connect(&self) -> Result<u32, Refused> {
        tokio::time::sleep(self.connect_delay).await;
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Refused);
        }
        let open = self.open.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(open, Ordering::SeqCst);
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn close(&self, _conn: u32) -> Result<(), Refused> {
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config(min: u32, max: u32) -> PoolConfig {
    PoolConfig::new()
        .min_connections(min)
        .max_connections(max)
        .idle_poll_interval(Duration::from_millis(5))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_live_count_never_exceeds_max() {
    let manager = MemoryManager::with_delay(Duration::from_millis(2));
    let pool = Pool::new(manager, config(0, 3)).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..40 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let conn = pool.acquire().await.unwrap();
            assert!(pool.status().live <= 3);
            tokio::time::sleep(Duration::from_millis(1)).await;
            pool.release(conn);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(pool.manager().peak.load(Ordering::SeqCst) <= 3);
    assert!(pool.status().live <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_connection_checked_out_twice() {
    let pool = Pool::new(MemoryManager::default(), config(2, 4)).unwrap();
    pool.initialize().await.unwrap();
    let checked_out = Arc::new(Mutex::new(HashSet::new()));

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let pool = pool.clone();
        let checked_out = Arc::clone(&checked_out);
        tasks.push(tokio::spawn(async move {
            for _ in 0..5 {
                let conn = pool.acquire().await.unwrap();
                assert!(
                    checked_out.lock().insert(conn),
                    "connection {conn} handed out twice"
                );
                tokio::task::yield_now().await;
                checked_out.lock().remove(&conn);
                pool.release(conn);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert!(checked_out.lock().is_empty());
    assert_eq!(pool.status().idle, pool.status().live);
}

#[tokio::test]
async fn test_saturated_acquire_blocks_until_release() {
    let pool = Pool::new(MemoryManager::default(), config(0, 1)).unwrap();
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.unwrap() })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    assert_eq!(pool.manager().next_id.load(Ordering::SeqCst), 1);

    pool.release(held);
    let got = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should be woken by release")
        .unwrap();
    assert_eq!(got, held);
}

#[tokio::test]
async fn test_waiters_served_in_arrival_order() {
    let pool = Pool::new(MemoryManager::default(), config(0, 1)).unwrap();
    let conn = pool.acquire().await.unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let mut tasks = Vec::new();
    for i in 0..4 {
        let pool = pool.clone();
        let order = Arc::clone(&order);
        tasks.push(tokio::spawn(async move {
            let conn = pool.acquire().await.unwrap();
            order.lock().push(i);
            pool.release(conn);
        }));
        // Let each waiter queue before the next arrives.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    pool.release(conn);
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(*order.lock(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_discard_wakes_waiter_to_create() {
    let pool = Pool::new(MemoryManager::default(), config(0, 1)).unwrap();
    let broken = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    pool.discard(broken).await;
    let fresh = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should create after discard")
        .unwrap();
    assert_ne!(fresh, broken);
    assert_eq!(pool.status().live, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_discard_racing_a_full_acquire_never_strands_it() {
    let pool = Pool::new(
        MemoryManager::default(),
        config(0, 1).idle_poll_interval(Duration::ZERO),
    )
    .unwrap();
    let mut held = pool.acquire().await.unwrap();

    for round in 0..300 {
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.unwrap() })
        };
        // Vary the interleaving between the acquirer's capacity check and
        // the discard freeing the slot.
        for _ in 0..round % 4 {
            tokio::task::yield_now().await;
        }

        pool.discard(held).await;
        held = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap_or_else(|_| panic!("acquirer stranded in round {round}"))
            .unwrap();
        assert_eq!(pool.status().live, 1);
    }
    assert_eq!(pool.manager().peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_waiter_does_not_lose_connection() {
    let pool = Pool::new(MemoryManager::default(), config(0, 1)).unwrap();
    let conn = pool.acquire().await.unwrap();

    let result = pool.acquire_timeout(Duration::from_millis(20)).await;
    assert!(matches!(result, Err(PoolError::AcquisitionTimeout(_))));

    pool.release(conn);
    assert_eq!(pool.status().idle, 1);
    assert_eq!(pool.acquire().await.unwrap(), conn);
}

#[tokio::test]
async fn test_close_drains_idle_connections() {
    let pool = Pool::new(MemoryManager::default(), config(3, 5)).unwrap();
    pool.initialize().await.unwrap();
    assert_eq!(pool.status().idle, 3);

    pool.close().await;
    assert_eq!(pool.status().idle, 0);
    assert_eq!(pool.status().live, 0);
    assert_eq!(pool.manager().closed.load(Ordering::SeqCst), 3);

    // Reuse after close opens a fresh connection.
    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn, 3);
}

#[tokio::test]
async fn test_initialize_failure_propagates() {
    let manager = MemoryManager::default();
    manager.refuse.store(true, Ordering::SeqCst);
    let pool = Pool::new(manager, config(2, 4)).unwrap();

    let err = pool.initialize().await.unwrap_err();
    assert!(matches!(err, PoolError::Connect(Refused)));
    assert_eq!(pool.status().live, 0);
}

#[tokio::test]
async fn test_slow_connect_times_out() {
    let manager = MemoryManager::with_delay(Duration::from_millis(200));
    let pool = Pool::new(
        manager,
        config(0, 2).connection_timeout(Duration::from_millis(20)),
    )
    .unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, PoolError::ConnectTimeout(_)));
    assert_eq!(pool.status().live, 0);
}
