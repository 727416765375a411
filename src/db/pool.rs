//! Bounded connection pool with lazy validation.
//!
//! # Responsibilities
//! - Open `size` connections eagerly at startup (fatal on failure)
//! - Hand each connection to exactly one caller at a time
//! - Validate connections idle past the freshness window before reuse
//! - Never hand out a connection the manager already knows is closed
//! - Replace dead connections transparently on acquire
//!
//! # Design Decisions
//! - A FIFO semaphore with one permit per slot bounds checkouts and wakes
//!   exactly one waiter per release
//! - Slots, not connections, are the unit of capacity: a slot whose
//!   reconnect failed goes back empty and is refilled by the next acquirer
//! - The slot list lock is never held across an await

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio::time::Instant;

use crate::observability::metrics;

/// Errors surfaced by the pool and its connection managers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PoolError {
    /// Opening a connection failed.
    #[error("failed to connect to database: {0}")]
    Connect(String),

    /// The trivial round-trip on a stale connection failed.
    #[error("connection validation failed: {0}")]
    Validation(String),

    /// Validation failed and so did the replacement.
    #[error("database unavailable: {0}")]
    Unavailable(String),

    /// A handler asked for a statement no plugin declared.
    #[error("statement '{0}' is not prepared on this connection")]
    UnknownStatement(String),

    #[error("connection pool closed")]
    Closed,
}

/// The database-connect primitive the pool is built on.
#[async_trait]
pub trait ConnectionManager: Send + Sync + 'static {
    type Connection: Send + 'static;

    /// Open a new, fully prepared connection.
    async fn connect(&self) -> Result<Self::Connection, PoolError>;

    /// Round-trip liveness check for a connection that sat idle.
    async fn validate(&self, conn: &mut Self::Connection) -> Result<(), PoolError>;

    /// Whether the connection is known to be unusable without a round-trip.
    /// Checked on every acquire, fresh or not.
    fn is_broken(&self, conn: &Self::Connection) -> bool;
}

struct Slot<C> {
    conn: Option<C>,
    last_used: Instant,
}

struct PoolInner<M: ConnectionManager> {
    manager: M,
    slots: Mutex<Vec<Slot<M::Connection>>>,
    permits: Arc<Semaphore>,
    size: usize,
    freshness: Duration,
}

impl<M: ConnectionManager> PoolInner<M> {
    fn put_back(&self, slot: Slot<M::Connection>) {
        let mut slots = self.slots.lock().expect("pool slot mutex poisoned");
        slots.push(slot);
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: usize,
    pub available: usize,
}

/// A fixed-size pool of database connections.
pub struct Pool<M: ConnectionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> Clone for Pool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ConnectionManager> Pool<M> {
    /// Open `size` connections up front. Any failure aborts construction.
    pub async fn new(manager: M, size: usize, freshness: Duration) -> Result<Self, PoolError> {
        let mut slots = Vec::with_capacity(size);
        for index in 0..size {
            let conn = manager.connect().await.map_err(|e| {
                tracing::error!(slot = index, error = %e, "Failed to open pooled connection");
                e
            })?;
            slots.push(Slot {
                conn: Some(conn),
                last_used: Instant::now(),
            });
        }

        tracing::info!(size, freshness_secs = freshness.as_secs(), "Connection pool ready");
        metrics::record_pool_available(size);

        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                slots: Mutex::new(slots),
                permits: Arc::new(Semaphore::new(size)),
                size,
                freshness,
            }),
        })
    }

    /// Check out a live connection, waiting for one to be released if all
    /// are in use.
    ///
    /// Only fails when a stale connection could not be replaced; the caller
    /// should answer with a "database unavailable" response.
    pub async fn acquire(&self) -> Result<PooledConnection<M>, PoolError> {
        let permit = match Arc::clone(&self.inner.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::NoPermits) => {
                metrics::record_pool_wait();
                tracing::debug!(size = self.inner.size, "Pool exhausted, waiting for a release");
                Arc::clone(&self.inner.permits)
                    .acquire_owned()
                    .await
                    .map_err(|_| PoolError::Closed)?
            }
            Err(TryAcquireError::Closed) => return Err(PoolError::Closed),
        };

        let slot = {
            let mut slots = self.inner.slots.lock().expect("pool slot mutex poisoned");
            slots.pop()
        };
        // Permits and slots are created together, so a permit always finds one.
        let slot = slot.ok_or(PoolError::Closed)?;

        let mut pooled = PooledConnection {
            pool: Arc::clone(&self.inner),
            conn: slot.conn,
            last_used: slot.last_used,
            _permit: permit,
        };
        pooled.ensure_live().await?;
        metrics::record_pool_available(self.inner.permits.available_permits());
        Ok(pooled)
    }

    /// Return a connection explicitly. Dropping the guard has the same effect.
    pub fn release(&self, conn: PooledConnection<M>) {
        drop(conn);
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            size: self.inner.size,
            available: self.inner.permits.available_permits(),
        }
    }

    /// Stop handing out connections; pending and future acquires fail.
    pub fn close(&self) {
        self.inner.permits.close();
    }
}

/// A connection checked out of the pool.
///
/// Exclusive to its holder; returned to the pool (and one waiter woken) on
/// drop.
pub struct PooledConnection<M: ConnectionManager> {
    pool: Arc<PoolInner<M>>,
    conn: Option<M::Connection>,
    last_used: Instant,
    // Declared last: the slot is back in the list before the waiter wakes.
    _permit: OwnedSemaphorePermit,
}

impl<M: ConnectionManager> PooledConnection<M> {
    async fn ensure_live(&mut self) -> Result<(), PoolError> {
        if self.conn.as_ref().is_some_and(|conn| self.pool.manager.is_broken(conn)) {
            tracing::warn!("Pooled connection closed by the server, replacing");
            self.conn = None;
        }

        let stale = self.last_used.elapsed() >= self.pool.freshness;

        if stale {
            if let Some(conn) = self.conn.as_mut() {
                if let Err(e) = self.pool.manager.validate(conn).await {
                    tracing::warn!(error = %e, "Stale connection failed validation, replacing");
                    self.conn = None;
                }
            }
        }

        if self.conn.is_none() {
            metrics::record_pool_replacement();
            match self.pool.manager.connect().await {
                Ok(conn) => self.conn = Some(conn),
                Err(e) => {
                    tracing::error!(error = %e, "Replacement connection failed");
                    return Err(PoolError::Unavailable(e.to_string()));
                }
            }
        }

        self.last_used = Instant::now();
        Ok(())
    }

    /// Drop the underlying connection instead of returning it. The slot
    /// goes back empty and is reconnected by the next acquirer.
    pub fn discard(mut self) {
        self.conn = None;
    }
}

impl<M: ConnectionManager> std::ops::Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("checked-out connection is always live")
    }
}

impl<M: ConnectionManager> std::ops::DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("checked-out connection is always live")
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        let last_used = if self.conn.is_some() {
            Instant::now()
        } else {
            self.last_used
        };
        self.pool.put_back(Slot {
            conn: self.conn.take(),
            last_used,
        });
        tracing::trace!("Connection returned to pool");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct MockConn {
        id: usize,
    }

    #[derive(Default)]
    struct MockManager {
        next_id: AtomicUsize,
        validations: AtomicUsize,
        fail_connect: AtomicBool,
        // Connections with an id below this fail validation.
        dead_below: AtomicUsize,
        // Connections with an id below this report themselves closed.
        closed_below: AtomicUsize,
    }

    impl MockManager {
        fn connects(&self) -> usize {
            self.next_id.load(Ordering::SeqCst)
        }

        fn kill_existing(&self) {
            self.dead_below.store(self.next_id.load(Ordering::SeqCst), Ordering::SeqCst);
        }

        fn close_existing(&self) {
            self.closed_below.store(self.next_id.load(Ordering::SeqCst), Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ConnectionManager for Arc<MockManager> {
        type Connection = MockConn;

        async fn connect(&self) -> Result<MockConn, PoolError> {
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(PoolError::Connect("connection refused".into()));
            }
            Ok(MockConn {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
            })
        }

        async fn validate(&self, conn: &mut MockConn) -> Result<(), PoolError> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            if conn.id < self.dead_below.load(Ordering::SeqCst) {
                Err(PoolError::Validation("server closed the connection".into()))
            } else {
                Ok(())
            }
        }

        fn is_broken(&self, conn: &MockConn) -> bool {
            conn.id < self.closed_below.load(Ordering::SeqCst)
        }
    }

    async fn pool(size: usize) -> (Pool<Arc<MockManager>>, Arc<MockManager>) {
        let manager = Arc::new(MockManager::default());
        let pool = Pool::new(Arc::clone(&manager), size, Duration::from_secs(60))
            .await
            .unwrap();
        (pool, manager)
    }

    #[tokio::test]
    async fn construction_opens_every_connection() {
        let (pool, manager) = pool(4).await;
        assert_eq!(manager.connects(), 4);
        assert_eq!(pool.status(), PoolStatus { size: 4, available: 4 });
    }

    #[tokio::test]
    async fn construction_failure_is_fatal() {
        let manager = Arc::new(MockManager::default());
        manager.fail_connect.store(true, Ordering::SeqCst);
        let result = Pool::new(manager, 2, Duration::from_secs(60)).await;
        assert!(matches!(result, Err(PoolError::Connect(_))));
    }

    #[tokio::test]
    async fn concurrent_holders_never_share_a_connection() {
        let (pool, _) = pool(3).await;
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();

        let ids: HashSet<usize> = [a.id, b.id, c.id].into_iter().collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(pool.status().available, 0);
    }

    #[tokio::test]
    async fn extra_acquirer_waits_for_release() {
        let (pool, _) = pool(2).await;
        let first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|c| c.id) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished(), "third acquire must block while both are held");

        let released_id = first.id;
        pool.release(first);

        let got = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake after release")
            .unwrap()
            .unwrap();
        assert_eq!(got, released_id);
    }

    #[tokio::test]
    async fn many_tasks_share_a_small_pool() {
        let (pool, manager) = pool(2).await;
        let in_use = Arc::new(Mutex::new(HashSet::new()));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let pool = pool.clone();
                let in_use = Arc::clone(&in_use);
                tokio::spawn(async move {
                    let conn = pool.acquire().await.unwrap();
                    assert!(in_use.lock().unwrap().insert(conn.id), "connection handed out twice");
                    tokio::task::yield_now().await;
                    in_use.lock().unwrap().remove(&conn.id);
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(manager.connects(), 2);
        assert_eq!(pool.status().available, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_connections_skip_validation() {
        let (pool, manager) = pool(1).await;
        drop(pool.acquire().await.unwrap());
        tokio::time::advance(Duration::from_secs(30)).await;
        drop(pool.acquire().await.unwrap());
        assert_eq!(manager.validations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_dead_connection_is_replaced() {
        let (pool, manager) = pool(1).await;
        manager.kill_existing();
        tokio::time::advance(Duration::from_secs(61)).await;

        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.id, 1, "replacement connection expected");
        assert_eq!(manager.validations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_connection_is_replaced_under_steady_use() {
        let (pool, manager) = pool(1).await;
        manager.close_existing();

        let mut handed_out = Vec::new();
        for _ in 0..10 {
            tokio::time::advance(Duration::from_secs(30)).await;
            handed_out.push(pool.acquire().await.unwrap().id);
        }

        assert!(handed_out.iter().all(|id| *id == 1), "closed connection reused: {handed_out:?}");
        assert_eq!(manager.connects(), 2);
        assert_eq!(manager.validations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_replacement_keeps_capacity() {
        let (pool, manager) = pool(1).await;
        manager.kill_existing();
        manager.fail_connect.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(61)).await;

        let err = pool.acquire().await.err().unwrap();
        assert!(matches!(err, PoolError::Unavailable(_)));
        assert_eq!(pool.status().available, 1, "slot must not leak");

        manager.fail_connect.store(false, Ordering::SeqCst);
        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.id, 1);
    }

    #[tokio::test]
    async fn discarded_connection_is_reopened_lazily() {
        let (pool, manager) = pool(1).await;
        pool.acquire().await.unwrap().discard();
        assert_eq!(manager.connects(), 1);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.id, 1);
        assert_eq!(manager.connects(), 2);
    }

    #[tokio::test]
    async fn closed_pool_rejects_acquire() {
        let (pool, _) = pool(1).await;
        let _held = pool.acquire().await.unwrap();
        pool.close();
        assert!(matches!(pool.acquire().await.err(), Some(PoolError::Closed)));
    }
}
