//! Bounded connection pool
//!
//! - Semaphore caps the number of live connections; waiters give up after
//!   the policy's wait budget with [`Error::PoolTimeout`]
//! - Every borrow runs the validation query; failing connections are
//!   dropped and replaced
//! - Leases go back to the idle set on drop, without awaiting
//! - Opening a connection counts against the same wait budget
//! - A connection held by a cancelled acquire is destroyed, never leaked

use crate::engine::ConnectionManager;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

/// Liveness check issued on every borrow
pub const VALIDATION_QUERY: &str = "SELECT 1";

/// Sizing and timing rules for a [`ConnectionPool`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPolicy {
    /// Maximum live connections (idle + leased)
    pub max_total: usize,
    /// Maximum connections kept in the idle set
    pub max_idle: usize,
    /// Connections opened by [`ConnectionPool::warm`]
    pub min_idle: usize,
    /// How long `acquire` waits for a free slot
    pub max_wait: Duration,
    pub validation_query: String,
    pub validation_timeout: Duration,
}

impl Default for PoolPolicy {
    fn default() -> Self {
        Self {
            max_total: 8,
            max_idle: 8,
            min_idle: 0,
            max_wait: Duration::from_millis(60_000),
            validation_query: VALIDATION_QUERY.to_string(),
            validation_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolPolicy {
    pub fn with_max_total(mut self, max_total: usize) -> Self {
        self.max_total = max_total;
        self
    }

    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn with_min_idle(mut self, min_idle: usize) -> Self {
        self.min_idle = min_idle;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }
}

/// Point-in-time pool counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub connections_created: u64,
    pub connections_closed: u64,
    pub acquisitions: u64,
    /// Acquires that ran out of wait budget
    pub timeouts: u64,
    pub validation_failures: u64,
    pub idle: usize,
    pub in_use: usize,
}

#[derive(Debug, Default)]
struct AtomicPoolStats {
    connections_created: AtomicU64,
    connections_closed: AtomicU64,
    acquisitions: AtomicU64,
    timeouts: AtomicU64,
    validation_failures: AtomicU64,
}

impl AtomicPoolStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct PoolInner<M: ConnectionManager> {
    manager: M,
    policy: PoolPolicy,
    /// LIFO; the lock is never held across an await
    idle: Mutex<Vec<M::Connection>>,
    permits: Arc<Semaphore>,
    total: AtomicUsize,
    stats: AtomicPoolStats,
    closed: AtomicBool,
}

impl<M: ConnectionManager> PoolInner<M> {
    async fn check(&self, conn: &mut M::Connection) -> Result<()> {
        let outcome = tokio::time::timeout(
            self.policy.validation_timeout,
            self.manager.validate(conn, &self.policy.validation_query),
        )
        .await;

        let err = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(Error::ValidationQuery { message })) => Error::ValidationQuery { message },
            Ok(Err(other)) => Error::validation_query(other.to_string()),
            Err(_) => Error::validation_query(format!(
                "no answer within {}s",
                self.policy.validation_timeout.as_secs_f64()
            )),
        };
        AtomicPoolStats::bump(&self.stats.validation_failures);
        Err(err)
    }

    async fn open(&self) -> Result<M::Connection> {
        let conn = self.manager.connect().await?;
        self.total.fetch_add(1, Ordering::AcqRel);
        AtomicPoolStats::bump(&self.stats.connections_created);
        debug!(total = self.total.load(Ordering::Acquire), "opened physical connection");
        Ok(conn)
    }

    fn destroy(&self, conn: M::Connection) {
        drop(conn);
        self.total.fetch_sub(1, Ordering::AcqRel);
        AtomicPoolStats::bump(&self.stats.connections_closed);
    }

    fn release(&self, conn: M::Connection) {
        let rejected = {
            let mut idle = self.idle.lock();
            // `closed` only flips under this lock
            if self.closed.load(Ordering::Acquire) || idle.len() >= self.policy.max_idle {
                Some(conn)
            } else {
                idle.push(conn);
                None
            }
        };
        if let Some(conn) = rejected {
            self.destroy(conn);
        }
    }

    fn timed_out(&self, start: Instant) -> Error {
        AtomicPoolStats::bump(&self.stats.timeouts);
        let waited = start.elapsed();
        warn!(
            waited_ms = waited.as_millis() as u64,
            max_total = self.policy.max_total,
            "connection pool exhausted"
        );
        Error::PoolTimeout { waited }
    }
}

/// A counted connection on its way to becoming a lease.
///
/// Dropping it (acquire failed or was cancelled) destroys the connection.
struct Checkout<'a, M: ConnectionManager> {
    pool: &'a PoolInner<M>,
    conn: Option<M::Connection>,
}

impl<'a, M: ConnectionManager> Checkout<'a, M> {
    fn new(pool: &'a PoolInner<M>, conn: M::Connection) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }

    async fn check(&mut self) -> Result<()> {
        let conn = self.conn.as_mut().expect("checkout already consumed");
        self.pool.check(conn).await
    }

    fn into_inner(mut self) -> M::Connection {
        self.conn.take().expect("checkout already consumed")
    }
}

impl<M: ConnectionManager> Drop for Checkout<'_, M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.destroy(conn);
        }
    }
}

/// Bounded set of physical connections shared by concurrent callers.
pub struct ConnectionPool<M: ConnectionManager> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ConnectionManager> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ConnectionManager> ConnectionPool<M> {
    /// Create an empty pool; no connection is opened here.
    pub fn new(manager: M, policy: PoolPolicy) -> Self {
        debug!(
            max_total = policy.max_total,
            max_wait_ms = policy.max_wait.as_millis() as u64,
            "creating connection pool"
        );
        Self {
            inner: Arc::new(PoolInner {
                manager,
                permits: Arc::new(Semaphore::new(policy.max_total)),
                idle: Mutex::new(Vec::with_capacity(policy.max_idle)),
                policy,
                total: AtomicUsize::new(0),
                stats: AtomicPoolStats::default(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn policy(&self) -> &PoolPolicy {
        &self.inner.policy
    }

    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Open connections until `min_idle` are idle.
    pub async fn warm(&self) -> Result<()> {
        let wanted = self.inner.policy.min_idle.min(self.inner.policy.max_idle);
        while self.inner.idle.lock().len() < wanted {
            let Ok(permit) = Arc::clone(&self.inner.permits).try_acquire_owned() else {
                break;
            };
            let conn = self.inner.open().await?;
            self.inner.release(conn);
            drop(permit);
        }
        Ok(())
    }

    /// Borrow a validated connection, waiting at most `max_wait` for a slot.
    pub async fn acquire(&self) -> Result<PooledConnection<M>> {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }

        let start = Instant::now();
        let permit = match tokio::time::timeout(
            inner.policy.max_wait,
            Arc::clone(&inner.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Error::PoolClosed),
            Err(_) => return Err(inner.timed_out(start)),
        };

        loop {
            let candidate = inner.idle.lock().pop();
            let Some(conn) = candidate else { break };
            let mut checkout = Checkout::new(inner, conn);
            match checkout.check().await {
                Ok(()) => return Ok(self.lease(checkout.into_inner(), permit, start)),
                Err(err) => warn!(error = %err, "discarding idle connection"),
            }
        }

        let remaining = inner.policy.max_wait.saturating_sub(start.elapsed());
        let conn = match tokio::time::timeout(remaining, inner.open()).await {
            Ok(conn) => conn?,
            Err(_) => return Err(inner.timed_out(start)),
        };
        let mut checkout = Checkout::new(inner, conn);
        if let Err(err) = checkout.check().await {
            drop(checkout);
            return Err(Error::connectivity_with_source(
                "replacement connection failed validation",
                err,
            ));
        }
        Ok(self.lease(checkout.into_inner(), permit, start))
    }

    fn lease(
        &self,
        conn: M::Connection,
        permit: OwnedSemaphorePermit,
        start: Instant,
    ) -> PooledConnection<M> {
        AtomicPoolStats::bump(&self.inner.stats.acquisitions);
        debug!(waited_ms = start.elapsed().as_millis() as u64, "connection leased");
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        }
    }

    /// Drop idle connections and refuse further acquires. Leases still out
    /// are destroyed when returned. Calling this again does nothing.
    pub fn close(&self) {
        let inner = &self.inner;
        let drained = {
            let mut idle = inner.idle.lock();
            if inner.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            std::mem::take(&mut *idle)
        };
        inner.permits.close();

        let count = drained.len();
        for conn in drained {
            inner.destroy(conn);
        }
        debug!(closed_idle = count, "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        let idle = inner.idle.lock().len();
        let total = inner.total.load(Ordering::Acquire);
        PoolStats {
            connections_created: inner.stats.connections_created.load(Ordering::Relaxed),
            connections_closed: inner.stats.connections_closed.load(Ordering::Relaxed),
            acquisitions: inner.stats.acquisitions.load(Ordering::Relaxed),
            timeouts: inner.stats.timeouts.load(Ordering::Relaxed),
            validation_failures: inner.stats.validation_failures.load(Ordering::Relaxed),
            idle,
            in_use: total.saturating_sub(idle),
        }
    }
}

/// A connection borrowed from the pool; returned when dropped.
pub struct PooledConnection<M: ConnectionManager> {
    conn: Option<M::Connection>,
    pool: Arc<PoolInner<M>>,
    // released after `conn` has been handed back
    _permit: OwnedSemaphorePermit,
}

impl<M: ConnectionManager> PooledConnection<M> {
    /// Destroy the connection instead of returning it
    pub fn discard(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.destroy(conn);
        }
    }
}

impl<M: ConnectionManager> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already returned")
    }
}

impl<M: ConnectionManager> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl<M: ConnectionManager> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
