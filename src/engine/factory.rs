//! Deferred pool construction.
//!
//! Registering a source must not touch the network, so the pool is built
//! the first time a connection is requested. Bad credentials therefore
//! surface on first use rather than at registration.

use crate::engine::pool::{ConnectionPool, PoolPolicy, PoolStats, PooledConnection};
use crate::engine::ConnectionManager;
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use tracing::debug;

type PoolInit<M> = Box<dyn Fn() -> ConnectionPool<M> + Send + Sync>;

/// Builds its pool on first use; at most one pool per factory.
pub struct PooledConnectionFactory<M: ConnectionManager> {
    init: PoolInit<M>,
    pool: OnceLock<ConnectionPool<M>>,
    closed: AtomicBool,
}

impl<M: ConnectionManager> PooledConnectionFactory<M> {
    /// `init` must be side-effect free; it runs at most once.
    pub fn new(init: impl Fn() -> ConnectionPool<M> + Send + Sync + 'static) -> Self {
        Self {
            init: Box::new(init),
            pool: OnceLock::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Factory whose pool wraps a manager produced by `make_manager`
    pub fn with_manager(
        make_manager: impl Fn() -> M + Send + Sync + 'static,
        policy: PoolPolicy,
    ) -> Self {
        Self::new(move || ConnectionPool::new(make_manager(), policy.clone()))
    }

    /// The pool, building it if this is the first request
    pub fn pool(&self) -> Result<&ConnectionPool<M>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }
        let pool = self.pool.get_or_init(|| {
            debug!("building connection pool on first use");
            (self.init)()
        });
        // close() may have run while we were initializing
        if self.closed.load(Ordering::Acquire) {
            pool.close();
            return Err(Error::PoolClosed);
        }
        Ok(pool)
    }

    /// Borrow a connection from the (lazily built) pool
    pub async fn acquire(&self) -> Result<PooledConnection<M>> {
        self.pool()?.acquire().await
    }

    pub fn is_initialized(&self) -> bool {
        self.pool.get().is_some()
    }

    /// Stats of the pool, if it has been built
    pub fn stats(&self) -> Option<PoolStats> {
        self.pool.get().map(ConnectionPool::stats)
    }

    /// Tear down the pool. Safe to call repeatedly.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pool) = self.pool.get() {
            pool.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<M: ConnectionManager> Drop for PooledConnectionFactory<M> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::MockManager;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counting_factory() -> (Arc<AtomicUsize>, PooledConnectionFactory<MockManager>) {
        let builds = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&builds);
        let factory = PooledConnectionFactory::with_manager(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                MockManager::default()
            },
            PoolPolicy::default(),
        );
        (builds, factory)
    }

    #[test]
    fn construction_is_deferred() {
        let (builds, factory) = counting_factory();
        assert!(!factory.is_initialized());
        assert_eq!(builds.load(Ordering::SeqCst), 0);
        assert!(factory.stats().is_none());
    }

    #[test]
    fn concurrent_first_use_builds_one_pool() {
        let (builds, factory) = counting_factory();
        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| factory.pool().map(|_| ()).unwrap());
            }
        });
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn acquire_builds_and_borrows() {
        let (builds, factory) = counting_factory();
        let lease = factory.acquire().await.unwrap();
        assert_eq!(lease.id, 0);
        drop(lease);
        factory.acquire().await.unwrap();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(factory.stats().unwrap().acquisitions, 2);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (_, factory) = counting_factory();
        drop(factory.acquire().await.unwrap());

        factory.close();
        factory.close();

        assert!(factory.is_closed());
        assert_eq!(factory.stats().unwrap().idle, 0);
        assert!(matches!(factory.acquire().await, Err(Error::PoolClosed)));
    }

    #[test]
    fn close_before_use_never_builds() {
        let (builds, factory) = counting_factory();
        factory.close();
        assert!(matches!(factory.pool(), Err(Error::PoolClosed)));
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }
}
