use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::config::ConnectionConfig;
use super::provider::{ConnectionLease, ConnectionProvider};
use super::Connection;
use crate::core::{Result, StoreError};
use crate::driver::Driver;

/// How long an exhausted acquire sleeps before re-checking the pool.
const RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Bounded connection pool.
///
/// Keeps a deque of idle connections, creates new ones up to the configured
/// maximum, and blocks callers for at most the configured acquisition
/// timeout when exhausted. All acquire/release traffic is safe across
/// threads; an individual connection never is.
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

pub(crate) struct PoolInner {
    config: ConnectionConfig,
    driver: Arc<dyn Driver>,
    /// Idle connections
    available: Mutex<VecDeque<IdleConnection>>,
    /// Total connections in existence, idle or leased
    total_connections: AtomicUsize,
    next_id: AtomicU64,
}

/// An idle connection plus the bookkeeping the sweep needs.
struct IdleConnection {
    connection: Connection,
    created_at: Instant,
    last_used: Instant,
}

impl IdleConnection {
    fn new(connection: Connection) -> Self {
        let now = Instant::now();
        Self {
            connection,
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, max_lifetime: Option<Duration>) -> bool {
        match max_lifetime {
            Some(lifetime) => self.created_at.elapsed() > lifetime,
            None => false,
        }
    }

    fn is_idle_too_long(&self, idle_timeout: Option<Duration>) -> bool {
        match idle_timeout {
            Some(timeout) => self.last_used.elapsed() > timeout,
            None => false,
        }
    }
}

impl ConnectionPool {
    /// Create a pool over the given driver, pre-creating the configured
    /// minimum number of connections.
    pub fn new(config: ConnectionConfig, driver: Arc<dyn Driver>) -> Result<Self> {
        config.validate().map_err(StoreError::ConnectionFailure)?;

        let inner = Arc::new(PoolInner {
            config,
            driver,
            available: Mutex::new(VecDeque::new()),
            total_connections: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        });
        inner.ensure_min_connections()?;

        Ok(Self { inner })
    }

    /// Draw a connection, blocking up to the configured acquisition timeout.
    pub fn acquire(&self) -> Result<ConnectionLease> {
        PoolInner::acquire_lease(&self.inner)
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }
}

impl ConnectionProvider for ConnectionPool {
    fn acquire(&self) -> Result<ConnectionLease> {
        PoolInner::acquire_lease(&self.inner)
    }
}

impl PoolInner {
    fn acquire_lease(inner: &Arc<Self>) -> Result<ConnectionLease> {
        let start = Instant::now();

        loop {
            if let Some(idle) = inner.try_get_available()? {
                return Ok(ConnectionLease::pooled(idle.connection, Arc::clone(inner)));
            }

            if let Some(connection) = inner.try_create_connection()? {
                return Ok(ConnectionLease::pooled(connection, Arc::clone(inner)));
            }

            if start.elapsed() >= inner.config.acquire_timeout {
                return Err(StoreError::ConnectionFailure(
                    "connection pool exhausted: no connection became available within the acquisition timeout".into(),
                ));
            }

            thread::sleep(RETRY_INTERVAL);
        }
    }

    /// Pop an idle connection, discarding any that aged out first.
    fn try_get_available(&self) -> Result<Option<IdleConnection>> {
        let mut available = self.available.lock()?;

        let mut kept = VecDeque::with_capacity(available.len());
        let mut removed = 0usize;
        while let Some(idle) = available.pop_front() {
            if idle.is_expired(self.config.max_lifetime)
                || idle.is_idle_too_long(self.config.idle_timeout)
            {
                removed += 1;
            } else {
                kept.push_back(idle);
            }
        }
        *available = kept;

        if removed > 0 {
            self.total_connections.fetch_sub(removed, Ordering::SeqCst);
            debug!(removed, "discarded aged-out pooled connections");
        }

        Ok(available.pop_front())
    }

    /// Open a new connection if the pool is under its maximum.
    fn try_create_connection(&self) -> Result<Option<Connection>> {
        if self.total_connections.load(Ordering::SeqCst) >= self.config.max_connections {
            return Ok(None);
        }

        let session = self.driver.open()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.total_connections.fetch_add(1, Ordering::SeqCst);
        debug!(conn = id, "created pooled connection");

        Ok(Some(Connection::new(id, session)))
    }

    fn ensure_min_connections(&self) -> Result<()> {
        let mut available = self.available.lock()?;

        while self.total_connections.load(Ordering::SeqCst) < self.config.min_connections {
            let session = self.driver.open()?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            available.push_back(IdleConnection::new(Connection::new(id, session)));
            self.total_connections.fetch_add(1, Ordering::SeqCst);
        }

        Ok(())
    }

    /// Take a connection back from a dropped lease.
    ///
    /// Connections that are closed or still stuck in manual-commit mode are
    /// not recycled; they are discarded and the pool shrinks by one.
    pub(crate) fn give_back(&self, connection: Connection) {
        if !connection.is_active() || connection.is_in_transaction() {
            warn!(
                conn = connection.id(),
                "discarding unusable connection instead of recycling it"
            );
            self.total_connections.fetch_sub(1, Ordering::SeqCst);
            return;
        }

        match self.available.lock() {
            Ok(mut available) => available.push_back(IdleConnection::new(connection)),
            Err(_) => {
                warn!(
                    conn = connection.id(),
                    "pool mutex poisoned; dropping returned connection"
                );
                self.total_connections.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    fn stats(&self) -> PoolStats {
        let available = match self.available.lock() {
            Ok(available) => available.len(),
            Err(_) => 0,
        };
        let total = self.total_connections.load(Ordering::SeqCst);

        PoolStats {
            total_connections: total,
            available_connections: available,
            active_connections: total.saturating_sub(available),
            max_connections: self.config.max_connections,
        }
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub total_connections: usize,
    pub available_connections: usize,
    pub active_connections: usize,
    pub max_connections: usize,
}

impl std::fmt::Display for PoolStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} active, {} available, max {}",
            self.active_connections,
            self.total_connections,
            self.available_connections,
            self.max_connections
        )
    }
}
