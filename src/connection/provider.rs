use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::pool::PoolInner;
use super::Connection;
use crate::core::Result;
use crate::driver::Driver;

/// Supplies ready-to-use connections.
///
/// Implemented by `ConnectionPool` (bounded reuse) and `DriverProvider`
/// (fresh connection per call). Release is not a method: the returned lease
/// gives the connection back when dropped, so release-exactly-once holds on
/// every exit path, including early errors.
pub trait ConnectionProvider: Send + Sync {
    fn acquire(&self) -> Result<ConnectionLease>;
}

/// Scoped ownership of one connection.
///
/// Derefs to `Connection`. On drop the connection goes home: back into the
/// pool it came from, or closed if it was a dedicated one. A connection
/// dropped while still in manual-commit mode is rolled back first; failures
/// on that path are logged, never raised.
pub struct ConnectionLease {
    connection: Option<Connection>,
    home: Option<Arc<PoolInner>>,
}

impl ConnectionLease {
    pub(crate) fn unpooled(connection: Connection) -> Self {
        Self {
            connection: Some(connection),
            home: None,
        }
    }

    pub(crate) fn pooled(connection: Connection, home: Arc<PoolInner>) -> Self {
        Self {
            connection: Some(connection),
            home: Some(home),
        }
    }
}

impl std::fmt::Debug for ConnectionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLease")
            .field("connection", &self.connection.as_ref().map(|c| c.id()))
            .field("pooled", &self.home.is_some())
            .finish()
    }
}

impl Deref for ConnectionLease {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.connection
            .as_ref()
            .expect("connection already returned to its provider")
    }
}

impl DerefMut for ConnectionLease {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection
            .as_mut()
            .expect("connection already returned to its provider")
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        if connection.is_in_transaction() {
            warn!(
                conn = connection.id(),
                "connection released while still in a transaction; rolling back"
            );
            if let Err(err) = connection.rollback() {
                warn!(conn = connection.id(), error = %err, "rollback on release failed");
            }
            if let Err(err) = connection.set_auto_commit(true) {
                warn!(conn = connection.id(), error = %err, "restoring auto-commit on release failed");
            }
        }

        match &self.home {
            Some(pool) => pool.give_back(connection),
            None => {
                if let Err(err) = connection.close() {
                    warn!(conn = connection.id(), error = %err, "closing released connection failed");
                }
            }
        }
    }
}

/// Connection provider without pooling.
///
/// Opens a fresh driver session on every acquire; the lease closes it on
/// drop. The simplest provider, useful for tests and one-off tooling where
/// pool behavior would only get in the way.
pub struct DriverProvider {
    driver: Arc<dyn Driver>,
    next_id: AtomicU64,
}

impl DriverProvider {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            next_id: AtomicU64::new(1),
        }
    }
}

impl ConnectionProvider for DriverProvider {
    fn acquire(&self) -> Result<ConnectionLease> {
        let session = self.driver.open()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        debug!(conn = id, "opened dedicated connection");
        Ok(ConnectionLease::unpooled(Connection::new(id, session)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::driver::MemoryDriver;

    #[test]
    fn test_driver_provider_hands_out_distinct_connections() {
        let provider = DriverProvider::new(Arc::new(MemoryDriver::new()));

        let first = provider.acquire().unwrap();
        let second = provider.acquire().unwrap();
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_lease_drop_discards_uncommitted_work() {
        let driver = MemoryDriver::new();
        let provider = DriverProvider::new(Arc::new(driver.clone()));

        {
            let mut lease = provider.acquire().unwrap();
            lease.set_auto_commit(false).unwrap();
            lease
                .execute(
                    "insert into member (member_id, money) values (?, ?)",
                    &[Value::from("memberA"), Value::from(10000)],
                )
                .unwrap();
            // Dropped without commit: the lease rolls back on release.
        }

        assert_eq!(driver.row_count().unwrap(), 0);
    }
}
