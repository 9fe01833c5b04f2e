pub mod config;
pub mod pool;
pub mod provider;

use tracing::{debug, warn};

use crate::core::{Result, Row, StoreError, Value};
use crate::driver::Session;

/// Data-store connection handle.
///
/// Wraps one driver session and tracks the auto-commit flag and open/closed
/// lifecycle. A connection is exclusively owned by whoever acquired it and
/// must never be shared across threads.
pub struct Connection {
    /// Unique connection ID
    id: u64,
    /// Underlying driver session
    session: Box<dyn Session>,
    /// Per-statement implicit commit; disabled for the span of a unit of work
    auto_commit: bool,
    closed: bool,
}

impl Connection {
    pub(crate) fn new(id: u64, session: Box<dyn Session>) -> Self {
        Self {
            id,
            session,
            auto_commit: true,
            closed: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Run a parameterized statement that returns no rows.
    ///
    /// Returns the affected row count.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_active()?;
        self.session.execute(sql, params)
    }

    /// Run a parameterized statement that returns rows.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.ensure_active()?;
        self.session.query(sql, params)
    }

    /// Toggle per-statement implicit commit.
    ///
    /// Turning auto-commit back on while a transaction is open commits the
    /// in-flight work, as relational drivers do.
    pub fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.ensure_active()?;
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        self.session.set_auto_commit(auto_commit)?;
        self.auto_commit = auto_commit;
        debug!(conn = self.id, auto_commit, "auto-commit toggled");
        Ok(())
    }

    /// Commit the current transaction.
    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.auto_commit {
            return Err(StoreError::ConnectionFailure(
                "commit outside of a transaction".into(),
            ));
        }
        self.session.commit()?;
        debug!(conn = self.id, "transaction committed");
        Ok(())
    }

    /// Roll back the current transaction.
    pub fn rollback(&mut self) -> Result<()> {
        self.ensure_active()?;
        if self.auto_commit {
            return Err(StoreError::ConnectionFailure(
                "rollback outside of a transaction".into(),
            ));
        }
        self.session.rollback()?;
        debug!(conn = self.id, "transaction rolled back");
        Ok(())
    }

    pub fn is_auto_commit(&self) -> bool {
        self.auto_commit
    }

    /// True while auto-commit is disabled on an open connection.
    pub fn is_in_transaction(&self) -> bool {
        !self.closed && !self.auto_commit
    }

    pub fn is_active(&self) -> bool {
        !self.closed
    }

    /// Close the connection, discarding any uncommitted work.
    ///
    /// A failed rollback is logged rather than raised so it cannot prevent
    /// the session itself from being closed.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.is_in_transaction() {
            if let Err(err) = self.session.rollback() {
                warn!(conn = self.id, error = %err, "rollback during close failed");
            }
        }
        self.closed = true;
        self.session
            .close()
            .map_err(|err| StoreError::ResourceReleaseFailure(err.to_string()))
    }

    fn ensure_active(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::ConnectionFailure("connection is closed".into()));
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(conn = self.id, error = %err, "closing connection failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{Driver, MemoryDriver};

    fn open_test_connection() -> Connection {
        let driver = MemoryDriver::new();
        Connection::new(1, driver.open().unwrap())
    }

    #[test]
    fn test_connection_creation() {
        let conn = open_test_connection();
        assert_eq!(conn.id(), 1);
        assert!(conn.is_active());
        assert!(conn.is_auto_commit());
        assert!(!conn.is_in_transaction());
    }

    #[test]
    fn test_transaction_lifecycle() {
        let mut conn = open_test_connection();

        conn.set_auto_commit(false).unwrap();
        assert!(conn.is_in_transaction());

        conn.commit().unwrap();
        conn.set_auto_commit(true).unwrap();
        assert!(!conn.is_in_transaction());
    }

    #[test]
    fn test_commit_requires_transaction() {
        let mut conn = open_test_connection();
        assert!(conn.commit().is_err());
        assert!(conn.rollback().is_err());
    }

    #[test]
    fn test_connection_close() {
        let mut conn = open_test_connection();

        conn.close().unwrap();
        assert!(!conn.is_active());
        assert!(conn
            .query("select member_id, money from member where member_id = ?", &[Value::from("x")])
            .is_err());
    }

    #[test]
    fn test_close_rolls_back_open_transaction() {
        let driver = MemoryDriver::new();
        let mut conn = Connection::new(1, driver.open().unwrap());

        conn.set_auto_commit(false).unwrap();
        conn.execute(
            "insert into member (member_id, money) values (?, ?)",
            &[Value::from("memberA"), Value::from(10000)],
        )
        .unwrap();
        conn.close().unwrap();

        assert_eq!(driver.row_count().unwrap(), 0);
    }
}
