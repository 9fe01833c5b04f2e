use std::sync::Arc;

use tracing::{debug, warn};

use crate::connection::provider::ConnectionProvider;
use crate::connection::Connection;
use crate::core::Result;

/// Runs a unit of work on one connection with one atomic outcome.
///
/// The coordinator owns the connection for the whole span: it binds one,
/// disables auto-commit, hands the connection to the work closure so every
/// store call inside routes through it, then commits or rolls back depending
/// on how the closure returns. The work never sees a different connection
/// and never closes the one it was given.
pub struct TransactionCoordinator {
    provider: Arc<dyn ConnectionProvider>,
}

impl TransactionCoordinator {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    /// Execute `work` inside a transaction.
    ///
    /// On success the transaction is committed and the closure's value
    /// returned. On any error, from the closure or from the commit itself,
    /// the transaction is rolled back and the original error re-raised;
    /// rollback and auto-commit-restore failures are logged, never allowed
    /// to replace it. The connection goes back to the provider on every
    /// path, exactly once, via the lease.
    pub fn run_in_transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut lease = self.provider.acquire()?;
        lease.set_auto_commit(false)?;
        debug!(conn = lease.id(), "unit of work started");

        let outcome = work(&mut lease).and_then(|value| lease.commit().map(|_| value));

        match outcome {
            Ok(value) => {
                Self::restore_auto_commit(&mut lease);
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = lease.rollback() {
                    warn!(
                        conn = lease.id(),
                        error = %rollback_err,
                        "rollback of aborted unit of work failed"
                    );
                }
                Self::restore_auto_commit(&mut lease);
                Err(err)
            }
        }
    }

    /// Put the connection back into per-statement commit mode before it
    /// returns to the provider. A failure here is subordinate to whatever
    /// the unit of work produced, so it is only logged.
    fn restore_auto_commit(conn: &mut Connection) {
        if let Err(err) = conn.set_auto_commit(true) {
            warn!(conn = conn.id(), error = %err, "restoring auto-commit failed");
        }
    }
}
