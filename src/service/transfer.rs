use tracing::debug;

use crate::connection::Connection;
use crate::core::{Member, Result, StoreError};
use crate::store::MemberStore;
use crate::transaction::TransactionCoordinator;

/// Business rule that may abort a transfer mid-flight.
///
/// The destination member is inspected after the debit has been issued, so a
/// rejection here exercises the full rollback path. The concrete predicate
/// is deployment policy, not fixed logic.
pub trait TransferPolicy: Send + Sync {
    fn validate(&self, destination: &Member) -> Result<()>;
}

/// Default policy: reject transfers to one reserved account id.
pub struct ReservedIdPolicy {
    reserved_id: String,
}

impl ReservedIdPolicy {
    pub const DEFAULT_RESERVED_ID: &'static str = "ex";

    pub fn new(reserved_id: impl Into<String>) -> Self {
        Self {
            reserved_id: reserved_id.into(),
        }
    }
}

impl Default for ReservedIdPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RESERVED_ID)
    }
}

impl TransferPolicy for ReservedIdPolicy {
    fn validate(&self, destination: &Member) -> Result<()> {
        if destination.id == self.reserved_id {
            return Err(StoreError::ValidationFailed(format!(
                "transfers to reserved account '{}' are not allowed",
                self.reserved_id
            )));
        }
        Ok(())
    }
}

/// Money transfer between two members, all-or-nothing.
pub struct TransferService {
    coordinator: TransactionCoordinator,
    store: MemberStore,
    policy: Box<dyn TransferPolicy>,
}

impl TransferService {
    pub fn new(coordinator: TransactionCoordinator, store: MemberStore) -> Self {
        Self::with_policy(coordinator, store, Box::new(ReservedIdPolicy::default()))
    }

    pub fn with_policy(
        coordinator: TransactionCoordinator,
        store: MemberStore,
        policy: Box<dyn TransferPolicy>,
    ) -> Self {
        Self {
            coordinator,
            store,
            policy,
        }
    }

    /// Move `amount` from one member to another inside a single unit of
    /// work: both lookups, the debit, the validation and the credit run on
    /// one connection and commit or roll back together. Any error aborts the
    /// whole transfer; retrying is the caller's decision.
    pub fn account_transfer(&self, from_id: &str, to_id: &str, amount: i64) -> Result<()> {
        debug!(from_id, to_id, amount, "account transfer started");
        self.coordinator
            .run_in_transaction(|conn| self.transfer_logic(conn, from_id, to_id, amount))
    }

    fn transfer_logic(
        &self,
        conn: &mut Connection,
        from_id: &str,
        to_id: &str,
        amount: i64,
    ) -> Result<()> {
        let from = self.store.find_by_id_with(conn, from_id)?;
        let to = self.store.find_by_id_with(conn, to_id)?;

        self.store.update_with(conn, from_id, from.balance - amount)?;
        self.policy.validate(&to)?;
        self.store.update_with(conn, to_id, to.balance + amount)?;

        Ok(())
    }
}
