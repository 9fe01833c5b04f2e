// ============================================================================
// MemberDB Library
// ============================================================================
//
// Layered data access for a single member relation: a driver seam any
// parameterized-statement store can plug into, a bounded connection pool,
// a CRUD store that works with pooled or caller-supplied connections, an
// explicit unit-of-work transaction coordinator, and an atomic
// account-transfer service on top.

pub mod connection;
pub mod core;
pub mod driver;
pub mod service;
pub mod store;
pub mod transaction;

// Re-export the main types for convenience
pub use crate::connection::config::ConnectionConfig;
pub use crate::connection::pool::{ConnectionPool, PoolStats};
pub use crate::connection::provider::{ConnectionLease, ConnectionProvider, DriverProvider};
pub use crate::connection::Connection;
pub use crate::core::{Member, Result, Row, StoreError, Value};
pub use crate::driver::{Driver, MemoryDriver, Session};
pub use crate::service::{ReservedIdPolicy, TransferPolicy, TransferService};
pub use crate::store::MemberStore;
pub use crate::transaction::TransactionCoordinator;
