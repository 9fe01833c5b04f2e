pub mod memory;

pub use memory::MemoryDriver;

use crate::core::{Result, Row, Value};

/// Factory for live links to the backing store.
///
/// Any relational driver that can run parameterized statements against the
/// `member` relation can sit behind this seam. Opening a session fails with
/// `ConnectionFailure` when the store is unreachable.
pub trait Driver: Send + Sync {
    fn open(&self) -> Result<Box<dyn Session>>;
}

/// One live session with the store.
///
/// Semantics follow the usual relational-driver contract:
/// - with auto-commit on (the initial state), every statement takes effect
///   immediately;
/// - with auto-commit off, writes are part of an open transaction that ends
///   with `commit` or `rollback`; turning auto-commit back on commits any
///   in-flight work;
/// - `commit`/`rollback` outside of manual-commit mode is an error;
/// - `close` discards uncommitted work and renders the session unusable.
pub trait Session: Send {
    /// Run a statement that returns no rows. Returns the affected row count.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Run a statement that returns rows.
    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}
