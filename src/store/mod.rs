use std::sync::Arc;

use tracing::debug;

use crate::connection::provider::ConnectionProvider;
use crate::connection::Connection;
use crate::core::{Member, Result, StoreError, Value};

/// CRUD access to the member relation.
///
/// Every operation comes in two forms. The plain form draws its own
/// connection from the provider and releases it when done, so single calls
/// stay independent. The `*_with` form runs on a caller-supplied connection
/// and never closes it; that is how a unit of work routes several statements
/// through one connection while the coordinator keeps ownership.
pub struct MemberStore {
    provider: Arc<dyn ConnectionProvider>,
}

impl MemberStore {
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    /// Insert a new member. Fails with `Duplicate` if the id is taken.
    pub fn save(&self, member: &Member) -> Result<Member> {
        let mut lease = self.provider.acquire()?;
        self.save_with(&mut lease, member)
    }

    pub fn save_with(&self, conn: &mut Connection, member: &Member) -> Result<Member> {
        let sql = "insert into member (member_id, money) values (?, ?)";

        conn.execute(
            sql,
            &[Value::from(member.id.clone()), Value::from(member.balance)],
        )?;
        Ok(member.clone())
    }

    /// Look up a member. Zero matching rows is `NotFound`.
    pub fn find_by_id(&self, member_id: &str) -> Result<Member> {
        let mut lease = self.provider.acquire()?;
        self.find_by_id_with(&mut lease, member_id)
    }

    pub fn find_by_id_with(&self, conn: &mut Connection, member_id: &str) -> Result<Member> {
        let sql = "select member_id, money from member where member_id = ?";

        let rows = conn.query(sql, &[Value::from(member_id)])?;
        match rows.first() {
            Some(row) => Member::from_row(row),
            None => Err(StoreError::NotFound(member_id.to_string())),
        }
    }

    /// Unconditionally set a member's balance.
    ///
    /// Any business validation happens before this call. Returns the
    /// affected row count.
    pub fn update(&self, member_id: &str, balance: i64) -> Result<u64> {
        let mut lease = self.provider.acquire()?;
        self.update_with(&mut lease, member_id, balance)
    }

    pub fn update_with(&self, conn: &mut Connection, member_id: &str, balance: i64) -> Result<u64> {
        let sql = "update member set money = ? where member_id = ?";

        let affected = conn.execute(sql, &[Value::from(balance), Value::from(member_id)])?;
        debug!(member_id, rows_affected = affected, "member balance updated");
        Ok(affected)
    }

    pub fn delete(&self, member_id: &str) -> Result<()> {
        let mut lease = self.provider.acquire()?;
        self.delete_with(&mut lease, member_id)
    }

    pub fn delete_with(&self, conn: &mut Connection, member_id: &str) -> Result<()> {
        let sql = "delete from member where member_id = ?";

        conn.execute(sql, &[Value::from(member_id)])?;
        Ok(())
    }
}
