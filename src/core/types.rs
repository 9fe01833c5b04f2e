use serde::{Deserialize, Serialize};

use super::{Result, StoreError, Value};

pub type Row = Vec<Value>;

/// The member entity: unique id plus current balance.
///
/// The id is immutable once the row exists; the balance is mutated through
/// `MemberStore::update`. No lower bound is enforced on the balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub balance: i64,
}

impl Member {
    pub fn new(id: impl Into<String>, balance: i64) -> Self {
        Self {
            id: id.into(),
            balance,
        }
    }

    /// Decode a driver row shaped `[member_id: Text, money: Integer]`.
    pub fn from_row(row: &Row) -> Result<Self> {
        if row.len() != 2 {
            return Err(StoreError::ConnectionFailure(format!(
                "malformed member row: expected 2 columns, got {}",
                row.len()
            )));
        }
        Ok(Self {
            id: row[0].as_text()?.to_string(),
            balance: row[1].as_integer()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_row() {
        let row = vec![Value::Text("memberA".into()), Value::Integer(10000)];
        let member = Member::from_row(&row).unwrap();
        assert_eq!(member.id, "memberA");
        assert_eq!(member.balance, 10000);
    }

    #[test]
    fn test_from_row_wrong_width() {
        let row = vec![Value::Text("memberA".into())];
        assert!(Member::from_row(&row).is_err());
    }

    #[test]
    fn test_from_row_wrong_types() {
        let row = vec![Value::Integer(1), Value::Integer(10000)];
        assert!(Member::from_row(&row).is_err());
    }
}
