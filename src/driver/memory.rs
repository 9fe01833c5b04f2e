use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{Driver, Session};
use crate::core::{Result, Row, StoreError, Value};

/// In-process driver for the `member` relation.
///
/// Stands in for a networked relational store: every opened session shares
/// the same table state, statements are parameterized, and a session with
/// auto-commit disabled stages its writes until `commit`. Cloning the driver
/// clones the handle, not the data.
#[derive(Default, Clone)]
pub struct MemoryDriver {
    table: Arc<RwLock<HashMap<String, i64>>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed row count, ignoring any in-flight session writes.
    pub fn row_count(&self) -> Result<usize> {
        Ok(self.table.read()?.len())
    }
}

impl Driver for MemoryDriver {
    fn open(&self) -> Result<Box<dyn Session>> {
        Ok(Box::new(MemorySession {
            table: Arc::clone(&self.table),
            auto_commit: true,
            pending: Vec::new(),
            closed: false,
        }))
    }
}

enum WriteOp {
    Insert { id: String, balance: i64 },
    Update { id: String, balance: i64 },
    Delete { id: String },
}

struct MemorySession {
    table: Arc<RwLock<HashMap<String, i64>>>,
    auto_commit: bool,
    pending: Vec<WriteOp>,
    closed: bool,
}

impl MemorySession {
    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(StoreError::ConnectionFailure("session is closed".into()));
        }
        Ok(())
    }

    /// Row as this session sees it: committed state with the session's own
    /// staged writes replayed on top, in program order.
    fn effective_get(&self, table: &HashMap<String, i64>, id: &str) -> Option<i64> {
        let mut current = table.get(id).copied();
        for op in &self.pending {
            match op {
                WriteOp::Insert { id: op_id, balance } if op_id == id => {
                    current = Some(*balance);
                }
                WriteOp::Update { id: op_id, balance } if op_id == id => {
                    current = Some(*balance);
                }
                WriteOp::Delete { id: op_id } if op_id == id => {
                    current = None;
                }
                _ => {}
            }
        }
        current
    }

    /// Apply all staged writes under one write lock.
    ///
    /// The batch is replayed onto an overlay first and the table is only
    /// touched once the whole replay succeeds, so a failed commit leaves the
    /// committed state untouched and the staged writes in place for rollback.
    fn apply_pending(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let mut table = self.table.write()?;
        let mut overlay: HashMap<String, Option<i64>> = HashMap::new();

        for op in &self.pending {
            match op {
                WriteOp::Insert { id, balance } => {
                    let current = overlay
                        .get(id)
                        .copied()
                        .unwrap_or_else(|| table.get(id).copied());
                    if current.is_some() {
                        return Err(StoreError::Duplicate(id.clone()));
                    }
                    overlay.insert(id.clone(), Some(*balance));
                }
                WriteOp::Update { id, balance } => {
                    let current = overlay
                        .get(id)
                        .copied()
                        .unwrap_or_else(|| table.get(id).copied());
                    if current.is_some() {
                        overlay.insert(id.clone(), Some(*balance));
                    }
                }
                WriteOp::Delete { id } => {
                    overlay.insert(id.clone(), None);
                }
            }
        }

        for (id, value) in overlay {
            match value {
                Some(balance) => {
                    table.insert(id, balance);
                }
                None => {
                    table.remove(&id);
                }
            }
        }

        self.pending.clear();
        Ok(())
    }

    fn param_text<'a>(params: &'a [Value], index: usize) -> Result<&'a str> {
        params
            .get(index)
            .ok_or_else(|| StoreError::ConnectionFailure("missing statement parameter".into()))?
            .as_text()
    }

    fn param_integer(params: &[Value], index: usize) -> Result<i64> {
        params
            .get(index)
            .ok_or_else(|| StoreError::ConnectionFailure("missing statement parameter".into()))?
            .as_integer()
    }
}

impl Session for MemorySession {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.ensure_open()?;
        let verb = sql
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();

        match verb.as_str() {
            "insert" => {
                let id = Self::param_text(params, 0)?.to_string();
                let balance = Self::param_integer(params, 1)?;

                {
                    let table = self.table.read()?;
                    if self.effective_get(&table, &id).is_some() {
                        return Err(StoreError::Duplicate(id));
                    }
                }

                if self.auto_commit {
                    self.table.write()?.insert(id, balance);
                } else {
                    self.pending.push(WriteOp::Insert { id, balance });
                }
                Ok(1)
            }
            "update" => {
                let balance = Self::param_integer(params, 0)?;
                let id = Self::param_text(params, 1)?.to_string();

                {
                    let table = self.table.read()?;
                    if self.effective_get(&table, &id).is_none() {
                        return Ok(0);
                    }
                }

                if self.auto_commit {
                    self.table.write()?.insert(id, balance);
                } else {
                    self.pending.push(WriteOp::Update { id, balance });
                }
                Ok(1)
            }
            "delete" => {
                let id = Self::param_text(params, 0)?.to_string();

                {
                    let table = self.table.read()?;
                    if self.effective_get(&table, &id).is_none() {
                        return Ok(0);
                    }
                }

                if self.auto_commit {
                    self.table.write()?.remove(&id);
                } else {
                    self.pending.push(WriteOp::Delete { id });
                }
                Ok(1)
            }
            _ => Err(StoreError::ConnectionFailure(format!(
                "unsupported statement: {}",
                sql
            ))),
        }
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.ensure_open()?;
        let verb = sql
            .trim()
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        if verb != "select" {
            return Err(StoreError::ConnectionFailure(format!(
                "unsupported query: {}",
                sql
            )));
        }

        let id = Self::param_text(params, 0)?;
        let table = self.table.read()?;
        Ok(match self.effective_get(&table, id) {
            Some(balance) => vec![vec![
                Value::Text(id.to_string()),
                Value::Integer(balance),
            ]],
            None => Vec::new(),
        })
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        self.ensure_open()?;
        if auto_commit && !self.auto_commit {
            // Re-enabling auto-commit commits in-flight work, as relational
            // drivers do.
            self.apply_pending()?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.auto_commit {
            return Err(StoreError::ConnectionFailure(
                "commit outside of a transaction".into(),
            ));
        }
        self.apply_pending()
    }

    fn rollback(&mut self) -> Result<()> {
        self.ensure_open()?;
        if self.auto_commit {
            return Err(StoreError::ConnectionFailure(
                "rollback outside of a transaction".into(),
            ));
        }
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        // Uncommitted work dies with the session.
        self.pending.clear();
        self.closed = true;
        Ok(())
    }
}
