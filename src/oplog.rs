use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

/// The three client operations a replica records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Check,
    Borrow,
    Return,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpKind::Check => "CHECK",
            OpKind::Borrow => "BORROW",
            OpKind::Return => "RETURN",
        })
    }
}

/// Who did what to which item, stamped with the vector clock at execution
/// time. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    pub username: String,
    pub kind: OpKind,
    pub item: String,
    pub clock: Vec<u64>,
}

/// Append-only, in-memory, per-replica sequence of executed operations,
/// ordered by append time. No compaction, persistence, or lookup.
#[derive(Debug, Default)]
pub struct OperationLog {
    records: Vec<OperationRecord>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: OperationRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    /// Emits every record as a JSON line through the diagnostic output.
    pub fn dump(&self) {
        info!(records = self.records.len(), "operation log dump");
        for record in &self.records {
            match serde_json::to_string(record) {
                Ok(line) => info!("{line}"),
                Err(error) => warn!(%error, "failed to encode operation record"),
            }
        }
    }
}
