use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::position::Position;

/// Row data keyed by column name, in source column-name spelling.
pub type RowData = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

/// A single captured change, as produced by a source connector's tail and
/// consumed by a target connector's `apply_changes`.
///
/// Invariant: events within one batch returned by `get_changes` are ordered
/// by `position` ascending; `position` is non-decreasing across batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub operation: Operation,
    pub schema: String,
    pub table: String,
    pub position: Position,
    pub timestamp: DateTime<Utc>,
    /// Required for `update`/`delete`; keyed by PK column name.
    pub primary_keys: RowData,
    /// Populated for `delete` (and optionally `update`).
    pub before_data: Option<RowData>,
    /// Populated for `insert`/`update`.
    pub after_data: Option<RowData>,
}

impl ChangeEvent {
    pub fn has_required_fields(&self) -> bool {
        match self.operation {
            Operation::Insert => self.after_data.is_some(),
            Operation::Update | Operation::Delete => !self.primary_keys.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(op: Operation) -> ChangeEvent {
        ChangeEvent {
            operation: op,
            schema: "HR".into(),
            table: "EMPLOYEES".into(),
            position: Position::from_scn(1000),
            timestamp: Utc::now(),
            primary_keys: BTreeMap::new(),
            before_data: None,
            after_data: None,
        }
    }

    #[test]
    fn insert_requires_after_data() {
        let mut event = sample_event(Operation::Insert);
        assert!(!event.has_required_fields());
        event.after_data = Some(BTreeMap::new());
        assert!(event.has_required_fields());
    }

    #[test]
    fn update_and_delete_require_primary_keys() {
        let mut event = sample_event(Operation::Delete);
        assert!(!event.has_required_fields());
        event.primary_keys.insert("ID".into(), Value::from(1));
        assert!(event.has_required_fields());
    }
}
