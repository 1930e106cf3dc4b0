use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    Oracle,
    Postgres,
    Mysql,
    Bigquery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Source,
    Target,
}

/// An immutable-per-run connection descriptor. Endpoints are read-only from
/// the core's perspective; mutation (via the HTTP/UI layer) is out of
/// scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub kind: EndpointKind,
    pub role: Role,
    pub host: String,
    pub port: u16,
    pub database: Option<String>,
    pub service_name: Option<String>,
    pub username: String,
    pub password: String,
    /// Only meaningful for `role == Target`: where created objects land.
    pub target_schema: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub schema: String,
    pub table: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Stopped,
    Failed,
    Completed,
    Pending,
    Running,
    Stopping,
}

impl TaskStatus {
    /// `pending|running|stopping`: a second execution must not start while
    /// one of these holds (spec §3 invariant, §4.5 reentry guard).
    pub fn is_re_runnable(self) -> bool {
        matches!(
            self,
            TaskStatus::Stopped | TaskStatus::Failed | TaskStatus::Completed
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub bytes_processed: u64,
    pub last_updated_ms: Option<i64>,
    pub latency_ms: Option<i64>,
    pub error: Option<String>,
}

/// A replication unit: source/target endpoint pair, table list and options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub source_endpoint_id: String,
    pub target_endpoint_id: String,
    pub tables: Vec<TableSpec>,
    pub initial_load: bool,
    pub create_tables: bool,
    pub merge_enabled: bool,
    pub last_position: Position,
    pub status: TaskStatus,
    pub metrics: Metrics,
    /// Identifies the current execution attempt; assigned fresh at
    /// submission time and used as the `ControlChannel` key.
    pub running_task_id: Option<String>,
}

impl Task {
    pub fn new_running_task_id() -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminal_statuses_are_re_runnable() {
        assert!(TaskStatus::Stopped.is_re_runnable());
        assert!(TaskStatus::Failed.is_re_runnable());
        assert!(TaskStatus::Completed.is_re_runnable());
        assert!(!TaskStatus::Pending.is_re_runnable());
        assert!(!TaskStatus::Running.is_re_runnable());
        assert!(!TaskStatus::Stopping.is_re_runnable());
    }
}
