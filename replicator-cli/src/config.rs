use std::path::Path;

use replicator_types::{Endpoint, EndpointKind, Metrics, Position, Role, TableSpec, Task, TaskStatus};
use serde::Deserialize;

use crate::errors::{CliError, Result};

/// The file-driven mode's config shape: a flat list of endpoints and tasks,
/// the same fields `replicator_tasks`/`replicator_endpoints` carry in
/// `PostgresTaskRepository`, but hand-editable for local runs and demos.
#[derive(Debug, Deserialize)]
pub struct ReplicatorConfig {
    pub endpoints: Vec<EndpointEntry>,
    #[serde(default)]
    pub tasks: Vec<TaskEntry>,
}

#[derive(Debug, Deserialize)]
pub struct EndpointEntry {
    pub id: String,
    pub kind: EndpointKind,
    pub role: Role,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub service_name: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub target_schema: Option<String>,
}

impl From<EndpointEntry> for Endpoint {
    fn from(e: EndpointEntry) -> Self {
        Endpoint {
            id: e.id,
            kind: e.kind,
            role: e.role,
            host: e.host,
            port: e.port,
            database: e.database,
            service_name: e.service_name,
            username: e.username,
            password: e.password,
            target_schema: e.target_schema,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TaskEntry {
    pub id: String,
    pub name: String,
    pub source_endpoint_id: String,
    pub target_endpoint_id: String,
    pub tables: Vec<TableSpec>,
    #[serde(default)]
    pub initial_load: bool,
    #[serde(default)]
    pub create_tables: bool,
    #[serde(default)]
    pub merge_enabled: bool,
}

impl From<TaskEntry> for Task {
    /// A task loaded from a config file has never run: `pending` status, a
    /// null position and a fresh `running_task_id`, mirroring the row a
    /// Control API submission would insert per spec.md §6.
    fn from(t: TaskEntry) -> Self {
        Task {
            id: t.id,
            name: t.name,
            source_endpoint_id: t.source_endpoint_id,
            target_endpoint_id: t.target_endpoint_id,
            tables: t.tables,
            initial_load: t.initial_load,
            create_tables: t.create_tables,
            merge_enabled: t.merge_enabled,
            last_position: Position::null(),
            status: TaskStatus::Pending,
            metrics: Metrics::default(),
            running_task_id: Some(Task::new_running_task_id()),
        }
    }
}

pub fn load_config(path: &Path) -> Result<ReplicatorConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| CliError::ConfigIo(path.to_path_buf(), e))?;
    let config: ReplicatorConfig = serde_yaml::from_str(&raw)?;
    Ok(config)
}
