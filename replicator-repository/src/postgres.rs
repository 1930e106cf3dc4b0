use async_trait::async_trait;
use replicator_types::{Endpoint, EndpointKind, Metrics, Position, ReplicatorError, Result, Role, Task, TaskStatus};
use tokio_postgres::{Client, NoTls};

use crate::TaskRepository;

/// Backs the real deployment: tasks and endpoints live in two Postgres
/// tables (`replicator_tasks`, `replicator_endpoints`), with the nested
/// fields (`tables`, `last_position`, `metrics`) stored as `jsonb` rather
/// than normalized further, since the core only ever reads/writes them as
/// whole values.
pub struct PostgresTaskRepository {
    client: Client,
}

impl PostgresTaskRepository {
    pub async fn connect(conn_str: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(|e| ReplicatorError::ConnectError(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "repository connection driver exited");
            }
        });
        Ok(Self { client })
    }
}

fn status_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Stopped => "stopped",
        TaskStatus::Failed => "failed",
        TaskStatus::Completed => "completed",
        TaskStatus::Pending => "pending",
        TaskStatus::Running => "running",
        TaskStatus::Stopping => "stopping",
    }
}

fn status_from_str(s: &str) -> Result<TaskStatus> {
    Ok(match s {
        "stopped" => TaskStatus::Stopped,
        "failed" => TaskStatus::Failed,
        "completed" => TaskStatus::Completed,
        "pending" => TaskStatus::Pending,
        "running" => TaskStatus::Running,
        "stopping" => TaskStatus::Stopping,
        other => return Err(ReplicatorError::ConfigError(format!("unknown task status {other}"))),
    })
}

fn kind_from_str(s: &str) -> Result<EndpointKind> {
    Ok(match s {
        "oracle" => EndpointKind::Oracle,
        "postgres" => EndpointKind::Postgres,
        "mysql" => EndpointKind::Mysql,
        "bigquery" => EndpointKind::Bigquery,
        other => return Err(ReplicatorError::ConfigError(format!("unknown endpoint kind {other}"))),
    })
}

fn role_from_str(s: &str) -> Result<Role> {
    Ok(match s {
        "source" => Role::Source,
        "target" => Role::Target,
        other => return Err(ReplicatorError::ConfigError(format!("unknown endpoint role {other}"))),
    })
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn load_task(&self, id: &str) -> Result<Task> {
        let row = self
            .client
            .query_opt(
                "SELECT id, name, source_endpoint_id, target_endpoint_id, tables, initial_load, \
                        create_tables, merge_enabled, last_position, status, metrics, running_task_id \
                 FROM replicator_tasks WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(|e| ReplicatorError::ConfigError(e.to_string()))?
            .ok_or_else(|| ReplicatorError::ConfigError(format!("no such task {id}")))?;

        let tables: serde_json::Value = row.get("tables");
        let last_position: serde_json::Value = row.get("last_position");
        let metrics: serde_json::Value = row.get("metrics");
        let status: String = row.get("status");

        Ok(Task {
            id: row.get("id"),
            name: row.get("name"),
            source_endpoint_id: row.get("source_endpoint_id"),
            target_endpoint_id: row.get("target_endpoint_id"),
            tables: serde_json::from_value(tables).map_err(|e| ReplicatorError::ConfigError(e.to_string()))?,
            initial_load: row.get("initial_load"),
            create_tables: row.get("create_tables"),
            merge_enabled: row.get("merge_enabled"),
            last_position: Position(last_position),
            status: status_from_str(&status)?,
            metrics: serde_json::from_value(metrics).map_err(|e| ReplicatorError::ConfigError(e.to_string()))?,
            running_task_id: row.get("running_task_id"),
        })
    }

    async fn load_endpoint(&self, id: &str) -> Result<Endpoint> {
        let row = self
            .client
            .query_opt(
                "SELECT id, kind, role, host, port, database, service_name, username, password, target_schema \
                 FROM replicator_endpoints WHERE id = $1",
                &[&id],
            )
            .await
            .map_err(|e| ReplicatorError::ConfigError(e.to_string()))?
            .ok_or_else(|| ReplicatorError::ConfigError(format!("no such endpoint {id}")))?;

        let kind: String = row.get("kind");
        let role: String = row.get("role");
        let port: i32 = row.get("port");

        Ok(Endpoint {
            id: row.get("id"),
            kind: kind_from_str(&kind)?,
            role: role_from_str(&role)?,
            host: row.get("host"),
            port: port as u16,
            database: row.get("database"),
            service_name: row.get("service_name"),
            username: row.get("username"),
            password: row.get("password"),
            target_schema: row.get("target_schema"),
        })
    }

    async fn save_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        self.client
            .execute(
                "UPDATE replicator_tasks SET status = $1 WHERE id = $2",
                &[&status_str(status), &task_id],
            )
            .await
            .map_err(|e| ReplicatorError::ConfigError(e.to_string()))?;
        Ok(())
    }

    async fn save_position_and_metrics(&self, task_id: &str, position: &Position, metrics: &Metrics) -> Result<()> {
        let metrics_json = serde_json::to_value(metrics).map_err(|e| ReplicatorError::ConfigError(e.to_string()))?;
        self.client
            .execute(
                "UPDATE replicator_tasks SET last_position = $1, metrics = $2 WHERE id = $3",
                &[&position.0, &metrics_json, &task_id],
            )
            .await
            .map_err(|e| ReplicatorError::ConfigError(e.to_string()))?;
        Ok(())
    }

    async fn clear_initial_load(&self, task_id: &str) -> Result<()> {
        self.client
            .execute("UPDATE replicator_tasks SET initial_load = false WHERE id = $1", &[&task_id])
            .await
            .map_err(|e| ReplicatorError::ConfigError(e.to_string()))?;
        Ok(())
    }
}
