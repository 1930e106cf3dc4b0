use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use replicator_types::{Endpoint, Metrics, Position, ReplicatorError, Result, Task, TaskStatus};

use crate::TaskRepository;

/// Backs the CLI's file-driven mode and tests: endpoints and tasks are
/// loaded once from a `ReplicatorConfig` and mutated in place, never
/// persisted back to disk.
pub struct InMemoryTaskRepository {
    tasks: Mutex<HashMap<String, Task>>,
    endpoints: Mutex<HashMap<String, Endpoint>>,
}

impl InMemoryTaskRepository {
    pub fn new(tasks: Vec<Task>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            tasks: Mutex::new(tasks.into_iter().map(|t| (t.id.clone(), t)).collect()),
            endpoints: Mutex::new(endpoints.into_iter().map(|e| (e.id.clone(), e)).collect()),
        }
    }

    /// Snapshot of the current task row, for tests asserting on final state.
    pub fn snapshot_task(&self, id: &str) -> Option<Task> {
        self.tasks.lock().get(id).cloned()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn load_task(&self, id: &str) -> Result<Task> {
        self.tasks
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ReplicatorError::ConfigError(format!("no such task {id}")))
    }

    async fn load_endpoint(&self, id: &str) -> Result<Endpoint> {
        self.endpoints
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ReplicatorError::ConfigError(format!("no such endpoint {id}")))
    }

    async fn save_status(&self, task_id: &str, status: TaskStatus) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| ReplicatorError::ConfigError(format!("no such task {task_id}")))?;
        task.status = status;
        Ok(())
    }

    async fn save_position_and_metrics(&self, task_id: &str, position: &Position, metrics: &Metrics) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| ReplicatorError::ConfigError(format!("no such task {task_id}")))?;
        task.last_position = position.clone();
        task.metrics = metrics.clone();
        Ok(())
    }

    async fn clear_initial_load(&self, task_id: &str) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| ReplicatorError::ConfigError(format!("no such task {task_id}")))?;
        task.initial_load = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replicator_types::{EndpointKind, Role, TableSpec};

    fn sample_task() -> Task {
        Task {
            id: "t1".into(),
            name: "orders".into(),
            source_endpoint_id: "src".into(),
            target_endpoint_id: "dst".into(),
            tables: vec![TableSpec { schema: "HR".into(), table: "ORDERS".into() }],
            initial_load: true,
            create_tables: true,
            merge_enabled: false,
            last_position: Position::null(),
            status: TaskStatus::Pending,
            metrics: Metrics::default(),
            running_task_id: None,
        }
    }

    fn sample_endpoint(id: &str, role: Role) -> Endpoint {
        Endpoint {
            id: id.into(),
            kind: EndpointKind::Oracle,
            role,
            host: "db".into(),
            port: 1521,
            database: None,
            service_name: Some("orcl".into()),
            username: "u".into(),
            password: "p".into(),
            target_schema: None,
        }
    }

    #[tokio::test]
    async fn save_position_and_metrics_updates_both_together() {
        let repo = InMemoryTaskRepository::new(
            vec![sample_task()],
            vec![sample_endpoint("src", Role::Source), sample_endpoint("dst", Role::Target)],
        );
        let mut metrics = Metrics::default();
        metrics.inserts = 5;
        repo.save_position_and_metrics("t1", &Position::from_scn(42), &metrics)
            .await
            .unwrap();

        let task = repo.load_task("t1").await.unwrap();
        assert_eq!(task.last_position.scn(), Some(42));
        assert_eq!(task.metrics.inserts, 5);
    }

    #[tokio::test]
    async fn unknown_task_errors() {
        let repo = InMemoryTaskRepository::new(vec![], vec![]);
        assert!(repo.load_task("missing").await.is_err());
    }
}
