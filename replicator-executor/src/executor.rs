use std::sync::Arc;

use replicator_connector::{SchemaConverter, SourceConnector, SourceConnectorRegistry, TargetConnector, TargetConnectorRegistry};
use replicator_control::ControlChannel;
use replicator_repository::TaskRepository;
use replicator_types::{Endpoint, Operation, Position, ReplicatorError, Result, Task, TaskStatus};

use crate::config::ExecutorConfig;

/// Drives one logical execution of a task end to end: prelude, connect,
/// optional DDL, optional snapshot, then the tail loop, with a cleanup
/// handler that always runs regardless of which phase exited.
pub struct TaskExecutor {
    repository: Arc<dyn TaskRepository>,
    control: Arc<dyn ControlChannel>,
    source_registry: Arc<SourceConnectorRegistry>,
    target_registry: Arc<TargetConnectorRegistry>,
    schema_converter: Arc<dyn SchemaConverter>,
    config: ExecutorConfig,
}

impl TaskExecutor {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        control: Arc<dyn ControlChannel>,
        source_registry: Arc<SourceConnectorRegistry>,
        target_registry: Arc<TargetConnectorRegistry>,
        schema_converter: Arc<dyn SchemaConverter>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            repository,
            control,
            source_registry,
            target_registry,
            schema_converter,
            config,
        }
    }

    #[tracing::instrument(skip(self), fields(task_id = %task_id))]
    pub async fn execute(&self, task_id: &str) -> Result<()> {
        let mut task = self.repository.load_task(task_id).await?;
        if !task.status.is_re_runnable() {
            return Err(ReplicatorError::ConfigError(format!(
                "task {task_id} is not re-runnable in status {:?}",
                task.status
            )));
        }
        let running_task_id = task
            .running_task_id
            .clone()
            .ok_or_else(|| ReplicatorError::ConfigError(format!("task {task_id} has no running_task_id assigned")))?;

        self.control.clear(&running_task_id).await;
        self.repository.save_status(task_id, TaskStatus::Running).await?;
        task.status = TaskStatus::Running;
        if task.metrics.error.is_some() {
            task.metrics.error = None;
            self.repository
                .save_position_and_metrics(task_id, &task.last_position, &task.metrics)
                .await?;
        }
        tracing::info!("task entered running");

        let outcome = self.run(task_id, &running_task_id, &mut task).await;

        let final_status = match &outcome {
            Ok(()) => TaskStatus::Stopped,
            Err(ReplicatorError::StopRequested) => TaskStatus::Stopped,
            Err(e) => {
                task.metrics.error = Some(truncate(&e.to_string(), 2000));
                let _ = self
                    .repository
                    .save_position_and_metrics(task_id, &task.last_position, &task.metrics)
                    .await;
                TaskStatus::Failed
            }
        };
        let _ = self.repository.save_status(task_id, final_status).await;
        self.control.clear(&running_task_id).await;
        tracing::info!(status = ?final_status, "task execution finished");

        match outcome {
            Ok(()) | Err(ReplicatorError::StopRequested) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn run(&self, task_id: &str, running_task_id: &str, task: &mut Task) -> Result<()> {
        let source_endpoint = self.repository.load_endpoint(&task.source_endpoint_id).await?;
        let target_endpoint = self.repository.load_endpoint(&task.target_endpoint_id).await?;

        let mut source = self.source_registry.build(&source_endpoint)?;
        let mut target = self.target_registry.build(&target_endpoint)?;
        source.connect().await?;
        target.connect().await?;

        let result = self
            .run_connected(task_id, running_task_id, task, source.as_mut(), target.as_mut(), &source_endpoint, &target_endpoint)
            .await;

        if let Err(e) = source.disconnect().await {
            tracing::warn!(error = %e, "error disconnecting source during cleanup");
        }
        if let Err(e) = target.disconnect().await {
            tracing::warn!(error = %e, "error disconnecting target during cleanup");
        }

        result
    }

    async fn run_connected(
        &self,
        task_id: &str,
        running_task_id: &str,
        task: &mut Task,
        source: &mut dyn SourceConnector,
        target: &mut dyn TargetConnector,
        source_endpoint: &Endpoint,
        target_endpoint: &Endpoint,
    ) -> Result<()> {
        let target_schema = target_endpoint
            .target_schema
            .clone()
            .unwrap_or_else(|| target_endpoint.database.clone().unwrap_or_default());

        if task.create_tables {
            target.create_schema_if_absent(&target_schema).await?;
            for table in &task.tables {
                let source_schema = source.get_table_schema(&table.schema, &table.table).await?;
                let target_table = self
                    .schema_converter
                    .convert(&source_schema, source_endpoint.kind, target_endpoint.kind)?;
                let mut target_table = target_table;
                target_table.schema = target_schema.clone();
                target.create_table_if_absent(&target_table).await?;
            }
        }

        if task.initial_load {
            self.run_snapshot(task_id, running_task_id, task, source, target, &target_schema).await?;
        }

        self.run_tail(task_id, running_task_id, task, source, target).await
    }

    async fn run_snapshot(
        &self,
        task_id: &str,
        running_task_id: &str,
        task: &mut Task,
        source: &mut dyn SourceConnector,
        target: &mut dyn TargetConnector,
        target_schema: &str,
    ) -> Result<()> {
        let mut first_table_position: Option<Position> = None;

        for table in task.tables.clone() {
            let pre_load_position = source.get_current_position().await?;
            if first_table_position.is_none() {
                first_table_position = Some(pre_load_position.clone());
            }
            task.last_position = pre_load_position.clone();

            target.clear_table(target_schema, &table.table).await?;

            let mut offset: u64 = 0;
            loop {
                let chunk = source
                    .snapshot_chunk(&table, self.config.snapshot_chunk_size, offset)
                    .await?;
                let row_count = chunk.rows.len() as u64;
                let is_last = chunk.is_last;
                target.write_snapshot_chunk(target_schema, &table.table, &chunk).await?;

                task.metrics.inserts += row_count;
                task.metrics.last_updated_ms = Some(now_ms());
                self.repository
                    .save_position_and_metrics(task_id, &task.last_position, &task.metrics)
                    .await?;

                offset += row_count;

                if self.control.is_stop_requested(running_task_id).await {
                    tracing::info!(table = %table.table, "stop requested during snapshot");
                    return Err(ReplicatorError::StopRequested);
                }
                if is_last {
                    break;
                }
            }
        }

        if let Some(position) = first_table_position {
            task.last_position = position;
            self.repository
                .save_position_and_metrics(task_id, &task.last_position, &task.metrics)
                .await?;
        }
        task.initial_load = false;
        self.repository.clear_initial_load(task_id).await?;
        Ok(())
    }

    async fn run_tail(
        &self,
        task_id: &str,
        running_task_id: &str,
        task: &mut Task,
        source: &mut dyn SourceConnector,
        target: &mut dyn TargetConnector,
    ) -> Result<()> {
        loop {
            if self.control.is_stop_requested(running_task_id).await {
                tracing::info!("stop requested, exiting tail loop");
                return Err(ReplicatorError::StopRequested);
            }

            let (events, new_position) = match source.get_changes(&task.tables, &task.last_position).await {
                Ok(v) => v,
                Err(ReplicatorError::SourceTransient(msg)) => {
                    tracing::warn!(error = %msg, "transient source error, retrying after poll interval");
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if events.is_empty() && new_position == task.last_position {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            }

            target.apply_changes(&events, task.merge_enabled).await?;

            for event in &events {
                match event.operation {
                    Operation::Insert => task.metrics.inserts += 1,
                    Operation::Update => task.metrics.updates += 1,
                    Operation::Delete => task.metrics.deletes += 1,
                }
            }
            task.last_position = new_position;
            task.metrics.last_updated_ms = Some(now_ms());
            self.repository
                .save_position_and_metrics(task_id, &task.last_position, &task.metrics)
                .await?;

            tracing::debug!(applied = events.len(), position = %task.last_position, "applied change batch");
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        s.chars().take(max_len).collect()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
