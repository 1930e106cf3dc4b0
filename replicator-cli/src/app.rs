use std::sync::Arc;

use replicator_connector::{SourceConnectorRegistry, TargetConnectorRegistry};
use replicator_control::{ControlChannel, InMemoryControlChannel};
use replicator_executor::{ExecutorConfig, TaskExecutor};
use replicator_repository::{InMemoryTaskRepository, PostgresTaskRepository, TaskRepository};
use replicator_schema::BasicSchemaConverter;
use replicator_types::TaskStatus;

use crate::cli::{Run, Stop};
use crate::config::load_config;
use crate::errors::{CliError, Result};
use crate::registries::{build_source_registry, build_target_registry};

/// Hooks `Ctrl-C` to the executor's own control channel so an attached
/// `run` invocation stops the same way an operator-issued stop would,
/// instead of the process being killed mid-batch.
fn spawn_ctrl_c_handler(control: Arc<dyn ControlChannel>, running_task_id: String) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(running_task_id = %running_task_id, "Ctrl-C received, requesting cooperative stop");
            control.request_stop(&running_task_id).await;
        }
    });
}

async fn execute(
    repository: Arc<dyn TaskRepository>,
    source_registry: SourceConnectorRegistry,
    target_registry: TargetConnectorRegistry,
    task_id: &str,
) -> Result<()> {
    let control = Arc::new(InMemoryControlChannel::new());
    let task = repository.load_task(task_id).await?;
    if let Some(running_task_id) = task.running_task_id.clone() {
        spawn_ctrl_c_handler(control.clone(), running_task_id);
    }

    let executor = TaskExecutor::new(
        repository,
        control,
        Arc::new(source_registry),
        Arc::new(target_registry),
        Arc::new(BasicSchemaConverter),
        ExecutorConfig::default(),
    );
    executor.execute(task_id).await?;
    Ok(())
}

pub async fn run(args: Run) -> Result<()> {
    let source_registry = build_source_registry();
    let target_registry = build_target_registry();

    match (args.task_id, args.config) {
        (Some(task_id), None) => {
            let db_url = args.db_url.ok_or(CliError::MissingDbUrl)?;
            let repository = Arc::new(PostgresTaskRepository::connect(&db_url).await?);
            execute(repository, source_registry, target_registry, &task_id).await
        }
        (None, Some(config_path)) => {
            let task_name = args.task_name.ok_or(CliError::MissingTaskName)?;
            let config = load_config(&config_path)?;
            let task_id = config
                .tasks
                .iter()
                .find(|t| t.name == task_name)
                .map(|t| t.id.clone())
                .ok_or_else(|| CliError::TaskNotFoundInConfig(task_name.clone()))?;

            let endpoints = config.endpoints.into_iter().map(Into::into).collect();
            let tasks = config.tasks.into_iter().map(Into::into).collect();
            let repository = Arc::new(InMemoryTaskRepository::new(tasks, endpoints));
            execute(repository, source_registry, target_registry, &task_id).await
        }
        (Some(_), Some(_)) => Err(CliError::Replicator(replicator_types::ReplicatorError::ConfigError(
            "--task-id and --config are mutually exclusive".into(),
        ))),
        (None, None) => Err(CliError::Replicator(replicator_types::ReplicatorError::ConfigError(
            "one of --task-id (with --db-url) or --config (with --task-name) is required".into(),
        ))),
    }
}

/// This build ships only `InMemoryControlChannel`, scoped to one process
/// (see DESIGN.md), so a `stop` invocation cannot reach another process's
/// `run` invocation through the control channel. It instead marks the
/// task row `stopping` so a subsequent `load_task` sees operator intent;
/// an attached `run` is still best stopped with Ctrl-C.
pub async fn stop(args: Stop) -> Result<()> {
    let repository = PostgresTaskRepository::connect(&args.db_url).await?;
    repository.save_status(&args.task_id, TaskStatus::Stopping).await?;
    tracing::info!(task_id = %args.task_id, "marked task stopping; attached `run` processes should be stopped with Ctrl-C");
    Ok(())
}
