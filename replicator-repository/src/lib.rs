//! Thin persistence boundary (C7) for task and endpoint rows.
//!
//! Position and metrics are always written together in one call so a crash
//! between the two can never leave `last_position` ahead of the metrics
//! that produced it (or vice versa) — the monotonicity guarantee spec.md
//! §4.4 calls for.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryTaskRepository;
pub use postgres::PostgresTaskRepository;

use async_trait::async_trait;
use replicator_types::{Endpoint, Metrics, Position, Result, Task, TaskStatus};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn load_task(&self, id: &str) -> Result<Task>;

    async fn load_endpoint(&self, id: &str) -> Result<Endpoint>;

    async fn save_status(&self, task_id: &str, status: TaskStatus) -> Result<()>;

    /// Writes `last_position` and `metrics` together; callers must not split
    /// these into two calls.
    async fn save_position_and_metrics(&self, task_id: &str, position: &Position, metrics: &Metrics) -> Result<()>;

    /// Clears `initial_load` once the snapshot phase has fully completed.
    async fn clear_initial_load(&self, task_id: &str) -> Result<()>;
}
