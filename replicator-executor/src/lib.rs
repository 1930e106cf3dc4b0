//! Task executor (C5): loads a task, connects its endpoints, runs the
//! optional DDL/snapshot phases, then tails source changes into the target
//! until stopped or it fails, writing a terminal status on every exit path.

mod config;
mod executor;

pub use config::ExecutorConfig;
pub use executor::TaskExecutor;
