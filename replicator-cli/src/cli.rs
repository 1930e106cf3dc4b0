use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, name = "replicator")]
#[command(about = "Heterogeneous database replication task executor")]
pub struct Cli {
    #[arg(global = true, long, value_enum, default_value = "pretty")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Run one task to completion (Ctrl-C requests a cooperative stop)")]
    Run(Run),
    #[command(about = "Request a cooperative stop for a running task")]
    Stop(Stop),
}

#[derive(Debug, Args)]
pub struct Run {
    /// Task id to run against a `PostgresTaskRepository`. Mutually
    /// exclusive with --config/--task-name.
    #[arg(long)]
    pub task_id: Option<String>,

    /// Connection string for the repository database, required with
    /// --task-id.
    #[arg(long)]
    pub db_url: Option<String>,

    /// YAML file listing endpoints and tasks, for local/demo runs backed
    /// by an `InMemoryTaskRepository` instead of Postgres.
    #[arg(long)]
    pub config: Option<std::path::PathBuf>,

    /// Name of the task within --config to run.
    #[arg(long)]
    pub task_name: Option<String>,
}

#[derive(Debug, Args)]
pub struct Stop {
    #[arg(long)]
    pub task_id: String,

    #[arg(long)]
    pub db_url: String,
}
