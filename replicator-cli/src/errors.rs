use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read config file {0:?}: {1}")]
    ConfigIo(std::path::PathBuf, std::io::Error),

    #[error("failed to parse config yaml: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("task {0:?} not found in config file")]
    TaskNotFoundInConfig(String),

    #[error("--config and --task-name must both be given for file-driven mode")]
    MissingTaskName,

    #[error("--db-url is required for repository-backed mode")]
    MissingDbUrl,

    #[error(transparent)]
    Replicator(#[from] replicator_types::ReplicatorError),
}

pub type Result<T> = std::result::Result<T, CliError>;
