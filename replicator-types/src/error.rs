use thiserror::Error;

/// Error kinds from spec §7. These are *kinds*, not one-error-type-per-call:
/// connector crates raise their own `ConnectorError` and the executor maps
/// it into one of these at the call boundary.
#[derive(Debug, Error)]
pub enum ReplicatorError {
    #[error("invalid task or endpoint configuration: {0}")]
    ConfigError(String),

    #[error("failed to connect: {0}")]
    ConnectError(String),

    #[error("no such table {schema}.{table}")]
    NoSuchTable { schema: String, table: String },

    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    #[error("transient source error, caller should retry: {0}")]
    SourceTransient(String),

    #[error("fatal source error: {0}")]
    SourceFatal(String),

    #[error("failed to apply change batch to target: {0}")]
    TargetApplyError(String),

    #[error("stop requested")]
    StopRequested,
}

impl ReplicatorError {
    /// Whether this error should drive the owning task to `failed`, per the
    /// propagation policy in spec §7. `StopRequested` is not an error from
    /// the state machine's point of view.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ReplicatorError::SourceTransient(_) | ReplicatorError::StopRequested)
    }
}

pub type Result<T> = std::result::Result<T, ReplicatorError>;
