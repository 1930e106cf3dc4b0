use std::time::Duration;

/// Tunables the upstream hardcoded as module-level constants; kept as
/// plain config here so a deployment can override them without a rebuild.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub snapshot_chunk_size: u32,
    pub poll_interval: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            snapshot_chunk_size: 1000,
            poll_interval: Duration::from_secs(5),
        }
    }
}
