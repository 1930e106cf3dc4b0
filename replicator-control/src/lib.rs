//! Out-of-band stop-signal channel (C6): lets an operator ask a running
//! task to cooperatively stop without the executor re-reading its own task
//! row on every loop iteration.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

/// Default TTL for a requested stop flag, per spec's default of one hour.
pub const DEFAULT_STOP_TTL: Duration = Duration::from_secs(3600);

/// Keyed by `running_task_id` (the opaque id a task is assigned at
/// submission, not the task's own persistent id) so a stale flag from a
/// previous run can never suppress a fresh one.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    async fn request_stop(&self, running_task_id: &str);

    async fn is_stop_requested(&self, running_task_id: &str) -> bool;

    async fn clear(&self, running_task_id: &str);
}

struct StopFlag {
    expires_at: Instant,
}

/// `parking_lot::Mutex` over a plain map, matching this workspace's
/// preference (seen in `replicator-oracle`'s state tracking and the
/// `dozer-tracing`/`dozer-utils` crates this work is grounded on) for
/// `parking_lot` over `std::sync::Mutex` where a lock is held briefly and
/// never across an `.await`.
pub struct InMemoryControlChannel {
    ttl: Duration,
    flags: Mutex<HashMap<String, StopFlag>>,
}

impl InMemoryControlChannel {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_STOP_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            flags: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryControlChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ControlChannel for InMemoryControlChannel {
    async fn request_stop(&self, running_task_id: &str) {
        let expires_at = Instant::now() + self.ttl;
        self.flags.lock().insert(running_task_id.to_string(), StopFlag { expires_at });
        tracing::info!(running_task_id, "stop requested");
    }

    async fn is_stop_requested(&self, running_task_id: &str) -> bool {
        let mut flags = self.flags.lock();
        match flags.get(running_task_id) {
            Some(flag) if flag.expires_at >= Instant::now() => true,
            Some(_) => {
                flags.remove(running_task_id);
                false
            }
            None => false,
        }
    }

    async fn clear(&self, running_task_id: &str) {
        self.flags.lock().remove(running_task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_then_check_reports_stop() {
        let channel = InMemoryControlChannel::new();
        assert!(!channel.is_stop_requested("run-1").await);
        channel.request_stop("run-1").await;
        assert!(channel.is_stop_requested("run-1").await);
    }

    #[tokio::test]
    async fn clear_removes_the_flag() {
        let channel = InMemoryControlChannel::new();
        channel.request_stop("run-1").await;
        channel.clear("run-1").await;
        assert!(!channel.is_stop_requested("run-1").await);
    }

    #[tokio::test]
    async fn expired_flag_is_treated_as_not_requested() {
        let channel = InMemoryControlChannel::with_ttl(Duration::from_millis(10));
        channel.request_stop("run-1").await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!channel.is_stop_requested("run-1").await);
    }

    #[tokio::test]
    async fn unrelated_task_ids_do_not_interfere() {
        let channel = InMemoryControlChannel::new();
        channel.request_stop("run-1").await;
        assert!(!channel.is_stop_requested("run-2").await);
    }
}
