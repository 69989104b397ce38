//! Trait definitions with mockall annotations for testing
//!
//! These traits are the dependency-injection seams of the supervisor:
//! channel configuration, process launching, durable session/log storage,
//! and per-pid resource sampling. Real implementations live in `services`.

use crate::error::SupervisorResult;
use chrono::{DateTime, Utc};
use shared::{Channel, ChannelId, LogEntry, QualityStats, RunId, RunStatus, StreamRun};
use std::sync::Arc;

/// Handle to a spawned streaming process
///
/// `wait` is a blocking-wait primitive, not a poll loop; it may be awaited
/// by multiple tasks concurrently (the exit watcher and a Stop caller).
#[async_trait::async_trait]
pub trait ProcessHandle: Send + Sync + std::fmt::Debug {
    /// OS process id of the spawned process
    fn pid(&self) -> u32;

    /// True while the process has not been observed to exit
    fn is_alive(&self) -> bool;

    /// Wait for the process to exit and return its exit code
    async fn wait(&self) -> i32;

    /// Send a graceful terminate signal to the whole process group
    fn terminate(&self) -> SupervisorResult<()>;

    /// Forcefully kill the whole process group
    fn kill(&self) -> SupervisorResult<()>;

    /// Last-known encoder-reported quality signals
    fn quality(&self) -> QualityStats;
}

/// Channel configuration source abstraction
///
/// The supervisor reads a fresh snapshot per launch attempt and never
/// mutates channel configuration.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ChannelProvider: Send + Sync {
    /// Look up a channel's launch parameters by id
    async fn get_channel(&self, channel_id: &ChannelId) -> SupervisorResult<Channel>;

    /// All configured channels (used by the daemon for auto-start)
    async fn list_channels(&self) -> SupervisorResult<Vec<Channel>>;
}

/// Process launching abstraction
///
/// Spawns the external streaming process detached into its own process
/// group so termination signals reach the whole subprocess tree.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Launch the streaming process for a channel
    ///
    /// Fails with `ConfigInvalid` if the channel has no usable source or
    /// an empty destination, `SourceNotFound` if the media file is missing,
    /// and `LaunchFailed` on OS-level spawn errors.
    async fn launch(&self, channel: &Channel) -> SupervisorResult<Arc<dyn ProcessHandle>>;
}

/// Durable session and log storage abstraction
///
/// Writes are channel/run-scoped and never require cross-channel
/// coordination. Failures here must never abort an otherwise-healthy
/// stream; callers log and continue.
#[mockall::automock]
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// Record a newly created stream run
    async fn create_session(&self, run: &StreamRun) -> SupervisorResult<()>;

    /// Finalize a stream run with its end time and outcome status
    async fn finalize_session(
        &self,
        run_id: RunId,
        ended_at: DateTime<Utc>,
        status: RunStatus,
    ) -> SupervisorResult<()>;

    /// Append an operator-facing log entry
    async fn append_log(&self, entry: &LogEntry) -> SupervisorResult<()>;
}

/// Per-pid resource usage snapshot
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceUsage {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

/// OS process-accounting abstraction for the health monitor
#[mockall::automock]
#[async_trait::async_trait]
pub trait ResourceProbe: Send + Sync {
    /// Sample CPU and memory usage of the given process
    async fn usage(&self, pid: u32) -> SupervisorResult<ResourceUsage>;
}
