//! Core shared types and identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier for a configured stream channel
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a single launch attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a logical streaming session spanning crash-retries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encoding mode for a channel's output leg
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EncodeMode {
    /// Copy source codecs straight through
    Passthrough,
    /// Re-encode with libx264 at the given settings
    Transcode {
        bitrate_kbps: u32,
        fps: u32,
        preset: String,
    },
}

/// Destination endpoint for a channel (RTMP base URL plus stream key)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub rtmp_url: String,
    pub stream_key: String,
}

impl Destination {
    /// Fully qualified destination URL including the embedded credential
    pub fn full_url(&self) -> String {
        format!("{}{}", self.rtmp_url, self.stream_key)
    }
}

/// A configured logical continuous-stream target
///
/// Owned by the configuration layer; the supervisor only reads a snapshot
/// per start attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    /// Path to the source media file
    pub source: String,
    pub destination: Destination,
    #[serde(flatten)]
    pub encode: EncodeMode,
    /// Channels marked enabled are auto-started by the daemon
    #[serde(default)]
    pub enabled: bool,
}

/// Supervisor-side state of a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelState {
    Idle,
    Starting,
    Running,
    Stopping,
    /// Waiting out the backoff delay before a crash-restart
    Retrying,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Idle => "idle",
            ChannelState::Starting => "starting",
            ChannelState::Running => "running",
            ChannelState::Stopping => "stopping",
            ChannelState::Retrying => "retrying",
        };
        write!(f, "{s}")
    }
}

/// Outcome status of a stream run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    Crashed,
    Failed,
}

impl RunStatus {
    /// Terminal statuses are immutable once written
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Starting => "starting",
            RunStatus::Running => "running",
            RunStatus::Stopping => "stopping",
            RunStatus::Stopped => "stopped",
            RunStatus::Crashed => "crashed",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One launch attempt of a channel
///
/// A crash-restart creates a new StreamRun sharing the same `session_id`;
/// callers see one continuous session until a terminal status is reached.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamRun {
    pub run_id: RunId,
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    pub pid: u32,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// 0 on an externally-initiated start, incremented per crash-restart
    pub retry_count: u32,
}

impl StreamRun {
    pub fn new(
        channel_id: ChannelId,
        session_id: SessionId,
        pid: u32,
        source: String,
        retry_count: u32,
    ) -> Self {
        Self {
            run_id: RunId::new(),
            session_id,
            channel_id,
            pid,
            source,
            started_at: Utc::now(),
            ended_at: None,
            status: RunStatus::Starting,
            retry_count,
        }
    }

    /// Run duration in whole seconds, measured to `ended_at` or now
    pub fn duration_seconds(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds()
    }
}

/// Derived health classification of a live stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Encoder-reported quality signals for a running process
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityStats {
    pub fps: f32,
    pub bitrate_kbps: f32,
    pub dropped_frames: u64,
}

impl Default for QualityStats {
    fn default() -> Self {
        // Last-resort defaults when the encoder reports nothing
        Self {
            fps: 30.0,
            bitrate_kbps: 4000.0,
            dropped_frames: 0,
        }
    }
}

/// One periodic health observation of a live run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub channel_id: ChannelId,
    pub run_id: RunId,
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub fps: f32,
    pub bitrate_kbps: f32,
    pub dropped_frames: u64,
    pub status: HealthStatus,
}

/// Severity of an operator-facing log entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// Operator-facing log entry for a channel
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub channel_id: ChannelId,
    pub level: LogLevel,
    pub message: String,
    pub run_id: Option<RunId>,
}
