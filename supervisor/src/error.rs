//! Supervisor-specific error types

use shared::ChannelId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Channel not found: {channel_id}")]
    ChannelNotFound { channel_id: ChannelId },

    #[error("Invalid channel configuration: {reason}")]
    ConfigInvalid { reason: String },

    #[error("Video file not found: {path}")]
    SourceNotFound { path: String },

    #[error("Failed to launch stream process: {message}")]
    LaunchFailed { message: String },

    #[error("Stream is already active")]
    AlreadyRunning { channel_id: ChannelId },

    #[error("Stream is not active")]
    NotRunning { channel_id: ChannelId },

    #[error("Resource sample unavailable for pid {pid}: {message}")]
    SampleUnavailable { pid: u32, message: String },

    #[error("Store write failed: {message}")]
    StoreWriteFailed { message: String },

    #[error("Signal delivery failed for pid {pid}: {message}")]
    SignalFailed { pid: u32, message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SupervisorError {
    pub fn config(reason: impl Into<String>) -> Self {
        SupervisorError::ConfigInvalid { reason: reason.into() }
    }

    pub fn launch(message: impl Into<String>) -> Self {
        SupervisorError::LaunchFailed { message: message.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        SupervisorError::StoreWriteFailed { message: message.into() }
    }
}

pub type SupervisorResult<T> = Result<T, SupervisorError>;
