//! Stream process supervisor
//!
//! Keeps long-running FFmpeg push processes alive for configured channels:
//! launches them detached into their own process groups, watches for exit,
//! auto-restarts crashes within a bounded retry budget, and stops streams
//! gracefully on request. Per-run health sampling and append-only session
//! records ride alongside without ever blocking the streams themselves.

pub mod core;
pub mod error;
pub mod monitor;
pub mod services;
pub mod supervisor;
pub mod traits;

pub use error::{SupervisorError, SupervisorResult};
pub use supervisor::{ChannelStatus, Supervisor, SupervisorSettings};
