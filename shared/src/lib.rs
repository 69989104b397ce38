//! Shared types for the stream supervision system
//!
//! Contains the data model shared between the supervisor core, its service
//! implementations, and the tests: channel configuration, stream runs,
//! health samples, and operator-facing log entries.

pub mod logging;
pub mod types;

pub use types::*;
