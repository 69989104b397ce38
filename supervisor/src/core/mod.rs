//! Pure supervisor logic, testable without spawning real processes

pub mod command;
pub mod health;
pub mod logs;
pub mod progress;
pub mod retry;

pub use command::build_launch_args;
pub use health::classify;
pub use logs::LogSink;
pub use progress::parse_progress_line;
pub use retry::{RetryDecision, RetryPolicy};
