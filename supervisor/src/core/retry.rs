//! Crash-retry decision policy
//!
//! Pure decision function consulted by the exit watcher after a process
//! terminates. Manual stop is authoritative and is never overridden by
//! auto-restart.

use std::time::Duration;

/// Outcome of a retry decision
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Restart the process after waiting out the delay
    Retry { delay: Duration },
    /// Stop retrying; the session is terminal
    GiveUp,
}

/// Bounded fixed-delay retry policy
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);

    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Decide whether a terminated process should be restarted
    ///
    /// `retry_count` is the number of crash-restarts already performed in
    /// the current logical session; the caller increments it on `Retry`.
    pub fn decide(&self, retry_count: u32, was_manual_stop: bool) -> RetryDecision {
        if was_manual_stop {
            return RetryDecision::GiveUp;
        }
        if retry_count < self.max_retries {
            RetryDecision::Retry { delay: self.delay }
        } else {
            RetryDecision::GiveUp
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_RETRIES, Self::DEFAULT_DELAY)
    }
}
