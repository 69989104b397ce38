//! Polling helpers for asynchronous assertions

use std::future::Future;
use std::time::Duration;

/// Generous ceiling for conditions that should settle in milliseconds
pub const SETTLE: Duration = Duration::from_secs(2);

/// Poll a condition until it holds or the timeout elapses
pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
