//! Ring-buffered per-channel log sink
//!
//! Keeps the most recent entries per channel in memory for fast status
//! queries and mirrors every entry to the durable store. A store failure
//! is logged locally and swallowed; it must never affect a running stream.

use crate::traits::SessionStore;
use chrono::Utc;
use shared::{ChannelId, LogEntry, LogLevel, RunId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Default bound on in-memory entries retained per channel
pub const DEFAULT_MAX_LOG_LINES: usize = 100;

pub struct LogSink<S: SessionStore> {
    rings: Mutex<HashMap<ChannelId, VecDeque<LogEntry>>>,
    store: Arc<S>,
    capacity: usize,
}

impl<S: SessionStore> LogSink<S> {
    pub fn new(store: Arc<S>, capacity: usize) -> Self {
        Self {
            rings: Mutex::new(HashMap::new()),
            store,
            capacity,
        }
    }

    /// Record an entry: append to the bounded ring, mirror to the store
    pub async fn record(
        &self,
        channel_id: &ChannelId,
        level: LogLevel,
        message: impl Into<String>,
        run_id: Option<RunId>,
    ) {
        let entry = LogEntry {
            timestamp: Utc::now(),
            channel_id: channel_id.clone(),
            level,
            message: message.into(),
            run_id,
        };

        {
            let mut rings = self.rings.lock().await;
            let ring = rings.entry(channel_id.clone()).or_default();
            ring.push_back(entry.clone());
            while ring.len() > self.capacity {
                ring.pop_front();
            }
        }

        if let Err(e) = self.store.append_log(&entry).await {
            tracing::warn!("⚠️ Failed to persist log entry for {}: {}", channel_id, e);
        }
    }

    /// Most recent entries for a channel, oldest first, most-recent last
    pub async fn recent(&self, channel_id: &ChannelId, limit: usize) -> Vec<LogEntry> {
        let rings = self.rings.lock().await;
        match rings.get(channel_id) {
            Some(ring) => {
                let skip = ring.len().saturating_sub(limit);
                ring.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SupervisorError;
    use crate::traits::MockSessionStore;

    fn sink_with_capacity(capacity: usize) -> LogSink<MockSessionStore> {
        let mut store = MockSessionStore::new();
        store.expect_append_log().returning(|_| Ok(())).times(0..);
        LogSink::new(Arc::new(store), capacity)
    }

    #[tokio::test]
    async fn test_ring_is_bounded() {
        let sink = sink_with_capacity(3);
        let channel = ChannelId::new("ch-1");

        for i in 0..5 {
            sink.record(&channel, LogLevel::Info, format!("entry {i}"), None).await;
        }

        let entries = sink.recent(&channel, 10).await;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "entry 2");
        assert_eq!(entries[2].message, "entry 4");
    }

    #[tokio::test]
    async fn test_recent_respects_limit_most_recent_last() {
        let sink = sink_with_capacity(10);
        let channel = ChannelId::new("ch-1");

        for i in 0..4 {
            sink.record(&channel, LogLevel::Info, format!("entry {i}"), None).await;
        }

        let entries = sink.recent(&channel, 2).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "entry 2");
        assert_eq!(entries[1].message, "entry 3");
    }

    #[tokio::test]
    async fn test_unknown_channel_is_empty() {
        let sink = sink_with_capacity(10);
        let entries = sink.recent(&ChannelId::new("missing"), 5).await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed() {
        let mut store = MockSessionStore::new();
        store
            .expect_append_log()
            .returning(|_| Err(SupervisorError::store("disk full")))
            .times(1..);
        let sink = LogSink::new(Arc::new(store), 10);
        let channel = ChannelId::new("ch-1");

        // Must not panic or error; the ring still receives the entry
        sink.record(&channel, LogLevel::Error, "boom", None).await;
        let entries = sink.recent(&channel, 5).await;
        assert_eq!(entries.len(), 1);
    }
}
