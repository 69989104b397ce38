//! Append-only JSONL session and log storage
//!
//! Two event logs under the data directory: `sessions.jsonl` receives a
//! start record per launch attempt and an end record when it finalizes;
//! `logs.jsonl` receives every operator-facing log entry. Appends are
//! line-atomic and require no cross-channel coordination.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use shared::{LogEntry, RunId, RunStatus, StreamRun};

use crate::error::SupervisorResult;
use crate::traits::SessionStore;

const SESSIONS_FILE: &str = "sessions.jsonl";
const LOGS_FILE: &str = "logs.jsonl";

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum SessionRecord<'a> {
    SessionStart {
        #[serde(flatten)]
        run: &'a StreamRun,
    },
    SessionEnd {
        run_id: RunId,
        ended_at: DateTime<Utc>,
        status: RunStatus,
    },
}

pub struct JsonlSessionStore {
    data_dir: PathBuf,
}

impl JsonlSessionStore {
    /// Open a store rooted at `data_dir`, creating the directory if needed
    pub fn new(data_dir: impl AsRef<Path>) -> SupervisorResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    async fn append_line<T: Serialize>(&self, file: &str, record: &T) -> SupervisorResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut handle = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.data_dir.join(file))
            .await?;
        handle.write_all(line.as_bytes()).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for JsonlSessionStore {
    async fn create_session(&self, run: &StreamRun) -> SupervisorResult<()> {
        self.append_line(SESSIONS_FILE, &SessionRecord::SessionStart { run })
            .await
    }

    async fn finalize_session(
        &self,
        run_id: RunId,
        ended_at: DateTime<Utc>,
        status: RunStatus,
    ) -> SupervisorResult<()> {
        self.append_line(
            SESSIONS_FILE,
            &SessionRecord::SessionEnd {
                run_id,
                ended_at,
                status,
            },
        )
        .await
    }

    async fn append_log(&self, entry: &LogEntry) -> SupervisorResult<()> {
        self.append_line(LOGS_FILE, entry).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ChannelId, LogLevel, SessionId};

    fn run() -> StreamRun {
        StreamRun::new(
            ChannelId::new("ch-1"),
            SessionId::new(),
            4321,
            "/videos/loop.mp4".to_string(),
            0,
        )
    }

    #[tokio::test]
    async fn test_session_lifecycle_appends_two_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::new(dir.path()).unwrap();

        let run = run();
        store.create_session(&run).await.unwrap();
        store
            .finalize_session(run.run_id, Utc::now(), RunStatus::Stopped)
            .await
            .unwrap();

        let contents = std::fs::read_to_string(dir.path().join(SESSIONS_FILE)).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("session_start"));
        assert!(lines[0].contains(&run.run_id.to_string()));
        assert!(lines[1].contains("session_end"));
        assert!(lines[1].contains("stopped"));
    }

    #[tokio::test]
    async fn test_log_entries_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlSessionStore::new(dir.path()).unwrap();

        for i in 0..3 {
            let entry = LogEntry {
                timestamp: Utc::now(),
                channel_id: ChannelId::new("ch-1"),
                level: LogLevel::Info,
                message: format!("entry {i}"),
                run_id: None,
            };
            store.append_log(&entry).await.unwrap();
        }

        let contents = std::fs::read_to_string(dir.path().join(LOGS_FILE)).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert!(contents.contains("entry 2"));
        assert!(contents.contains("INFO"));
    }

    #[tokio::test]
    async fn test_creates_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("streams");
        let store = JsonlSessionStore::new(&nested).unwrap();
        store.create_session(&run()).await.unwrap();
        assert!(nested.join(SESSIONS_FILE).exists());
    }
}
