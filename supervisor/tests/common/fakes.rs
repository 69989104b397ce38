//! Controllable in-memory implementations of the supervisor traits
//!
//! FakeProcess exits only when told to (or when terminated, depending on
//! its behavior), which lets tests drive crash/stop orderings exactly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use shared::{Channel, ChannelId, LogEntry, QualityStats, RunId, RunStatus, StreamRun};
use supervisor::error::{SupervisorError, SupervisorResult};
use supervisor::traits::{
    ChannelProvider, ProcessHandle, ProcessLauncher, ResourceProbe, ResourceUsage, SessionStore,
};

/// How a fake process reacts to terminate()
#[derive(Clone, Copy, Debug)]
pub enum TerminateBehavior {
    /// Exit promptly with the given code, like a well-behaved process
    ExitWith(i32),
    /// Ignore the signal and keep running until killed
    Ignore,
}

#[derive(Debug)]
pub struct FakeProcess {
    pid: u32,
    exit_tx: watch::Sender<Option<i32>>,
    exit_rx: watch::Receiver<Option<i32>>,
    behavior: TerminateBehavior,
    pub terminate_calls: AtomicUsize,
    pub kill_calls: AtomicUsize,
    quality: Mutex<QualityStats>,
}

impl FakeProcess {
    pub fn new(pid: u32, behavior: TerminateBehavior) -> Arc<Self> {
        let (exit_tx, exit_rx) = watch::channel(None);
        Arc::new(Self {
            pid,
            exit_tx,
            exit_rx,
            behavior,
            terminate_calls: AtomicUsize::new(0),
            kill_calls: AtomicUsize::new(0),
            quality: Mutex::new(QualityStats::default()),
        })
    }

    /// Simulate the process exiting on its own with the given code
    pub fn trigger_exit(&self, code: i32) {
        let _ = self.exit_tx.send(Some(code));
    }

    pub fn set_quality(&self, quality: QualityStats) {
        *self.quality.lock().unwrap() = quality;
    }

    pub fn terminate_count(&self) -> usize {
        self.terminate_calls.load(Ordering::SeqCst)
    }

    pub fn kill_count(&self) -> usize {
        self.kill_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessHandle for FakeProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    fn is_alive(&self) -> bool {
        self.exit_rx.borrow().is_none()
    }

    async fn wait(&self) -> i32 {
        let mut rx = self.exit_rx.clone();
        loop {
            let current = *rx.borrow();
            if let Some(code) = current {
                return code;
            }
            if rx.changed().await.is_err() {
                return -1;
            }
        }
    }

    fn terminate(&self) -> SupervisorResult<()> {
        self.terminate_calls.fetch_add(1, Ordering::SeqCst);
        if let TerminateBehavior::ExitWith(code) = self.behavior {
            self.trigger_exit(code);
        }
        Ok(())
    }

    fn kill(&self) -> SupervisorResult<()> {
        self.kill_calls.fetch_add(1, Ordering::SeqCst);
        self.trigger_exit(-9);
        Ok(())
    }

    fn quality(&self) -> QualityStats {
        *self.quality.lock().unwrap()
    }
}

/// Launcher handing out FakeProcess handles, shared by cloning
#[derive(Clone)]
pub struct FakeLauncher {
    inner: Arc<LauncherInner>,
}

struct LauncherInner {
    handles: Mutex<Vec<Arc<FakeProcess>>>,
    behavior: TerminateBehavior,
    refuse: AtomicBool,
    next_pid: AtomicU32,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::with_behavior(TerminateBehavior::ExitWith(0))
    }

    pub fn with_behavior(behavior: TerminateBehavior) -> Self {
        Self {
            inner: Arc::new(LauncherInner {
                handles: Mutex::new(Vec::new()),
                behavior,
                refuse: AtomicBool::new(false),
                next_pid: AtomicU32::new(1000),
            }),
        }
    }

    /// Make every subsequent launch fail
    pub fn refuse_launches(&self, refuse: bool) {
        self.inner.refuse.store(refuse, Ordering::SeqCst);
    }

    pub fn launch_count(&self) -> usize {
        self.inner.handles.lock().unwrap().len()
    }

    pub fn handle(&self, index: usize) -> Arc<FakeProcess> {
        Arc::clone(&self.inner.handles.lock().unwrap()[index])
    }

    pub fn latest(&self) -> Arc<FakeProcess> {
        let handles = self.inner.handles.lock().unwrap();
        Arc::clone(handles.last().expect("no process launched yet"))
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(&self, _channel: &Channel) -> SupervisorResult<Arc<dyn ProcessHandle>> {
        if self.inner.refuse.load(Ordering::SeqCst) {
            return Err(SupervisorError::launch("spawn refused"));
        }
        let pid = self.inner.next_pid.fetch_add(1, Ordering::SeqCst);
        let handle = FakeProcess::new(pid, self.inner.behavior);
        self.inner.handles.lock().unwrap().push(Arc::clone(&handle));
        Ok(handle)
    }
}

/// In-memory session store, shared by cloning
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    sessions: Mutex<Vec<StreamRun>>,
    finalized: Mutex<Vec<(RunId, RunStatus)>>,
    logs: Mutex<Vec<LogEntry>>,
}

impl MemoryStore {
    pub fn sessions(&self) -> Vec<StreamRun> {
        self.inner.sessions.lock().unwrap().clone()
    }

    pub fn finalized(&self) -> Vec<(RunId, RunStatus)> {
        self.inner.finalized.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.inner.logs.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, run: &StreamRun) -> SupervisorResult<()> {
        self.inner.sessions.lock().unwrap().push(run.clone());
        Ok(())
    }

    async fn finalize_session(
        &self,
        run_id: RunId,
        _ended_at: DateTime<Utc>,
        status: RunStatus,
    ) -> SupervisorResult<()> {
        self.inner.finalized.lock().unwrap().push((run_id, status));
        Ok(())
    }

    async fn append_log(&self, entry: &LogEntry) -> SupervisorResult<()> {
        self.inner.logs.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Fixed in-memory channel configuration
#[derive(Clone)]
pub struct StaticChannels {
    channels: Arc<HashMap<ChannelId, Channel>>,
}

impl StaticChannels {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            channels: Arc::new(channels.into_iter().map(|c| (c.id.clone(), c)).collect()),
        }
    }
}

#[async_trait]
impl ChannelProvider for StaticChannels {
    async fn get_channel(&self, channel_id: &ChannelId) -> SupervisorResult<Channel> {
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| SupervisorError::ChannelNotFound {
                channel_id: channel_id.clone(),
            })
    }

    async fn list_channels(&self) -> SupervisorResult<Vec<Channel>> {
        Ok(self.channels.values().cloned().collect())
    }
}

/// Probe returning a constant usage snapshot
#[derive(Clone, Copy)]
pub struct ConstProbe {
    usage: ResourceUsage,
}

impl ConstProbe {
    pub fn new(cpu_percent: f32, memory_percent: f32) -> Self {
        Self {
            usage: ResourceUsage {
                cpu_percent,
                memory_percent,
            },
        }
    }

    pub fn healthy() -> Self {
        Self::new(10.0, 5.0)
    }
}

#[async_trait]
impl ResourceProbe for ConstProbe {
    async fn usage(&self, _pid: u32) -> SupervisorResult<ResourceUsage> {
        Ok(self.usage)
    }
}
