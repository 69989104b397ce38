//! Stream supervisor state machine
//!
//! Owns per-channel state (live process handle, current run, manual-stop
//! flag, retry counter), drives start/stop/retry transitions, and exposes
//! status queries. Dependencies are injected through the traits in
//! `crate::traits` so the whole state machine is testable without real
//! processes.
//!
//! Locking discipline: a briefly-held outer map lock hands out per-channel
//! slots; all operations on one channel serialize on that slot's mutex, so
//! unrelated channels never block each other. The exit watcher blocks on
//! `ProcessHandle::wait` without holding the slot lock and re-acquires it
//! only after exit is observed, which keeps Start/Stop responsive while a
//! channel is running. Once the manual-stop flag is set under the slot
//! lock, any watcher reaching the classification branch sees it, so Stop
//! always wins a race against a crash-retry decision.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use shared::{
    Channel, ChannelId, ChannelState, HealthSample, LogEntry, LogLevel, RunId, RunStatus,
    SessionId, StreamRun,
};

use crate::core::logs::DEFAULT_MAX_LOG_LINES;
use crate::core::{LogSink, RetryDecision, RetryPolicy};
use crate::error::{SupervisorError, SupervisorResult};
use crate::monitor::{HealthArchive, HealthMonitor, MonitorHandle, DEFAULT_SAMPLE_INTERVAL};
use crate::traits::{ChannelProvider, ProcessHandle, ProcessLauncher, ResourceProbe, SessionStore};

/// Tunable supervisor parameters
#[derive(Clone, Debug)]
pub struct SupervisorSettings {
    /// Crash-restarts allowed per logical session
    pub max_retries: u32,
    /// Fixed delay before each crash-restart
    pub retry_delay: Duration,
    /// Wait after SIGTERM before escalating to SIGKILL
    pub grace_period: Duration,
    /// Health sampling interval
    pub sample_interval: Duration,
    /// In-memory log lines retained per channel
    pub max_log_lines: usize,
    /// Health samples retained per run
    pub max_health_samples: usize,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            max_retries: RetryPolicy::DEFAULT_MAX_RETRIES,
            retry_delay: RetryPolicy::DEFAULT_DELAY,
            grace_period: Duration::from_secs(5),
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            max_log_lines: DEFAULT_MAX_LOG_LINES,
            max_health_samples: 120,
        }
    }
}

impl SupervisorSettings {
    /// Configure retry limit (fluent API)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Configure retry delay (fluent API)
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Configure termination grace period (fluent API)
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    /// Configure health sampling interval (fluent API)
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.retry_delay)
    }
}

/// Status snapshot returned to the API/scheduler layer
#[derive(Clone, Debug, Serialize)]
pub struct ChannelStatus {
    pub channel_id: ChannelId,
    pub state: ChannelState,
    pub running: bool,
    pub run: Option<StreamRun>,
    /// Crash-restarts performed in the current logical session
    pub retry_count: u32,
}

/// Per-channel slot; all operations on one channel serialize on `entry`
struct ChannelSlot {
    entry: Mutex<ChannelEntry>,
}

impl Default for ChannelSlot {
    fn default() -> Self {
        Self {
            entry: Mutex::new(ChannelEntry::default()),
        }
    }
}

struct ChannelEntry {
    state: ChannelState,
    handle: Option<Arc<dyn ProcessHandle>>,
    run: Option<StreamRun>,
    /// Run most recently closed out; the terminal record target when the
    /// session ends with no live run (cancelled retry, failed relaunch)
    last_run_id: Option<RunId>,
    session_id: Option<SessionId>,
    manual_stop: bool,
    retry_count: u32,
    monitor: Option<MonitorHandle>,
}

impl Default for ChannelEntry {
    fn default() -> Self {
        Self {
            state: ChannelState::Idle,
            handle: None,
            run: None,
            last_run_id: None,
            session_id: None,
            manual_stop: false,
            retry_count: 0,
            monitor: None,
        }
    }
}

/// Stream process supervisor
pub struct Supervisor<C, L, S, P>
where
    C: ChannelProvider + 'static,
    L: ProcessLauncher + 'static,
    S: SessionStore + 'static,
    P: ResourceProbe + 'static,
{
    inner: Arc<SupervisorInner<C, L, S, P>>,
}

struct SupervisorInner<C, L, S, P>
where
    C: ChannelProvider + 'static,
    L: ProcessLauncher + 'static,
    S: SessionStore + 'static,
    P: ResourceProbe + 'static,
{
    channels: Mutex<HashMap<ChannelId, Arc<ChannelSlot>>>,
    provider: Arc<C>,
    launcher: Arc<L>,
    store: Arc<S>,
    logs: Arc<LogSink<S>>,
    archive: Arc<HealthArchive>,
    monitor: HealthMonitor<P, S>,
    settings: SupervisorSettings,
}

impl<C, L, S, P> Supervisor<C, L, S, P>
where
    C: ChannelProvider + 'static,
    L: ProcessLauncher + 'static,
    S: SessionStore + 'static,
    P: ResourceProbe + 'static,
{
    /// Create a new supervisor with injected dependencies
    pub fn new(provider: C, launcher: L, store: S, probe: P, settings: SupervisorSettings) -> Self {
        let store = Arc::new(store);
        let logs = Arc::new(LogSink::new(Arc::clone(&store), settings.max_log_lines));
        let archive = Arc::new(HealthArchive::new(settings.max_health_samples));
        let monitor = HealthMonitor::new(
            Arc::new(probe),
            Arc::clone(&logs),
            Arc::clone(&archive),
            settings.sample_interval,
        );

        Self {
            inner: Arc::new(SupervisorInner {
                channels: Mutex::new(HashMap::new()),
                provider: Arc::new(provider),
                launcher: Arc::new(launcher),
                store,
                logs,
                archive,
                monitor,
                settings,
            }),
        }
    }

    /// Start streaming a channel
    ///
    /// Rejected if the channel is not idle; a start never replaces a live
    /// process handle. An accepted start begins a fresh logical session
    /// with the retry counter reset to zero.
    pub async fn start(&self, channel_id: &ChannelId) -> (bool, String) {
        let slot = self.inner.slot(channel_id).await;
        let mut entry = slot.entry.lock().await;

        if entry.state != ChannelState::Idle {
            let err = SupervisorError::AlreadyRunning {
                channel_id: channel_id.clone(),
            };
            return (false, err.to_string());
        }

        let channel = match self.inner.provider.get_channel(channel_id).await {
            Ok(channel) => channel,
            Err(e) => return (false, e.to_string()),
        };

        entry.retry_count = 0;
        entry.manual_stop = false;
        let session_id = SessionId::new();
        entry.session_id = Some(session_id);

        match self.inner.launch_run(&mut entry, &channel, session_id, 0).await {
            Ok((handle, run_id)) => {
                tokio::spawn(Arc::clone(&self.inner).watch_run(
                    Arc::clone(&slot),
                    channel_id.clone(),
                    session_id,
                    handle,
                    run_id,
                ));
                self.inner
                    .logs
                    .record(
                        channel_id,
                        LogLevel::Info,
                        format!("Stream started successfully for {}", channel.name),
                        Some(run_id),
                    )
                    .await;
                tracing::info!("🎬 Stream started for channel {}", channel_id);
                (true, format!("Streaming {} started successfully", channel.name))
            }
            Err(e) => {
                entry.state = ChannelState::Idle;
                entry.session_id = None;
                self.inner
                    .logs
                    .record(
                        channel_id,
                        LogLevel::Error,
                        format!("Error starting stream: {e}"),
                        None,
                    )
                    .await;
                (false, e.to_string())
            }
        }
    }

    /// Stop streaming a channel
    ///
    /// Marks the channel as manually stopping, terminates the process group
    /// gracefully, and escalates to a forceful kill once the grace period
    /// elapses. The manual-stop flag suppresses auto-retry for this exit
    /// even if the watcher observes it first.
    pub async fn stop(&self, channel_id: &ChannelId) -> (bool, String) {
        let not_running = || {
            let err = SupervisorError::NotRunning {
                channel_id: channel_id.clone(),
            };
            (false, err.to_string())
        };
        let Some(slot) = self.inner.slot_if_exists(channel_id).await else {
            return not_running();
        };

        let (handle, run_id) = {
            let mut entry = slot.entry.lock().await;
            match entry.state {
                ChannelState::Idle => {
                    return not_running();
                }
                ChannelState::Stopping => {
                    return (false, "Stream is already stopping".to_string());
                }
                ChannelState::Retrying => {
                    // No live process during the backoff wait; cancel the
                    // pending restart and close the session out with a
                    // terminal record for the crashed run.
                    entry.state = ChannelState::Idle;
                    entry.session_id = None;
                    entry.manual_stop = false;
                    if let Some(last_run_id) = entry.last_run_id.take() {
                        self.inner
                            .record_terminal(last_run_id, RunStatus::Stopped)
                            .await;
                    }
                    self.inner
                        .logs
                        .record(
                            channel_id,
                            LogLevel::Info,
                            "Pending restart cancelled; stream stopped",
                            None,
                        )
                        .await;
                    return (true, "Stream stopped successfully".to_string());
                }
                ChannelState::Starting | ChannelState::Running => {
                    entry.manual_stop = true;
                    entry.state = ChannelState::Stopping;
                    if let Some(run) = entry.run.as_mut() {
                        run.status = RunStatus::Stopping;
                    }
                    let Some(handle) = entry.handle.clone() else {
                        entry.state = ChannelState::Idle;
                        entry.manual_stop = false;
                        return not_running();
                    };
                    (handle, entry.run.as_ref().map(|r| r.run_id))
                }
            }
        };

        self.inner
            .logs
            .record(channel_id, LogLevel::Info, "Stopping stream...", run_id)
            .await;

        if let Err(e) = handle.terminate() {
            self.inner
                .logs
                .record(
                    channel_id,
                    LogLevel::Error,
                    format!("Error signalling process: {e}"),
                    run_id,
                )
                .await;
        }

        let grace = self.inner.settings.grace_period;
        if tokio::time::timeout(grace, handle.wait()).await.is_err() {
            tracing::warn!(
                "🔨 Channel {} did not exit within {:?}, killing process group",
                channel_id,
                grace
            );
            if let Err(e) = handle.kill() {
                self.inner
                    .logs
                    .record(
                        channel_id,
                        LogLevel::Error,
                        format!("Error killing process: {e}"),
                        run_id,
                    )
                    .await;
            }
            handle.wait().await;
        }

        // The watcher may have finalized this run already; both closers
        // are idempotent and guarded by the run id.
        {
            let mut entry = slot.entry.lock().await;
            if let (Some(run), Some(expected)) = (entry.run.as_ref(), run_id) {
                if run.run_id == expected {
                    self.inner.close_session(&mut entry, RunStatus::Stopped).await;
                }
            }
        }

        self.inner
            .logs
            .record(channel_id, LogLevel::Info, "Stream stopped successfully", run_id)
            .await;
        (true, "Stream stopped successfully".to_string())
    }

    /// Stop every channel that is not idle; used for orderly shutdown
    pub async fn stop_all(&self) -> (bool, String) {
        let channel_ids: Vec<ChannelId> = {
            let channels = self.inner.channels.lock().await;
            channels.keys().cloned().collect()
        };

        let mut stopped = 0;
        for channel_id in channel_ids {
            let (ok, _) = self.stop(&channel_id).await;
            if ok {
                stopped += 1;
            }
        }

        tracing::info!("🛑 All streams stopped ({} were active)", stopped);
        (true, format!("All streams stopped ({stopped} were active)"))
    }

    /// Status snapshot for a channel
    ///
    /// `running` reflects true process existence: the handle's exit channel
    /// is fed directly by the OS wait, so a process the watcher has not yet
    /// processed still reads as dead here.
    pub async fn status(&self, channel_id: &ChannelId) -> ChannelStatus {
        let Some(slot) = self.inner.slot_if_exists(channel_id).await else {
            return ChannelStatus {
                channel_id: channel_id.clone(),
                state: ChannelState::Idle,
                running: false,
                run: None,
                retry_count: 0,
            };
        };

        let entry = slot.entry.lock().await;
        let alive = entry.handle.as_ref().map(|h| h.is_alive()).unwrap_or(false);
        ChannelStatus {
            channel_id: channel_id.clone(),
            state: entry.state,
            running: entry.state == ChannelState::Running && alive,
            run: entry.run.clone(),
            retry_count: entry.retry_count,
        }
    }

    /// Channels with a live run right now
    pub async fn active_channels(&self) -> Vec<ChannelId> {
        let slots: Vec<(ChannelId, Arc<ChannelSlot>)> = {
            let channels = self.inner.channels.lock().await;
            channels.iter().map(|(id, slot)| (id.clone(), Arc::clone(slot))).collect()
        };

        let mut active = Vec::new();
        for (channel_id, slot) in slots {
            let entry = slot.entry.lock().await;
            if entry.state != ChannelState::Idle {
                active.push(channel_id);
            }
        }
        active
    }

    /// Most recent operator log entries for a channel, most-recent last
    pub async fn recent_logs(&self, channel_id: &ChannelId, limit: usize) -> Vec<LogEntry> {
        self.inner.logs.recent(channel_id, limit).await
    }

    /// Most recent health samples for a run, most-recent last
    pub async fn recent_health(&self, run_id: RunId, limit: usize) -> Vec<HealthSample> {
        self.inner.archive.recent(run_id, limit).await
    }
}

impl<C, L, S, P> SupervisorInner<C, L, S, P>
where
    C: ChannelProvider + 'static,
    L: ProcessLauncher + 'static,
    S: SessionStore + 'static,
    P: ResourceProbe + 'static,
{
    async fn slot(&self, channel_id: &ChannelId) -> Arc<ChannelSlot> {
        let mut channels = self.channels.lock().await;
        Arc::clone(
            channels
                .entry(channel_id.clone())
                .or_insert_with(|| Arc::new(ChannelSlot::default())),
        )
    }

    async fn slot_if_exists(&self, channel_id: &ChannelId) -> Option<Arc<ChannelSlot>> {
        let channels = self.channels.lock().await;
        channels.get(channel_id).map(Arc::clone)
    }

    /// Launch the process for a channel and register the new run
    ///
    /// Caller holds the slot lock and resets state on error.
    async fn launch_run(
        &self,
        entry: &mut ChannelEntry,
        channel: &Channel,
        session_id: SessionId,
        retry_count: u32,
    ) -> SupervisorResult<(Arc<dyn ProcessHandle>, RunId)> {
        entry.state = ChannelState::Starting;
        let handle = self.launcher.launch(channel).await?;

        let mut run = StreamRun::new(
            channel.id.clone(),
            session_id,
            handle.pid(),
            channel.source.clone(),
            retry_count,
        );
        let run_id = run.run_id;

        // Bookkeeping failures never block a launched stream
        if let Err(e) = self.store.create_session(&run).await {
            tracing::warn!("⚠️ Failed to persist session record for {}: {}", channel.id, e);
        }
        run.status = RunStatus::Running;

        entry.monitor = Some(self.monitor.spawn(&run, Arc::clone(&handle)));
        entry.handle = Some(Arc::clone(&handle));
        entry.run = Some(run);
        entry.state = ChannelState::Running;

        Ok((handle, run_id))
    }

    /// Close out the current run: end time, outcome status, monitor stop
    ///
    /// Leaves channel state and session fields untouched; idempotent when
    /// the run is already gone.
    async fn finalize_run(&self, entry: &mut ChannelEntry, status: RunStatus) {
        if let Some(mut run) = entry.run.take() {
            let ended_at = Utc::now();
            run.ended_at = Some(ended_at);
            run.status = status;
            entry.last_run_id = Some(run.run_id);
            if let Err(e) = self.store.finalize_session(run.run_id, ended_at, status).await {
                tracing::warn!(
                    "⚠️ Failed to finalize session record for {}: {}",
                    run.channel_id,
                    e
                );
            }
        }
        if let Some(monitor) = entry.monitor.take() {
            monitor.stop();
        }
        entry.handle = None;
    }

    /// Write a terminal record for a run that was already closed with a
    /// non-terminal marker; the session must never end on `crashed`
    async fn record_terminal(&self, run_id: RunId, status: RunStatus) {
        if let Err(e) = self.store.finalize_session(run_id, Utc::now(), status).await {
            tracing::warn!("⚠️ Failed to write terminal session record: {}", e);
        }
    }

    /// Finalize the run and return the channel to idle
    async fn close_session(&self, entry: &mut ChannelEntry, status: RunStatus) {
        self.finalize_run(entry, status).await;
        entry.state = ChannelState::Idle;
        entry.session_id = None;
        entry.manual_stop = false;
    }

    /// Exit watcher: one task per logical session
    ///
    /// Blocks on process exit (no polling), classifies the termination
    /// under the slot lock, and either finalizes the session or relaunches
    /// after the retry delay. The lock is never held across the exit wait
    /// or the backoff sleep.
    async fn watch_run(
        self: Arc<Self>,
        slot: Arc<ChannelSlot>,
        channel_id: ChannelId,
        session_id: SessionId,
        mut handle: Arc<dyn ProcessHandle>,
        mut run_id: RunId,
    ) {
        loop {
            let code = handle.wait().await;

            let mut entry = slot.entry.lock().await;
            if entry.run.as_ref().map(|r| r.run_id) != Some(run_id) {
                // Stop() finalized this run first
                return;
            }

            self.logs
                .record(
                    &channel_id,
                    LogLevel::Warning,
                    format!("Stream ended with code {code}"),
                    Some(run_id),
                )
                .await;

            if entry.manual_stop || entry.state == ChannelState::Stopping {
                self.close_session(&mut entry, RunStatus::Stopped).await;
                self.logs
                    .record(
                        &channel_id,
                        LogLevel::Info,
                        "Stream was manually stopped",
                        Some(run_id),
                    )
                    .await;
                return;
            }

            match self.settings.retry_policy().decide(entry.retry_count, false) {
                RetryDecision::GiveUp => {
                    self.logs
                        .record(
                            &channel_id,
                            LogLevel::Error,
                            format!(
                                "Maximum retry attempts ({}) reached",
                                self.settings.max_retries
                            ),
                            Some(run_id),
                        )
                        .await;
                    self.close_session(&mut entry, RunStatus::Failed).await;
                    tracing::error!("❌ Channel {} failed after exhausting retries", channel_id);
                    return;
                }
                RetryDecision::Retry { delay } => {
                    entry.retry_count += 1;
                    let attempt = entry.retry_count;
                    self.logs
                        .record(
                            &channel_id,
                            LogLevel::Warning,
                            format!("Stream process crashed. Attempting restart #{attempt}"),
                            Some(run_id),
                        )
                        .await;
                    // Internal retry marker, not a terminal session close
                    self.finalize_run(&mut entry, RunStatus::Crashed).await;
                    entry.state = ChannelState::Retrying;
                    drop(entry);

                    tokio::time::sleep(delay).await;

                    let mut entry = slot.entry.lock().await;
                    if entry.state != ChannelState::Retrying
                        || entry.session_id != Some(session_id)
                    {
                        // A manual stop or a fresh start superseded this retry
                        return;
                    }

                    let relaunch = match self.provider.get_channel(&channel_id).await {
                        Ok(channel) => {
                            self.launch_run(&mut entry, &channel, session_id, attempt).await
                        }
                        Err(e) => Err(e),
                    };

                    match relaunch {
                        Ok((new_handle, new_run_id)) => {
                            self.logs
                                .record(
                                    &channel_id,
                                    LogLevel::Info,
                                    "Stream restarted successfully",
                                    Some(new_run_id),
                                )
                                .await;
                            handle = new_handle;
                            run_id = new_run_id;
                        }
                        Err(e) => {
                            self.logs
                                .record(
                                    &channel_id,
                                    LogLevel::Error,
                                    format!("Failed to restart stream: {e}"),
                                    None,
                                )
                                .await;
                            // The session ends here; overwrite the crash
                            // marker with a terminal failure.
                            entry.last_run_id = None;
                            self.record_terminal(run_id, RunStatus::Failed).await;
                            entry.state = ChannelState::Idle;
                            entry.session_id = None;
                            entry.manual_stop = false;
                            return;
                        }
                    }
                }
            }
        }
    }
}
