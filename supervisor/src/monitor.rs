//! Per-run health monitoring
//!
//! One sampling task per live stream run. Each tick samples CPU/memory via
//! the injected probe and the encoder's last-known quality signals from the
//! process handle, classifies the result, and appends it to the archive.
//! A critical classification is surfaced to the operator log immediately.
//!
//! Sample streams are detached, not deleted, when a run ends so the tail
//! of samples leading up to a crash stays available for post-mortems.

use crate::core::{classify, LogSink};
use crate::traits::{ProcessHandle, ResourceProbe, ResourceUsage, SessionStore};
use chrono::Utc;
use shared::{HealthSample, HealthStatus, LogLevel, RunId, StreamRun};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Default interval between health samples
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(30);

/// Append-only store of health samples, keyed by run
///
/// Bounded to the most recent `capacity` samples per run. Runs are never
/// removed here; a finished run's samples stay readable.
pub struct HealthArchive {
    samples: Mutex<HashMap<RunId, VecDeque<HealthSample>>>,
    capacity: usize,
}

impl HealthArchive {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub async fn append(&self, sample: HealthSample) {
        let mut samples = self.samples.lock().await;
        let ring = samples.entry(sample.run_id).or_default();
        ring.push_back(sample);
        while ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// Most recent samples for a run, oldest first
    pub async fn recent(&self, run_id: RunId, limit: usize) -> Vec<HealthSample> {
        let samples = self.samples.lock().await;
        match samples.get(&run_id) {
            Some(ring) => {
                let skip = ring.len().saturating_sub(limit);
                ring.iter().skip(skip).cloned().collect()
            }
            None => Vec::new(),
        }
    }
}

/// Handle to a running monitor task
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Cancel the monitor; observed within one sampling interval
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns and owns the per-run sampling tasks
pub struct HealthMonitor<P, S>
where
    P: ResourceProbe + 'static,
    S: SessionStore + 'static,
{
    probe: Arc<P>,
    logs: Arc<LogSink<S>>,
    archive: Arc<HealthArchive>,
    sample_interval: Duration,
}

impl<P, S> HealthMonitor<P, S>
where
    P: ResourceProbe + 'static,
    S: SessionStore + 'static,
{
    pub fn new(
        probe: Arc<P>,
        logs: Arc<LogSink<S>>,
        archive: Arc<HealthArchive>,
        sample_interval: Duration,
    ) -> Self {
        Self {
            probe,
            logs,
            archive,
            sample_interval,
        }
    }

    /// Start monitoring a live run
    pub fn spawn(&self, run: &StreamRun, handle: Arc<dyn ProcessHandle>) -> MonitorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let probe = Arc::clone(&self.probe);
        let logs = Arc::clone(&self.logs);
        let archive = Arc::clone(&self.archive);
        let sample_interval = self.sample_interval;
        let run_id = run.run_id;
        let channel_id = run.channel_id.clone();
        let pid = run.pid;

        let task = tokio::spawn(async move {
            let mut ticker = interval(sample_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_usage = ResourceUsage {
                cpu_percent: 0.0,
                memory_percent: 0.0,
            };

            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        if !handle.is_alive() {
                            break;
                        }

                        // Sample failures are non-fatal: keep last-known values
                        match probe.usage(pid).await {
                            Ok(usage) => last_usage = usage,
                            Err(e) => {
                                tracing::debug!("📉 Sample unavailable for pid {}: {}", pid, e);
                            }
                        }
                        let quality = handle.quality();
                        let status = classify(last_usage.cpu_percent, quality.dropped_frames);

                        if status == HealthStatus::Critical {
                            logs.record(
                                &channel_id,
                                LogLevel::Warning,
                                format!(
                                    "Stream health critical for channel {}: CPU {:.0}%, dropped frames: {}",
                                    channel_id, last_usage.cpu_percent, quality.dropped_frames
                                ),
                                Some(run_id),
                            )
                            .await;
                        }

                        archive
                            .append(HealthSample {
                                timestamp: Utc::now(),
                                channel_id: channel_id.clone(),
                                run_id,
                                cpu_percent: last_usage.cpu_percent,
                                memory_percent: last_usage.memory_percent,
                                fps: quality.fps,
                                bitrate_kbps: quality.bitrate_kbps,
                                dropped_frames: quality.dropped_frames,
                                status,
                            })
                            .await;
                    }
                }
            }
        });

        MonitorHandle { stop_tx, task }
    }
}
