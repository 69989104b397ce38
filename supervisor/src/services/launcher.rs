//! FFmpeg process launcher
//!
//! Spawns FFmpeg detached into its own process group so terminate/kill
//! signals reach the whole subprocess tree, pipes stderr through the
//! progress parser to keep last-known quality stats fresh, and reports
//! exit through a watch channel fed by the single task that owns the
//! child and reaps it.

use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::watch;

use shared::{Channel, QualityStats};

use crate::core::{build_launch_args, parse_progress_line};
use crate::error::{SupervisorError, SupervisorResult};
use crate::traits::{ProcessHandle, ProcessLauncher};

/// Launches FFmpeg for channel configurations
pub struct FfmpegLauncher {
    program: String,
}

impl FfmpegLauncher {
    pub fn new() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }

    /// Override the binary to launch (fluent API)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn validate(channel: &Channel) -> SupervisorResult<()> {
        if channel.source.trim().is_empty() {
            return Err(SupervisorError::config("channel has no source file"));
        }
        if channel.destination.rtmp_url.trim().is_empty()
            || channel.destination.stream_key.trim().is_empty()
        {
            return Err(SupervisorError::config(
                "channel has no usable destination URL or stream key",
            ));
        }
        if !Path::new(&channel.source).exists() {
            return Err(SupervisorError::SourceNotFound {
                path: channel.source.clone(),
            });
        }
        Ok(())
    }
}

impl Default for FfmpegLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLauncher for FfmpegLauncher {
    async fn launch(&self, channel: &Channel) -> SupervisorResult<Arc<dyn ProcessHandle>> {
        Self::validate(channel)?;

        let args = build_launch_args(channel);
        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // New process group: signals target the whole FFmpeg tree without
        // touching the supervisor itself.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .map_err(|e| SupervisorError::launch(e.to_string()))?;

        let pid = child
            .id()
            .ok_or_else(|| SupervisorError::launch("process exited before pid was known"))?;

        let quality = Arc::new(RwLock::new(QualityStats::default()));

        if let Some(stderr) = child.stderr.take() {
            let quality = Arc::clone(&quality);
            let channel_id = channel.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(update) = parse_progress_line(&line) {
                        if let Ok(mut stats) = quality.write() {
                            update.apply(&mut stats);
                        }
                    } else if !line.trim().is_empty() {
                        tracing::debug!("📺 [{}] ffmpeg: {}", channel_id, line.trim());
                    }
                }
            });
        }

        // The reaper task is the sole owner of the child; everyone else
        // observes exit through the watch channel.
        let (exit_tx, exit_rx) = watch::channel(None::<i32>);
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code().unwrap_or(-1),
                Err(e) => {
                    tracing::warn!("⚠️ Failed to reap pid {}: {}", pid, e);
                    -1
                }
            };
            let _ = exit_tx.send(Some(code));
        });

        tracing::info!("🎥 Spawned {} (pid {}) for channel {}", self.program, pid, channel.id);

        Ok(Arc::new(StreamProcess {
            pid,
            exit_rx,
            quality,
        }))
    }
}

/// Handle to a spawned FFmpeg process group
#[derive(Debug)]
pub struct StreamProcess {
    pid: u32,
    exit_rx: watch::Receiver<Option<i32>>,
    quality: Arc<RwLock<QualityStats>>,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: nix::sys::signal::Signal) -> SupervisorResult<()> {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), signal) {
        Ok(()) => Ok(()),
        // Already gone counts as delivered
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(SupervisorError::SignalFailed {
            pid,
            message: e.to_string(),
        }),
    }
}

#[async_trait]
impl ProcessHandle for StreamProcess {
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
                // Reaper dropped without publishing a code
                return -1;
            }
        }
    }

    #[cfg(unix)]
    fn terminate(&self) -> SupervisorResult<()> {
        signal_group(self.pid, nix::sys::signal::Signal::SIGTERM)
    }

    #[cfg(not(unix))]
    fn terminate(&self) -> SupervisorResult<()> {
        Err(SupervisorError::SignalFailed {
            pid: self.pid,
            message: "process group signalling is unsupported on this platform".to_string(),
        })
    }

    #[cfg(unix)]
    fn kill(&self) -> SupervisorResult<()> {
        signal_group(self.pid, nix::sys::signal::Signal::SIGKILL)
    }

    #[cfg(not(unix))]
    fn kill(&self) -> SupervisorResult<()> {
        Err(SupervisorError::SignalFailed {
            pid: self.pid,
            message: "process group signalling is unsupported on this platform".to_string(),
        })
    }

    fn quality(&self) -> QualityStats {
        self.quality.read().map(|stats| *stats).unwrap_or_default()
    }
}
