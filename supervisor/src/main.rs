//! Supervisor daemon entry point
//!
//! Loads channel configuration, auto-starts enabled channels, and runs
//! until interrupted, at which point every live stream is stopped
//! gracefully before exit.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use supervisor::services::{FfmpegLauncher, JsonChannelProvider, JsonlSessionStore, SysinfoProbe};
use supervisor::{Supervisor, SupervisorSettings};

#[derive(Parser, Debug)]
#[command(name = "supervisor", about = "Continuous stream process supervisor")]
struct Args {
    /// Path to the channel configuration file
    #[arg(long, default_value = "channels.json")]
    channels: PathBuf,

    /// Directory for session and log records
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Base log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Crash-restarts allowed per streaming session
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Seconds to wait before each crash-restart
    #[arg(long, default_value_t = 5)]
    retry_delay_secs: u64,

    /// Seconds to wait after SIGTERM before SIGKILL
    #[arg(long, default_value_t = 5)]
    grace_secs: u64,

    /// Seconds between health samples
    #[arg(long, default_value_t = 30)]
    health_interval_secs: u64,

    /// FFmpeg binary to launch
    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    shared::logging::init_tracing_with_level(args.log_level.as_deref());
    shared::logging::log_startup("stream supervisor");

    let provider = JsonChannelProvider::load(&args.channels)?;
    let channel_list = provider.channels();

    let settings = SupervisorSettings::default()
        .with_max_retries(args.max_retries)
        .with_retry_delay(Duration::from_secs(args.retry_delay_secs))
        .with_grace_period(Duration::from_secs(args.grace_secs))
        .with_sample_interval(Duration::from_secs(args.health_interval_secs));

    let supervisor = Supervisor::new(
        provider,
        FfmpegLauncher::new().with_program(args.ffmpeg),
        JsonlSessionStore::new(&args.data_dir)?,
        SysinfoProbe::new(),
        settings,
    );

    for channel in channel_list.iter().filter(|c| c.enabled) {
        let (ok, message) = supervisor.start(&channel.id).await;
        if ok {
            shared::logging::log_success(&message);
        } else {
            tracing::warn!("⚠️ Auto-start skipped for {}: {}", channel.id, message);
        }
    }

    let active = supervisor.active_channels().await;
    tracing::info!(
        "🚀 Supervisor running with {} active stream(s); press Ctrl+C to stop",
        active.len()
    );
    tokio::signal::ctrl_c().await?;

    shared::logging::log_shutdown("interrupt received");
    let (_, message) = supervisor.stop_all().await;
    tracing::info!("✅ {}", message);

    Ok(())
}
