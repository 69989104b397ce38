//! Channel fixtures and a fully-wired supervisor harness

use std::time::Duration;

use shared::{Channel, ChannelId, Destination, EncodeMode};
use supervisor::{Supervisor, SupervisorSettings};

use super::fakes::{ConstProbe, FakeLauncher, MemoryStore, StaticChannels};

pub fn passthrough_channel(id: &str) -> Channel {
    Channel {
        id: ChannelId::new(id),
        name: format!("Channel {id}"),
        source: "/videos/loop.mp4".to_string(),
        destination: Destination {
            rtmp_url: "rtmp://live.example.com/app/".to_string(),
            stream_key: format!("key-{id}"),
        },
        encode: EncodeMode::Passthrough,
        enabled: true,
    }
}

pub fn transcode_channel(id: &str) -> Channel {
    Channel {
        encode: EncodeMode::Transcode {
            bitrate_kbps: 4000,
            fps: 30,
            preset: "veryfast".to_string(),
        },
        ..passthrough_channel(id)
    }
}

/// Settings scaled down to test time
pub fn test_settings() -> SupervisorSettings {
    SupervisorSettings::default()
        .with_retry_delay(Duration::from_millis(25))
        .with_grace_period(Duration::from_millis(50))
        .with_sample_interval(Duration::from_millis(10))
}

pub struct Harness {
    pub supervisor: Supervisor<StaticChannels, FakeLauncher, MemoryStore, ConstProbe>,
    pub launcher: FakeLauncher,
    pub store: MemoryStore,
}

pub fn harness(channels: Vec<Channel>, settings: SupervisorSettings) -> Harness {
    harness_with(channels, settings, FakeLauncher::new(), ConstProbe::healthy())
}

pub fn harness_with(
    channels: Vec<Channel>,
    settings: SupervisorSettings,
    launcher: FakeLauncher,
    probe: ConstProbe,
) -> Harness {
    let store = MemoryStore::default();
    let supervisor = Supervisor::new(
        StaticChannels::new(channels),
        launcher.clone(),
        store.clone(),
        probe,
        settings,
    );
    Harness {
        supervisor,
        launcher,
        store,
    }
}
