//! JSON-file channel configuration provider
//!
//! Channels live in a single JSON array loaded once at startup. The
//! supervisor reads snapshots by id; nothing here mutates configuration.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use shared::{Channel, ChannelId};

use crate::error::{SupervisorError, SupervisorResult};
use crate::traits::ChannelProvider;

pub struct JsonChannelProvider {
    channels: HashMap<ChannelId, Channel>,
}

impl JsonChannelProvider {
    /// Load channel configuration from a JSON array file
    pub fn load(path: impl AsRef<Path>) -> SupervisorResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let channels: Vec<Channel> = serde_json::from_str(&contents)?;
        tracing::info!("📋 Loaded {} channel(s) from {}", channels.len(), path.as_ref().display());
        Ok(Self::from_channels(channels))
    }

    pub fn from_channels(channels: Vec<Channel>) -> Self {
        Self {
            channels: channels.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// All configured channels, in no particular order
    pub fn channels(&self) -> Vec<Channel> {
        self.channels.values().cloned().collect()
    }
}

#[async_trait]
impl ChannelProvider for JsonChannelProvider {
    async fn get_channel(&self, channel_id: &ChannelId) -> SupervisorResult<Channel> {
        self.channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| SupervisorError::ChannelNotFound {
                channel_id: channel_id.clone(),
            })
    }

    async fn list_channels(&self) -> SupervisorResult<Vec<Channel>> {
        Ok(self.channels())
    }
}
