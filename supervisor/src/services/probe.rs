//! sysinfo-backed resource probe
//!
//! One shared `System` refreshed per sample. CPU percentages are
//! measured between consecutive refreshes, so the first sample after a
//! process appears reads near zero and settles on the next interval.

use async_trait::async_trait;
use sysinfo::System;
use tokio::sync::Mutex;

use crate::error::{SupervisorError, SupervisorResult};
use crate::traits::{ResourceProbe, ResourceUsage};

pub struct SysinfoProbe {
    system: Mutex<System>,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResourceProbe for SysinfoProbe {
    async fn usage(&self, pid: u32) -> SupervisorResult<ResourceUsage> {
        let mut system = self.system.lock().await;
        let sys_pid = sysinfo::Pid::from_u32(pid);

        if !system.refresh_process(sys_pid) {
            return Err(SupervisorError::SampleUnavailable {
                pid,
                message: "process not found".to_string(),
            });
        }
        system.refresh_memory();

        let process = system
            .process(sys_pid)
            .ok_or_else(|| SupervisorError::SampleUnavailable {
                pid,
                message: "process disappeared during refresh".to_string(),
            })?;

        let total_memory = system.total_memory();
        let memory_percent = if total_memory > 0 {
            (process.memory() as f32 / total_memory as f32) * 100.0
        } else {
            0.0
        };

        Ok(ResourceUsage {
            cpu_percent: process.cpu_usage(),
            memory_percent,
        })
    }
}
