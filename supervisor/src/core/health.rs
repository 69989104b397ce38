//! Health classification rule for live streams

use shared::HealthStatus;

/// Classify a health sample from CPU usage and dropped-frame count
///
/// Fixed thresholds, evaluated on every sample: critical beats warning,
/// warning beats healthy.
pub fn classify(cpu_percent: f32, dropped_frames: u64) -> HealthStatus {
    if dropped_frames > 100 || cpu_percent > 90.0 {
        HealthStatus::Critical
    } else if dropped_frames > 50 || cpu_percent > 70.0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}
