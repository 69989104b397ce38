//! FFmpeg progress-line parsing
//!
//! FFmpeg's `-stats` output interleaves lines like
//! `frame=  120 fps= 30 q=28.0 size= 256kB time=00:00:04.00 bitrate= 524.3kbits/s drop=3 speed=1x`
//! on stderr. Parsing is best-effort: any field that fails to parse is
//! simply absent from the update and the caller keeps its last-known value.

use shared::QualityStats;

/// Partial quality update extracted from one progress line
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QualityUpdate {
    pub fps: Option<f32>,
    pub bitrate_kbps: Option<f32>,
    pub dropped_frames: Option<u64>,
}

impl QualityUpdate {
    pub fn is_empty(&self) -> bool {
        self.fps.is_none() && self.bitrate_kbps.is_none() && self.dropped_frames.is_none()
    }

    /// Merge this update over last-known stats
    pub fn apply(&self, stats: &mut QualityStats) {
        if let Some(fps) = self.fps {
            stats.fps = fps;
        }
        if let Some(bitrate) = self.bitrate_kbps {
            stats.bitrate_kbps = bitrate;
        }
        if let Some(dropped) = self.dropped_frames {
            stats.dropped_frames = dropped;
        }
    }
}

/// Parse one stderr line from the encoder, if it is a progress line
pub fn parse_progress_line(line: &str) -> Option<QualityUpdate> {
    if !line.contains("frame=") {
        return None;
    }

    // FFmpeg pads values after '=', e.g. "fps= 30"; collapse that so the
    // line splits into key=value tokens.
    let mut compact = line.trim().to_string();
    while compact.contains("= ") {
        compact = compact.replace("= ", "=");
    }

    let mut update = QualityUpdate::default();
    for token in compact.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key {
            "fps" => update.fps = value.parse::<f32>().ok(),
            "bitrate" => {
                update.bitrate_kbps = value
                    .strip_suffix("kbits/s")
                    .and_then(|v| v.parse::<f32>().ok());
            }
            "drop" => update.dropped_frames = value.parse::<u64>().ok(),
            _ => {}
        }
    }

    if update.is_empty() {
        None
    } else {
        Some(update)
    }
}
