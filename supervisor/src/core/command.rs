//! Channel → FFmpeg argument list mapping
//!
//! Pure function producing the flat argument list for the transport
//! process. The launcher treats this as opaque; the only contract is a
//! flat argv whose last element is the fully qualified destination URL
//! including the embedded stream key.

use shared::{Channel, EncodeMode};

/// Build the FFmpeg argument list for a channel
///
/// The returned list excludes the program name itself. The input loops
/// forever (`-stream_loop -1`) and is read at native rate (`-re`); the
/// output leg carries reconnect/timeout flags to tolerate transient
/// destination-endpoint hiccups.
pub fn build_launch_args(channel: &Channel) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-loglevel".into(),
        "error".into(),
        "-stats".into(),
        "-re".into(),
        "-stream_loop".into(),
        "-1".into(),
        "-i".into(),
        channel.source.clone(),
    ];

    match &channel.encode {
        EncodeMode::Passthrough => {
            args.extend(["-c:v".into(), "copy".into(), "-c:a".into(), "copy".into()]);
        }
        EncodeMode::Transcode { bitrate_kbps, fps, preset } => {
            args.extend([
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                preset.clone(),
                "-b:v".into(),
                format!("{bitrate_kbps}k"),
                "-maxrate".into(),
                format!("{}k", bitrate_kbps * 3 / 2),
                "-bufsize".into(),
                format!("{}k", bitrate_kbps * 2),
                "-r".into(),
                fps.to_string(),
                "-pix_fmt".into(),
                "yuv420p".into(),
                // Keyframe interval locked to 2 seconds of video
                "-g".into(),
                (fps * 2).to_string(),
                "-c:a".into(),
                "aac".into(),
                "-b:a".into(),
                "128k".into(),
                "-ar".into(),
                "44100".into(),
            ]);
        }
    }

    args.extend([
        "-f".into(),
        "flv".into(),
        "-reconnect".into(),
        "1".into(),
        "-reconnect_streamed".into(),
        "1".into(),
        "-reconnect_delay_max".into(),
        "5".into(),
        "-rw_timeout".into(),
        "10000000".into(),
        channel.destination.full_url(),
    ]);

    args
}
