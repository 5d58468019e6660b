//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video stream parameters relevant to stream-copy compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStreamInfo {
    pub codec: String,
    pub width: u32,
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    pub pix_fmt: Option<String>,
}

/// Audio stream parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioStreamInfo {
    pub codec: String,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

/// Media file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds, when the container or a stream reports one
    pub duration: Option<f64>,
    /// First video stream
    pub video: Option<VideoStreamInfo>,
    /// First audio stream
    pub audio: Option<AudioStreamInfo>,
    /// Container format name (e.g. "mov,mp4,m4a,3gp,3g2,mj2")
    pub format_name: String,
    /// File size in bytes
    pub size: u64,
}

impl MediaInfo {
    /// Whether a second file can be stream-copied after this one.
    ///
    /// Returns a description of the first mismatch found.
    pub fn concat_mismatch(&self, other: &MediaInfo) -> Option<String> {
        match (&self.video, &other.video) {
            (Some(a), Some(b)) => {
                if a.codec != b.codec {
                    return Some(format!("video codec {} vs {}", a.codec, b.codec));
                }
                if (a.width, a.height) != (b.width, b.height) {
                    return Some(format!(
                        "resolution {}x{} vs {}x{}",
                        a.width, a.height, b.width, b.height
                    ));
                }
                if (a.fps - b.fps).abs() > 0.01 {
                    return Some(format!("frame rate {:.3} vs {:.3}", a.fps, b.fps));
                }
            }
            (None, None) => {}
            _ => return Some("video stream present in only one clip".to_string()),
        }

        match (&self.audio, &other.audio) {
            (Some(a), Some(b)) if a.codec != b.codec => {
                Some(format!("audio codec {} vs {}", a.codec, b.codec))
            }
            (Some(_), None) | (None, Some(_)) => {
                Some("audio stream present in only one clip".to_string())
            }
            _ => None,
        }
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    #[serde(default)]
    format_name: String,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    pix_fmt: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
    duration: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::ffprobe_failed(
            format!("ffprobe could not read {}", path.display()),
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    let info = parse_probe_output(&output.stdout)?;
    debug!(path = %path.display(), duration = ?info.duration, "Probed media");
    Ok(info)
}

/// Measured duration of a media file in seconds.
///
/// A missing or non-positive duration is `DurationUnknown`, never a default.
pub async fn probe_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    let path = path.as_ref();
    probe_media(path)
        .await?
        .duration
        .ok_or_else(|| MediaError::DurationUnknown(path.to_path_buf()))
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .map(|s| VideoStreamInfo {
            codec: s.codec_name.clone().unwrap_or_default(),
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
            fps: s
                .avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
                .unwrap_or(0.0),
            pix_fmt: s.pix_fmt.clone(),
        });

    let audio = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "audio")
        .map(|s| AudioStreamInfo {
            codec: s.codec_name.clone().unwrap_or_default(),
            sample_rate: s.sample_rate.as_deref().and_then(|r| r.parse().ok()),
            channels: s.channels,
        });

    // Container duration first; fall back to the longest stream.
    let duration = parse_positive(probe.format.duration.as_deref()).or_else(|| {
        probe
            .streams
            .iter()
            .filter_map(|s| parse_positive(s.duration.as_deref()))
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))))
    });

    Ok(MediaInfo {
        duration,
        video,
        audio,
        format_name: probe.format.format_name,
        size: probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
    })
}

fn parse_positive(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok()
}
