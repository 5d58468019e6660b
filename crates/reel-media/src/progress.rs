//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number (zero for audio-only jobs)
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Progress percentage given the expected output duration in seconds.
    pub fn percentage(&self, total_secs: f64) -> f64 {
        if total_secs <= 0.0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / 1000.0 / total_secs) * 100.0).clamp(0.0, 100.0)
    }

    /// Fold one `key=value` line into the running state.
    ///
    /// Returns a snapshot when a `progress=` line closes a block.
    pub fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" | "out_time_ms" => {
                // FFmpeg reports microseconds under both keys.
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Whether a stderr line belongs to the progress protocol rather than diagnostics.
    pub fn is_progress_line(line: &str) -> bool {
        const KEYS: [&str; 12] = [
            "frame", "fps", "stream_0_0_q", "bitrate", "total_size", "out_time_us",
            "out_time_ms", "out_time", "dup_frames", "drop_frames", "speed", "progress",
        ];
        line.split_once('=')
            .map(|(key, _)| KEYS.contains(&key.trim()))
            .unwrap_or(false)
    }
}

/// Reports one step's encode progress in 10% increments.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    step: String,
    total_secs: f64,
    last_decile: Option<u8>,
}

impl ProgressReporter {
    /// `total_secs` is the expected output duration of the step.
    pub fn new(step: impl Into<String>, total_secs: f64) -> Self {
        Self {
            step: step.into(),
            total_secs,
            last_decile: None,
        }
    }

    /// Record a snapshot. Returns the percentage logged when a new 10% mark
    /// is reached.
    pub fn observe(&mut self, progress: &FfmpegProgress) -> Option<u8> {
        let decile = if progress.is_complete {
            10
        } else {
            (progress.percentage(self.total_secs) / 10.0).floor() as u8
        };
        if self.last_decile.is_some_and(|last| last >= decile) {
            return None;
        }
        self.last_decile = Some(decile);

        let percent = decile * 10;
        debug!(step = %self.step, percent, speed = progress.speed, "FFmpeg progress");
        Some(percent)
    }
}
