//! Voiceover segments placed on the final video timeline.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Closed time interval `[start, end]` in seconds during which a voiceover plays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActiveWindow {
    pub start: f64,
    pub end: f64,
}

impl ActiveWindow {
    /// Membership test, inclusive at both boundaries.
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Whether `t` falls inside any of the windows.
pub fn any_window_contains(windows: &[ActiveWindow], t: f64) -> bool {
    windows.iter().any(|w| w.contains(t))
}

/// Offset of the `index`-th voiceover on a fixed cadence.
pub fn cadence_offset(index: usize, interval_secs: f64) -> f64 {
    index as f64 * interval_secs
}

/// A rendered voiceover utterance with its timeline placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneAudioSegment {
    /// Scene index the utterance belongs to
    pub index: usize,
    /// Local audio file
    pub path: PathBuf,
    /// Start offset on the output timeline (seconds)
    pub offset_secs: f64,
    /// Measured duration of the rendered audio (seconds)
    pub duration_secs: f64,
}

impl SceneAudioSegment {
    /// Create a segment, validating its timing.
    pub fn new(
        index: usize,
        path: impl AsRef<Path>,
        offset_secs: f64,
        duration_secs: f64,
    ) -> ModelResult<Self> {
        if !offset_secs.is_finite() || offset_secs < 0.0 {
            return Err(ModelError::invalid_segment(format!(
                "segment {index} has invalid offset {offset_secs}"
            )));
        }
        if !duration_secs.is_finite() || duration_secs < 0.0 {
            return Err(ModelError::invalid_segment(format!(
                "segment {index} has invalid duration {duration_secs}"
            )));
        }

        Ok(Self {
            index,
            path: path.as_ref().to_path_buf(),
            offset_secs,
            duration_secs,
        })
    }

    /// Active window `[offset, offset + duration]`.
    pub fn window(&self) -> ActiveWindow {
        ActiveWindow {
            start: self.offset_secs,
            end: self.offset_secs + self.duration_secs,
        }
    }

    /// Whether the segment starts before the anchor track ends.
    pub fn starts_before(&self, total_secs: f64) -> bool {
        self.offset_secs < total_secs
    }

    /// Offset in whole milliseconds, as the delay filter expects.
    pub fn offset_ms(&self) -> u64 {
        (self.offset_secs * 1000.0).round() as u64
    }
}

/// Check that offsets never decrease with segment order.
pub fn validate_ordering(segments: &[SceneAudioSegment]) -> ModelResult<()> {
    for pair in segments.windows(2) {
        if pair[1].offset_secs < pair[0].offset_secs {
            return Err(ModelError::invalid_segment(format!(
                "segment {} starts at {:.3}s before segment {} at {:.3}s",
                pair[1].index, pair[1].offset_secs, pair[0].index, pair[0].offset_secs
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_inclusive() {
        let seg = SceneAudioSegment::new(1, "vo-1.mp3", 8.0, 4.0).unwrap();
        let w = seg.window();
        assert!(w.contains(8.0));
        assert!(w.contains(12.0));
        assert!(w.contains(10.0));
        assert!(!w.contains(7.999));
        assert!(!w.contains(12.001));
        assert!((w.duration() - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_union_membership() {
        let windows = [
            ActiveWindow { start: 0.0, end: 2.0 },
            ActiveWindow { start: 8.0, end: 11.5 },
        ];
        assert!(any_window_contains(&windows, 1.0));
        assert!(any_window_contains(&windows, 9.0));
        assert!(!any_window_contains(&windows, 5.0));
    }

    #[test]
    fn test_cadence_and_ordering() {
        let segments: Vec<_> = (0..4)
            .map(|i| SceneAudioSegment::new(i, format!("vo-{i}.mp3"), cadence_offset(i, 8.0), 3.0).unwrap())
            .collect();
        assert_eq!(segments[3].offset_secs, 24.0);
        assert_eq!(segments[3].offset_ms(), 24_000);
        assert!(validate_ordering(&segments).is_ok());

        let reversed: Vec<_> = segments.into_iter().rev().collect();
        assert!(validate_ordering(&reversed).is_err());
    }

    #[test]
    fn test_rejects_negative_timing() {
        assert!(SceneAudioSegment::new(0, "a.mp3", -1.0, 2.0).is_err());
        assert!(SceneAudioSegment::new(0, "a.mp3", 0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_starts_before() {
        let seg = SceneAudioSegment::new(2, "a.mp3", 16.0, 2.0).unwrap();
        assert!(seg.starts_before(16.5));
        assert!(!seg.starts_before(16.0));
    }
}
