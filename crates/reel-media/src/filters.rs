//! FFmpeg filter-graph fragments for audio mixing and composition.
//!
//! Times are rendered with millisecond precision. Expressions containing
//! commas are single-quoted so they survive filter-graph parsing.

use reel_models::ActiveWindow;

/// Loudness target applied to the final mix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessTarget {
    /// Integrated loudness (LUFS)
    pub integrated: f64,
    /// Maximum true peak (dBTP)
    pub true_peak: f64,
    /// Loudness range (LU)
    pub range: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated: -16.0,
            true_peak: -1.5,
            range: 11.0,
        }
    }
}

/// Time-varying gain expression: `attenuation` inside any window, 1 elsewhere.
///
/// `between` is inclusive at both ends, and the sum makes the test hold
/// for the union of all windows. Evaluated per frame (`eval=frame`).
pub fn build_ducking_volume_expr(windows: &[ActiveWindow], attenuation: f64) -> String {
    if windows.is_empty() {
        return "1".to_string();
    }
    let tests: Vec<String> = windows
        .iter()
        .map(|w| format!("between(t,{:.3},{:.3})", w.start, w.end))
        .collect();
    format!("if({},{},1)", tests.join("+"), format_gain(attenuation))
}

/// `volume` filter applying the ducking expression.
pub fn ducking_volume_filter(windows: &[ActiveWindow], attenuation: f64) -> String {
    format!(
        "volume='{}':eval=frame",
        build_ducking_volume_expr(windows, attenuation)
    )
}

/// Delay every channel by `offset_ms`, padding with silence.
pub fn adelay_filter(offset_ms: u64) -> String {
    format!("adelay={}:all=1", offset_ms)
}

/// Parallel mix whose length follows the first input.
pub fn amix_filter(weights: &[f64]) -> String {
    let weights: Vec<String> = weights.iter().map(|w| format_gain(*w)).collect();
    format!(
        "amix=inputs={}:duration=first:dropout_transition=0:normalize=0:weights='{}'",
        weights.len(),
        weights.join(" ")
    )
}

/// EBU R128 loudness normalisation.
pub fn loudnorm_filter(target: &LoudnessTarget) -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}",
        target.integrated, target.true_peak, target.range
    )
}

/// Audio fade-out starting at `start` seconds.
pub fn afade_out_filter(start: f64, duration: f64) -> String {
    format!("afade=t=out:st={:.3}:d={:.3}", start, duration)
}

/// Scale to a fixed width, keeping aspect ratio with an even height.
pub fn scale_to_width_filter(width: u32) -> String {
    format!("scale={}:-2", width)
}

/// One line of a concat-demuxer list file.
pub fn concat_list_entry(path: &str) -> String {
    // Single quotes cannot be escaped inside a quoted string: close, escape, reopen.
    format!("file '{}'", path.replace('\'', r"'\''"))
}

fn format_gain(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
