//! Logo overlay.
//!
//! The logo is scaled to a fraction of the video width, keeping its aspect
//! ratio, and pinned to one corner with a fixed pixel margin. Overlay
//! compositing always re-encodes the video stream; audio is copied.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::encoding::EncodingConfig;
use crate::error::{MediaError, MediaResult};
use crate::filters::scale_to_width_filter;

/// Corner the logo is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayCorner {
    TopLeft,
    #[default]
    TopRight,
    BottomLeft,
    BottomRight,
}

impl OverlayCorner {
    /// `overlay` x:y position expression with `margin` pixels from both edges.
    pub fn position_expr(&self, margin: u32) -> String {
        match self {
            OverlayCorner::TopLeft => format!("{m}:{m}", m = margin),
            OverlayCorner::TopRight => format!("W-w-{m}:{m}", m = margin),
            OverlayCorner::BottomLeft => format!("{m}:H-h-{m}", m = margin),
            OverlayCorner::BottomRight => format!("W-w-{m}:H-h-{m}", m = margin),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayCorner::TopLeft => "top_left",
            OverlayCorner::TopRight => "top_right",
            OverlayCorner::BottomLeft => "bottom_left",
            OverlayCorner::BottomRight => "bottom_right",
        }
    }
}

impl fmt::Display for OverlayCorner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayCorner {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "top_left" => Ok(OverlayCorner::TopLeft),
            "top_right" => Ok(OverlayCorner::TopRight),
            "bottom_left" => Ok(OverlayCorner::BottomLeft),
            "bottom_right" => Ok(OverlayCorner::BottomRight),
            other => Err(MediaError::invalid_config(format!("unknown overlay corner: {other}"))),
        }
    }
}

/// Configuration for logo overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayConfig {
    /// Logo width as a fraction of the video width
    pub scale: f64,
    /// Distance from both edges of the chosen corner (pixels)
    pub margin: u32,
    pub corner: OverlayCorner,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            scale: 0.15,
            margin: 20,
            corner: OverlayCorner::TopRight,
        }
    }
}

impl OverlayConfig {
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_margin(mut self, margin: u32) -> Self {
        self.margin = margin;
        self
    }

    pub fn with_corner(mut self, corner: OverlayCorner) -> Self {
        self.corner = corner;
        self
    }

    pub fn validate(&self) -> MediaResult<()> {
        if !(self.scale > 0.0 && self.scale <= 1.0) {
            return Err(MediaError::invalid_config(format!(
                "overlay scale must be within (0, 1], got {}",
                self.scale
            )));
        }
        Ok(())
    }

    /// Logo width in pixels for a video `video_width` pixels wide (even, at least 2).
    pub fn logo_width(&self, video_width: u32) -> u32 {
        let width = (video_width as f64 * self.scale).round() as u32;
        (width - width % 2).max(2)
    }

    /// Filter graph for inputs `[0:v]` (video) and `[1:v]` (logo), output `[vout]`.
    pub fn build_overlay_filter(&self, video_width: u32) -> String {
        format!(
            "[1:v]{}[logo];[0:v][logo]overlay={}:format=auto[vout]",
            scale_to_width_filter(self.logo_width(video_width)),
            self.corner.position_expr(self.margin)
        )
    }
}

/// Composite `logo` over `input` into `output`.
pub async fn apply_overlay(
    runner: &FfmpegRunner,
    input: &Path,
    logo: &Path,
    output: &Path,
    video_width: u32,
    config: &OverlayConfig,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    config.validate()?;
    if !logo.exists() {
        return Err(MediaError::FileNotFound(logo.to_path_buf()));
    }

    info!(
        video = %input.display(),
        logo = %logo.display(),
        corner = %config.corner,
        width = config.logo_width(video_width),
        "Applying logo overlay"
    );

    let cmd = FfmpegCommand::new(output)
        .label("overlay")
        .input(input)
        .input(logo)
        .filter_complex(config.build_overlay_filter(video_width))
        .map("[vout]")
        .map("0:a?")
        .output_args(encoding.video_args())
        .audio_codec("copy")
        .output_args(["-movflags", "+faststart"]);

    runner.run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OverlayConfig::default();
        assert!((config.scale - 0.15).abs() < f64::EPSILON);
        assert_eq!(config.margin, 20);
        assert_eq!(config.corner, OverlayCorner::TopRight);
    }

    #[test]
    fn test_logo_width_is_even_fraction() {
        let config = OverlayConfig::default();
        assert_eq!(config.logo_width(1280), 192);
        assert_eq!(config.logo_width(1920), 288);
        // 854 * 0.15 = 128.1
        assert_eq!(config.logo_width(854), 128);
        assert_eq!(config.with_scale(0.001).logo_width(100), 2);
    }

    #[test]
    fn test_overlay_filter_top_right() {
        let filter = OverlayConfig::default().build_overlay_filter(1280);
        assert_eq!(
            filter,
            "[1:v]scale=192:-2[logo];[0:v][logo]overlay=W-w-20:20:format=auto[vout]"
        );
    }

    #[test]
    fn test_corner_positions() {
        assert_eq!(OverlayCorner::TopLeft.position_expr(10), "10:10");
        assert_eq!(OverlayCorner::BottomLeft.position_expr(10), "10:H-h-10");
        assert_eq!(OverlayCorner::BottomRight.position_expr(10), "W-w-10:H-h-10");
        assert_eq!("bottom-right".parse::<OverlayCorner>().unwrap(), OverlayCorner::BottomRight);
        assert!("middle".parse::<OverlayCorner>().is_err());
    }

    #[test]
    fn test_scale_validation() {
        assert!(OverlayConfig::default().validate().is_ok());
        assert!(OverlayConfig::default().with_scale(0.0).validate().is_err());
        assert!(OverlayConfig::default().with_scale(1.2).validate().is_err());
    }

    #[tokio::test]
    async fn test_missing_logo() {
        let dir = tempfile::tempdir().unwrap();
        let err = apply_overlay(
            &FfmpegRunner::new(),
            &dir.path().join("in.mp4"),
            &dir.path().join("logo.png"),
            &dir.path().join("out.mp4"),
            1280,
            &OverlayConfig::default(),
            &EncodingConfig::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
