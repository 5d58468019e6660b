//! Assembly tests against a real FFmpeg install.
//!
//! Fixtures are synthesised with lavfi sources, so no media files are
//! checked in. Run with `--ignored` on a machine with ffmpeg/ffprobe.

use std::path::{Path, PathBuf};

use reel_media::{
    probe_duration, probe_media, AudioMixer, ComposerConfig, DuckingConfig, FfmpegCommand,
    FfmpegRunner, VideoComposer, VoiceoverTrack,
};
use tempfile::TempDir;

const FPS: f64 = 24.0;

async fn render_clip(dir: &Path, name: &str, secs: f64) -> PathBuf {
    let path = dir.join(name);
    let cmd = FfmpegCommand::new(&path)
        .input_with_args(
            ["-f", "lavfi"],
            format!("testsrc=size=320x240:rate={}:duration={}", FPS, secs),
        )
        .input_with_args(
            ["-f", "lavfi"],
            format!("anullsrc=r=48000:cl=stereo:d={}", secs),
        )
        .output_args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-c:a", "aac", "-shortest"]);
    FfmpegRunner::new().run(&cmd).await.unwrap();
    path
}

async fn render_tone(dir: &Path, name: &str, secs: f64) -> PathBuf {
    let path = dir.join(name);
    let cmd = FfmpegCommand::new(&path)
        .input_with_args(["-f", "lavfi"], format!("sine=frequency=440:duration={}", secs))
        .output_args(["-c:a", "libmp3lame", "-b:a", "128k"]);
    FfmpegRunner::new().run(&cmd).await.unwrap();
    path
}

async fn render_silence(dir: &Path, name: &str, secs: f64) -> PathBuf {
    let path = dir.join(name);
    let cmd = FfmpegCommand::new(&path)
        .input_with_args(["-f", "lavfi"], format!("anullsrc=r=44100:cl=mono:d={}", secs))
        .output_args(["-c:a", "libmp3lame"]);
    FfmpegRunner::new().run(&cmd).await.unwrap();
    path
}

async fn render_logo(dir: &Path) -> PathBuf {
    let path = dir.join("logo.png");
    let cmd = FfmpegCommand::new(&path)
        .input_with_args(["-f", "lavfi"], "color=c=red:s=200x100")
        .output_args(["-frames:v", "1"]);
    FfmpegRunner::new().run(&cmd).await.unwrap();
    path
}

/// Mean volume (dB) of `path` between `start` and `start + len`.
async fn mean_volume(path: &Path, start: f64, len: f64) -> f64 {
    let output = tokio::process::Command::new("ffmpeg")
        .args(["-hide_banner", "-ss", &start.to_string(), "-t", &len.to_string(), "-i"])
        .arg(path)
        .args(["-af", "volumedetect", "-f", "null", "-"])
        .output()
        .await
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .find_map(|line| line.split("mean_volume:").nth(1))
        .and_then(|v| v.trim().trim_end_matches("dB").trim().parse().ok())
        .unwrap_or_else(|| panic!("no mean_volume in output:\n{stderr}"))
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_concat_three_clips() {
    let dir = TempDir::new().unwrap();
    let mut clips = Vec::new();
    for i in 0..3 {
        clips.push(render_clip(dir.path(), &format!("video-{i}.mp4"), 5.0).await);
    }

    let out = VideoComposer::default().concat(&clips, dir.path()).await.unwrap();
    let duration = probe_duration(&out).await.unwrap();
    assert!((duration - 15.0).abs() <= 1.0 / FPS + 0.05, "duration was {duration}");
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_zero_segments_passes_music_through() {
    let dir = TempDir::new().unwrap();
    let music = render_tone(dir.path(), "happy.mp3", 12.0).await;
    let out_dir = dir.path().join("out");
    tokio::fs::create_dir_all(&out_dir).await.unwrap();

    let outcome = AudioMixer::default().mix(&music, &[], &out_dir).await.unwrap();
    assert!(outcome.plan.is_passthrough());

    let before = probe_media(&music).await.unwrap();
    let after = probe_media(&outcome.path).await.unwrap();
    assert_eq!(before.audio, after.audio);
    assert!((before.duration.unwrap() - after.duration.unwrap()).abs() < 0.05);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_music_is_ducked_only_inside_window() {
    let dir = TempDir::new().unwrap();
    let music = render_tone(dir.path(), "calm.mp3", 30.0).await;
    // A silent voiceover isolates the ducking gain from the voice itself.
    let voice = render_silence(dir.path(), "voiceover-1.mp3", 4.0).await;

    let mixer = AudioMixer::new(DuckingConfig::default().with_loudness(None));
    let outcome = mixer
        .mix(&music, &[VoiceoverTrack::new(1, &voice, 8.0)], dir.path())
        .await
        .unwrap();
    assert_eq!(outcome.plan.segments.len(), 1);

    let before = mean_volume(&outcome.path, 2.0, 4.0).await;
    let inside = mean_volume(&outcome.path, 9.0, 2.0).await;
    let after = mean_volume(&outcome.path, 20.0, 4.0).await;

    // 20 * log10(0.65) ~= -3.74 dB
    let drop = before - inside;
    assert!((3.0..4.5).contains(&drop), "ducking drop was {drop} dB");
    assert!((before - after).abs() < 0.5);

    let duration = probe_duration(&outcome.path).await.unwrap();
    assert!((duration - 30.0).abs() < 0.1, "mix should follow music length, got {duration}");
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_late_voiceover_is_excluded() {
    let dir = TempDir::new().unwrap();
    let music = render_tone(dir.path(), "dark.mp3", 10.0).await;
    let early = render_silence(dir.path(), "voiceover-0.mp3", 2.0).await;
    let late = render_silence(dir.path(), "voiceover-1.mp3", 2.0).await;

    let outcome = AudioMixer::default()
        .mix(
            &music,
            &[VoiceoverTrack::new(0, &early, 0.0), VoiceoverTrack::new(1, &late, 10.0)],
            dir.path(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.plan.dropped, vec![1]);
    assert_eq!(outcome.plan.segments.len(), 1);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_fade_out_ends_at_video_end() {
    let dir = TempDir::new().unwrap();
    let mut clips = Vec::new();
    for i in 0..3 {
        clips.push(render_clip(dir.path(), &format!("video-{i}.mp4"), 5.0).await);
    }
    let music = render_tone(dir.path(), "happy.mp3", 20.0).await;

    let composer = VideoComposer::new(ComposerConfig::default());
    let concat = composer.concat(&clips, dir.path()).await.unwrap();
    let out = dir.path().join("with-audio.mp4");
    let duration = composer.attach_audio(&concat, &music, &out).await.unwrap();
    assert!((duration - 15.0).abs() < 0.1);

    let steady = mean_volume(&out, 10.0, 1.5).await;
    let tail = mean_volume(&out, 14.0, 0.9).await;
    assert!(steady - tail > 6.0, "tail should be faded: {steady} vs {tail}");

    let final_duration = probe_duration(&out).await.unwrap();
    assert!((final_duration - 15.0).abs() < 0.2);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_compose_with_overlay() {
    let dir = TempDir::new().unwrap();
    let mut clips = Vec::new();
    for i in 0..4 {
        clips.push(render_clip(dir.path(), &format!("video-{i}.mp4"), 2.0).await);
    }
    let music = render_tone(dir.path(), "inspirational.mp3", 10.0).await;
    let logo = render_logo(dir.path()).await;

    let composed = VideoComposer::default()
        .compose(&clips, &music, Some(&logo), dir.path())
        .await
        .unwrap();

    assert!(composed.path.ends_with("final.mp4"));
    assert!((composed.duration - 8.0).abs() < 0.2);

    let info = probe_media(&composed.path).await.unwrap();
    assert_eq!(info.video.unwrap().width, 320);
    assert!(info.audio.is_some());
}
