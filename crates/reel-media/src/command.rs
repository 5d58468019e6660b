//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{FfmpegProgress, ProgressReporter};

/// Diagnostic lines retained from stderr for failure reports.
const MAX_DIAGNOSTIC_LINES: usize = 64;

/// One `-i` input with the options that precede it.
#[derive(Debug, Clone)]
struct FfmpegInput {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands with any number of inputs.
///
/// Inputs are numbered in the order they are added, which is the order
/// filter graphs refer to them (`[0:v]`, `[1:a]`, ...).
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Short name used in logs and error messages
    label: String,
    inputs: Vec<FfmpegInput>,
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
    overwrite: bool,
}

impl FfmpegCommand {
    /// Create a command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            label: "ffmpeg".to_string(),
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Name the step for logs and diagnostics.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Add an input file.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args(Vec::<String>::new(), path)
    }

    /// Add an input file preceded by input options (e.g. `-f concat`).
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Select a stream or filter-graph label for the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Copy all selected streams without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// End the output with the shortest mapped stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn step_label(&self) -> &str {
        &self.label
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push("error".to_string());
        args.push("-nostats".to_string());

        // Progress output to stderr, interleaved with diagnostics
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands.
///
/// `run` looks synchronous to the caller: it resolves once the subprocess
/// exits. Stderr is streamed over a channel so progress can be reported
/// and diagnostics kept for the error on failure.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Kill any command still running after `secs`.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    pub fn has_cancel(&self) -> bool {
        self.cancel_rx.is_some()
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run a command whose output should last `expected_secs`, logging
    /// progress as it goes.
    pub async fn run_timed(&self, cmd: &FfmpegCommand, expected_secs: f64) -> MediaResult<()> {
        let mut reporter = ProgressReporter::new(cmd.step_label(), expected_secs);
        self.run_with_progress(cmd, |snapshot| {
            reporter.observe(&snapshot);
        })
        .await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(&self, cmd: &FfmpegCommand, mut on_progress: F) -> MediaResult<()>
    where
        F: FnMut(FfmpegProgress),
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!(step = %cmd.label, "Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr was not captured", None, None))?;

        let (line_tx, mut line_rx) = mpsc::channel::<String>(256);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line_tx.send(line).await.is_err() {
                    break;
                }
            }
        });

        let mut progress = FfmpegProgress::default();
        let mut diagnostics: VecDeque<String> = VecDeque::new();
        let mut handle_line = |line: String, progress: &mut FfmpegProgress| {
            if FfmpegProgress::is_progress_line(&line) {
                if let Some(snapshot) = progress.apply_line(&line) {
                    on_progress(snapshot);
                }
            } else if !line.trim().is_empty() {
                if diagnostics.len() == MAX_DIAGNOSTIC_LINES {
                    diagnostics.pop_front();
                }
                diagnostics.push_back(line);
            }
        };

        let deadline = self
            .timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        let mut cancel_rx = self.cancel_rx.clone();
        let mut stderr_open = true;

        let status = loop {
            tokio::select! {
                line = line_rx.recv(), if stderr_open => match line {
                    Some(line) => handle_line(line, &mut progress),
                    None => stderr_open = false,
                },
                status = child.wait() => break status?,
                _ = wait_for_cancel(&mut cancel_rx) => {
                    info!(step = %cmd.label, "FFmpeg cancelled, killing process");
                    let _ = child.kill().await;
                    reader.abort();
                    return Err(MediaError::Cancelled);
                }
                _ = sleep_until(deadline) => {
                    let secs = self.timeout_secs.unwrap_or_default();
                    warn!(step = %cmd.label, "FFmpeg timed out after {} seconds, killing process", secs);
                    let _ = child.kill().await;
                    reader.abort();
                    return Err(MediaError::Timeout(secs));
                }
            }
        };

        // The process has exited; collect whatever stderr is still buffered.
        let _ = reader.await;
        while let Ok(line) = line_rx.try_recv() {
            handle_line(line, &mut progress);
        }

        if status.success() {
            debug!(step = %cmd.label, "FFmpeg finished");
            return Ok(());
        }

        let stderr = Vec::from(diagnostics).join("\n");
        let message = match status.code() {
            Some(code) => format!("{} exited with status {}", cmd.label, code),
            None => format!("{} was terminated by a signal", cmd.label),
        };
        warn!(step = %cmd.label, exit_code = ?status.code(), "FFmpeg failed");

        Err(MediaError::ffmpeg_failed(
            message,
            (!stderr.is_empty()).then_some(stderr),
            status.code(),
        ))
    }
}

/// Resolve once the cancel flag is raised; never resolves without a receiver.
async fn wait_for_cancel(cancel_rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = cancel_rx.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without cancelling.
            return std::future::pending().await;
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_are_numbered_in_order() {
        let cmd = FfmpegCommand::new("out.m4a")
            .label("mix")
            .input("music.mp3")
            .input_with_args(["-f", "concat", "-safe", "0"], "list.txt")
            .filter_complex("[0:a][1:a]amix=inputs=2[out]")
            .map("[out]");

        let args = cmd.build_args();
        let first = args.iter().position(|a| a == "music.mp3").unwrap();
        let concat = args.iter().position(|a| a == "concat").unwrap();
        let second = args.iter().position(|a| a == "list.txt").unwrap();
        let filter = args.iter().position(|a| a == "-filter_complex").unwrap();

        assert!(first < concat && concat < second && second < filter);
        assert_eq!(args.last().unwrap(), "out.m4a");
        assert_eq!(args[0], "-y");
        assert_eq!(cmd.input_count(), 2);
        assert_eq!(cmd.step_label(), "mix");
    }

    #[test]
    fn test_codec_helpers() {
        let args = FfmpegCommand::new("o.mp4")
            .input("i.mp4")
            .video_codec("libx264")
            .crf(20)
            .preset("veryfast")
            .audio_codec("aac")
            .shortest()
            .build_args();

        for expected in ["-c:v", "libx264", "-crf", "20", "-preset", "veryfast", "-c:a", "aac", "-shortest"] {
            assert!(args.iter().any(|a| a == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_progress_is_piped_to_stderr() {
        let args = FfmpegCommand::new("o.mp4").input("i.mp4").build_args();
        let idx = args.iter().position(|a| a == "-progress").unwrap();
        assert_eq!(args[idx + 1], "pipe:2");
    }

    #[tokio::test]
    async fn test_cancel_waiter_ignores_false() {
        let (tx, rx) = watch::channel(false);
        let mut rx = Some(rx);
        let waiter = wait_for_cancel(&mut rx);
        tokio::pin!(waiter);

        assert!(tokio::time::timeout(Duration::from_millis(20), &mut waiter).await.is_err());
        tx.send(true).unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(200), &mut waiter).await.is_ok());
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_failure_carries_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = FfmpegCommand::new(dir.path().join("out.mp4"))
            .label("broken")
            .input(dir.path().join("missing.mp4"));

        let err = FfmpegRunner::new().run(&cmd).await.unwrap_err();
        match err {
            MediaError::FfmpegFailed { message, stderr, exit_code } => {
                assert!(message.starts_with("broken exited"));
                assert!(stderr.unwrap().contains("missing.mp4"));
                assert_ne!(exit_code, Some(0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    fn endless_tone(dir: &Path) -> FfmpegCommand {
        FfmpegCommand::new(dir.join("tone.wav"))
            .label("endless")
            .input_with_args(["-re", "-f", "lavfi"], "sine=frequency=440")
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_timeout_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FfmpegRunner::new().with_timeout(1);
        let err = runner.run(&endless_tone(dir.path())).await.unwrap_err();
        assert!(matches!(err, MediaError::Timeout(1)));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_cancel_kills_process() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let runner = FfmpegRunner::new().with_cancel(rx);

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            tx.send(true).unwrap();
        };
        let args = endless_tone(dir.path());
        let (result, _) = tokio::join!(runner.run_timed(&args, 60.0), cancel);
        assert!(matches!(result, Err(MediaError::Cancelled)));
    }
}
