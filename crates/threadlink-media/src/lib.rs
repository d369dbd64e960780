// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media transcoding for the Threadlink bridge.
//!
//! Shells out to `ffmpeg` to produce round video notes, turn Source stickers
//! into images, and turn Sink images into stickers.

use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use threadlink_config::model::MediaConfig;
use threadlink_core::{AdapterType, BridgeError, HealthStatus, MediaTranscoder, PluginAdapter};

/// Edge length of a round video note.
const VIDEO_NOTE_SIZE: u32 = 384;

/// Longest edge of a Source sticker.
const STICKER_SIZE: u32 = 512;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Transcoder backed by an `ffmpeg` executable.
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, args: Vec<OsString>, output: &Path) -> Result<(), BridgeError> {
        debug!(ffmpeg = %self.ffmpeg_path, ?args, "running ffmpeg");

        let child = tokio::process::Command::new(&self.ffmpeg_path)
            .args(&args)
            .kill_on_drop(true)
            .output();

        let result = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| BridgeError::Timeout {
                duration: self.timeout,
            })?
            .map_err(|e| BridgeError::Media(format!("failed to run ffmpeg: {e}")))?;

        if !result.status.success() {
            let exit_code = result.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(3)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join(" | ");
            warn!(exit_code, stderr = %tail, "ffmpeg failed");
            return Err(BridgeError::Media(format!(
                "ffmpeg exited with code {exit_code}: {tail}"
            )));
        }

        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(BridgeError::Media(format!(
                "ffmpeg produced no output at {}",
                output.display()
            ))),
        }
    }
}

fn base_args(input: &Path) -> Vec<OsString> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-i".into(),
        input.as_os_str().to_owned(),
    ]
}

/// Square center crop, scaled, capped at `max_secs`, H.264/AAC in MP4.
pub fn video_note_args(input: &Path, output: &Path, max_secs: u32) -> Vec<OsString> {
    let mut args = base_args(input);
    let filter = format!(
        "crop='min(iw,ih)':'min(iw,ih)',scale={VIDEO_NOTE_SIZE}:{VIDEO_NOTE_SIZE}"
    );
    args.extend([
        "-t".into(),
        max_secs.to_string().into(),
        "-vf".into(),
        filter.into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        "veryfast".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-c:a".into(),
        "aac".into(),
        "-movflags".into(),
        "+faststart".into(),
        "-f".into(),
        "mp4".into(),
        output.as_os_str().to_owned(),
    ]);
    args
}

/// First frame of the sticker as PNG.
pub fn sticker_to_image_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = base_args(input);
    args.extend([
        "-frames:v".into(),
        "1".into(),
        "-f".into(),
        "image2".into(),
        "-c:v".into(),
        "png".into(),
        output.as_os_str().to_owned(),
    ]);
    args
}

/// Fit within 512x512 keeping aspect ratio, transparent padding, webp.
pub fn image_to_sticker_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args = base_args(input);
    let filter = format!(
        "scale={STICKER_SIZE}:{STICKER_SIZE}:force_original_aspect_ratio=decrease,\
         format=rgba,pad={STICKER_SIZE}:{STICKER_SIZE}:(ow-iw)/2:(oh-ih)/2:color=0x00000000"
    );
    args.extend([
        "-vf".into(),
        filter.into(),
        "-frames:v".into(),
        "1".into(),
        "-c:v".into(),
        "libwebp".into(),
        "-f".into(),
        "webp".into(),
        output.as_os_str().to_owned(),
    ]);
    args
}

#[async_trait]
impl PluginAdapter for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transcoder
    }

    async fn health_check(&self) -> Result<HealthStatus, BridgeError> {
        let probe = tokio::process::Command::new(&self.ffmpeg_path)
            .arg("-version")
            .kill_on_drop(true)
            .output()
            .await;
        Ok(match probe {
            Ok(out) if out.status.success() => HealthStatus::Healthy,
            Ok(out) => HealthStatus::Degraded(format!(
                "ffmpeg -version exited with {}",
                out.status.code().unwrap_or(-1)
            )),
            Err(e) => HealthStatus::Unhealthy(format!("ffmpeg not runnable: {e}")),
        })
    }

    async fn shutdown(&self) -> Result<(), BridgeError> {
        Ok(())
    }
}

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn to_video_note(
        &self,
        input: &Path,
        output: &Path,
        max_secs: u32,
    ) -> Result<(), BridgeError> {
        self.run(video_note_args(input, output, max_secs), output)
            .await
    }

    async fn sticker_to_image(&self, input: &Path, output: &Path) -> Result<(), BridgeError> {
        self.run(sticker_to_image_args(input, output), output).await
    }

    async fn image_to_sticker(&self, input: &Path, output: &Path) -> Result<(), BridgeError> {
        self.run(image_to_sticker_args(input, output), output).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcoder(path: &str) -> FfmpegTranscoder {
        FfmpegTranscoder::new(&MediaConfig {
            ffmpeg_path: path.to_string(),
            ..MediaConfig::default()
        })
    }

    fn joined(args: &[OsString]) -> String {
        args.iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn video_note_args_crop_square_and_cap_duration() {
        let args = video_note_args(Path::new("in.mp4"), Path::new("out.mp4"), 60);
        let line = joined(&args);
        assert!(line.contains("-t 60"));
        assert!(line.contains("crop='min(iw,ih)':'min(iw,ih)'"));
        assert!(line.contains("scale=384:384"));
        assert!(line.ends_with("out.mp4"));
    }

    #[test]
    fn sticker_args_take_first_frame_as_png() {
        let line = joined(&sticker_to_image_args(
            Path::new("s.webp"),
            Path::new("s.png"),
        ));
        assert!(line.contains("-frames:v 1"));
        assert!(line.contains("-c:v png"));
    }

    #[test]
    fn image_to_sticker_pads_to_512() {
        let line = joined(&image_to_sticker_args(
            Path::new("a.jpg"),
            Path::new("a.webp"),
        ));
        assert!(line.contains("pad=512:512"));
        assert!(line.contains("libwebp"));
    }

    #[tokio::test]
    async fn missing_binary_is_a_media_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = transcoder("/nonexistent/ffmpeg-for-tests");
        let err = t
            .sticker_to_image(&dir.path().join("a.webp"), &dir.path().join("a.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Media(_)));
        assert!(matches!(
            t.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_a_media_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = transcoder("false")
            .to_video_note(&dir.path().join("a.mp4"), &dir.path().join("b.mp4"), 60)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Media(msg) if msg.contains("exited")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn success_without_output_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = transcoder("true")
            .image_to_sticker(&dir.path().join("a.png"), &dir.path().join("a.webp"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Media(msg) if msg.contains("no output")));
    }
}
