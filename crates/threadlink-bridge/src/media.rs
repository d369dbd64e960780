// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media pipeline shared by both routers.
//!
//! Source media is downloaded in full, written to a scratch directory that is
//! removed when the [`PreparedMedia`] drops, converted where the Sink needs a
//! different format, and uploaded from disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::TryStreamExt;
use tempfile::TempDir;
use tracing::{debug, warn};

use threadlink_config::model::MediaConfig;
use threadlink_core::sink::{SinkMedia, SinkOutgoing, SinkSticker};
use threadlink_core::source::{MediaKind, MediaMessage, OutgoingContent};
use threadlink_core::{
    BridgeError, MediaTranscoder, SinkClient, SinkMessageId, SourceClient, TopicId,
};

use crate::classify::{InboundContent, decorate};

/// Marker used when a sticker cannot be shown as an image.
pub const STICKER_FALLBACK: &str = "🎭 Sticker";

const SCRATCH_PREFIX: &str = "threadlink-";

/// A scratch directory holding downloaded and converted media.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub async fn write(&self, name: &str, data: &[u8]) -> Result<PathBuf, BridgeError> {
        let path = self.file(name);
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| BridgeError::Media(format!("failed to write scratch file: {e}")))?;
        Ok(path)
    }
}

/// Sink messages to try in order, plus the scratch files they reference.
#[derive(Debug)]
pub struct PreparedMedia {
    pub candidates: Vec<SinkOutgoing>,
    _scratch: Option<ScratchDir>,
}

impl PreparedMedia {
    fn single(message: SinkOutgoing, scratch: ScratchDir) -> Self {
        Self {
            candidates: vec![message],
            _scratch: Some(scratch),
        }
    }
}

/// File extension for a MIME type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    let base = mime.split(';').next().unwrap_or_default().trim();
    match base {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/quicktime" => "mov",
        "audio/ogg" => "ogg",
        "audio/mpeg" => "mp3",
        "audio/mp4" | "audio/aac" => "m4a",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// Upload file name for a Source media message.
pub fn file_name_for(media: &MediaMessage, kind: MediaKind) -> String {
    if let Some(name) = media
        .file_name
        .as_deref()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty() && !n.contains(['/', '\\']))
    {
        return name.to_string();
    }
    let ext = media.mimetype.as_deref().map_or("bin", extension_for_mime);
    format!("{kind}.{ext}")
}

#[derive(Clone)]
pub struct MediaPipeline {
    source: Arc<dyn SourceClient>,
    sink: Arc<dyn SinkClient>,
    transcoder: Arc<dyn MediaTranscoder>,
    scratch_root: PathBuf,
    max_video_note_secs: u32,
}

impl MediaPipeline {
    pub fn new(
        source: Arc<dyn SourceClient>,
        sink: Arc<dyn SinkClient>,
        transcoder: Arc<dyn MediaTranscoder>,
        config: &MediaConfig,
    ) -> Self {
        Self {
            source,
            sink,
            transcoder,
            scratch_root: PathBuf::from(&config.scratch_dir),
            max_video_note_secs: config.max_video_note_secs,
        }
    }

    /// Creates a fresh scratch directory under the configured root.
    pub async fn scratch(&self) -> Result<ScratchDir, BridgeError> {
        tokio::fs::create_dir_all(&self.scratch_root)
            .await
            .map_err(|e| BridgeError::Media(format!("failed to create scratch root: {e}")))?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.scratch_root)
            .map_err(|e| BridgeError::Media(format!("failed to create scratch dir: {e}")))?;
        Ok(ScratchDir { dir })
    }

    /// Downloads and decrypts Source media into memory.
    pub async fn download(
        &self,
        media: &MediaMessage,
        kind: MediaKind,
    ) -> Result<Vec<u8>, BridgeError> {
        if media.media_key.as_deref().is_none_or(str::is_empty) {
            return Err(BridgeError::Media(format!("{kind} message has no media key")));
        }
        let stream = self.source.download_media(media, kind).await?;
        let chunks: Vec<Vec<u8>> = stream.try_collect().await?;
        let data = chunks.concat();
        if data.is_empty() {
            return Err(BridgeError::Media(format!("{kind} download was empty")));
        }
        debug!(%kind, bytes = data.len(), "media downloaded");
        Ok(data)
    }

    async fn download_to_scratch(
        &self,
        media: &MediaMessage,
        kind: MediaKind,
    ) -> Result<(ScratchDir, PathBuf), BridgeError> {
        let data = self.download(media, kind).await?;
        let scratch = self.scratch().await?;
        let path = scratch.write(&file_name_for(media, kind), &data).await?;
        Ok((scratch, path))
    }

    /// Prepares Source media for the Sink. `prefix` is the sender attribution
    /// placed in front of the caption.
    pub async fn prepare_inbound(
        &self,
        content: &InboundContent<'_>,
        prefix: Option<&str>,
    ) -> Result<PreparedMedia, BridgeError> {
        let caption = decorate(prefix, content.text());
        match *content {
            InboundContent::Sticker(media) => Ok(self.prepare_sticker(media, prefix).await),
            InboundContent::VideoNote(media) => {
                let (scratch, original) = self.download_to_scratch(media, MediaKind::Video).await?;
                let note = scratch.file("video_note.mp4");
                let path = match self
                    .transcoder
                    .to_video_note(&original, &note, self.max_video_note_secs)
                    .await
                {
                    Ok(()) => note,
                    Err(e) => {
                        warn!(error = %e, "video note transcode failed, sending original");
                        original
                    }
                };
                Ok(PreparedMedia::single(
                    SinkOutgoing::VideoNote {
                        media: SinkMedia::Path(path),
                    },
                    scratch,
                ))
            }
            InboundContent::Video(media) => {
                let (scratch, path) = self.download_to_scratch(media, MediaKind::Video).await?;
                let media_ref = SinkMedia::Path(path);
                let message = if media.gif_playback == Some(true) {
                    SinkOutgoing::Animation {
                        media: media_ref,
                        caption,
                    }
                } else {
                    SinkOutgoing::Video {
                        media: media_ref,
                        caption,
                    }
                };
                Ok(PreparedMedia::single(message, scratch))
            }
            InboundContent::Image(media) => {
                let (scratch, path) = self.download_to_scratch(media, MediaKind::Image).await?;
                Ok(PreparedMedia::single(
                    SinkOutgoing::Photo {
                        media: SinkMedia::Path(path),
                        caption,
                    },
                    scratch,
                ))
            }
            InboundContent::Audio(media) => {
                let (scratch, path) = self.download_to_scratch(media, MediaKind::Audio).await?;
                let media_ref = SinkMedia::Path(path);
                let message = if media.ptt == Some(true) {
                    SinkOutgoing::Voice {
                        media: media_ref,
                        caption,
                    }
                } else {
                    SinkOutgoing::Audio {
                        media: media_ref,
                        caption,
                        title: None,
                    }
                };
                Ok(PreparedMedia::single(message, scratch))
            }
            InboundContent::Document(media) => {
                let (scratch, path) =
                    self.download_to_scratch(media, MediaKind::Document).await?;
                Ok(PreparedMedia::single(
                    SinkOutgoing::Document {
                        media: SinkMedia::Path(path),
                        caption,
                    },
                    scratch,
                ))
            }
            _ => Err(BridgeError::Internal(format!(
                "{} is not a media message",
                content.kind()
            ))),
        }
    }

    /// Sticker chain: converted image, then the original as a photo, then text.
    async fn prepare_sticker(&self, media: &MediaMessage, prefix: Option<&str>) -> PreparedMedia {
        let fallback_text = decorate(prefix, Some(STICKER_FALLBACK))
            .unwrap_or_else(|| STICKER_FALLBACK.to_string());
        let text_only = SinkOutgoing::text(fallback_text.clone());

        let (scratch, original) = match self.download_to_scratch(media, MediaKind::Sticker).await {
            Ok(downloaded) => downloaded,
            Err(e) => {
                warn!(error = %e, "sticker download failed, sending text marker");
                return PreparedMedia {
                    candidates: vec![text_only],
                    _scratch: None,
                };
            }
        };

        let converted = scratch.file("sticker.png");
        let first = match self.transcoder.sticker_to_image(&original, &converted).await {
            Ok(()) => SinkOutgoing::Photo {
                media: SinkMedia::Path(converted),
                caption: decorate(prefix, None),
            },
            Err(e) => {
                warn!(error = %e, "sticker conversion failed, sending original");
                SinkOutgoing::Photo {
                    media: SinkMedia::Path(original),
                    caption: Some(fallback_text),
                }
            }
        };
        PreparedMedia {
            candidates: vec![first, text_only],
            _scratch: Some(scratch),
        }
    }

    /// Sends the first candidate the Sink accepts.
    ///
    /// A missing topic is returned immediately so the caller can heal.
    pub async fn send_prepared(
        &self,
        topic: TopicId,
        prepared: &PreparedMedia,
    ) -> Result<SinkMessageId, BridgeError> {
        let mut last_error = None;
        for candidate in &prepared.candidates {
            match self.sink.send(topic, candidate.clone()).await {
                Ok(id) => return Ok(id),
                Err(e) if e.is_thread_not_found() => return Err(e),
                Err(e) => {
                    debug!(topic = topic.0, kind = candidate.kind(), error = %e, "media candidate rejected");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| BridgeError::Media("no media to send".into())))
    }

    /// Downloads a Sink file into memory.
    pub async fn download_sink_file(&self, file_id: &str) -> Result<Vec<u8>, BridgeError> {
        let data = self.sink.download_file(file_id).await?;
        if data.is_empty() {
            return Err(BridgeError::Media(format!("sink file {file_id} was empty")));
        }
        Ok(data)
    }

    /// Converts a Sink sticker into Source content.
    ///
    /// Static webp stickers pass through, video stickers are converted, and
    /// animated vector stickers degrade to their emoji.
    pub async fn sticker_for_source(
        &self,
        sticker: &SinkSticker,
    ) -> Result<OutgoingContent, BridgeError> {
        if sticker.is_animated {
            let text = sticker
                .emoji
                .clone()
                .unwrap_or_else(|| STICKER_FALLBACK.to_string());
            return Ok(OutgoingContent::Text { text });
        }
        let data = self.download_sink_file(&sticker.file_id).await?;
        if !sticker.is_video {
            return Ok(OutgoingContent::Sticker { data });
        }
        let scratch = self.scratch().await?;
        let input = scratch.write("sticker.webm", &data).await?;
        let output = scratch.file("sticker.webp");
        self.transcoder.image_to_sticker(&input, &output).await?;
        let data = tokio::fs::read(&output)
            .await
            .map_err(|e| BridgeError::Media(format!("failed to read converted sticker: {e}")))?;
        Ok(OutgoingContent::Sticker { data })
    }

    /// Removes scratch directories left behind by a previous run.
    pub async fn sweep_scratch(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.scratch_root).await {
            Ok(entries) => entries,
            Err(_) => return 0,
        };
        let mut removed = 0;
        while let Ok(Some(entry)) = entries.next_entry().await {
            if !entry.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX) {
                continue;
            }
            let path = entry.path();
            let result = if path.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => debug!(path = %path.display(), error = %e, "failed to sweep scratch entry"),
            }
        }
        if removed > 0 {
            debug!(removed, "swept scratch directory");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_for_common_mimes() {
        assert_eq!(extension_for_mime("image/jpeg"), "jpg");
        assert_eq!(extension_for_mime("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(extension_for_mime("application/x-unknown"), "bin");
    }

    #[test]
    fn file_name_prefers_original_name() {
        let media = MediaMessage {
            file_name: Some("report.pdf".into()),
            mimetype: Some("application/pdf".into()),
            ..MediaMessage::default()
        };
        assert_eq!(file_name_for(&media, MediaKind::Document), "report.pdf");
    }

    #[test]
    fn file_name_rejects_paths() {
        let media = MediaMessage {
            file_name: Some("../../etc/passwd".into()),
            mimetype: Some("image/png".into()),
            ..MediaMessage::default()
        };
        assert_eq!(file_name_for(&media, MediaKind::Image), "image.png");
    }

    #[test]
    fn file_name_from_mime_when_unnamed() {
        let media = MediaMessage {
            mimetype: Some("video/mp4".into()),
            ..MediaMessage::default()
        };
        assert_eq!(file_name_for(&media, MediaKind::Video), "video.mp4");
        assert_eq!(
            file_name_for(&MediaMessage::default(), MediaKind::Sticker),
            "sticker.bin"
        );
    }
}
