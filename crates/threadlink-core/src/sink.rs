// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sink-side message types.
//!
//! Incoming topic messages mirror the Sink bot API's update objects so the
//! adapter can deserialize them without an intermediate layer.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::{SinkMessageId, TopicId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl SinkUser {
    /// Full name suitable for display.
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkChat {
    pub id: i64,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Text formatting span. Offsets are in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    pub offset: usize,
    pub length: usize,
}

impl MessageEntity {
    pub fn is_spoiler(&self) -> bool {
        self.kind == "spoiler"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Any non-photo file attachment (video, voice, audio, document, animation).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkFile {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkSticker {
    pub file_id: String,
    #[serde(default)]
    pub file_unique_id: String,
    #[serde(default)]
    pub is_animated: bool,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkLocation {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SinkContact {
    pub phone_number: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub vcard: Option<String>,
}

/// A message posted in the Sink supergroup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicMessage {
    pub message_id: SinkMessageId,
    /// Topic the message was posted in. `None` for the general thread.
    pub message_thread_id: Option<TopicId>,
    pub from: Option<SinkUser>,
    pub chat: SinkChat,
    pub date: i64,
    pub text: Option<String>,
    pub entities: Vec<MessageEntity>,
    pub caption: Option<String>,
    pub caption_entities: Vec<MessageEntity>,
    pub photo: Vec<PhotoSize>,
    pub video: Option<SinkFile>,
    pub animation: Option<SinkFile>,
    pub video_note: Option<SinkFile>,
    pub voice: Option<SinkFile>,
    pub audio: Option<SinkFile>,
    pub document: Option<SinkFile>,
    pub sticker: Option<SinkSticker>,
    pub location: Option<SinkLocation>,
    pub contact: Option<SinkContact>,
    pub reply_to_message: Option<Box<TopicMessage>>,
}

impl TopicMessage {
    /// Text body or caption.
    pub fn body(&self) -> Option<&str> {
        self.text.as_deref().or(self.caption.as_deref())
    }

    /// Formatting entities that apply to [`TopicMessage::body`].
    pub fn body_entities(&self) -> &[MessageEntity] {
        if self.text.is_some() {
            &self.entities
        } else {
            &self.caption_entities
        }
    }

    /// Returns `true` if any part of the text or caption is marked as a spoiler.
    pub fn has_spoiler(&self) -> bool {
        self.entities
            .iter()
            .chain(self.caption_entities.iter())
            .any(MessageEntity::is_spoiler)
    }

    /// The largest photo size attached, if any.
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height))
    }

    pub fn sender_id(&self) -> Option<i64> {
        self.from.as_ref().map(|u| u.id)
    }
}

/// Media to upload to the Sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkMedia {
    /// A local file; uploaded from disk.
    Path(PathBuf),
    /// In-memory bytes with an upload file name.
    Bytes { data: Vec<u8>, file_name: String },
    /// A URL the Sink fetches itself.
    Url(String),
    /// A file already stored by the Sink.
    FileId(String),
}

/// A message to post into a Sink topic.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkOutgoing {
    Text {
        text: String,
        reply_to: Option<SinkMessageId>,
    },
    Photo {
        media: SinkMedia,
        caption: Option<String>,
    },
    Video {
        media: SinkMedia,
        caption: Option<String>,
    },
    Animation {
        media: SinkMedia,
        caption: Option<String>,
    },
    VideoNote {
        media: SinkMedia,
    },
    Voice {
        media: SinkMedia,
        caption: Option<String>,
    },
    Audio {
        media: SinkMedia,
        caption: Option<String>,
        title: Option<String>,
    },
    Document {
        media: SinkMedia,
        caption: Option<String>,
    },
    Location {
        latitude: f64,
        longitude: f64,
    },
    Contact {
        phone_number: String,
        first_name: String,
        vcard: Option<String>,
    },
}

impl SinkOutgoing {
    /// Plain text message without a reply reference.
    pub fn text(text: impl Into<String>) -> Self {
        SinkOutgoing::Text {
            text: text.into(),
            reply_to: None,
        }
    }

    /// Short kind name used in logs and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SinkOutgoing::Text { .. } => "text",
            SinkOutgoing::Photo { .. } => "photo",
            SinkOutgoing::Video { .. } => "video",
            SinkOutgoing::Animation { .. } => "animation",
            SinkOutgoing::VideoNote { .. } => "video_note",
            SinkOutgoing::Voice { .. } => "voice",
            SinkOutgoing::Audio { .. } => "audio",
            SinkOutgoing::Document { .. } => "document",
            SinkOutgoing::Location { .. } => "location",
            SinkOutgoing::Contact { .. } => "contact",
        }
    }

    /// Text body or caption carried by this message.
    pub fn text_content(&self) -> Option<&str> {
        match self {
            SinkOutgoing::Text { text, .. } => Some(text),
            SinkOutgoing::Photo { caption, .. }
            | SinkOutgoing::Video { caption, .. }
            | SinkOutgoing::Animation { caption, .. }
            | SinkOutgoing::Voice { caption, .. }
            | SinkOutgoing::Audio { caption, .. }
            | SinkOutgoing::Document { caption, .. } => caption.as_deref(),
            _ => None,
        }
    }
}
