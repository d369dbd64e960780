// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building Bot API requests for outgoing topic messages.
//!
//! Media the Sink already knows about (URLs, file ids) travels as a plain
//! string in a JSON body. Local files and in-memory bytes go out as a
//! multipart upload, with every other parameter sent as a text field.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::{Map, Value, json};

use threadlink_core::BridgeError;
use threadlink_core::sink::{SinkMedia, SinkOutgoing};

/// Media resolved into what goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Upload {
    /// Bytes to attach as a multipart file part.
    Inline { data: Vec<u8>, file_name: String },
    /// A URL or file id sent as a string parameter.
    Reference(String),
}

/// A fully prepared Bot API call.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub method: &'static str,
    pub params: Map<String, Value>,
    /// Name of the media parameter and its payload, for media messages.
    pub media: Option<(&'static str, Upload)>,
}

impl OutgoingRequest {
    /// Multipart body for an inline upload.
    pub fn form(&self) -> Form {
        let mut form = Form::new();
        for (key, value) in &self.params {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            form = form.text(key.clone(), text);
        }
        if let Some((field, Upload::Inline { data, file_name })) = &self.media {
            let part = Part::bytes(data.clone()).file_name(file_name.clone());
            form = form.part(*field, part);
        }
        form
    }

    /// Returns `true` if the request carries file bytes.
    pub fn is_multipart(&self) -> bool {
        matches!(self.media, Some((_, Upload::Inline { .. })))
    }

    /// JSON body for a request without inline bytes.
    pub fn json_body(&self) -> Value {
        let mut body = self.params.clone();
        if let Some((field, Upload::Reference(reference))) = &self.media {
            body.insert((*field).to_string(), Value::String(reference.clone()));
        }
        Value::Object(body)
    }
}

/// Reads local files so the request no longer depends on the filesystem.
pub async fn resolve_media(media: &SinkMedia) -> Result<Upload, BridgeError> {
    match media {
        SinkMedia::Path(path) => {
            let data = tokio::fs::read(path).await.map_err(|e| {
                BridgeError::Media(format!("failed to read {}: {e}", path.display()))
            })?;
            Ok(Upload::Inline {
                data,
                file_name: upload_name(path),
            })
        }
        SinkMedia::Bytes { data, file_name } => Ok(Upload::Inline {
            data: data.clone(),
            file_name: file_name.clone(),
        }),
        SinkMedia::Url(url) => Ok(Upload::Reference(url.clone())),
        SinkMedia::FileId(id) => Ok(Upload::Reference(id.clone())),
    }
}

fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

/// Prepares the Bot API call that posts `message` into `topic` of `chat_id`.
pub async fn prepare(
    chat_id: i64,
    topic: i64,
    message: &SinkOutgoing,
) -> Result<OutgoingRequest, BridgeError> {
    let mut params = Map::new();
    params.insert("chat_id".into(), json!(chat_id));
    params.insert("message_thread_id".into(), json!(topic));

    let (method, media) = match message {
        SinkOutgoing::Text { text, reply_to } => {
            params.insert("text".into(), json!(text));
            if let Some(reply_to) = reply_to {
                params.insert(
                    "reply_parameters".into(),
                    json!({ "message_id": reply_to.0, "allow_sending_without_reply": true }),
                );
            }
            ("sendMessage", None)
        }
        SinkOutgoing::Photo { media, caption } => {
            insert_caption(&mut params, caption);
            ("sendPhoto", Some(("photo", resolve_media(media).await?)))
        }
        SinkOutgoing::Video { media, caption } => {
            insert_caption(&mut params, caption);
            ("sendVideo", Some(("video", resolve_media(media).await?)))
        }
        SinkOutgoing::Animation { media, caption } => {
            insert_caption(&mut params, caption);
            ("sendAnimation", Some(("animation", resolve_media(media).await?)))
        }
        SinkOutgoing::VideoNote { media } => {
            ("sendVideoNote", Some(("video_note", resolve_media(media).await?)))
        }
        SinkOutgoing::Voice { media, caption } => {
            insert_caption(&mut params, caption);
            ("sendVoice", Some(("voice", resolve_media(media).await?)))
        }
        SinkOutgoing::Audio {
            media,
            caption,
            title,
        } => {
            insert_caption(&mut params, caption);
            if let Some(title) = title {
                params.insert("title".into(), json!(title));
            }
            ("sendAudio", Some(("audio", resolve_media(media).await?)))
        }
        SinkOutgoing::Document { media, caption } => {
            insert_caption(&mut params, caption);
            ("sendDocument", Some(("document", resolve_media(media).await?)))
        }
        SinkOutgoing::Location {
            latitude,
            longitude,
        } => {
            params.insert("latitude".into(), json!(latitude));
            params.insert("longitude".into(), json!(longitude));
            ("sendLocation", None)
        }
        SinkOutgoing::Contact {
            phone_number,
            first_name,
            vcard,
        } => {
            params.insert("phone_number".into(), json!(phone_number));
            params.insert("first_name".into(), json!(first_name));
            if let Some(vcard) = vcard {
                params.insert("vcard".into(), json!(vcard));
            }
            ("sendContact", None)
        }
    };

    Ok(OutgoingRequest {
        method,
        params,
        media,
    })
}

fn insert_caption(params: &mut Map<String, Value>, caption: &Option<String>) {
    if let Some(caption) = caption.as_deref().filter(|c| !c.is_empty()) {
        params.insert("caption".into(), json!(caption));
    }
}
