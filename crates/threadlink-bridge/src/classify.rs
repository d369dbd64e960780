// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content classification for both routing directions.
//!
//! Each direction uses a strict priority list: the first matching kind wins
//! and exactly one forwarder handles the message.

use threadlink_core::sink::{
    PhotoSize, SinkContact, SinkFile, SinkLocation, SinkSticker, TopicMessage,
};
use threadlink_core::source::{ContactMessage, LocationMessage, MediaMessage, MessagePayload};

/// A Source message, reduced to the one thing the Sink should receive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InboundContent<'a> {
    Sticker(&'a MediaMessage),
    VideoNote(&'a MediaMessage),
    Video(&'a MediaMessage),
    Image(&'a MediaMessage),
    Audio(&'a MediaMessage),
    Document(&'a MediaMessage),
    Location(&'a LocationMessage),
    Contact(&'a ContactMessage),
    Contacts(&'a [ContactMessage]),
    Text(&'a str),
}

impl InboundContent<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundContent::Sticker(_) => "sticker",
            InboundContent::VideoNote(_) => "video_note",
            InboundContent::Video(_) => "video",
            InboundContent::Image(_) => "image",
            InboundContent::Audio(_) => "audio",
            InboundContent::Document(_) => "document",
            InboundContent::Location(_) => "location",
            InboundContent::Contact(_) | InboundContent::Contacts(_) => "contact",
            InboundContent::Text(_) => "text",
        }
    }

    /// Caption or body text carried by the content.
    pub fn text(&self) -> Option<&str> {
        match self {
            InboundContent::Video(m) | InboundContent::Image(m) | InboundContent::Document(m) => {
                m.caption.as_deref()
            }
            InboundContent::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Classifies a Source payload after stripping ephemeral and view-once wrappers.
///
/// Priority: sticker, video note, video, image, audio, document, location,
/// contact, text.
pub fn classify_inbound(payload: &MessagePayload) -> Option<InboundContent<'_>> {
    let payload = payload.unwrap_wrappers();

    if let Some(m) = &payload.sticker_message {
        return Some(InboundContent::Sticker(m));
    }
    if let Some(m) = &payload.ptv_message {
        return Some(InboundContent::VideoNote(m));
    }
    if let Some(m) = &payload.video_message {
        return Some(InboundContent::Video(m));
    }
    if let Some(m) = &payload.image_message {
        return Some(InboundContent::Image(m));
    }
    if let Some(m) = &payload.audio_message {
        return Some(InboundContent::Audio(m));
    }
    let captioned_document = payload
        .document_with_caption_message
        .as_deref()
        .and_then(|w| w.message.as_ref())
        .and_then(|inner| inner.document_message.as_ref());
    if let Some(m) = payload.document_message.as_ref().or(captioned_document) {
        return Some(InboundContent::Document(m));
    }
    if let Some(m) = payload
        .location_message
        .as_ref()
        .or(payload.live_location_message.as_ref())
    {
        return Some(InboundContent::Location(m));
    }
    if let Some(m) = &payload.contact_message {
        return Some(InboundContent::Contact(m));
    }
    if let Some(m) = &payload.contacts_array_message
        && !m.contacts.is_empty()
    {
        return Some(InboundContent::Contacts(&m.contacts));
    }
    payload
        .conversation
        .as_deref()
        .or(payload
            .extended_text_message
            .as_ref()
            .map(|m| m.text.as_str()))
        .filter(|text| !text.trim().is_empty())
        .map(InboundContent::Text)
}

/// A Sink topic message, reduced to the one thing the Source should receive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutboundContent<'a> {
    Photo(&'a PhotoSize),
    Video(&'a SinkFile),
    Animation(&'a SinkFile),
    VideoNote(&'a SinkFile),
    Voice(&'a SinkFile),
    Audio(&'a SinkFile),
    Document(&'a SinkFile),
    Sticker(&'a SinkSticker),
    Location(&'a SinkLocation),
    Contact(&'a SinkContact),
    Text(&'a str),
}

impl OutboundContent<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundContent::Photo(_) => "photo",
            OutboundContent::Video(_) => "video",
            OutboundContent::Animation(_) => "animation",
            OutboundContent::VideoNote(_) => "video_note",
            OutboundContent::Voice(_) => "voice",
            OutboundContent::Audio(_) => "audio",
            OutboundContent::Document(_) => "document",
            OutboundContent::Sticker(_) => "sticker",
            OutboundContent::Location(_) => "location",
            OutboundContent::Contact(_) => "contact",
            OutboundContent::Text(_) => "text",
        }
    }
}

/// Classifies a Sink topic message.
///
/// Priority: photo, video/animation, video note, voice, audio, document,
/// sticker, location, contact, text.
pub fn classify_outbound(message: &TopicMessage) -> Option<OutboundContent<'_>> {
    if let Some(photo) = message.largest_photo() {
        return Some(OutboundContent::Photo(photo));
    }
    if let Some(f) = &message.video {
        return Some(OutboundContent::Video(f));
    }
    if let Some(f) = &message.animation {
        return Some(OutboundContent::Animation(f));
    }
    if let Some(f) = &message.video_note {
        return Some(OutboundContent::VideoNote(f));
    }
    if let Some(f) = &message.voice {
        return Some(OutboundContent::Voice(f));
    }
    if let Some(f) = &message.audio {
        return Some(OutboundContent::Audio(f));
    }
    if let Some(f) = &message.document {
        return Some(OutboundContent::Document(f));
    }
    if let Some(s) = &message.sticker {
        return Some(OutboundContent::Sticker(s));
    }
    if let Some(l) = &message.location {
        return Some(OutboundContent::Location(l));
    }
    if let Some(c) = &message.contact {
        return Some(OutboundContent::Contact(c));
    }
    message
        .text
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .map(OutboundContent::Text)
}

/// Wraps a text body in the Source's spoiler marker.
pub fn spoiler(text: &str) -> String {
    format!("||{text}||")
}

/// Joins an optional prefix and an optional body.
///
/// A prefix without a body loses its trailing whitespace so captions such as
/// `"👤 Alice:\n"` render cleanly on their own.
pub fn decorate(prefix: Option<&str>, body: Option<&str>) -> Option<String> {
    match (prefix, body.filter(|b| !b.is_empty())) {
        (Some(p), Some(b)) => Some(format!("{p}{b}")),
        (Some(p), None) => Some(p.trim_end().to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    }
}

/// Extracts the first phone number from a vCard `TEL` line.
pub fn vcard_phone(vcard: &str) -> Option<String> {
    vcard
        .lines()
        .filter(|line| line.to_ascii_uppercase().starts_with("TEL"))
        .find_map(|line| {
            let number = line.rsplit(':').next()?.trim();
            (!number.is_empty()).then(|| number.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadlink_core::sink::MessageEntity;

    fn payload(json: serde_json::Value) -> MessagePayload {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn sticker_wins_over_everything() {
        let p = payload(serde_json::json!({
            "stickerMessage": { "mimetype": "image/webp" },
            "imageMessage": { "mimetype": "image/jpeg" },
            "conversation": "text"
        }));
        assert_eq!(classify_inbound(&p).unwrap().kind(), "sticker");
    }

    #[test]
    fn video_note_beats_video() {
        let p = payload(serde_json::json!({
            "ptvMessage": { "mimetype": "video/mp4" },
            "videoMessage": { "mimetype": "video/mp4" }
        }));
        assert_eq!(classify_inbound(&p).unwrap().kind(), "video_note");
    }

    #[test]
    fn view_once_image_is_unwrapped() {
        let p = payload(serde_json::json!({
            "viewOnceMessage": { "message": { "imageMessage": { "caption": "once" } } }
        }));
        let content = classify_inbound(&p).unwrap();
        assert_eq!(content.kind(), "image");
        assert_eq!(content.text(), Some("once"));
    }

    #[test]
    fn captioned_document_is_a_document() {
        let p = payload(serde_json::json!({
            "documentWithCaptionMessage": {
                "message": { "documentMessage": { "fileName": "a.pdf", "caption": "read" } }
            }
        }));
        let content = classify_inbound(&p).unwrap();
        assert_eq!(content.kind(), "document");
        assert_eq!(content.text(), Some("read"));
    }

    #[test]
    fn extended_text_is_text() {
        let p = payload(serde_json::json!({ "extendedTextMessage": { "text": "link" } }));
        assert_eq!(classify_inbound(&p), Some(InboundContent::Text("link")));
    }

    #[test]
    fn empty_payload_is_unsupported() {
        assert!(classify_inbound(&MessagePayload::default()).is_none());
        assert!(classify_inbound(&MessagePayload::text_message("   ")).is_none());
    }

    #[test]
    fn outbound_photo_beats_caption_text() {
        let msg = TopicMessage {
            photo: vec![PhotoSize {
                file_id: "p".into(),
                ..PhotoSize::default()
            }],
            caption: Some("look".into()),
            ..TopicMessage::default()
        };
        assert_eq!(classify_outbound(&msg).unwrap().kind(), "photo");
    }

    #[test]
    fn outbound_animation_beats_its_document_twin() {
        let file = SinkFile {
            file_id: "gif".into(),
            ..SinkFile::default()
        };
        let msg = TopicMessage {
            animation: Some(file.clone()),
            document: Some(file),
            ..TopicMessage::default()
        };
        assert_eq!(classify_outbound(&msg).unwrap().kind(), "animation");
    }

    #[test]
    fn outbound_text_keeps_entities_separate() {
        let msg = TopicMessage {
            text: Some("hi".into()),
            entities: vec![MessageEntity {
                kind: "spoiler".into(),
                offset: 0,
                length: 2,
            }],
            ..TopicMessage::default()
        };
        assert_eq!(classify_outbound(&msg), Some(OutboundContent::Text("hi")));
        assert!(msg.has_spoiler());
    }

    #[test]
    fn decorate_combinations() {
        assert_eq!(
            decorate(Some("👤 Alice:\n"), Some("hello")).as_deref(),
            Some("👤 Alice:\nhello")
        );
        assert_eq!(decorate(Some("👤 Alice:\n"), None).as_deref(), Some("👤 Alice:"));
        assert_eq!(decorate(None, Some("hi")).as_deref(), Some("hi"));
        assert_eq!(decorate(None, Some("")), None);
    }

    #[test]
    fn spoiler_wraps_text() {
        assert_eq!(spoiler("secret"), "||secret||");
    }

    #[test]
    fn vcard_phone_reads_tel_line() {
        let vcard = "BEGIN:VCARD\nVERSION:3.0\nFN:Bob\nTEL;type=CELL;waid=4915:+49 151 2345\nEND:VCARD";
        assert_eq!(vcard_phone(vcard).as_deref(), Some("+49 151 2345"));
        assert_eq!(vcard_phone("BEGIN:VCARD\nEND:VCARD"), None);
    }
}
