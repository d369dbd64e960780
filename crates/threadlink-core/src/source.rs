// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source-side message, contact, and call types.
//!
//! Field names follow the Source transport's camelCase wire format so the
//! sidecar's JSON events deserialize directly into these structs.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::types::ConversationId;

/// Reference to a single Source message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: ConversationId,
    #[serde(default)]
    pub from_me: bool,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// A message received from the Source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMessage {
    pub key: MessageKey,
    #[serde(default)]
    pub push_name: Option<String>,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub message_timestamp: Option<i64>,
    #[serde(default)]
    pub message: Option<MessagePayload>,
}

impl SourceMessage {
    pub fn conversation(&self) -> &ConversationId {
        &self.key.remote_jid
    }

    /// The participant who authored the message. For direct chats this is the
    /// conversation itself.
    pub fn sender_id(&self) -> &str {
        self.key
            .participant
            .as_deref()
            .unwrap_or(self.key.remote_jid.as_str())
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.message_timestamp
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now)
    }

    /// Plain text carried by the message: body text or a media caption.
    pub fn text(&self) -> Option<&str> {
        self.message.as_ref().and_then(MessagePayload::text)
    }
}

/// The content of a Source message. Exactly one field is normally set, but
/// wrappers (ephemeral, view-once) nest another payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessagePayload {
    pub conversation: Option<String>,
    pub extended_text_message: Option<ExtendedTextMessage>,
    pub image_message: Option<MediaMessage>,
    pub video_message: Option<MediaMessage>,
    pub ptv_message: Option<MediaMessage>,
    pub audio_message: Option<MediaMessage>,
    pub document_message: Option<MediaMessage>,
    pub document_with_caption_message: Option<Box<WrappedMessage>>,
    pub sticker_message: Option<MediaMessage>,
    pub location_message: Option<LocationMessage>,
    pub live_location_message: Option<LocationMessage>,
    pub contact_message: Option<ContactMessage>,
    pub contacts_array_message: Option<ContactsArrayMessage>,
    pub ephemeral_message: Option<Box<WrappedMessage>>,
    pub view_once_message: Option<Box<WrappedMessage>>,
    pub view_once_message_v2: Option<Box<WrappedMessage>>,
}

impl MessagePayload {
    /// Convenience constructor for a plain text payload.
    pub fn text_message(text: impl Into<String>) -> Self {
        Self {
            conversation: Some(text.into()),
            ..Self::default()
        }
    }

    /// Strips ephemeral and view-once wrappers, returning the innermost payload.
    pub fn unwrap_wrappers(&self) -> &MessagePayload {
        let inner = self
            .ephemeral_message
            .as_deref()
            .or(self.view_once_message.as_deref())
            .or(self.view_once_message_v2.as_deref())
            .and_then(|w| w.message.as_ref());
        match inner {
            Some(payload) => payload.unwrap_wrappers(),
            None => self,
        }
    }

    /// Returns `true` if the payload was wrapped in a view-once envelope.
    pub fn is_view_once(&self) -> bool {
        if self.view_once_message.is_some() || self.view_once_message_v2.is_some() {
            return true;
        }
        self.ephemeral_message
            .as_deref()
            .and_then(|w| w.message.as_ref())
            .is_some_and(MessagePayload::is_view_once)
    }

    /// Body text or media caption, after unwrapping.
    pub fn text(&self) -> Option<&str> {
        let payload = self.unwrap_wrappers();
        payload
            .conversation
            .as_deref()
            .or(payload
                .extended_text_message
                .as_ref()
                .map(|m| m.text.as_str()))
            .or(payload.image_message.as_ref().and_then(|m| m.caption.as_deref()))
            .or(payload.video_message.as_ref().and_then(|m| m.caption.as_deref()))
            .or(payload
                .document_message
                .as_ref()
                .and_then(|m| m.caption.as_deref()))
    }
}

/// A payload nested inside a wrapper message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WrappedMessage {
    pub message: Option<MessagePayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtendedTextMessage {
    pub text: String,
}

/// Encrypted media reference plus display metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaMessage {
    pub url: Option<String>,
    pub direct_path: Option<String>,
    /// Base64 content key needed to decrypt the media.
    pub media_key: Option<String>,
    pub mimetype: Option<String>,
    pub caption: Option<String>,
    pub file_name: Option<String>,
    pub file_length: Option<u64>,
    pub seconds: Option<u32>,
    /// Voice note (push-to-talk) flag for audio.
    pub ptt: Option<bool>,
    pub gif_playback: Option<bool>,
    pub is_animated: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationMessage {
    pub degrees_latitude: f64,
    pub degrees_longitude: f64,
    pub name: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactMessage {
    pub display_name: Option<String>,
    pub vcard: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactsArrayMessage {
    pub display_name: Option<String>,
    pub contacts: Vec<ContactMessage>,
}

/// Media class passed to the decrypting download primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Sticker,
}

/// A Source contact as delivered by contact upsert/update events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Contact {
    pub id: String,
    pub name: Option<String>,
    pub notify: Option<String>,
    pub verified_name: Option<String>,
    /// Set when the contact's profile picture changed.
    pub img_url: Option<String>,
}

impl Contact {
    /// Best available display name: address-book name, then push name, then verified business name.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.notify.as_deref())
            .or(self.verified_name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Offer,
    Ringing,
    Timeout,
    Reject,
    Accept,
    Terminate,
}

/// A call signalling event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallEvent {
    pub id: String,
    pub from: String,
    pub status: CallStatus,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub is_group: bool,
    /// Unix timestamp in seconds.
    #[serde(default)]
    pub date: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupParticipant {
    pub id: String,
    pub admin: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupMetadata {
    pub id: String,
    pub subject: String,
    pub desc: Option<String>,
    pub owner: Option<String>,
    pub creation: Option<i64>,
    pub participants: Vec<GroupParticipant>,
}

/// An event from the Source event feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum SourceEvent {
    #[serde(rename = "message")]
    Message(SourceMessage),
    #[serde(rename = "contacts.upsert")]
    ContactsUpsert(Vec<Contact>),
    #[serde(rename = "contacts.update")]
    ContactsUpdate(Vec<Contact>),
    #[serde(rename = "call")]
    Call(Vec<CallEvent>),
}

/// Content sent to a Source conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum OutgoingContent {
    Text {
        text: String,
    },
    Image {
        data: Vec<u8>,
        mimetype: String,
        caption: Option<String>,
    },
    Video {
        data: Vec<u8>,
        mimetype: String,
        caption: Option<String>,
        gif_playback: bool,
        video_note: bool,
    },
    Audio {
        data: Vec<u8>,
        mimetype: String,
        voice_note: bool,
    },
    Document {
        data: Vec<u8>,
        mimetype: String,
        file_name: String,
        caption: Option<String>,
    },
    Sticker {
        data: Vec<u8>,
    },
    Location {
        latitude: f64,
        longitude: f64,
        name: Option<String>,
        address: Option<String>,
    },
    Contact {
        display_name: String,
        vcard: String,
    },
}

impl OutgoingContent {
    /// Short kind name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingContent::Text { .. } => "text",
            OutgoingContent::Image { .. } => "image",
            OutgoingContent::Video { .. } => "video",
            OutgoingContent::Audio { .. } => "audio",
            OutgoingContent::Document { .. } => "document",
            OutgoingContent::Sticker { .. } => "sticker",
            OutgoingContent::Location { .. } => "location",
            OutgoingContent::Contact { .. } => "contact",
        }
    }
}

/// A message quoted by an outgoing reply.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotedMessage {
    pub key: MessageKey,
    pub text: Option<String>,
}

/// Per-send options for Source messages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    pub quoted: Option<QuotedMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_event_deserializes_from_wire_json() {
        let json = serde_json::json!({
            "event": "message",
            "data": {
                "key": {
                    "remoteJid": "120363025@g.us",
                    "fromMe": false,
                    "id": "3EB0C767D26A",
                    "participant": "4915112345678@s.whatsapp.net"
                },
                "pushName": "Alice",
                "messageTimestamp": 1700000000,
                "message": { "conversation": "hello" }
            }
        });
        let event: SourceEvent = serde_json::from_value(json).unwrap();
        match event {
            SourceEvent::Message(msg) => {
                assert_eq!(msg.sender_id(), "4915112345678@s.whatsapp.net");
                assert_eq!(msg.text(), Some("hello"));
                assert!(msg.conversation().is_group());
            }
            other => panic!("expected message event, got {other:?}"),
        }
    }

    #[test]
    fn unwrap_nested_view_once() {
        let json = serde_json::json!({
            "ephemeralMessage": {
                "message": {
                    "viewOnceMessageV2": {
                        "message": {
                            "imageMessage": { "mimetype": "image/jpeg", "caption": "secret" }
                        }
                    }
                }
            }
        });
        let payload: MessagePayload = serde_json::from_value(json).unwrap();
        assert!(payload.is_view_once());
        let inner = payload.unwrap_wrappers();
        assert!(inner.image_message.is_some());
        assert_eq!(payload.text(), Some("secret"));
    }

    #[test]
    fn contact_display_name_prefers_address_book() {
        let contact = Contact {
            id: "1@s.whatsapp.net".into(),
            name: Some("Bob Builder".into()),
            notify: Some("bob".into()),
            ..Contact::default()
        };
        assert_eq!(contact.display_name(), Some("Bob Builder"));

        let blank = Contact {
            name: Some("   ".into()),
            ..Contact::default()
        };
        assert_eq!(blank.display_name(), None);
    }

    #[test]
    fn call_event_status_parses() {
        let json = serde_json::json!({
            "event": "call",
            "data": [{ "id": "call-1", "from": "1@s.whatsapp.net", "status": "offer", "isVideo": true }]
        });
        let event: SourceEvent = serde_json::from_value(json).unwrap();
        match event {
            SourceEvent::Call(calls) => {
                assert_eq!(calls[0].status, CallStatus::Offer);
                assert!(calls[0].is_video);
            }
            other => panic!("expected call event, got {other:?}"),
        }
    }
}
