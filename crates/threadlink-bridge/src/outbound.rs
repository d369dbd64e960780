// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound routing: operator messages in Sink topics back to the Source.

use std::time::Duration;

use tracing::{debug, info, warn};

use threadlink_core::sink::{SinkOutgoing, TopicMessage};
use threadlink_core::source::{OutgoingContent, SendOptions};
use threadlink_core::{
    BridgeError, ConversationId, ConversationKind, OperatorId, SinkMessageId,
};

use crate::classify::{OutboundContent, classify_outbound, spoiler};
use crate::{BridgeEngine, metrics};

pub const REACTION_SUCCESS: &str = "👍";
pub const REACTION_FAILURE: &str = "👎";
pub const REACTION_FILTERED: &str = "🙈";

pub const UNAUTHORIZED_REPLY: &str = "🚫 You are not authorized to use this bridge.";

/// Delay between a forwarded message and the `available` presence.
pub const AVAILABLE_DELAY: Duration = Duration::from_secs(2);

/// Body text as the Source should see it, spoiler-wrapped when flagged.
fn outbound_body(text: &str, has_spoiler: bool) -> String {
    if has_spoiler {
        spoiler(text)
    } else {
        text.to_string()
    }
}

fn minimal_vcard(name: &str, phone: &str) -> String {
    format!("BEGIN:VCARD\nVERSION:3.0\nFN:{name}\nTEL;type=CELL:{phone}\nEND:VCARD")
}

impl BridgeEngine {
    /// Routes one operator message from a topic to its conversation.
    /// Never fails; errors become reactions and log lines.
    pub async fn route_outbound(&self, message: TopicMessage) {
        let Some(topic) = message.message_thread_id else {
            return;
        };
        let Some(sender) = message.sender_id() else {
            return;
        };

        if !self.inner.auth.is_authenticated(OperatorId(sender)) {
            info!(operator = sender, topic = topic.0, "unauthorized operator message");
            let reply = SinkOutgoing::Text {
                text: UNAUTHORIZED_REPLY.to_string(),
                reply_to: Some(message.message_id),
            };
            if let Err(e) = self.inner.sink.send(topic, reply).await {
                warn!(error = %e, "failed to send authorization denial");
            }
            return;
        }

        let Some(conversation) = self.inner.store.conversation_for_topic(topic).await else {
            warn!(topic = topic.0, "message in unmapped topic");
            return;
        };

        match conversation.kind() {
            ConversationKind::StatusBroadcast => {
                let status = message
                    .reply_to_message
                    .as_ref()
                    .and_then(|replied| self.inner.status_index.get(replied.message_id));
                match status {
                    Some(status) => self.reply_to_status(topic, &message, status).await,
                    None => debug!(topic = topic.0, "ignoring message in status topic"),
                }
                return;
            }
            ConversationKind::CallLog => {
                debug!(topic = topic.0, "ignoring message in call-log topic");
                return;
            }
            ConversationKind::Direct | ConversationKind::Group => {}
        }

        let Some(content) = classify_outbound(&message) else {
            debug!(topic = topic.0, "unsupported operator message dropped");
            return;
        };

        if let OutboundContent::Text(text) = content
            && self.inner.store.is_blocked(text).await
        {
            info!(conversation = %conversation, "outbound text blocked by filter");
            self.react(message.message_id, REACTION_FILTERED).await;
            return;
        }

        let typing = self.inner.bridge.typing_indicators;
        if typing {
            self.inner.presence.typing(&conversation).await;
        }
        let result = self.forward_outbound(&conversation, &message, content).await;
        if typing {
            self.inner
                .presence
                .available_after(&conversation, AVAILABLE_DELAY);
        }

        match result {
            Ok(Some(id)) => {
                debug!(conversation = %conversation, kind = content.kind(), source_message = %id, "outbound message bridged");
                metrics::record_bridged("outbound", content.kind());
                self.react(message.message_id, REACTION_SUCCESS).await;
                if let Err(e) = self.inner.store.touch_activity(&conversation).await {
                    warn!(conversation = %conversation, error = %e, "failed to update activity");
                }
            }
            Ok(None) => {
                debug!(conversation = %conversation, kind = content.kind(), "source returned no message id");
            }
            Err(e) => {
                metrics::record_failed("outbound");
                warn!(conversation = %conversation, kind = content.kind(), error = %e, "failed to bridge outbound message");
                self.react(message.message_id, REACTION_FAILURE).await;
            }
        }
    }

    async fn forward_outbound(
        &self,
        conversation: &ConversationId,
        message: &TopicMessage,
        content: OutboundContent<'_>,
    ) -> Result<Option<String>, BridgeError> {
        let media = &self.inner.media;
        let caption = message
            .caption
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| outbound_body(c, message.has_spoiler()));

        let outgoing = match content {
            OutboundContent::Text(text) => OutgoingContent::Text {
                text: outbound_body(text, message.has_spoiler()),
            },
            OutboundContent::Photo(photo) => OutgoingContent::Image {
                data: media.download_sink_file(&photo.file_id).await?,
                mimetype: "image/jpeg".to_string(),
                caption,
            },
            OutboundContent::Video(file) | OutboundContent::Animation(file) => {
                OutgoingContent::Video {
                    data: media.download_sink_file(&file.file_id).await?,
                    mimetype: file.mime_type.clone().unwrap_or_else(|| "video/mp4".into()),
                    caption,
                    gif_playback: matches!(content, OutboundContent::Animation(_)),
                    video_note: false,
                }
            }
            OutboundContent::VideoNote(file) => OutgoingContent::Video {
                data: media.download_sink_file(&file.file_id).await?,
                mimetype: "video/mp4".to_string(),
                caption: None,
                gif_playback: false,
                video_note: true,
            },
            OutboundContent::Voice(file) => OutgoingContent::Audio {
                data: media.download_sink_file(&file.file_id).await?,
                mimetype: file
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "audio/ogg; codecs=opus".into()),
                voice_note: true,
            },
            OutboundContent::Audio(file) => OutgoingContent::Audio {
                data: media.download_sink_file(&file.file_id).await?,
                mimetype: file.mime_type.clone().unwrap_or_else(|| "audio/mpeg".into()),
                voice_note: false,
            },
            OutboundContent::Document(file) => OutgoingContent::Document {
                data: media.download_sink_file(&file.file_id).await?,
                mimetype: file
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| "application/octet-stream".into()),
                file_name: file.file_name.clone().unwrap_or_else(|| "document".into()),
                caption,
            },
            OutboundContent::Sticker(sticker) => media.sticker_for_source(sticker).await?,
            OutboundContent::Location(location) => OutgoingContent::Location {
                latitude: location.latitude,
                longitude: location.longitude,
                name: None,
                address: None,
            },
            OutboundContent::Contact(contact) => {
                let display_name = match contact.last_name.as_deref() {
                    Some(last) if !last.is_empty() => format!("{} {last}", contact.first_name),
                    _ => contact.first_name.clone(),
                };
                let vcard = contact
                    .vcard
                    .clone()
                    .unwrap_or_else(|| minimal_vcard(&display_name, &contact.phone_number));
                OutgoingContent::Contact {
                    display_name,
                    vcard,
                }
            }
        };

        self.inner
            .source
            .send_message(conversation, outgoing, SendOptions::default())
            .await
    }

    /// Sets a reaction on a Sink message, logging failures.
    pub(crate) async fn react(&self, message: SinkMessageId, emoji: &str) {
        if let Err(e) = self.inner.sink.set_reaction(message, emoji).await {
            debug!(message = message.0, emoji, error = %e, "failed to set reaction");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spoiler_body_is_wrapped() {
        assert_eq!(outbound_body("secret", true), "||secret||");
        assert_eq!(outbound_body("plain", false), "plain");
    }

    #[test]
    fn minimal_vcard_carries_name_and_phone() {
        let vcard = minimal_vcard("Bob", "+4915");
        assert!(vcard.contains("FN:Bob"));
        assert_eq!(crate::classify::vcard_phone(&vcard).as_deref(), Some("+4915"));
    }
}
