// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound routing: Source messages into Sink topics.

use tracing::{debug, warn};

use threadlink_core::sink::SinkOutgoing;
use threadlink_core::source::{ContactMessage, SourceMessage};
use threadlink_core::{BridgeError, ConversationId, SinkMessageId, TopicId};

use crate::classify::{InboundContent, classify_inbound, decorate, vcard_phone};
use crate::topics::{TopicContext, formatted_phone};
use crate::{BridgeEngine, metrics};

/// Marker placed in front of messages the bridge account sent itself.
pub const OWN_MESSAGE_PREFIX: &str = "📤 ";

/// Attribution line for a group participant.
pub fn sender_prefix(name: &str) -> String {
    format!("👤 {name}:\n")
}

fn contact_outgoing(contact: &ContactMessage, prefix: Option<&str>) -> SinkOutgoing {
    let name = contact
        .display_name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or("Contact");
    match contact.vcard.as_deref().and_then(vcard_phone) {
        Some(phone_number) => SinkOutgoing::Contact {
            phone_number,
            first_name: name.to_string(),
            vcard: contact.vcard.clone(),
        },
        None => SinkOutgoing::text(
            decorate(prefix, Some(&format!("📇 {name}"))).unwrap_or_default(),
        ),
    }
}

impl BridgeEngine {
    /// Routes one Source message into its topic. Never fails; errors are logged.
    pub async fn route_inbound(&self, message: SourceMessage) {
        let conversation = message.conversation().clone();
        if conversation.is_status_broadcast() {
            self.mirror_status(&message).await;
            return;
        }

        let from_me = message.key.from_me;
        if from_me && !self.inner.bridge.mirror_own_messages {
            debug!(conversation = %conversation, "skipping own message");
            return;
        }

        let sender = message.sender_id().to_string();
        let push_name = message.push_name.as_deref();
        if !from_me {
            let sender_id = ConversationId::new(sender.as_str());
            let phone = sender_id
                .phone()
                .unwrap_or_else(|| sender_id.user_part().to_string());
            if let Err(e) = self
                .inner
                .store
                .record_participant(&sender, &phone, push_name)
                .await
            {
                warn!(participant = %sender, error = %e, "failed to record participant");
            }
        }

        let Some(content) = message.message.as_ref().and_then(classify_inbound) else {
            debug!(conversation = %conversation, id = %message.key.id, "unsupported message dropped");
            return;
        };

        let prefix = if from_me {
            Some(OWN_MESSAGE_PREFIX.to_string())
        } else if conversation.is_group() && sender != conversation.as_str() {
            let name = self.resolve_sender_name(&sender, push_name).await;
            Some(sender_prefix(&name))
        } else {
            None
        };

        // Our own push name must not title a contact's topic.
        let context = if from_me || conversation.is_group() {
            TopicContext::default()
        } else {
            TopicContext::with_push_name(push_name)
        };

        match self
            .forward_content(&conversation, &context, &content, prefix.as_deref())
            .await
        {
            Ok(sink_id) => {
                debug!(
                    conversation = %conversation,
                    kind = content.kind(),
                    sink_message = sink_id.0,
                    "inbound message bridged"
                );
                metrics::record_bridged("inbound", content.kind());
                if let Err(e) = self.inner.store.touch_activity(&conversation).await {
                    warn!(conversation = %conversation, error = %e, "failed to update activity");
                }
                if !from_me && self.inner.bridge.read_receipts && !message.key.id.is_empty() {
                    self.inner.receipts.enqueue(message.key.clone());
                }
            }
            Err(e) => {
                metrics::record_failed("inbound");
                warn!(
                    conversation = %conversation,
                    kind = content.kind(),
                    error = %e,
                    "failed to bridge inbound message"
                );
            }
        }
    }

    /// Display name for a message author: contact directory, then participant
    /// profile, then push name, then the formatted phone.
    pub async fn resolve_sender_name(&self, participant: &str, push_name: Option<&str>) -> String {
        let id = ConversationId::new(participant);
        if let Some(phone) = id.phone()
            && let Some(name) = self.inner.store.contact_name(&phone).await
        {
            return name;
        }
        if let Some(name) = self
            .inner
            .store
            .participant(participant)
            .await
            .and_then(|p| p.name)
        {
            return name;
        }
        if let Some(name) = push_name.map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        formatted_phone(&id)
    }

    /// Sends classified content into the conversation's topic, healing the
    /// topic once if the Sink lost it.
    pub(crate) async fn forward_content(
        &self,
        conversation: &ConversationId,
        context: &TopicContext,
        content: &InboundContent<'_>,
        prefix: Option<&str>,
    ) -> Result<SinkMessageId, BridgeError> {
        let topics = &self.inner.topics;
        let sink = &self.inner.sink;
        match *content {
            InboundContent::Text(text) => {
                let text = decorate(prefix, Some(text)).unwrap_or_default();
                topics
                    .with_topic_healing(conversation, context, |topic| {
                        sink.send(topic, SinkOutgoing::text(text.clone()))
                    })
                    .await
            }
            InboundContent::Location(location) => {
                let message = SinkOutgoing::Location {
                    latitude: location.degrees_latitude,
                    longitude: location.degrees_longitude,
                };
                let label = decorate(
                    prefix,
                    location.name.as_deref().or(location.address.as_deref()),
                );
                topics
                    .with_topic_healing(conversation, context, |topic| {
                        self.send_with_label(topic, message.clone(), label.clone())
                    })
                    .await
            }
            InboundContent::Contact(contact) => {
                let message = contact_outgoing(contact, prefix);
                topics
                    .with_topic_healing(conversation, context, |topic| {
                        sink.send(topic, message.clone())
                    })
                    .await
            }
            InboundContent::Contacts(contacts) => {
                let messages: Vec<SinkOutgoing> = contacts
                    .iter()
                    .map(|c| contact_outgoing(c, prefix))
                    .collect();
                topics
                    .with_topic_healing(conversation, context, |topic| {
                        self.send_all(topic, messages.clone())
                    })
                    .await
            }
            _ => {
                let prepared = self.inner.media.prepare_inbound(content, prefix).await?;
                let media = &self.inner.media;
                topics
                    .with_topic_healing(conversation, context, |topic| {
                        media.send_prepared(topic, &prepared)
                    })
                    .await
            }
        }
    }

    /// Sends an optional text label followed by a message that cannot carry a caption.
    async fn send_with_label(
        &self,
        topic: TopicId,
        message: SinkOutgoing,
        label: Option<String>,
    ) -> Result<SinkMessageId, BridgeError> {
        if let Some(label) = label {
            self.inner.sink.send(topic, SinkOutgoing::text(label)).await?;
        }
        self.inner.sink.send(topic, message).await
    }

    async fn send_all(
        &self,
        topic: TopicId,
        messages: Vec<SinkOutgoing>,
    ) -> Result<SinkMessageId, BridgeError> {
        let mut last = SinkMessageId::default();
        for message in messages {
            last = self.inner.sink.send(topic, message).await?;
        }
        Ok(last)
    }
}
