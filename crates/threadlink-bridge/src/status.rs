// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status mirroring and replies to mirrored statuses.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, info, warn};

use threadlink_core::sink::{SinkOutgoing, TopicMessage};
use threadlink_core::source::{
    MessageKey, OutgoingContent, QuotedMessage, SendOptions, SourceMessage,
};
use threadlink_core::{ConversationId, SinkMessageId, TopicId};

use crate::classify::classify_inbound;
use crate::topics::TopicContext;
use crate::{BridgeEngine, metrics};

/// A mirrored status, remembered so operators can reply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusRef {
    /// Conversation of the status author.
    pub author: ConversationId,
    pub key: MessageKey,
    pub text: Option<String>,
}

#[derive(Default)]
struct IndexState {
    entries: HashMap<SinkMessageId, StatusRef>,
    order: VecDeque<SinkMessageId>,
}

/// Bounded map from mirrored Sink message to the original status.
/// The oldest entry is evicted once `capacity` is exceeded.
pub struct StatusReplyIndex {
    capacity: usize,
    state: Mutex<IndexState>,
}

impl StatusReplyIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(IndexState::default()),
        }
    }

    pub fn insert(&self, message: SinkMessageId, status: StatusRef) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.entries.insert(message, status).is_none() {
            state.order.push_back(message);
        }
        while state.order.len() > self.capacity {
            if let Some(oldest) = state.order.pop_front() {
                state.entries.remove(&oldest);
            }
        }
    }

    pub fn get(&self, message: SinkMessageId) -> Option<StatusRef> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.get(&message).cloned()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BridgeEngine {
    /// Mirrors a status update into the status topic.
    pub(crate) async fn mirror_status(&self, message: &SourceMessage) {
        if !self.inner.bridge.status_mirroring || message.key.from_me {
            return;
        }
        let Some(participant) = message.key.participant.as_deref() else {
            debug!(id = %message.key.id, "status without author dropped");
            return;
        };
        let Some(content) = message.message.as_ref().and_then(classify_inbound) else {
            debug!(id = %message.key.id, "unsupported status dropped");
            return;
        };

        let author_id = ConversationId::new(participant);
        let author = match author_id.phone() {
            Some(phone) => ConversationId::from_phone(&phone),
            None => author_id,
        };
        let name = self
            .resolve_sender_name(participant, message.push_name.as_deref())
            .await;
        let prefix = format!("📱 Status from {name}\n");
        let conversation = ConversationId::status_broadcast();

        match self
            .forward_content(&conversation, &TopicContext::default(), &content, Some(&prefix))
            .await
        {
            Ok(sink_id) => {
                self.inner.status_index.insert(
                    sink_id,
                    StatusRef {
                        author,
                        key: message.key.clone(),
                        text: content.text().map(str::to_string),
                    },
                );
                metrics::record_bridged("inbound", "status");
                debug!(author = %name, sink_message = sink_id.0, "status mirrored");
                if self.inner.bridge.auto_view_status
                    && let Err(e) = self
                        .inner
                        .source
                        .read_messages(std::slice::from_ref(&message.key))
                        .await
                {
                    debug!(error = %e, "failed to mark status viewed");
                }
            }
            Err(e) => warn!(author = %name, error = %e, "failed to mirror status"),
        }
    }

    /// Sends an operator's reply to a mirrored status back to its author.
    pub(crate) async fn reply_to_status(
        &self,
        topic: TopicId,
        message: &TopicMessage,
        status: StatusRef,
    ) {
        let Some(text) = message.body().filter(|t| !t.trim().is_empty()) else {
            debug!("non-text status reply ignored");
            return;
        };
        let options = SendOptions {
            quoted: Some(QuotedMessage {
                key: status.key.clone(),
                text: status.text.clone(),
            }),
        };
        let content = OutgoingContent::Text {
            text: text.to_string(),
        };
        match self
            .inner
            .source
            .send_message(&status.author, content, options)
            .await
        {
            Ok(_) => {
                info!(author = %status.author, "status reply sent");
                metrics::record_bridged("outbound", "status_reply");
                self.react(message.message_id, crate::outbound::REACTION_SUCCESS)
                    .await;
            }
            Err(e) => {
                warn!(author = %status.author, error = %e, "status reply failed");
                let reply = SinkOutgoing::Text {
                    text: format!("❌ Failed to reply to status: {e}"),
                    reply_to: Some(message.message_id),
                };
                if let Err(e) = self.inner.sink.send(topic, reply).await {
                    warn!(error = %e, "failed to report status reply failure");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(id: &str) -> StatusRef {
        StatusRef {
            author: ConversationId::new("1@s.whatsapp.net"),
            key: MessageKey {
                remote_jid: ConversationId::status_broadcast(),
                from_me: false,
                id: id.to_string(),
                participant: Some("1@s.whatsapp.net".into()),
            },
            text: None,
        }
    }

    #[test]
    fn index_evicts_oldest_beyond_capacity() {
        let index = StatusReplyIndex::new(2);
        index.insert(SinkMessageId(1), status("a"));
        index.insert(SinkMessageId(2), status("b"));
        index.insert(SinkMessageId(3), status("c"));
        assert_eq!(index.len(), 2);
        assert!(index.get(SinkMessageId(1)).is_none());
        assert_eq!(index.get(SinkMessageId(3)).unwrap().key.id, "c");
    }

    #[test]
    fn reinserting_does_not_duplicate_order() {
        let index = StatusReplyIndex::new(2);
        index.insert(SinkMessageId(1), status("a"));
        index.insert(SinkMessageId(1), status("a2"));
        index.insert(SinkMessageId(2), status("b"));
        assert_eq!(index.len(), 2);
        assert_eq!(index.get(SinkMessageId(1)).unwrap().key.id, "a2");
    }
}
