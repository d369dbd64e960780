// SPDX-FileCopyrightText: 2026 Threadlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-polling bookkeeping for `getUpdates`.

use std::collections::VecDeque;

use serde::Deserialize;
use tracing::debug;

use threadlink_core::sink::TopicMessage;

/// One raw update. The message is decoded separately so a single
/// unexpected shape cannot stall the offset.
#[derive(Debug, Deserialize)]
pub struct RawUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<serde_json::Value>,
}

/// Returns `true` if the message was posted by a human in the bridged supergroup.
pub fn is_operator_message(message: &TopicMessage, group_id: i64) -> bool {
    if message.chat.id != group_id {
        return false;
    }
    match &message.from {
        Some(user) => !user.is_bot,
        None => false,
    }
}

/// Pending updates and the next `getUpdates` offset.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    offset: i64,
    pending: VecDeque<TopicMessage>,
}

impl UpdateQueue {
    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn pop(&mut self) -> Option<TopicMessage> {
        self.pending.pop_front()
    }

    /// Records a batch, advancing the offset past every update in it.
    pub fn ingest(&mut self, updates: Vec<RawUpdate>, group_id: i64) {
        for update in updates {
            self.offset = self.offset.max(update.update_id + 1);
            let Some(raw) = update.message else {
                continue;
            };
            match serde_json::from_value::<TopicMessage>(raw) {
                Ok(message) if is_operator_message(&message, group_id) => {
                    self.pending.push_back(message);
                }
                Ok(message) => {
                    debug!(
                        update_id = update.update_id,
                        chat_id = message.chat.id,
                        "ignoring message outside the bridged group"
                    );
                }
                Err(e) => {
                    debug!(update_id = update.update_id, error = %e, "undecodable message skipped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(id: i64, chat: i64, is_bot: bool) -> RawUpdate {
        RawUpdate {
            update_id: id,
            message: Some(json!({
                "message_id": id,
                "message_thread_id": 5,
                "from": { "id": 1001, "is_bot": is_bot, "first_name": "Op" },
                "chat": { "id": chat, "type": "supergroup" },
                "date": 1_700_000_000,
                "text": "hello"
            })),
        }
    }

    #[test]
    fn keeps_only_human_messages_from_the_group() {
        let mut queue = UpdateQueue::default();
        queue.ingest(
            vec![update(10, -100, false), update(11, -200, false), update(12, -100, true)],
            -100,
        );

        assert_eq!(queue.offset(), 13);
        let message = queue.pop().unwrap();
        assert_eq!(message.text.as_deref(), Some("hello"));
        assert_eq!(message.message_thread_id.map(|t| t.0), Some(5));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn undecodable_updates_still_advance_the_offset() {
        let mut queue = UpdateQueue::default();
        queue.ingest(
            vec![
                RawUpdate {
                    update_id: 40,
                    message: Some(json!({ "chat": "not an object" })),
                },
                RawUpdate {
                    update_id: 41,
                    message: None,
                },
            ],
            -100,
        );
        assert_eq!(queue.offset(), 42);
        assert!(queue.pop().is_none());
    }
}
